//! Pass trait.

use enumset::EnumSet;
use stratum_ir::{Module, Stage};
use stratum_status::Status;

use crate::context::PassContext;

/// A module transformation run by the [`Pipeline`](crate::Pipeline).
///
/// Passes are standalone objects with no state of their own; everything a
/// pass consults besides the module comes through the [`PassContext`]. On
/// error the module is left in an unspecified state and the run aborts.
pub trait Pass: Send + Sync {
    /// Name used in logs and error context.
    fn name(&self) -> &'static str;

    /// Stage this pass marks on the module when it succeeds.
    fn stage(&self) -> Stage;

    /// Stages that must already be applied.
    fn requires(&self) -> EnumSet<Stage> {
        EnumSet::empty()
    }

    fn run(&self, module: &mut Module, ctx: &PassContext<'_>) -> Result<(), Status>;
}
