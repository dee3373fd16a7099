//! Pass driver.

use snafu::ResultExt;
use stratum_ir::{Module, Stage, verify_module};
use stratum_status::{Status, StatusContext};

use crate::context::PassContext;
use crate::error::*;
use crate::pass::Pass;
use crate::passes::*;

/// The passes of a full lowering, in order.
pub fn standard_passes() -> Vec<Box<dyn Pass>> {
    vec![
        Box::new(AllocsToGlobals),
        Box::new(DecomposeAggregates),
        Box::new(ExpandOps),
        Box::new(LowerGlobals),
        Box::new(LowerToRuntimeBuiltins),
        Box::new(PackArguments),
        Box::new(PopulateFunctionMetadata),
    ]
}

/// Runs an ordered list of passes over a module.
///
/// ```rust,ignore
/// let ctx = PassContext::new(&allocator, &builtins, &options);
/// let lowered = Pipeline::new(ctx).run(module)?;
/// assert!(lowered.is_finalized());
/// ```
pub struct Pipeline<'a> {
    ctx: PassContext<'a>,
    passes: Vec<Box<dyn Pass>>,
}

impl<'a> Pipeline<'a> {
    /// The standard pipeline.
    pub fn new(ctx: PassContext<'a>) -> Self {
        Self::from_passes(ctx, standard_passes())
    }

    /// A pipeline running exactly `passes`, in order.
    pub fn from_passes(ctx: PassContext<'a>, passes: Vec<Box<dyn Pass>>) -> Self {
        Self { ctx, passes }
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Run every pass over `module`.
    ///
    /// The module is returned only when all passes succeed; on failure it is
    /// dropped together with whatever partial rewrite the failing pass left.
    #[tracing::instrument(skip_all, fields(module = %module.name, device = %self.ctx.device))]
    pub fn run(&self, mut module: Module) -> Result<Module, Status> {
        if self.ctx.options.verify_each_pass {
            verify_module(&module).status_context(|| "input module")?;
        }

        for pass in &self.passes {
            self.check_order(pass.as_ref(), &module).status_context(|| pass.name())?;

            tracing::debug!(pass = pass.name(), "running pass");
            if let Err(status) = pass.run(&mut module, &self.ctx) {
                tracing::error!(pass = pass.name(), %status, "pass failed; aborting");
                return Err(status.wrap(pass.name()));
            }
            module.stages.insert(pass.stage());

            if self.ctx.options.verify_each_pass {
                verify_module(&module).context(MalformedSnafu).status_context(|| pass.name())?;
            }
            if self.ctx.options.dump_ir {
                tracing::debug!("after {}:\n{module}", pass.name());
            }
        }
        Ok(module)
    }

    fn check_order(&self, pass: &dyn Pass, module: &Module) -> Result<()> {
        snafu::ensure!(!module.is_finalized(), FinalizedSnafu { module: module.name.clone() });
        let missing = pass.requires() - module.stages;
        snafu::ensure!(
            missing.is_empty(),
            MissingStageSnafu {
                pass: pass.name(),
                missing: missing.iter().map(|stage: Stage| stage.as_ref().to_string()).collect::<Vec<_>>().join(", "),
            }
        );
        Ok(())
    }
}
