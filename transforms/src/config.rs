//! Pipeline configuration.
//!
//! Provides typed configuration with a bon builder and environment fallbacks.

use bon::bon;
use stratum_dtype::DType;

/// Width of the size half of a packed aggregate argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexBitwidth {
    W32,
    #[default]
    W64,
}

impl IndexBitwidth {
    /// `STRATUM_INDEX_BITWIDTH=32|64`; anything else selects the default.
    pub fn from_env() -> Self {
        match std::env::var("STRATUM_INDEX_BITWIDTH").as_deref() {
            Ok("32") => Self::W32,
            _ => Self::W64,
        }
    }

    /// Dtype of aggregate size arguments.
    pub fn size_dtype(&self) -> DType {
        match self {
            Self::W32 => DType::Int32,
            Self::W64 => DType::Index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Run the module verifier after every pass.
    pub verify_each_pass: bool,
    /// Log the module at debug level after every pass.
    pub dump_ir: bool,
    /// Largest local allocation (bytes) promoted to a global.
    pub hoist_limit: Option<usize>,
    pub index_bitwidth: IndexBitwidth,
}

#[bon]
impl PipelineOptions {
    #[builder]
    pub fn builder(
        #[builder(default = false)] verify_each_pass: bool,
        #[builder(default = false)] dump_ir: bool,
        hoist_limit: Option<usize>,
        #[builder(default)] index_bitwidth: IndexBitwidth,
    ) -> Self {
        Self { verify_each_pass, dump_ir, hoist_limit, index_bitwidth }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `STRATUM_VERIFY=1` - Verify the module after every pass
    /// * `STRATUM_DUMP_IR=1` - Log the module after every pass
    /// * `STRATUM_HOIST_LIMIT=N` - Keep allocations above N bytes local
    /// * `STRATUM_INDEX_BITWIDTH=32|64` - Aggregate size argument width (default: 64)
    pub fn from_env() -> Self {
        let flag = |name: &str| std::env::var(name).is_ok_and(|value| value == "1");
        Self {
            verify_each_pass: flag("STRATUM_VERIFY"),
            dump_ir: flag("STRATUM_DUMP_IR"),
            hoist_limit: std::env::var("STRATUM_HOIST_LIMIT").ok().and_then(|s| s.parse().ok()),
            index_bitwidth: IndexBitwidth::from_env(),
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
