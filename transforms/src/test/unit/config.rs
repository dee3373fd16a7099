use stratum_dtype::DType;

use crate::{IndexBitwidth, PipelineOptions};

#[test]
fn test_defaults() {
    let options = PipelineOptions::default();
    assert!(!options.verify_each_pass);
    assert!(!options.dump_ir);
    assert_eq!(options.hoist_limit, None);
    assert_eq!(options.index_bitwidth, IndexBitwidth::W64);
}

#[test]
fn test_builder() {
    let options = PipelineOptions::builder()
        .verify_each_pass(true)
        .dump_ir(true)
        .hoist_limit(4096)
        .index_bitwidth(IndexBitwidth::W32)
        .build();
    assert!(options.verify_each_pass && options.dump_ir);
    assert_eq!(options.hoist_limit, Some(4096));
    assert_eq!(options.index_bitwidth.size_dtype(), DType::Int32);
    assert_eq!(IndexBitwidth::W64.size_dtype(), DType::Index);
}
