use proptest::prelude::*;

use super::generators::aggregate_dtype;
use crate::layout::align_up;

proptest! {
    #[test]
    fn leaves_are_aligned_and_in_bounds(dtype in aggregate_dtype(3)) {
        let layout = dtype.layout();
        for leaf in dtype.leaves() {
            let leaf_layout = leaf.dtype.layout();
            prop_assert_eq!(leaf.offset % leaf_layout.align, 0);
            prop_assert!(leaf.offset + leaf_layout.size <= layout.size);
            prop_assert_eq!(dtype.offset_of(&leaf.path), Some(leaf.offset));
        }
        prop_assert_eq!(layout.size, align_up(layout.size, layout.align));
    }

    #[test]
    fn leaves_do_not_overlap(dtype in aggregate_dtype(3)) {
        let leaves = dtype.leaves();
        for pair in leaves.windows(2) {
            prop_assert!(pair[0].offset + pair[0].dtype.bytes() <= pair[1].offset);
        }
    }
}
