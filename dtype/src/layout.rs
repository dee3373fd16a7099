//! Byte layout of value types.
//!
//! Aggregates follow C struct rules: every field starts at the next offset
//! aligned to the field's own alignment, and the total size is rounded up to
//! the largest field alignment. An empty aggregate has size 0 and alignment 1.
//!
//! [`DType::leaves`] flattens an aggregate into its non-aggregate fields in
//! depth-first pre-order, field index ascending. This is the order in which
//! aggregate loads and stores are decomposed, at any nesting depth.

use smallvec::SmallVec;

use crate::{Aggregate, DType};

/// Pointer width of both address spaces.
pub const POINTER_BYTES: usize = 8;

/// Size and alignment of a type, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    pub size: usize,
    pub align: usize,
}

impl Layout {
    pub const fn new(size: usize, align: usize) -> Self {
        Self { size, align }
    }
}

/// Round `value` up to the next multiple of `align` (a power of two).
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// A non-aggregate field reached by flattening an aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Field indices from the root aggregate down to this leaf.
    pub path: SmallVec<[usize; 4]>,
    /// Byte offset from the start of the root aggregate.
    pub offset: usize,
    pub dtype: DType,
}

impl Aggregate {
    pub fn layout(&self) -> Layout {
        let mut offset = 0;
        let mut align = 1;
        for field in self.fields() {
            let field_layout = field.layout();
            offset = align_up(offset, field_layout.align) + field_layout.size;
            align = align.max(field_layout.align);
        }
        Layout::new(align_up(offset, align), align)
    }

    /// Byte offset of every direct field.
    pub fn field_offsets(&self) -> SmallVec<[usize; 4]> {
        let mut offset = 0;
        self.fields()
            .iter()
            .map(|field| {
                let field_layout = field.layout();
                let start = align_up(offset, field_layout.align);
                offset = start + field_layout.size;
                start
            })
            .collect()
    }
}

impl DType {
    pub fn layout(&self) -> Layout {
        match self {
            Self::Scalar(s) => Layout::new(s.bytes(), s.bytes()),
            Self::Ptr(_) => Layout::new(POINTER_BYTES, POINTER_BYTES),
            Self::Aggregate(agg) => agg.layout(),
        }
    }

    /// Flatten into leaves (depth-first, pre-order). A non-aggregate type is
    /// its own single leaf with an empty path.
    pub fn leaves(&self) -> Vec<Leaf> {
        let mut out = Vec::new();
        collect_leaves(self, &mut SmallVec::new(), 0, &mut out);
        out
    }

    /// Byte offset of the field at `path` relative to the start of `self`.
    pub fn offset_of(&self, path: &[usize]) -> Option<usize> {
        let mut current = self;
        let mut offset = 0;
        for &index in path {
            let agg = current.as_aggregate()?;
            offset += *agg.field_offsets().get(index)?;
            current = agg.field(index)?;
        }
        Some(offset)
    }
}

fn collect_leaves(dtype: &DType, path: &mut SmallVec<[usize; 4]>, base: usize, out: &mut Vec<Leaf>) {
    match dtype {
        DType::Aggregate(agg) => {
            for (index, (field, offset)) in agg.fields().iter().zip(agg.field_offsets()).enumerate() {
                path.push(index);
                collect_leaves(field, path, base + offset, out);
                path.pop();
            }
        }
        leaf => out.push(Leaf { path: path.clone(), offset: base, dtype: leaf.clone() }),
    }
}
