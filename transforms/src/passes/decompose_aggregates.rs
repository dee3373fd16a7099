//! Split aggregate loads and stores into per-leaf scalar accesses.
//!
//! Leaves are visited depth-first in field order, at
//! `base offset + leaf offset`. Aggregate values are tracked as the list of
//! their leaf values so that an `extract` from a decomposed value forwards the
//! leaf directly. A value that is still needed whole (by a call, a return or
//! an aggregate-typed extract) is rebuilt with `make_aggregate` under its
//! original id.

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;
use snafu::OptionExt;
use stratum_dtype::DType;
use stratum_ir::{Function, Module, Op, Operation, Stage, Value, ValueId};
use stratum_status::Status;

use crate::context::PassContext;
use crate::error::*;
use crate::pass::Pass;

#[derive(Debug, Clone, Copy, Default)]
pub struct DecomposeAggregates;

impl Pass for DecomposeAggregates {
    fn name(&self) -> &'static str {
        "decompose-aggregate-loads-and-stores"
    }

    fn stage(&self) -> Stage {
        Stage::AggregatesDecomposed
    }

    #[tracing::instrument(skip_all, fields(module = %module.name))]
    fn run(&self, module: &mut Module, _ctx: &PassContext<'_>) -> Result<(), Status> {
        for function in module.definitions_mut() {
            decompose_function(function)?;
        }
        Ok(())
    }
}

/// Decompose every aggregate load and store of `function`.
pub fn decompose_function(function: &mut Function) -> Result<()> {
    let mut types = function.value_types();
    let needs_value = values_needed_whole(function, &types);
    let body = std::mem::take(&mut function.body);

    let mut rewriter = Rewriter { function, types: &mut types, out: Vec::with_capacity(body.len()) };
    let mut leaves: HashMap<ValueId, Vec<ValueId>> = HashMap::new();
    let mut forward: HashMap<ValueId, ValueId> = HashMap::new();
    let mut split = 0;

    for mut operation in body {
        operation.op.map_operands(|value| forward.get(&value).copied().unwrap_or(value));

        match &operation.op {
            Op::Load { ptr, offset } if operation.result().is_some_and(|value| value.dtype.is_aggregate()) => {
                let Some(result) = operation.result().cloned() else { continue };
                let values: Vec<ValueId> = result
                    .dtype
                    .leaves()
                    .into_iter()
                    .map(|leaf| rewriter.emit(Op::Load { ptr: *ptr, offset: offset + leaf.offset }, leaf.dtype))
                    .collect();
                if needs_value.contains(&result.id) {
                    rewriter.rebuild(&result.dtype, &mut values.iter().copied(), Some(result.clone()))?;
                }
                leaves.insert(result.id, values);
            }
            Op::Store { ptr, offset, value } if rewriter.types.get(value).is_some_and(DType::is_aggregate) => {
                let dtype = rewriter.dtype(*value)?;
                let values = match leaves.get(value) {
                    Some(values) => values.clone(),
                    None => {
                        split += 1;
                        let values = rewriter.split(*value, &dtype);
                        leaves.insert(*value, values.clone());
                        values
                    }
                };
                for (leaf, leaf_value) in dtype.leaves().into_iter().zip(values) {
                    rewriter.out.push(Operation::effect(Op::Store {
                        ptr: *ptr,
                        offset: offset + leaf.offset,
                        value: leaf_value,
                    }));
                }
            }
            Op::MakeAggregate { fields } => {
                let flattened = fields.iter().try_fold(Vec::new(), |mut acc, field| {
                    if rewriter.types.get(field).is_some_and(DType::is_aggregate) {
                        acc.extend(leaves.get(field)?.iter().copied());
                    } else {
                        acc.push(*field);
                    }
                    Some(acc)
                });
                if let (Some(flattened), Some(result)) = (flattened, operation.result()) {
                    leaves.insert(result.id, flattened);
                }
                rewriter.out.push(operation);
            }
            Op::Extract { src, path } if leaves.contains_key(src) => {
                let Some(result) = operation.result().cloned() else { continue };
                let src_dtype = rewriter.dtype(*src)?;
                let selected = select_leaves(&src_dtype, path, &leaves[src]);
                if result.dtype.is_aggregate() {
                    leaves.insert(result.id, selected);
                    rewriter.out.push(operation);
                } else {
                    let [leaf] = selected.as_slice() else {
                        return EmptyLeafRangeSnafu { path: path.to_vec(), dtype: src_dtype }.fail();
                    };
                    forward.insert(result.id, *leaf);
                }
            }
            _ => rewriter.out.push(operation),
        }
    }

    let out = rewriter.out;
    function.body = out;
    let removed = function.eliminate_dead_code();
    tracing::debug!(function = %function.name, split, forwarded = forward.len(), removed, "aggregates decomposed");
    Ok(())
}

/// Leaf values of the field at `path` out of the leaves of `dtype`.
fn select_leaves(dtype: &DType, path: &[usize], values: &[ValueId]) -> Vec<ValueId> {
    dtype
        .leaves()
        .iter()
        .zip(values)
        .filter(|(leaf, _)| leaf.path.starts_with(path))
        .map(|(_, value)| *value)
        .collect()
}

/// Aggregate values with a user that needs the whole value.
///
/// Aggregate stores and scalar extracts are served from leaves and do not
/// count.
fn values_needed_whole(function: &Function, types: &HashMap<ValueId, DType>) -> HashSet<ValueId> {
    let is_aggregate = |value: &ValueId| types.get(value).is_some_and(DType::is_aggregate);
    let mut needed = HashSet::new();
    for operation in &function.body {
        let operands: SmallVec<[ValueId; 4]> = match &operation.op {
            Op::Store { ptr, .. } => SmallVec::from_slice(&[*ptr]),
            Op::Extract { .. } if operation.results.iter().all(|value| !value.dtype.is_aggregate()) => {
                SmallVec::new()
            }
            op => op.operands(),
        };
        needed.extend(operands.into_iter().filter(|value| is_aggregate(value)));
    }
    needed
}

struct Rewriter<'f> {
    function: &'f mut Function,
    types: &'f mut HashMap<ValueId, DType>,
    out: Vec<Operation>,
}

impl Rewriter<'_> {
    fn dtype(&self, value: ValueId) -> Result<DType> {
        self.types.get(&value).cloned().context(UnknownValueSnafu { function: self.function.name.clone(), value })
    }

    fn emit(&mut self, op: Op, dtype: DType) -> ValueId {
        let value = self.function.fresh_value(dtype);
        self.types.insert(value.id, value.dtype.clone());
        let id = value.id;
        self.out.push(Operation::with_result(op, value));
        id
    }

    /// Extract every leaf of an untracked aggregate value.
    fn split(&mut self, value: ValueId, dtype: &DType) -> Vec<ValueId> {
        dtype
            .leaves()
            .into_iter()
            .map(|leaf| self.emit(Op::Extract { src: value, path: leaf.path }, leaf.dtype))
            .collect()
    }

    /// Rebuild an aggregate from its leaves, nested aggregates first.
    ///
    /// The outermost `make_aggregate` defines `result` when given.
    fn rebuild(
        &mut self,
        dtype: &DType,
        leaves: &mut impl Iterator<Item = ValueId>,
        result: Option<Value>,
    ) -> Result<ValueId> {
        let Some(aggregate) = dtype.as_aggregate() else {
            return leaves.next().context(EmptyLeafRangeSnafu { path: Vec::<usize>::new(), dtype: dtype.clone() });
        };
        let fields = aggregate
            .fields()
            .iter()
            .map(|field| self.rebuild(field, leaves, None))
            .collect::<Result<SmallVec<_>>>()?;
        let op = Op::MakeAggregate { fields };
        Ok(match result {
            Some(result) => {
                let id = result.id;
                self.out.push(Operation::with_result(op, result));
                id
            }
            None => self.emit(op, dtype.clone()),
        })
    }
}
