//! Module analyses shared by the passes.

use std::collections::{HashMap, HashSet};

use smallvec::{SmallVec, smallvec};
use stratum_ir::{Function, Module, Op, ValueId};

/// Names of functions that can reach themselves through the call graph.
pub fn recursive_functions(module: &Module) -> HashSet<String> {
    let graph: HashMap<&str, Vec<&str>> = module
        .functions
        .iter()
        .map(|function| (function.name.as_str(), function.callees().collect()))
        .collect();

    graph
        .keys()
        .filter(|&&root| {
            let mut seen = HashSet::new();
            let mut stack: Vec<&str> = graph[root].clone();
            while let Some(name) = stack.pop() {
                if name == root {
                    return true;
                }
                if seen.insert(name)
                    && let Some(callees) = graph.get(name)
                {
                    stack.extend(callees.iter().copied());
                }
            }
            false
        })
        .map(|name| name.to_string())
        .collect()
}

/// Allocations of `function` whose address escapes it.
///
/// An address escapes when it, or a pointer derived from it with `PtrAdd`,
/// is stored as a value, passed to a call or builtin, returned, placed in an
/// aggregate or selected between. Loading from, storing to, offsetting and
/// deallocating it are local uses.
pub fn escaping_allocations(function: &Function) -> HashSet<ValueId> {
    let mut origin: HashMap<ValueId, ValueId> = HashMap::new();
    let mut escaping = HashSet::new();

    for operation in &function.body {
        let escaped: SmallVec<[ValueId; 4]> = match &operation.op {
            Op::Alloc { .. } => {
                if let Some(result) = operation.result() {
                    origin.insert(result.id, result.id);
                }
                continue;
            }
            Op::PtrAdd { base, .. } => {
                if let Some(&root) = origin.get(base)
                    && let Some(result) = operation.result()
                {
                    origin.insert(result.id, root);
                }
                continue;
            }
            Op::Load { .. } | Op::Dealloc { .. } => continue,
            Op::Store { value, .. } => smallvec![*value],
            op => op.operands(),
        };
        escaping.extend(escaped.iter().filter_map(|value| origin.get(value).copied()));
    }
    escaping
}
