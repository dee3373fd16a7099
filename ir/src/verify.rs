//! Structural well-formedness checks for a [`Module`].

use std::collections::{HashMap, HashSet};

use snafu::ensure;

use crate::error::*;
use crate::function::Function;
use crate::module::Module;
use crate::op::Op;

/// Check module-level invariants:
///
/// - function and global names are unique;
/// - every value is defined once, before any use;
/// - global alignments are powers of two;
/// - global initializers match the declared size;
/// - calls target known functions with matching arity;
/// - returns match the signature's result count.
pub fn verify_module(module: &Module) -> Result<()> {
    let mut names = HashSet::new();
    for function in &module.functions {
        ensure!(names.insert(function.name.as_str()), DuplicateFunctionSnafu { name: function.name.clone() });
    }

    let mut globals = HashSet::new();
    for global in &module.globals {
        ensure!(globals.insert(global.name.as_str()), DuplicateGlobalSnafu { name: global.name.clone() });
        ensure!(
            global.align.is_power_of_two(),
            GlobalAlignmentSnafu { name: global.name.clone(), align: global.align }
        );
        if let Some(actual) = global.init.len() {
            ensure!(
                actual == global.size,
                InitializerSizeSnafu { name: global.name.clone(), declared: global.size, actual }
            );
        }
    }

    let arities: HashMap<&str, usize> =
        module.functions.iter().map(|function| (function.name.as_str(), function.signature.params.len())).collect();
    for function in &module.functions {
        verify_function(function, &arities)?;
    }
    Ok(())
}

fn verify_function(function: &Function, arities: &HashMap<&str, usize>) -> Result<()> {
    let name = || function.name.clone();
    if function.is_external() {
        ensure!(function.body.is_empty(), ExternalWithBodySnafu { function: name() });
        return Ok(());
    }

    let mut defined = HashSet::new();
    for param in &function.signature.params {
        ensure!(defined.insert(param.id), RedefinitionSnafu { function: name(), value: param.id });
    }

    for operation in &function.body {
        for operand in operation.operands() {
            ensure!(defined.contains(&operand), UseBeforeDefSnafu { function: name(), value: operand });
        }
        match &operation.op {
            Op::Call { callee, args } => {
                let Some(&expected) = arities.get(callee.as_str()) else {
                    return UnknownCalleeSnafu { caller: name(), callee: callee.clone() }.fail();
                };
                ensure!(
                    args.len() == expected,
                    CallAritySnafu { caller: name(), callee: callee.clone(), expected, actual: args.len() }
                );
            }
            Op::Return { values } => {
                let expected = function.signature.results.len();
                ensure!(values.len() == expected, ReturnAritySnafu { function: name(), expected, actual: values.len() });
            }
            _ => {}
        }
        for result in &operation.results {
            ensure!(defined.insert(result.id), RedefinitionSnafu { function: name(), value: result.id });
        }
    }
    Ok(())
}
