//! Functions and the checked [`FunctionBuilder`].

use std::collections::{HashMap, HashSet};

use smallvec::{SmallVec, smallvec};
use snafu::{OptionExt, ensure};
use stratum_dtype::ext::HasDType;
use stratum_dtype::{AddrSpace, DType};

use crate::error::*;
use crate::metadata::Metadata;
use crate::op::{Op, Operation};
use crate::types::*;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Value>,
    /// Result types; empty for a void function.
    pub results: Vec<DType>,
}

impl Signature {
    pub fn param_types(&self) -> impl Iterator<Item = &DType> {
        self.params.iter().map(|param| &param.dtype)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Linkage {
    /// Defined in this module.
    #[default]
    Internal,
    /// Declaration only; resolved by the loader.
    External,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub signature: Signature,
    pub body: Vec<Operation>,
    pub linkage: Linkage,
    pub metadata: Metadata,
    next_value: u32,
}

impl Function {
    /// An internal function with the given parameter types and an empty body.
    pub fn new(
        name: impl Into<String>,
        params: impl IntoIterator<Item = DType>,
        results: impl IntoIterator<Item = DType>,
    ) -> Self {
        let params: Vec<Value> =
            params.into_iter().enumerate().map(|(i, dtype)| Value::new(ValueId(i as u32), dtype)).collect();
        Self {
            name: name.into(),
            next_value: params.len() as u32,
            signature: Signature { params, results: results.into_iter().collect() },
            body: Vec::new(),
            linkage: Linkage::Internal,
            metadata: Metadata::default(),
        }
    }

    /// An external declaration.
    pub fn declare(
        name: impl Into<String>,
        params: impl IntoIterator<Item = DType>,
        results: impl IntoIterator<Item = DType>,
    ) -> Self {
        Self { linkage: Linkage::External, ..Self::new(name, params, results) }
    }

    pub fn is_external(&self) -> bool {
        self.linkage == Linkage::External
    }

    /// Allocate a new value id in this function.
    pub fn fresh_value(&mut self, dtype: DType) -> Value {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        Value::new(id, dtype)
    }

    /// Dtype of every parameter and op result.
    pub fn value_types(&self) -> HashMap<ValueId, DType> {
        self.signature
            .params
            .iter()
            .chain(self.body.iter().flat_map(|operation| operation.results.iter()))
            .map(|value| (value.id, value.dtype.clone()))
            .collect()
    }

    /// Names of every function called from the body, in order of appearance.
    pub fn callees(&self) -> impl Iterator<Item = &str> {
        self.body.iter().filter_map(|operation| match &operation.op {
            Op::Call { callee, .. } => Some(callee.as_str()),
            _ => None,
        })
    }

    pub fn count_ops(&self, predicate: impl Fn(&Op) -> bool) -> usize {
        self.body.iter().filter(|operation| predicate(&operation.op)).count()
    }

    /// Remove pure operations whose results are never used.
    ///
    /// Returns the number of removed operations.
    pub fn eliminate_dead_code(&mut self) -> usize {
        let mut live: HashSet<ValueId> = HashSet::new();
        let mut keep = vec![true; self.body.len()];
        for (index, operation) in self.body.iter().enumerate().rev() {
            let used = operation.results.iter().any(|value| live.contains(&value.id));
            if operation.op.is_pure() && !used {
                keep[index] = false;
                continue;
            }
            live.extend(operation.operands());
        }

        let before = self.body.len();
        let mut keep = keep.into_iter();
        self.body.retain(|_| keep.next().unwrap_or(true));
        before - self.body.len()
    }

    /// Replace uses of values according to `substitutions`.
    pub fn substitute(&mut self, substitutions: &HashMap<ValueId, ValueId>) {
        if substitutions.is_empty() {
            return;
        }
        let resolve = |mut value: ValueId| {
            while let Some(next) = substitutions.get(&value) {
                value = *next;
            }
            value
        };
        for operation in &mut self.body {
            operation.op.map_operands(resolve);
        }
    }
}

/// Builds a function body with operand type checks.
///
/// ```rust,ignore
/// let mut f = FunctionBuilder::new("axpy", [DType::Float32, DType::Float32], [DType::Float32]);
/// let [a, x] = [f.param(0)?, f.param(1)?];
/// let y = f.binary(BinaryOp::Mul, a, x)?;
/// f.ret(&[y])?;
/// let function = f.finish();
/// ```
#[derive(Debug)]
pub struct FunctionBuilder {
    function: Function,
    types: HashMap<ValueId, DType>,
}

impl FunctionBuilder {
    pub fn new(
        name: impl Into<String>,
        params: impl IntoIterator<Item = DType>,
        results: impl IntoIterator<Item = DType>,
    ) -> Self {
        let function = Function::new(name, params, results);
        let types = function.value_types();
        Self { function, types }
    }

    pub fn param(&self, index: usize) -> Result<ValueId> {
        let param = self
            .function
            .signature
            .params
            .get(index)
            .context(ParamOutOfRangeSnafu { function: self.function.name.clone(), index })?;
        Ok(param.id)
    }

    pub fn params(&self) -> Vec<ValueId> {
        self.function.signature.params.iter().map(|param| param.id).collect()
    }

    pub fn dtype(&self, value: ValueId) -> Result<&DType> {
        self.types.get(&value).context(UnknownValueSnafu { function: self.function.name.clone(), value })
    }

    fn push(&mut self, op: Op, dtype: DType) -> ValueId {
        let result = self.function.fresh_value(dtype.clone());
        self.types.insert(result.id, dtype);
        let id = result.id;
        self.function.body.push(Operation::with_result(op, result));
        id
    }

    fn pointer(&self, value: ValueId) -> Result<AddrSpace> {
        match self.dtype(value)? {
            DType::Ptr(space) => Ok(*space),
            other => NotAPointerSnafu { value, dtype: other.clone() }.fail(),
        }
    }

    pub fn constant(&mut self, value: ConstValue, dtype: DType) -> Result<ValueId> {
        let fits = dtype.scalar().is_some_and(|scalar| value.fits(scalar));
        ensure!(fits, ConstDTypeMismatchSnafu { value: value.to_string(), dtype });
        Ok(self.push(Op::Const(value), dtype))
    }

    /// A constant typed after the Rust value: `f.literal(2.0f32)`.
    pub fn literal<T: HasDType + Into<ConstValue>>(&mut self, value: T) -> Result<ValueId> {
        self.constant(value.into(), T::DTYPE)
    }

    pub fn unary(&mut self, op: UnaryOp, src: ValueId) -> Result<ValueId> {
        let dtype = self.dtype(src)?.clone();
        let valid = match op {
            UnaryOp::Not => dtype.is_int() || dtype.is_bool(),
            UnaryOp::Neg | UnaryOp::Abs => dtype.is_int() || dtype.is_float(),
            UnaryOp::Sqrt | UnaryOp::Exp | UnaryOp::Log => dtype.is_float(),
        };
        ensure!(valid, InvalidDTypeForUnaryOpSnafu { operation: op, dtype });
        Ok(self.push(Op::Unary { op, src }, dtype))
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> Result<ValueId> {
        let (l, r) = (self.dtype(lhs)?.clone(), self.dtype(rhs)?.clone());
        ensure!(l == r, DTypeMismatchSnafu { lhs: l, rhs: r });
        let valid = match op {
            _ if op.is_bitwise() => l.is_int() || l.is_bool(),
            BinaryOp::CmpEq | BinaryOp::CmpNe => l.scalar().is_some(),
            _ => l.is_int() || l.is_float(),
        };
        ensure!(valid, InvalidDTypeForBinaryOpSnafu { operation: op, dtypes: smallvec![l.clone(), r] });
        let dtype = if op.is_comparison() { DType::Bool } else { l };
        Ok(self.push(Op::Binary { op, lhs, rhs }, dtype))
    }

    pub fn select(&mut self, cond: ValueId, on_true: ValueId, on_false: ValueId) -> Result<ValueId> {
        let actual = self.dtype(cond)?.clone();
        ensure!(actual.is_bool(), SelectConditionNotBoolSnafu { actual });
        let (t, f) = (self.dtype(on_true)?.clone(), self.dtype(on_false)?.clone());
        ensure!(t == f, DTypeMismatchSnafu { lhs: t.clone(), rhs: f });
        Ok(self.push(Op::Select { cond, on_true, on_false }, t))
    }

    pub fn fused(&mut self, op: FusedOp, operands: &[ValueId]) -> Result<ValueId> {
        ensure!(
            operands.len() == op.arity(),
            FusedAritySnafu { operation: op, expected: op.arity(), actual: operands.len() }
        );
        let dtype = self.dtype(operands[0])?.clone();
        for operand in &operands[1..] {
            let other = self.dtype(*operand)?;
            ensure!(*other == dtype, DTypeMismatchSnafu { lhs: dtype.clone(), rhs: other.clone() });
        }
        ensure!(
            dtype.is_int() || dtype.is_float(),
            InvalidDTypeForBinaryOpSnafu { operation: BinaryOp::Mul, dtypes: smallvec![dtype.clone()] }
        );
        Ok(self.push(Op::Fused { op, operands: operands.iter().copied().collect() }, dtype))
    }

    pub fn alloc(&mut self, size: usize, align: usize, space: AddrSpace) -> ValueId {
        self.push(Op::Alloc { size: AllocSize::Static(size), align, space }, DType::ptr(space))
    }

    pub fn alloc_dynamic(&mut self, size: ValueId, align: usize, space: AddrSpace) -> Result<ValueId> {
        let actual = self.dtype(size)?.clone();
        ensure!(actual.is_int(), AllocSizeNotIntegerSnafu { actual });
        Ok(self.push(Op::Alloc { size: AllocSize::Dynamic(size), align, space }, DType::ptr(space)))
    }

    pub fn dealloc(&mut self, ptr: ValueId) -> Result<()> {
        self.pointer(ptr)?;
        self.function.body.push(Operation::effect(Op::Dealloc { ptr }));
        Ok(())
    }

    pub fn load(&mut self, ptr: ValueId, offset: usize, dtype: DType) -> Result<ValueId> {
        self.pointer(ptr)?;
        Ok(self.push(Op::Load { ptr, offset }, dtype))
    }

    pub fn store(&mut self, ptr: ValueId, offset: usize, value: ValueId) -> Result<()> {
        self.pointer(ptr)?;
        self.dtype(value)?;
        self.function.body.push(Operation::effect(Op::Store { ptr, offset, value }));
        Ok(())
    }

    pub fn make_aggregate(&mut self, fields: &[ValueId]) -> Result<ValueId> {
        let dtypes = fields.iter().map(|field| self.dtype(*field).cloned()).collect::<Result<Vec<_>>>()?;
        Ok(self.push(Op::MakeAggregate { fields: fields.iter().copied().collect() }, DType::aggregate(dtypes)))
    }

    pub fn extract(&mut self, src: ValueId, path: &[usize]) -> Result<ValueId> {
        let src_dtype = self.dtype(src)?;
        let dtype = match src_dtype.field_at(path) {
            Some(dtype) if !path.is_empty() => dtype.clone(),
            _ => return InvalidFieldPathSnafu { path: path.to_vec(), dtype: src_dtype.clone() }.fail(),
        };
        Ok(self.push(Op::Extract { src, path: path.iter().copied().collect() }, dtype))
    }

    pub fn global_ref(&mut self, name: impl Into<String>, space: AddrSpace) -> ValueId {
        self.push(Op::GlobalRef { name: name.into() }, DType::ptr(space))
    }

    pub fn ptr_add(&mut self, base: ValueId, offset: usize) -> Result<ValueId> {
        let space = self.pointer(base)?;
        Ok(self.push(Op::PtrAdd { base, offset }, DType::ptr(space)))
    }

    /// Call `callee`, producing one value per entry of `results`.
    pub fn call(
        &mut self,
        callee: impl Into<String>,
        args: &[ValueId],
        results: impl IntoIterator<Item = DType>,
    ) -> Result<SmallVec<[ValueId; 1]>> {
        for arg in args {
            self.dtype(*arg)?;
        }
        let values: SmallVec<[Value; 1]> = results.into_iter().map(|dtype| self.function.fresh_value(dtype)).collect();
        for value in &values {
            self.types.insert(value.id, value.dtype.clone());
        }
        let ids = values.iter().map(|value| value.id).collect();
        self.function.body.push(Operation::new(
            Op::Call { callee: callee.into(), args: args.iter().copied().collect() },
            values,
        ));
        Ok(ids)
    }

    pub fn ret(&mut self, values: &[ValueId]) -> Result<()> {
        for value in values {
            self.dtype(*value)?;
        }
        self.function.body.push(Operation::effect(Op::Return { values: values.iter().copied().collect() }));
        Ok(())
    }

    pub fn finish(self) -> Function {
        self.function
    }
}
