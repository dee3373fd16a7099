//! Textual form of the IR, used in debug logs and test failures.
//!
//! ```text
//! module @demo {
//!   global @main.alloc0 : 1024 bytes align 16 host zeroed
//!   func @main(%0: f32) -> (f32) {
//!     %1 = const 1.0 : f32
//!     %2 = add %0, %1 : f32
//!     return %2
//!   }
//! }
//! ```

use std::fmt::{self, Display, Formatter, Write};

use crate::function::Function;
use crate::module::{GlobalDecl, Initializer, Module};
use crate::op::{Op, Operation};

fn join<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    let mut out = String::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{item}");
    }
    out
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.results.is_empty() {
            write!(f, "{} = ", join(self.results.iter().map(|value| value.id)))?;
        }
        f.write_str(self.op.mnemonic())?;
        match &self.op {
            Op::Const(value) => write!(f, " {value}")?,
            Op::Alloc { size, align, space } => write!(f, " {size} align {align} {}", space.mnemonic())?,
            Op::Load { ptr, offset } => write!(f, " {ptr}[+{offset}]")?,
            Op::Store { ptr, offset, value } => write!(f, " {ptr}[+{offset}], {value}")?,
            Op::Extract { src, path } => write!(f, " {src}[{}]", join(path.iter()))?,
            Op::GlobalRef { name } => write!(f, " @{name}")?,
            Op::StorageBase { space } => write!(f, " {}", space.mnemonic())?,
            Op::PtrAdd { base, offset } => write!(f, " {base}, {offset}")?,
            Op::Call { callee, args } => write!(f, " @{callee}({})", join(args.iter()))?,
            Op::Builtin { name, args, immediates } => {
                write!(f, " @{name}({})", join(args.iter()))?;
                if !immediates.is_empty() {
                    write!(f, " [{}]", join(immediates.iter()))?;
                }
            }
            op => {
                let operands = op.operands();
                if !operands.is_empty() {
                    write!(f, " {}", join(operands.iter()))?;
                }
            }
        }
        if !self.results.is_empty() {
            write!(f, " : {}", join(self.results.iter().map(|value| &value.dtype)))?;
        }
        Ok(())
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_external() { "extern" } else { "func" };
        write!(f, "{keyword} @{}({})", self.name, join(self.signature.params.iter()))?;
        if !self.signature.results.is_empty() {
            write!(f, " -> ({})", join(self.signature.results.iter()))?;
        }
        if let Some(tag) = self.metadata.cconv.tag() {
            write!(f, " #{tag}")?;
        }
        if self.is_external() {
            return Ok(());
        }
        writeln!(f, " {{")?;
        for operation in &self.body {
            writeln!(f, "    {operation}")?;
        }
        write!(f, "  }}")
    }
}

impl Display for GlobalDecl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "global @{} : {} bytes align {} {}", self.name, self.size, self.align, self.space.mnemonic())?;
        match &self.init {
            Initializer::Zeroed => f.write_str(" zeroed"),
            Initializer::Bytes(bytes) => write!(f, " init[{}]", bytes.len()),
        }
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "module @{} {{", self.name)?;
        for global in &self.globals {
            writeln!(f, "  {global}")?;
        }
        if let Some(storage) = &self.storage {
            for segment in &storage.segments {
                writeln!(f, "  storage {} : {} bytes align {}", segment.space.mnemonic(), segment.size, segment.align)?;
            }
        }
        for function in &self.functions {
            writeln!(f, "  {function}")?;
        }
        f.write_str("}")
    }
}
