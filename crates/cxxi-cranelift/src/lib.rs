//! Cranelift lowering for cxxi translation units
//!
//! Synthesized functions of a unit become symbols of one native object:
//! functions with bodies are compiled and exported, body-less ones are
//! declared as imports.

pub mod codegen;
pub mod compiler;
pub mod errors;
pub mod types;

#[cfg(test)]
mod tests;

pub use compiler::{CodeModule, FunctionSymbol, SymbolLinkage, UnitCompiler};
pub use errors::{CompilationError, CompilationErrorKind, CompilationResult};

use cxxi_core::TargetInfo;
use cxxi_front::TranslationUnit;

/// Lower the synthesized functions of `unit` into a native code module
pub fn lower_unit(
    unit: &TranslationUnit,
    target: &TargetInfo,
    unit_name: &str,
) -> CompilationResult<CodeModule> {
    let compiler = UnitCompiler::new(target, unit_name)?;
    compiler.compile_unit(unit)
}
