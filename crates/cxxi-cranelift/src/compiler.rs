//! Main compiler interface
//!
//! This module provides the high-level interface for lowering the
//! synthesized functions of a translation unit to a native object file.

use cranelift_codegen::ir::Signature;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_object::{ObjectBuilder, ObjectModule};
use cxxi_core::TargetInfo;
use cxxi_front::TranslationUnit;

use crate::codegen::CodeGenerator;
use crate::errors::CompilationResult;

/// How a lowered function appears in the object's symbol table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolLinkage {
    /// Defined in this object.
    Export,
    /// Declared only; resolved when the object is linked.
    Import,
}

/// A function symbol of a lowered module.
#[derive(Clone, Debug)]
pub struct FunctionSymbol {
    pub name: String,
    pub signature: Signature,
    pub linkage: SymbolLinkage,
    /// Textual IR of the body, for exported functions.
    pub ir: Option<String>,
}

/// The native code produced for one unit.
#[derive(Clone, Debug)]
pub struct CodeModule {
    pub name: String,
    pub functions: Vec<FunctionSymbol>,
    /// Relocatable object file bytes for the target.
    pub object: Vec<u8>,
}

impl CodeModule {
    pub fn function(&self, name: &str) -> Option<&FunctionSymbol> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Unit compiler using Cranelift
pub struct UnitCompiler {
    module: ObjectModule,
    target: TargetInfo,
    name: String,
}

impl UnitCompiler {
    /// Create a new compiler for the given target
    pub fn new(target: &TargetInfo, unit_name: &str) -> CompilationResult<Self> {
        let mut flag_builder = settings::builder();
        flag_builder.set("use_colocated_libcalls", "false")?;
        flag_builder.set("is_pic", "false")?;

        let isa_builder = cranelift_codegen::isa::lookup(target.triple.clone())?;
        let isa = isa_builder.finish(settings::Flags::new(flag_builder))?;

        let object_builder = ObjectBuilder::new(
            isa,
            unit_name.to_owned(),
            cranelift_module::default_libcall_names(),
        )?;

        Ok(UnitCompiler {
            module: ObjectModule::new(object_builder),
            target: target.clone(),
            name: unit_name.to_owned(),
        })
    }

    /// Compile the synthesized functions of `unit` into an object file
    pub fn compile_unit(mut self, unit: &TranslationUnit) -> CompilationResult<CodeModule> {
        tracing::debug!(unit = %self.name, target = %self.target.triple, "lowering unit");
        let codegen = CodeGenerator::new(&mut self.module, unit, &self.target);
        let functions = codegen.compile_unit()?;

        let object = self.module.finish();
        let bytes = object.emit()?;
        tracing::debug!(
            unit = %self.name,
            functions = functions.len(),
            size = bytes.len(),
            "emitted object"
        );

        Ok(CodeModule {
            name: self.name,
            functions,
            object: bytes,
        })
    }
}
