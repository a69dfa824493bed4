//! Code generation from the semantic tree to Cranelift IR
//!
//! Bodies are straight-line: a single `return` of a literal or a parameter
//! reference, converted to the declared return type.

use std::collections::HashMap;

use cranelift_codegen::ir::{self as cl_ir, InstBuilder};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_module::{FuncId, Linkage, Module};
use cxxi_core::TargetInfo;
use cxxi_front::tree::{Expr, Stmt};
use cxxi_front::{DeclRef, ExprRef, TranslationUnit};

use crate::compiler::{FunctionSymbol, SymbolLinkage};
use crate::errors::{CompilationError, CompilationResult};
use crate::types::{signature, value_type, Scalar, ScalarClass};

/// Code generator for one translation unit
pub struct CodeGenerator<'m, M: Module> {
    module: &'m mut M,
    unit: &'m TranslationUnit,
    target: &'m TargetInfo,
    /// Declared functions, in declaration order
    functions: Vec<(DeclRef, FuncId)>,
    symbols: HashMap<FuncId, FunctionSymbol>,
}

impl<'m, M: Module> CodeGenerator<'m, M> {
    pub fn new(module: &'m mut M, unit: &'m TranslationUnit, target: &'m TargetInfo) -> Self {
        Self {
            module,
            unit,
            target,
            functions: Vec::new(),
            symbols: HashMap::new(),
        }
    }

    /// Declare every synthesized function, then compile those with bodies.
    pub fn compile_unit(mut self) -> CompilationResult<Vec<FunctionSymbol>> {
        let unit = self.unit;
        let synthesized = unit
            .functions()
            .into_iter()
            .filter(|&f| unit.function(f).is_some_and(|f| f.is_synthesized));

        for decl in synthesized {
            self.declare_function(decl)?;
        }

        for (decl, func_id) in self.functions.clone() {
            self.compile_function(decl, func_id)?;
        }

        Ok(self
            .functions
            .iter()
            .filter_map(|(_, id)| self.symbols.remove(id))
            .collect())
    }

    fn declare_function(&mut self, decl: DeclRef) -> CompilationResult<()> {
        let Some(function) = self.unit.function(decl) else {
            return Ok(());
        };
        let name = self.unit.decl(decl).name.clone();
        let call_conv = self.module.isa().default_call_conv();
        let sig = signature(self.unit, self.target, function, call_conv)?;
        let linkage = if function.body.is_some() {
            SymbolLinkage::Export
        } else {
            SymbolLinkage::Import
        };
        let module_linkage = match linkage {
            SymbolLinkage::Export => Linkage::Export,
            SymbolLinkage::Import => Linkage::Import,
        };

        let func_id = self.module.declare_function(&name, module_linkage, &sig)?;
        tracing::trace!(function = %name, ?linkage, "declared function");
        self.functions.push((decl, func_id));
        self.symbols.insert(
            func_id,
            FunctionSymbol {
                name,
                signature: sig,
                linkage,
                ir: None,
            },
        );
        Ok(())
    }

    fn compile_function(&mut self, decl: DeclRef, func_id: FuncId) -> CompilationResult<()> {
        let Some(function) = self.unit.function(decl) else {
            return Ok(());
        };
        let Some(body) = function.body else {
            return Ok(());
        };

        let mut ctx = self.module.make_context();
        ctx.func.signature = self
            .module
            .declarations()
            .get_function_decl(func_id)
            .signature
            .clone();

        let mut func_ctx = FunctionBuilderContext::new();
        let mut builder = FunctionBuilder::new(&mut ctx.func, &mut func_ctx);
        let entry_block = builder.create_block();
        builder.append_block_params_for_function_params(entry_block);
        builder.switch_to_block(entry_block);
        builder.seal_block(entry_block);

        let param_values: Vec<cl_ir::Value> = builder.block_params(entry_block).to_vec();
        let params: HashMap<DeclRef, cl_ir::Value> = function
            .params
            .iter()
            .copied()
            .zip(param_values)
            .collect();

        let mut lowerer = FunctionLowerer {
            builder: &mut builder,
            unit: self.unit,
            target: self.target,
            params,
        };
        match self.unit.stmt(body) {
            Stmt::Return { value, .. } => {
                let returned = match value {
                    Some(expr) => {
                        let ret = value_type(self.unit, self.target, &function.ret)?;
                        let (value, from) = lowerer.lower_expr(*expr)?;
                        vec![lowerer.convert(value, from, ret)?]
                    }
                    None if function.ret == cxxi_front::QualType::Void => Vec::new(),
                    None => {
                        return Err(CompilationError::type_error(format!(
                            "'{}' must return a value",
                            self.unit.decl(decl).name
                        )));
                    }
                };
                builder.ins().return_(&returned);
            }
        }
        builder.finalize();

        let ir = ctx.func.display().to_string();
        self.module.define_function(func_id, &mut ctx)?;
        tracing::debug!(function = %self.unit.decl(decl).name, "compiled function");
        if let Some(symbol) = self.symbols.get_mut(&func_id) {
            symbol.ir = Some(ir);
        }
        Ok(())
    }
}

/// Per-function lowering context
struct FunctionLowerer<'a, 'b> {
    builder: &'a mut FunctionBuilder<'b>,
    unit: &'a TranslationUnit,
    target: &'a TargetInfo,
    params: HashMap<DeclRef, cl_ir::Value>,
}

impl FunctionLowerer<'_, '_> {
    fn lower_expr(&mut self, expr: ExprRef) -> CompilationResult<(cl_ir::Value, Scalar)> {
        let expr = self.unit.expr(expr);
        let scalar = value_type(self.unit, self.target, expr.ty())?;
        let value = match expr {
            Expr::IntegerLiteral { value, .. } => {
                if scalar.class == ScalarClass::Float {
                    return Err(CompilationError::type_error("integer literal of floating type"));
                }
                self.builder.ins().iconst(scalar.ty, *value as i64)
            }
            Expr::FloatingLiteral { value, .. } => match scalar.ty {
                cl_ir::types::F32 => self.builder.ins().f32const(*value as f32),
                cl_ir::types::F64 => self.builder.ins().f64const(*value),
                _ => {
                    return Err(CompilationError::type_error("floating literal of integer type"));
                }
            },
            Expr::ParamRef { param, .. } => match self.params.get(param) {
                Some(value) => *value,
                None => {
                    return Err(CompilationError::type_error(format!(
                        "parameter '{}' is not attached to the function",
                        self.unit.decl(*param).name
                    )));
                }
            },
        };
        Ok((value, scalar))
    }

    /// Integer width changes and float precision changes; nothing else.
    fn convert(
        &mut self,
        value: cl_ir::Value,
        from: Scalar,
        to: Scalar,
    ) -> CompilationResult<cl_ir::Value> {
        if from.ty == to.ty {
            return Ok(value);
        }
        let ins = self.builder.ins();
        match (from.class, to.class) {
            (ScalarClass::Float, ScalarClass::Float) => Ok(if to.ty.bits() > from.ty.bits() {
                ins.fpromote(to.ty, value)
            } else {
                ins.fdemote(to.ty, value)
            }),
            (ScalarClass::Float, _) | (_, ScalarClass::Float) => Err(CompilationError::type_error(
                format!("cannot convert {} to {}", from.ty, to.ty),
            )),
            (class, _) => Ok(if to.ty.bits() < from.ty.bits() {
                ins.ireduce(to.ty, value)
            } else if class == ScalarClass::SignedInt {
                ins.sextend(to.ty, value)
            } else {
                ins.uextend(to.ty, value)
            }),
        }
    }
}
