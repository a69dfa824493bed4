//! Mapping of semantic types onto Cranelift value types
//!
//! Only scalars cross the native boundary: integers, enums (as their
//! underlying integer), floating point values, pointers and references.
//! Records passed by value would need ABI marshalling and are rejected.

use cranelift_codegen::ir::types::{F32, F64, I8, I16, I32, I64, Type};
use cranelift_codegen::ir::{AbiParam, Signature};
use cranelift_codegen::isa::CallConv;
use cxxi_core::TargetInfo;
use cxxi_front::tree::FunctionDecl;
use cxxi_front::{BuiltinKind, QualType, TranslationUnit};

use crate::errors::{CompilationError, CompilationResult};

/// Classification of a scalar for conversions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarClass {
    SignedInt,
    UnsignedInt,
    Float,
}

/// A lowered scalar: its Cranelift type and how to convert it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scalar {
    pub ty: Type,
    pub class: ScalarClass,
}

pub fn pointer_type(target: &TargetInfo) -> Type {
    match target.pointer_size {
        2 => I16,
        4 => I32,
        _ => I64,
    }
}

fn int_type(bytes: u64) -> Type {
    match bytes {
        1 => I8,
        2 => I16,
        4 => I32,
        _ => I64,
    }
}

fn builtin_scalar(kind: BuiltinKind, target: &TargetInfo) -> Scalar {
    match kind {
        BuiltinKind::Float => Scalar {
            ty: F32,
            class: ScalarClass::Float,
        },
        BuiltinKind::Double => Scalar {
            ty: F64,
            class: ScalarClass::Float,
        },
        _ => Scalar {
            ty: int_type(kind.size_align(target).0),
            class: if kind.is_signed(target) {
                ScalarClass::SignedInt
            } else {
                ScalarClass::UnsignedInt
            },
        },
    }
}

/// Scalar representation of `ty`, or `None` for `void`.
pub fn scalar_type(
    unit: &TranslationUnit,
    target: &TargetInfo,
    ty: &QualType,
) -> CompilationResult<Option<Scalar>> {
    let scalar = match ty {
        QualType::Void => return Ok(None),
        QualType::Builtin(kind) => builtin_scalar(*kind, target),
        QualType::Enum(decl) => match unit.enum_decl(*decl) {
            Some(e) => builtin_scalar(e.underlying, target),
            None => return Err(CompilationError::unsupported_type(unit.qualified_name(*decl))),
        },
        QualType::Pointer(_) | QualType::LValueReference(_) => Scalar {
            ty: pointer_type(target),
            class: ScalarClass::UnsignedInt,
        },
        QualType::Record(decl) => {
            return Err(CompilationError::unsupported_type(format!(
                "'{}' passed by value",
                unit.qualified_name(*decl)
            )));
        }
        QualType::Array(..)
        | QualType::Function { .. }
        | QualType::TemplateParam(_)
        | QualType::TemplateSpecialization { .. } => {
            return Err(CompilationError::unsupported_type(format!("{ty:?}")));
        }
    };
    Ok(Some(scalar))
}

/// Scalar representation of a value-carrying type; `void` is an error.
pub fn value_type(
    unit: &TranslationUnit,
    target: &TargetInfo,
    ty: &QualType,
) -> CompilationResult<Scalar> {
    scalar_type(unit, target, ty)?
        .ok_or_else(|| CompilationError::type_error("void value"))
}

/// Cranelift signature of a function declaration.
pub fn signature(
    unit: &TranslationUnit,
    target: &TargetInfo,
    function: &FunctionDecl,
    call_conv: CallConv,
) -> CompilationResult<Signature> {
    let mut sig = Signature::new(call_conv);
    for param in &function.param_types {
        sig.params.push(AbiParam::new(value_type(unit, target, param)?.ty));
    }
    if let Some(ret) = scalar_type(unit, target, &function.ret)? {
        sig.returns.push(AbiParam::new(ret.ty));
    }
    Ok(sig)
}
