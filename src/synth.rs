//! Synthesis of function declarations and straight-line bodies.
//!
//! Everything created here is appended to the unit at its end location and
//! is visible to later lookups and to `emit`.

use cxxi_cranelift::{CodeModule, lower_unit};
use cxxi_front::{BuiltinKind, DeclRef, ExprRef, QualType};

use crate::errors::{InterfaceError, InterfaceResult};
use crate::interface::CxxInterface;
use crate::types::{HandleKind, TypeHandle, UnitId};

/// A synthesized function declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    decl: DeclRef,
    unit: UnitId,
}

impl FunctionRef {
    pub fn decl(self) -> DeclRef {
        self.decl
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParamRef {
    decl: DeclRef,
    unit: UnitId,
}

impl ParamRef {
    pub fn decl(self) -> DeclRef {
        self.decl
    }
}

/// An expression usable as a returned value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueRef {
    expr: ExprRef,
    unit: UnitId,
}

impl ValueRef {
    pub fn expr(self) -> ExprRef {
        self.expr
    }
}

/// Type of a literal.
#[derive(Clone, Debug)]
pub enum LiteralType {
    Type(TypeHandle),
    /// The target's pointer-sized unsigned integer.
    Index,
}

/// Payload of a literal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Float(f64),
}

impl CxxInterface {
    /// Declare `name(arg_types) -> return_type` in the root scope. `None`
    /// returns `void`; an empty name gets a generated one. Names of
    /// synthesized functions are unique.
    pub fn declare_function(
        &mut self,
        name: &str,
        arg_types: &[TypeHandle],
        return_type: Option<&TypeHandle>,
    ) -> InterfaceResult<FunctionRef> {
        let location = self.end_of_unit()?;
        let param_types = arg_types
            .iter()
            .map(|handle| self.value_type(handle))
            .collect::<InterfaceResult<Vec<_>>>()?;
        let ret = match return_type {
            Some(handle) => self.value_type(handle)?,
            None => QualType::Void,
        };
        let name = if name.is_empty() {
            self.next_anonymous_name()
        } else {
            name.to_owned()
        };
        let unit = self.unit()?;
        let taken = unit.functions().into_iter().any(|decl| {
            unit.function(decl).is_some_and(|f| f.is_synthesized) && unit.decl(decl).name == name
        });
        if taken {
            return Err(InterfaceError::DuplicateFunction(name));
        }

        let decl = self.with_sema(|sema| sema.create_function(&name, param_types, ret, location))?;
        tracing::debug!(function = %name, params = arg_types.len(), "declared function");
        Ok(FunctionRef {
            decl,
            unit: self.id(),
        })
    }

    /// Append a parameter to `function`. Parameters must follow the
    /// declared argument types in order.
    pub fn add_parameter(
        &mut self,
        name: &str,
        ty: &TypeHandle,
        function: FunctionRef,
    ) -> InterfaceResult<ParamRef> {
        self.check_unit(function.unit)?;
        let ty = self.value_type(ty)?;
        let location = self.end_of_unit()?;
        let unit = self.unit()?;
        let function_name = unit.decl(function.decl).name.clone();
        let Some(decl) = unit.function(function.decl) else {
            return Err(InterfaceError::InvalidHandle(format!(
                "'{function_name}' is not a function"
            )));
        };
        let index = decl.params.len();
        let expected = decl.param_types.get(index).cloned();

        match expected {
            Some(expected) if expected == ty => {}
            Some(expected) => {
                let (expected, found) =
                    self.with_sema(|sema| (sema.type_spelling(&expected), sema.type_spelling(&ty)))?;
                return Err(InterfaceError::ParameterMismatch {
                    function: function_name,
                    index,
                    reason: format!("expected '{expected}', found '{found}'"),
                });
            }
            None => {
                return Err(InterfaceError::ParameterMismatch {
                    function: function_name,
                    index,
                    reason: format!("function takes {index} parameters"),
                });
            }
        }

        let param = self.with_sema(|sema| {
            let param = sema.create_param(function.decl, name, ty, location);
            sema.attach_param(function.decl, param);
            param
        })?;
        Ok(ParamRef {
            decl: param,
            unit: self.id(),
        })
    }

    /// Signed integer constant of `bit_width` bits.
    pub fn literal(&mut self, bit_width: u32, value: i64) -> InterfaceResult<ValueRef> {
        let kind = BuiltinKind::signed_of_width(bit_width).ok_or_else(|| {
            InterfaceError::UnsupportedLiteralType(format!("i{bit_width}"))
        })?;
        self.literal_of(&LiteralType::Type(TypeHandle::builtin(kind)), Numeric::Integer(value))
    }

    /// Constant of type `ty`. Integer and index types take integer
    /// payloads, floating types take floating payloads.
    pub fn literal_of(&mut self, ty: &LiteralType, value: Numeric) -> InterfaceResult<ValueRef> {
        let kind = match ty {
            LiteralType::Index => self.index_kind(),
            LiteralType::Type(handle) => {
                self.check_handle(handle)?;
                match handle.kind() {
                    HandleKind::Builtin(kind) => kind,
                    other => {
                        return Err(InterfaceError::UnsupportedLiteralType(format!("{other:?}")));
                    }
                }
            }
        };

        let ty = QualType::Builtin(kind);
        let expr = match (kind.is_floating(), value) {
            (false, Numeric::Integer(v)) => {
                self.with_sema(|sema| sema.create_integer_literal(v as u64, ty))?
            }
            (true, Numeric::Float(v)) => {
                self.with_sema(|sema| sema.create_floating_literal(v, ty))?
            }
            _ => return Err(InterfaceError::LiteralPayloadMismatch(kind.spelling().to_owned())),
        };
        tracing::trace!(%kind, ?value, "created literal");
        Ok(ValueRef {
            expr,
            unit: self.id(),
        })
    }

    /// An expression reading `param`.
    pub fn param_ref(&mut self, param: ParamRef) -> InterfaceResult<ValueRef> {
        self.check_unit(param.unit)?;
        let expr = self
            .with_sema(|sema| sema.create_param_ref(param.decl))?
            .ok_or_else(|| InterfaceError::InvalidHandle("not a parameter".to_owned()))?;
        Ok(ValueRef {
            expr,
            unit: self.id(),
        })
    }

    /// Make `return value` the body of `function`, replacing any prior body.
    pub fn set_return(
        &mut self,
        value: Option<ValueRef>,
        function: FunctionRef,
    ) -> InterfaceResult<()> {
        self.check_unit(function.unit)?;
        if let Some(value) = value {
            self.check_unit(value.unit)?;
        }
        if self.unit()?.function(function.decl).is_none() {
            return Err(InterfaceError::InvalidHandle("not a function".to_owned()));
        }
        let location = self.end_of_unit()?;
        self.with_sema(|sema| {
            let body = sema.create_return(value.map(ValueRef::expr), location);
            sema.set_body(function.decl, body);
        })?;
        tracing::debug!(function = ?function.decl, "set return");
        Ok(())
    }

    /// Lower every synthesized function of the unit into one code module.
    pub fn emit(&self) -> InterfaceResult<CodeModule> {
        let unit = self.unit()?;
        let module = lower_unit(unit, self.target(), self.module_name())?;
        tracing::debug!(module = %module.name, functions = module.functions.len(), "emitted module");
        Ok(module)
    }

    /// Semantic type of a value-carrying handle.
    fn value_type(&self, handle: &TypeHandle) -> InterfaceResult<QualType> {
        self.check_handle(handle)?;
        self.to_semantic_type(handle).ok_or_else(|| {
            InterfaceError::InvalidHandle(format!("{:?} is not a value type", handle.kind()))
        })
    }

    fn index_kind(&self) -> BuiltinKind {
        let pointer = u64::from(self.target().pointer_size);
        [BuiltinKind::UInt, BuiltinKind::ULong, BuiltinKind::ULongLong]
            .into_iter()
            .find(|kind| kind.size_align(self.target()).0 == pointer)
            .unwrap_or(BuiltinKind::ULongLong)
    }
}
