//! Synthesized declarations, expressions and statements.

use smallvec::SmallVec;

use crate::refs::{DeclRef, ExprRef, StmtRef};
use crate::tree::{Decl, DeclKind, Expr, FunctionDecl, ParamDecl, Stmt};
use crate::types::{mask_to_width, BuiltinKind, QualType, SourceLocation};

use super::Sema;

impl Sema<'_> {
    /// Declare a body-less function in the root scope.
    pub fn create_function(
        &mut self,
        name: &str,
        param_types: Vec<QualType>,
        ret: QualType,
        location: SourceLocation,
    ) -> DeclRef {
        let root = self.unit().root();
        self.unit_mut().add_decl(
            root,
            Decl {
                name: name.to_owned(),
                parent: None,
                location,
                kind: DeclKind::Function(FunctionDecl {
                    ret,
                    param_types,
                    params: SmallVec::new(),
                    body: None,
                    is_synthesized: true,
                }),
            },
        )
    }

    /// Create a parameter owned by `function`; it is not attached yet.
    pub fn create_param(
        &mut self,
        function: DeclRef,
        name: &str,
        ty: QualType,
        location: SourceLocation,
    ) -> DeclRef {
        self.unit_mut().push_decl(Decl {
            name: name.to_owned(),
            parent: Some(function),
            location,
            kind: DeclKind::Param(ParamDecl { ty, function }),
        })
    }

    /// Append `param` to the parameter list of `function`.
    pub fn attach_param(&mut self, function: DeclRef, param: DeclRef) {
        if let Some(f) = self.unit_mut().function_mut(function) {
            f.params.push(param);
        }
    }

    /// Integer constant of type `ty`, truncated to the type's width.
    pub fn create_integer_literal(&mut self, value: u64, ty: QualType) -> ExprRef {
        let value = match ty {
            QualType::Builtin(kind) => mask_to_width(value, self.bit_width(kind)),
            _ => value,
        };
        self.unit_mut().push_expr(Expr::IntegerLiteral { value, ty })
    }

    /// Floating constant of type `ty`, rounded to `float` when needed.
    pub fn create_floating_literal(&mut self, value: f64, ty: QualType) -> ExprRef {
        let value = match ty {
            QualType::Builtin(BuiltinKind::Float) => f64::from(value as f32),
            _ => value,
        };
        self.unit_mut().push_expr(Expr::FloatingLiteral { value, ty })
    }

    pub fn create_param_ref(&mut self, param: DeclRef) -> Option<ExprRef> {
        let ty = self.unit().param(param)?.ty.clone();
        Some(self.unit_mut().push_expr(Expr::ParamRef { param, ty }))
    }

    pub fn create_return(&mut self, value: Option<ExprRef>, location: SourceLocation) -> StmtRef {
        self.unit_mut().push_stmt(Stmt::Return { value, location })
    }

    /// Make `body` the only statement of `function`.
    pub fn set_body(&mut self, function: DeclRef, body: StmtRef) {
        if let Some(f) = self.unit_mut().function_mut(function) {
            f.body = Some(body);
        }
    }

    fn bit_width(&self, kind: BuiltinKind) -> u32 {
        (kind.size_align(self.target()).0 * 8) as u32
    }
}
