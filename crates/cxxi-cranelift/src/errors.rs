//! Lowering failures.

use cranelift_codegen::CodegenError;
use cranelift_codegen::isa::LookupError;
use cranelift_codegen::settings::SetError;
use cranelift_module::ModuleError;
use derive_more::{Display, Error, From};

pub type CompilationResult<T> = Result<T, CompilationError>;

/// A lowering failure. The kind is boxed to keep results small.
#[derive(Debug, Display)]
#[display("{kind}")]
pub struct CompilationError {
    kind: Box<CompilationErrorKind>,
}

#[derive(Debug, Display, Error, From)]
pub enum CompilationErrorKind {
    /// A declaration's type has no scalar lowering.
    #[display("unsupported type: {_0}")]
    #[from(ignore)]
    UnsupportedType(#[error(not(source))] String),

    /// A body disagrees with its declaration.
    #[display("type mismatch: {_0}")]
    #[from(ignore)]
    TypeMismatch(#[error(not(source))] String),

    #[display("no backend for target: {_0}")]
    Target(LookupError),

    #[display("invalid backend setting: {_0}")]
    Settings(SetError),

    #[display("cranelift rejected a function: {_0}")]
    Codegen(CodegenError),

    #[display("module error: {_0}")]
    Module(ModuleError),

    #[display("cannot write object file: {_0}")]
    Object(object::write::Error),
}

impl<E> From<E> for CompilationError
where
    CompilationErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        Self {
            kind: Box::new(error.into()),
        }
    }
}

impl From<Box<ModuleError>> for CompilationErrorKind {
    fn from(error: Box<ModuleError>) -> Self {
        Self::Module(*error)
    }
}

impl std::error::Error for CompilationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl CompilationError {
    pub fn kind(&self) -> &CompilationErrorKind {
        &self.kind
    }

    pub(crate) fn unsupported_type(ty: impl std::fmt::Display) -> Self {
        CompilationErrorKind::UnsupportedType(ty.to_string()).into()
    }

    pub(crate) fn type_error(message: impl std::fmt::Display) -> Self {
        CompilationErrorKind::TypeMismatch(message.to_string()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_displayed() {
        let error = CompilationError::unsupported_type("struct Pair");
        assert_eq!(error.to_string(), "unsupported type: struct Pair");
        assert!(std::error::Error::source(&error).is_none());
    }
}
