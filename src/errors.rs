//! Error handling for the interoperability interface.

use std::path::PathBuf;

use cxxi_core::Diagnostic;
use cxxi_cranelift::CompilationError;
use cxxi_front::{ParseFailure, SemaError};
use derive_more::{Display, Error, From};

use crate::interface::BuildState;

/// Result type for interface operations.
pub type InterfaceResult<T> = std::result::Result<T, InterfaceError>;

/// Errors that can occur while building, querying or extending a unit.
#[derive(Debug, Display, Error, From)]
pub enum InterfaceError {
    /// The header does not parse on its own.
    #[from(ignore)]
    #[display("failed to precompile '{}': {}", path.display(), render(diagnostics))]
    PrecompileError {
        path: PathBuf,
        diagnostics: Vec<Diagnostic>,
    },

    /// The wrapper unit did not parse.
    #[display("{_0}")]
    ParseError(#[error(not(source))] ParseFailure),

    /// The header path cannot be opened.
    #[from(ignore)]
    #[display("cannot open '{}': {source}", path.display())]
    SystemError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A template argument constant was given a non-integral type.
    #[from(ignore)]
    #[display("template argument constant requires an integral type, got {_0}")]
    InvalidArgumentKind(#[error(not(source))] String),

    #[from(ignore)]
    #[display("cannot create a literal of type {_0}")]
    UnsupportedLiteralType(#[error(not(source))] String),

    #[from(ignore)]
    #[display("cannot instantiate '{name}': {source}")]
    InstantiationFailure { name: String, source: SemaError },

    #[from(ignore)]
    #[display("interface is not ready ({_0:?})")]
    NotReady(#[error(not(source))] BuildState),

    #[from(ignore)]
    #[display("the translation unit is already built")]
    AlreadyBuilt,

    /// The handle belongs to another interface instance.
    #[from(ignore)]
    #[display("handle refers to a different translation unit")]
    StaleHandle,

    #[from(ignore)]
    #[display("invalid handle: {_0}")]
    InvalidHandle(#[error(not(source))] String),

    #[from(ignore)]
    #[display("parameter {index} of '{function}': {reason}")]
    ParameterMismatch {
        function: String,
        index: usize,
        reason: String,
    },

    /// A synthesized function with this name already exists.
    #[from(ignore)]
    #[display("function '{_0}' is already declared")]
    DuplicateFunction(#[error(not(source))] String),

    #[from(ignore)]
    #[display("literal payload does not match type {_0}")]
    LiteralPayloadMismatch(#[error(not(source))] String),

    #[from(ignore)]
    #[display("cannot lay out '{name}': {source}")]
    Layout { name: String, source: SemaError },

    #[display("lowering failed: {_0}")]
    Codegen(#[error(source)] CompilationError),
}

impl InterfaceError {
    /// Diagnostics attached to precompile and parse failures.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            InterfaceError::PrecompileError { diagnostics, .. } => diagnostics,
            InterfaceError::ParseError(failure) => &failure.diagnostics,
            _ => &[],
        }
    }
}

fn render(diagnostics: &[Diagnostic]) -> String {
    match diagnostics.iter().find(|d| d.is_error()) {
        Some(first) => first.to_string(),
        None => "no diagnostics".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxxi_core::{CompilationPhase, Span};

    #[test]
    fn test_precompile_error_shows_first_error() {
        let error = InterfaceError::PrecompileError {
            path: PathBuf::from("bad.h"),
            diagnostics: vec![
                Diagnostic::warning(CompilationPhase::Preprocessing, "bad.h", Span::default(), "ignored"),
                Diagnostic::error(CompilationPhase::Parsing, "bad.h", Span::new(3, 4), "expected ';'"),
            ],
        };
        assert_eq!(
            error.to_string(),
            "failed to precompile 'bad.h': bad.h:3: error: expected ';'"
        );
        assert_eq!(error.diagnostics().len(), 2);
    }

    #[test]
    fn test_not_ready_names_the_state() {
        let error = InterfaceError::NotReady(BuildState::Unbuilt);
        assert_eq!(error.to_string(), "interface is not ready (Unbuilt)");
        assert!(error.diagnostics().is_empty());
    }
}
