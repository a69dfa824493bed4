//! Error types for semantic analysis and parsing

use cxxi_core::Diagnostic;
use derive_more::{Display, Error};

pub type SemaResult<T> = Result<T, SemaError>;

/// Failure of a semantic action (lookup, layout, instantiation).
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SemaError {
    #[display("use of undeclared identifier '{name}'")]
    UndeclaredName { name: String },

    #[display("'{name}' does not name a type")]
    NotAType { name: String },

    #[display("'{name}' is not a class template")]
    NotATemplate { name: String },

    #[display("incomplete type '{name}'")]
    IncompleteType { name: String },

    #[display("type depends on template parameters")]
    DependentType,

    #[display("implicit instantiation of undefined template '{name}'")]
    UndefinedTemplate { name: String },

    #[display("template '{name}' expects {expected} arguments, got {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[display("template argument {index} of '{name}' must be {expected}")]
    ArgumentKind {
        name: String,
        index: usize,
        expected: &'static str,
    },

    #[display("recursive instantiation of '{name}'")]
    RecursiveInstantiation { name: String },

    #[display("template instantiation depth exceeds maximum of {limit}")]
    InstantiationDepth { limit: usize },

    #[display("type '{name}' is too large")]
    TypeTooLarge { name: String },

    #[display("requested alignment {value} is not a power of two")]
    InvalidAlignment { value: u64 },

    #[display("redefinition of '{name}'")]
    Redefinition { name: String },

    #[display("{message}")]
    Unsupported { message: String },
}

impl SemaError {
    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        SemaError::Unsupported {
            message: message.into(),
        }
    }
}

/// Parsing stopped; the diagnostics explain why.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("{}", render(diagnostics))]
pub struct ParseFailure {
    #[error(not(source))]
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseFailure {
    /// The first error, which is what stopped the parser.
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.diagnostics.iter().find(|d| d.is_error())
    }
}

pub(crate) fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
