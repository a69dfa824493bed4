//! Diagnostic messages emitted while reading headers and synthesizing code.

use std::fmt;

/// Byte range inside a source file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A diagnostic message (error, warning, or info) with source location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[salsa::accumulator]
pub struct Diagnostic {
    pub message: String,
    pub file: String,
    pub span: Span,
    pub severity: DiagnosticSeverity,
    pub phase: CompilationPhase,
}

impl Diagnostic {
    pub fn error(
        phase: CompilationPhase,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            file: file.into(),
            span,
            severity: DiagnosticSeverity::Error,
            phase,
        }
    }

    pub fn warning(
        phase: CompilationPhase,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            ..Self::error(phase, file, span, message)
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.file, self.span.start, self.severity, self.message
        )
    }
}

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// Compilation phase where a diagnostic was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompilationPhase {
    Preprocessing,
    Parsing,
    Semantic,
    Instantiation,
    Lowering,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Info => write!(f, "note"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location_and_severity() {
        let diag = Diagnostic::error(
            CompilationPhase::Parsing,
            "point.h",
            Span::new(12, 13),
            "expected ';'",
        );
        assert_eq!(diag.to_string(), "point.h:12: error: expected ';'");
    }

    #[test]
    fn test_warning_keeps_phase() {
        let diag = Diagnostic::warning(
            CompilationPhase::Preprocessing,
            "a.h",
            Span::default(),
            "ignored",
        );
        assert!(!diag.is_error());
        assert_eq!(diag.phase, CompilationPhase::Preprocessing);
    }
}
