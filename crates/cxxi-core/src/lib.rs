//! Shared infrastructure for the cxxi crates: the salsa database, header
//! inputs, diagnostics and the target description.
pub mod database;
pub mod diagnostic;
pub mod language;
pub mod target;

pub use database::{CxxiDatabase, Db, HeaderFile};
pub use diagnostic::{CompilationPhase, Diagnostic, DiagnosticSeverity, Span};
pub use language::LanguageVariant;
pub use target::{Endianness, TargetInfo};
