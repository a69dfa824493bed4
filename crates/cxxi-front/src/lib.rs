//! Declaration-level front end for C and C++ headers.
//!
//! Reads the declaration subset of a header (namespaces, classes, class
//! templates, enums, aliases and function declarations) into an arena tree,
//! and provides the semantic actions that look up, lay out, instantiate and
//! synthesize declarations in that tree.

pub mod errors;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod pch;
pub mod refs;
pub mod sema;
pub mod session;
pub mod tree;
pub mod types;
pub mod vfs;

pub use errors::{ParseFailure, SemaError, SemaResult};
pub use layout::{RecordLayout, TypeInfo};
pub use pch::{precompile_header, PrecompileFailure, PrecompileRequest, PrecompiledHeader};
pub use refs::{DeclRef, ExprRef, FileId, StmtRef};
pub use sema::{LookupCategory, LookupResult, Sema};
pub use session::{FrontendAction, Session};
pub use tree::{DeclKind, SpecializationKind, TranslationUnit};
pub use types::{ArrayBound, BuiltinKind, QualType, SourceLocation, TemplateArgument};
pub use vfs::{FileSystemHandle, VirtualFileSystem};
