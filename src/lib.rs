//! Interoperability with native C and C++ headers.
//!
//! A [`CxxInterface`] builds one translation unit around a header, then
//! answers lookups and layout queries against it, instantiates class
//! templates on demand, synthesizes new functions, and finally lowers the
//! synthesized functions into a native code module.

pub mod errors;
pub mod interface;
mod resolve;
mod synth;
mod template;
pub mod types;

pub use cxxi_core::{Diagnostic, LanguageVariant, TargetInfo};
pub use cxxi_cranelift::{CodeModule, FunctionSymbol, SymbolLinkage};
pub use cxxi_front::{BuiltinKind, QualType, TemplateArgument, TranslationUnit};
pub use errors::{InterfaceError, InterfaceResult};
pub use interface::{BuildState, CxxInterface, InterfaceOptions};
pub use synth::{FunctionRef, LiteralType, Numeric, ParamRef, ValueRef};
pub use template::ArgumentValue;
pub use types::{HandleKind, TypeHandle, TypeLayout, UnitId};
