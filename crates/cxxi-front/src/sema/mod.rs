//! Semantic actions over a translation unit.
//!
//! `Sema` borrows the unit mutably for the duration of a batch of actions.
//! The parser drives it while reading headers; the interface drives it
//! afterwards to look up, instantiate and synthesize declarations.

mod decl;
mod lookup;
mod template;

pub use lookup::{LookupCategory, LookupResult};
pub use template::MAX_INSTANTIATION_DEPTH;
pub(crate) use template::checked_alignment;

use cxxi_core::{LanguageVariant, TargetInfo};
use smallvec::SmallVec;

use crate::refs::DeclRef;
use crate::tree::TranslationUnit;
use crate::types::{ArrayBound, QualType, TemplateArgument};

pub struct Sema<'a> {
    unit: &'a mut TranslationUnit,
    target: &'a TargetInfo,
    language: LanguageVariant,
    /// Specializations whose definitions are being instantiated, innermost last.
    instantiating: SmallVec<[DeclRef; 8]>,
}

impl<'a> Sema<'a> {
    pub fn new(
        unit: &'a mut TranslationUnit,
        target: &'a TargetInfo,
        language: LanguageVariant,
    ) -> Self {
        Self {
            unit,
            target,
            language,
            instantiating: SmallVec::new(),
        }
    }

    pub fn unit(&self) -> &TranslationUnit {
        &*self.unit
    }

    pub fn unit_mut(&mut self) -> &mut TranslationUnit {
        &mut *self.unit
    }

    pub fn target(&self) -> &TargetInfo {
        self.target
    }

    pub fn language(&self) -> LanguageVariant {
        self.language
    }

    /// Qualified name of a declaration, with template arguments for
    /// specializations (`ns::Box<int>`).
    pub fn display_name(&self, decl: DeclRef) -> String {
        let name = self.unit.qualified_name(decl);
        match self.unit.record(decl).and_then(|r| r.specialization.as_ref()) {
            Some(info) => format!("{name}<{}>", self.args_spelling(&info.args)),
            None => name,
        }
    }

    /// Source-like spelling of a type, for diagnostics.
    pub fn type_spelling(&self, ty: &QualType) -> String {
        match ty {
            QualType::Void => "void".to_owned(),
            QualType::Builtin(kind) => kind.spelling().to_owned(),
            QualType::Record(decl) | QualType::Enum(decl) => self.display_name(*decl),
            QualType::Pointer(inner) => format!("{}*", self.type_spelling(inner)),
            QualType::LValueReference(inner) => format!("{}&", self.type_spelling(inner)),
            QualType::Array(inner, ArrayBound::Fixed(n)) => {
                format!("{}[{n}]", self.type_spelling(inner))
            }
            QualType::Array(inner, ArrayBound::Param(i)) => {
                format!("{}[${i}]", self.type_spelling(inner))
            }
            QualType::TemplateParam(i) => format!("${i}"),
            QualType::TemplateSpecialization { template, args } => format!(
                "{}<{}>",
                self.unit.qualified_name(*template),
                self.args_spelling(args)
            ),
            QualType::Function { ret, params } => format!(
                "{}({})",
                self.type_spelling(ret),
                params
                    .iter()
                    .map(|p| self.type_spelling(p))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    fn args_spelling(&self, args: &[TemplateArgument]) -> String {
        args.iter()
            .map(|arg| match arg {
                TemplateArgument::Type(ty) => self.type_spelling(ty),
                TemplateArgument::Integral { .. } => arg
                    .integral_value()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                TemplateArgument::Param(i) => format!("${i}"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
