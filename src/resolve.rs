//! Name lookup and layout queries.

use cxxi_front::{BuiltinKind, LookupCategory, LookupResult, QualType};

use crate::errors::{InterfaceError, InterfaceResult};
use crate::interface::CxxInterface;
use crate::types::{HandleKind, TypeHandle, TypeLayout};

impl CxxInterface {
    /// Find a class template, class or enum by root-qualified name.
    ///
    /// Nothing matching is not an error: the handle is `Invalid`.
    pub fn resolve_type(&mut self, qualified_name: &str) -> InterfaceResult<TypeHandle> {
        let found = self.with_sema(|sema| sema.find_tagged(qualified_name))?;
        let kind = match found {
            LookupResult::Found(LookupCategory::Template, decl) => HandleKind::TemplateClass(decl),
            LookupResult::Found(LookupCategory::Class, decl) => HandleKind::Class(decl),
            LookupResult::Found(LookupCategory::Enum, decl) => HandleKind::Enum(decl),
            LookupResult::NotFound => HandleKind::Invalid,
        };
        tracing::debug!(name = qualified_name, ?kind, "resolved type");
        Ok(TypeHandle::in_unit(kind, self.id()))
    }

    pub fn builtin(&self, kind: BuiltinKind) -> TypeHandle {
        TypeHandle::builtin(kind)
    }

    /// Width and alignment of `handle` in bits, computed once per handle.
    pub fn layout(&mut self, handle: &TypeHandle) -> InterfaceResult<TypeLayout> {
        self.check_handle(handle)?;
        if let Some(layout) = handle.cached_layout() {
            return Ok(layout);
        }
        let Some(ty) = self.to_semantic_type(handle) else {
            return Err(InterfaceError::InvalidHandle(format!(
                "{:?} has no layout",
                handle.kind()
            )));
        };

        let info = self.with_sema(|sema| {
            sema.type_info(&ty)
                .map_err(|source| InterfaceError::Layout {
                    name: sema.type_spelling(&ty),
                    source,
                })
        })??;
        let layout = handle.cache_layout(TypeLayout {
            bit_width: info.width,
            bit_alignment: info.align,
        });
        tracing::trace!(kind = ?handle.kind(), ?layout, "computed layout");
        Ok(layout)
    }

    /// Size of `handle` in bytes.
    pub fn type_size(&mut self, handle: &TypeHandle) -> InterfaceResult<u64> {
        Ok(self.layout(handle)?.bit_width / 8)
    }

    /// Alignment of `handle` in bytes.
    pub fn type_alignment(&mut self, handle: &TypeHandle) -> InterfaceResult<u64> {
        Ok(self.layout(handle)?.bit_alignment / 8)
    }

    /// The semantic type a handle stands for. Templates, `Invalid` and
    /// handles of other units have none.
    pub fn to_semantic_type(&self, handle: &TypeHandle) -> Option<QualType> {
        if handle.unit().is_some_and(|unit| unit != self.id()) {
            return None;
        }
        match handle.kind() {
            HandleKind::Builtin(kind) => Some(QualType::Builtin(kind)),
            HandleKind::Class(decl) | HandleKind::SpecializedTemplateClass(decl) => {
                Some(QualType::Record(decl))
            }
            HandleKind::Enum(decl) => Some(QualType::Enum(decl)),
            HandleKind::Invalid | HandleKind::TemplateClass(_) => None,
        }
    }

    /// A handle for a builtin, record or enum type of this unit.
    pub fn handle_for_semantic_type(&self, ty: &QualType) -> TypeHandle {
        let Ok(unit) = self.unit() else {
            return TypeHandle::invalid();
        };
        let kind = match ty {
            QualType::Builtin(kind) => HandleKind::Builtin(*kind),
            QualType::Enum(decl) if unit.enum_decl(*decl).is_some() => HandleKind::Enum(*decl),
            QualType::Record(decl) => match unit.record(*decl) {
                Some(record) => match (record.definition, &record.specialization) {
                    (Some(definition), Some(_)) => HandleKind::SpecializedTemplateClass(definition),
                    (Some(definition), None) => HandleKind::Class(definition),
                    (None, _) => HandleKind::Invalid,
                },
                None => HandleKind::Invalid,
            },
            _ => HandleKind::Invalid,
        };
        TypeHandle::in_unit(kind, self.id())
    }
}
