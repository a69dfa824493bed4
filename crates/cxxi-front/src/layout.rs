//! Record memory layout computation.
//!
//! Computes base and field offsets, sizes, and alignment for records on the
//! unit's target. Uses natural alignment: each scalar is aligned to the
//! target ABI's alignment for it.
//!
//! ## Layout rules
//!
//! - A dynamic class without a dynamic base starts with a vtable pointer
//! - The first dynamic base is the primary base and sits at offset 0
//! - Bases come before fields; empty bases take no space
//! - Fields are laid out in declaration order; union members all start at 0
//! - `alignas` raises the record alignment
//! - Total size is padded to the record alignment
//! - An empty C++ class has size 1; an empty C struct has size 0
//! - Sizes whose bit width does not fit in a `u64` are `TypeTooLarge`

use crate::errors::{SemaError, SemaResult};
use crate::refs::DeclRef;
use crate::sema::Sema;
use crate::tree::{Attr, AttrArg, TagKind};
use crate::types::{ArrayBound, QualType};

/// Width and alignment of a type, in bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub width: u64,
    pub align: u64,
}

/// Memory layout of a defined record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    /// Byte offset of each base, in declaration order.
    pub base_offsets: Vec<u64>,
    /// Byte offset of each field.
    pub field_offsets: Vec<u64>,
    /// Whether the record starts with its own vtable pointer.
    pub has_vptr: bool,
    /// Total size in bytes (padded to alignment).
    pub size: u64,
    /// Alignment in bytes.
    pub alignment: u64,
}

fn align_to(offset: u64, align: u64) -> Option<u64> {
    offset.checked_next_multiple_of(align.max(1))
}

impl Sema<'_> {
    /// Width and alignment of a complete type, in bits.
    pub fn type_info(&self, ty: &QualType) -> SemaResult<TypeInfo> {
        let (size, align) = self.size_align(ty)?;
        match (size.checked_mul(8), align.checked_mul(8)) {
            (Some(width), Some(align)) => Ok(TypeInfo { width, align }),
            _ => Err(self.too_large(ty)),
        }
    }

    /// Size and alignment of a complete type, in bytes.
    pub fn size_align(&self, ty: &QualType) -> SemaResult<(u64, u64)> {
        let pointer = u64::from(self.target().pointer_size);
        match ty {
            QualType::Void => Err(SemaError::IncompleteType {
                name: "void".to_owned(),
            }),
            QualType::Builtin(kind) => Ok(kind.size_align(self.target())),
            QualType::Pointer(_) | QualType::LValueReference(_) => Ok((pointer, pointer)),
            QualType::Array(element, bound) => {
                let ArrayBound::Fixed(count) = *bound else {
                    return Err(SemaError::DependentType);
                };
                let (size, align) = self.size_align(element)?;
                let size = size.checked_mul(count).ok_or_else(|| self.too_large(ty))?;
                Ok((size, align))
            }
            QualType::Enum(decl) => {
                let incomplete = || SemaError::IncompleteType {
                    name: self.display_name(*decl),
                };
                let e = self.unit().enum_decl(*decl).ok_or_else(&incomplete)?;
                if !e.is_complete && !e.fixed_underlying {
                    return Err(incomplete());
                }
                Ok(e.underlying.size_align(self.target()))
            }
            QualType::Record(decl) => {
                let layout = self.record_layout(self.record_definition(*decl)?)?;
                Ok((layout.size, layout.alignment))
            }
            QualType::TemplateParam(_) | QualType::TemplateSpecialization { .. } => {
                Err(SemaError::DependentType)
            }
            QualType::Function { .. } => Err(SemaError::unsupported(
                "function types have no size",
            )),
        }
    }

    fn too_large(&self, ty: &QualType) -> SemaError {
        SemaError::TypeTooLarge {
            name: self.type_spelling(ty),
        }
    }

    /// The declaration carrying the body of record `decl`.
    pub fn record_definition(&self, decl: DeclRef) -> SemaResult<DeclRef> {
        self.unit()
            .record(decl)
            .and_then(|r| r.definition)
            .ok_or_else(|| SemaError::IncompleteType {
                name: self.display_name(decl),
            })
    }

    pub fn is_dynamic_type(&self, ty: &QualType) -> bool {
        match ty {
            QualType::Record(decl) => self
                .unit()
                .record(*decl)
                .and_then(|r| r.definition)
                .and_then(|d| self.unit().record(d))
                .is_some_and(|r| r.is_dynamic),
            _ => false,
        }
    }

    /// No fields, no vtable pointer and only empty bases.
    pub fn is_empty_record(&self, definition: DeclRef) -> bool {
        let Some(record) = self.unit().record(definition) else {
            return false;
        };
        record.fields.is_empty()
            && !record.is_dynamic
            && record.bases.iter().all(|base| match base {
                QualType::Record(b) => self
                    .record_definition(*b)
                    .is_ok_and(|d| self.is_empty_record(d)),
                _ => false,
            })
    }

    /// Compute the layout of a defined record.
    pub fn record_layout(&self, definition: DeclRef) -> SemaResult<RecordLayout> {
        let Some(record) = self.unit().record(definition) else {
            return Err(SemaError::NotAType {
                name: self.display_name(definition),
            });
        };
        if record.definition.is_none() {
            return Err(SemaError::IncompleteType {
                name: self.display_name(definition),
            });
        }

        let too_large = || SemaError::TypeTooLarge {
            name: self.display_name(definition),
        };
        let pointer = u64::from(self.target().pointer_size);
        let primary = if record.is_dynamic {
            record.bases.iter().position(|b| self.is_dynamic_type(b))
        } else {
            None
        };
        let has_vptr = record.is_dynamic && primary.is_none();

        let mut offset: u64 = 0;
        let mut max_align: u64 = 1;
        if has_vptr {
            offset = pointer;
            max_align = pointer;
        }

        let mut base_offsets = vec![0; record.bases.len()];
        let order = primary
            .into_iter()
            .chain((0..record.bases.len()).filter(|&i| Some(i) != primary));
        for index in order {
            let QualType::Record(base) = &record.bases[index] else {
                return Err(SemaError::DependentType);
            };
            let base_def = self.record_definition(*base)?;
            let layout = self.record_layout(base_def)?;
            max_align = max_align.max(layout.alignment);
            if self.is_empty_record(base_def) {
                continue;
            }
            offset = align_to(offset, layout.alignment).ok_or_else(too_large)?;
            base_offsets[index] = offset;
            offset = offset.checked_add(layout.size).ok_or_else(too_large)?;
        }

        let mut field_offsets = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            let (size, align) = self.size_align(&field.ty)?;
            max_align = max_align.max(align);
            if record.tag == TagKind::Union {
                field_offsets.push(0);
                offset = offset.max(size);
            } else {
                offset = align_to(offset, align).ok_or_else(too_large)?;
                field_offsets.push(offset);
                offset = offset.checked_add(size).ok_or_else(too_large)?;
            }
        }

        for attr in &record.attrs {
            match attr {
                Attr::Aligned(AttrArg::Fixed(value)) => max_align = max_align.max(*value),
                Attr::Aligned(AttrArg::Param(_)) => return Err(SemaError::DependentType),
            }
        }

        let mut size = align_to(offset, max_align).ok_or_else(too_large)?;
        if size == 0 && self.language().is_cxx() {
            size = max_align;
        }

        Ok(RecordLayout {
            base_offsets,
            field_offsets,
            has_vptr,
            size,
            alignment: max_align,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::{linux64, parse_with};
    use crate::sema::LookupResult;
    use cxxi_core::{LanguageVariant, TargetInfo};
    use std::str::FromStr;

    fn layout_in(language: LanguageVariant, target: &TargetInfo, source: &str, name: &str) -> RecordLayout {
        let mut unit = parse_with(language, source).unwrap();
        let sema = Sema::new(&mut unit, target, language);
        let LookupResult::Found(_, decl) = sema.find_tagged(name) else {
            panic!("{name} not found");
        };
        sema.record_layout(decl).unwrap()
    }

    fn layout(source: &str, name: &str) -> RecordLayout {
        layout_in(LanguageVariant::Cxx, &linux64(), source, name)
    }

    #[test]
    fn test_natural_alignment_padding() {
        let l = layout("struct Mixed { char c; double d; short s; };", "Mixed");
        assert_eq!(l.field_offsets, [0, 8, 16]);
        assert_eq!((l.size, l.alignment), (24, 8));
    }

    #[test]
    fn test_empty_class_has_size_one_in_cxx_only() {
        assert_eq!(layout("struct Empty {};", "Empty").size, 1);
        let c = layout_in(LanguageVariant::C, &linux64(), "struct Empty {};", "Empty");
        assert_eq!(c.size, 0);
    }

    #[test]
    fn test_vtable_pointer_comes_first() {
        let l = layout("struct Shape { virtual ~Shape(); int id; };", "Shape");
        assert!(l.has_vptr);
        assert_eq!(l.field_offsets, [8]);
        assert_eq!(l.size, 16);
    }

    #[test]
    fn test_primary_base_shares_the_vtable_pointer() {
        let source = "struct Shape { virtual ~Shape(); int id; };
                      struct Circle : Shape { double radius; };";
        let l = layout(source, "Circle");
        assert!(!l.has_vptr);
        assert_eq!(l.base_offsets, [0]);
        assert_eq!(l.field_offsets, [16]);
        assert_eq!(l.size, 24);
    }

    #[test]
    fn test_empty_base_takes_no_space() {
        let l = layout("struct Tag {}; struct Tagged : Tag { int x; };", "Tagged");
        assert_eq!(l.field_offsets, [0]);
        assert_eq!(l.size, 4);
    }

    #[test]
    fn test_union_members_overlap() {
        let l = layout("union Value { char c; double d; int words[3]; };", "Value");
        assert_eq!(l.field_offsets, [0, 0, 0]);
        assert_eq!((l.size, l.alignment), (16, 8));
    }

    #[test]
    fn test_alignas_raises_alignment() {
        let l = layout("struct alignas(16) Vec4 { float x; };", "Vec4");
        assert_eq!((l.size, l.alignment), (16, 16));
    }

    #[test]
    fn test_arrays_of_char_then_int() {
        let l = layout("struct Named { char name[10]; int n; };", "Named");
        assert_eq!(l.field_offsets, [0, 12]);
        assert_eq!(l.size, 16);
    }

    #[test]
    fn test_long_follows_the_data_model() {
        let source = "struct L { char c; long v; };";
        assert_eq!(layout(source, "L").size, 16);

        let windows = TargetInfo::from_triple(
            target_lexicon::Triple::from_str("x86_64-pc-windows-msvc").unwrap(),
        );
        assert_eq!(layout_in(LanguageVariant::Cxx, &windows, source, "L").size, 8);
    }

    #[test]
    fn test_type_info_is_in_bits() {
        let mut unit = parse_with(LanguageVariant::Cxx, "").unwrap();
        let target = linux64();
        let sema = Sema::new(&mut unit, &target, LanguageVariant::Cxx);
        let info = sema
            .type_info(&QualType::Builtin(crate::types::BuiltinKind::Double))
            .unwrap();
        assert_eq!(info, TypeInfo { width: 64, align: 64 });
        assert!(matches!(
            sema.size_align(&QualType::Void),
            Err(SemaError::IncompleteType { .. })
        ));
    }

    #[test]
    fn test_oversized_records_are_rejected() {
        let source = "struct Bits { char a[4611686018427387904]; };\n\
                      struct Bytes { char a[9223372036854775807]; char b[9223372036854775807]; char c[2]; };";
        let mut unit = parse_with(LanguageVariant::Cxx, source).unwrap();
        let target = linux64();
        let sema = Sema::new(&mut unit, &target, LanguageVariant::Cxx);

        let LookupResult::Found(_, bits) = sema.find_tagged("Bits") else {
            panic!("Bits not found");
        };
        assert_eq!(sema.size_align(&QualType::Record(bits)).unwrap().0, 1 << 62);
        assert!(matches!(
            sema.type_info(&QualType::Record(bits)),
            Err(SemaError::TypeTooLarge { .. })
        ));

        let LookupResult::Found(_, bytes) = sema.find_tagged("Bytes") else {
            panic!("Bytes not found");
        };
        assert!(matches!(
            sema.record_layout(bytes),
            Err(SemaError::TypeTooLarge { name }) if name == "Bytes"
        ));
    }

    #[test]
    fn test_oversized_array_field_is_rejected_while_parsing() {
        let Err(error) = parse_with(
            LanguageVariant::Cxx,
            "struct H { long long a[3000000000000000000]; };",
        ) else {
            panic!("oversized array accepted");
        };
        assert!(error.message.contains("too large"));
    }
}
