//! Semantic types of the header language.

use std::fmt;

use cxxi_core::TargetInfo;
use serde::{Deserialize, Serialize};

use crate::refs::{DeclRef, FileId};

/// Scalar types built into the language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuiltinKind {
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 14] = [
        BuiltinKind::Bool,
        BuiltinKind::Char,
        BuiltinKind::SChar,
        BuiltinKind::UChar,
        BuiltinKind::Short,
        BuiltinKind::UShort,
        BuiltinKind::Int,
        BuiltinKind::UInt,
        BuiltinKind::Long,
        BuiltinKind::ULong,
        BuiltinKind::LongLong,
        BuiltinKind::ULongLong,
        BuiltinKind::Float,
        BuiltinKind::Double,
    ];

    /// Integral kinds may be used as non-type template arguments.
    pub fn is_integral(self) -> bool {
        !self.is_floating()
    }

    pub fn is_floating(self) -> bool {
        matches!(self, BuiltinKind::Float | BuiltinKind::Double)
    }

    pub fn is_signed(self, target: &TargetInfo) -> bool {
        match self {
            BuiltinKind::Char => target.char_is_signed,
            BuiltinKind::SChar
            | BuiltinKind::Short
            | BuiltinKind::Int
            | BuiltinKind::Long
            | BuiltinKind::LongLong
            | BuiltinKind::Float
            | BuiltinKind::Double => true,
            _ => false,
        }
    }

    /// Size and alignment in bytes on `target`.
    pub fn size_align(self, target: &TargetInfo) -> (u64, u64) {
        let wide = u64::from(target.wide_scalar_align);
        match self {
            BuiltinKind::Bool | BuiltinKind::Char | BuiltinKind::SChar | BuiltinKind::UChar => {
                (1, 1)
            }
            BuiltinKind::Short | BuiltinKind::UShort => (2, 2),
            BuiltinKind::Int | BuiltinKind::UInt | BuiltinKind::Float => (4, 4),
            BuiltinKind::Long | BuiltinKind::ULong => {
                let size = u64::from(target.long_size);
                (size, size.min(wide))
            }
            BuiltinKind::LongLong | BuiltinKind::ULongLong | BuiltinKind::Double => (8, wide),
        }
    }

    /// Signed integer kind with exactly `bits` bits.
    pub fn signed_of_width(bits: u32) -> Option<BuiltinKind> {
        match bits {
            8 => Some(BuiltinKind::SChar),
            16 => Some(BuiltinKind::Short),
            32 => Some(BuiltinKind::Int),
            64 => Some(BuiltinKind::LongLong),
            _ => None,
        }
    }

    pub fn spelling(self) -> &'static str {
        match self {
            BuiltinKind::Bool => "bool",
            BuiltinKind::Char => "char",
            BuiltinKind::SChar => "signed char",
            BuiltinKind::UChar => "unsigned char",
            BuiltinKind::Short => "short",
            BuiltinKind::UShort => "unsigned short",
            BuiltinKind::Int => "int",
            BuiltinKind::UInt => "unsigned int",
            BuiltinKind::Long => "long",
            BuiltinKind::ULong => "unsigned long",
            BuiltinKind::LongLong => "long long",
            BuiltinKind::ULongLong => "unsigned long long",
            BuiltinKind::Float => "float",
            BuiltinKind::Double => "double",
        }
    }
}

impl fmt::Display for BuiltinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

/// Array extent: known, or a non-type template parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayBound {
    Fixed(u64),
    Param(u32),
}

/// A type as the semantic tree represents it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualType {
    Void,
    Builtin(BuiltinKind),
    Record(DeclRef),
    Enum(DeclRef),
    Pointer(Box<QualType>),
    LValueReference(Box<QualType>),
    Array(Box<QualType>, ArrayBound),
    /// Type template parameter, by position.
    TemplateParam(u32),
    /// A template-id whose arguments still depend on template parameters.
    TemplateSpecialization {
        template: DeclRef,
        args: Vec<TemplateArgument>,
    },
    Function {
        ret: Box<QualType>,
        params: Vec<QualType>,
    },
}

impl QualType {
    pub fn pointer_to(self) -> QualType {
        QualType::Pointer(Box::new(self))
    }

    pub fn reference_to(self) -> QualType {
        QualType::LValueReference(Box::new(self))
    }

    pub fn is_dependent(&self) -> bool {
        match self {
            QualType::TemplateParam(_) | QualType::TemplateSpecialization { .. } => true,
            QualType::Pointer(inner) | QualType::LValueReference(inner) => inner.is_dependent(),
            QualType::Array(inner, bound) => {
                inner.is_dependent() || matches!(bound, ArrayBound::Param(_))
            }
            QualType::Function { ret, params } => {
                ret.is_dependent() || params.iter().any(QualType::is_dependent)
            }
            _ => false,
        }
    }

    pub fn as_builtin(&self) -> Option<BuiltinKind> {
        match self {
            QualType::Builtin(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// One argument of a template-id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateArgument {
    Type(QualType),
    /// Integral constant, truncated to `bit_width` bits.
    Integral {
        value: u64,
        bit_width: u32,
        signed: bool,
    },
    /// Non-type template parameter, by position.
    Param(u32),
}

impl TemplateArgument {
    /// Build an integral argument, masking `value` to `bit_width` bits.
    pub fn integral(value: u64, bit_width: u32, signed: bool) -> Self {
        TemplateArgument::Integral {
            value: mask_to_width(value, bit_width),
            bit_width,
            signed,
        }
    }

    pub fn is_dependent(&self) -> bool {
        match self {
            TemplateArgument::Type(ty) => ty.is_dependent(),
            TemplateArgument::Integral { .. } => false,
            TemplateArgument::Param(_) => true,
        }
    }

    /// The constant as a signed or unsigned number, per its signedness.
    pub fn integral_value(&self) -> Option<i128> {
        match *self {
            TemplateArgument::Integral {
                value,
                bit_width,
                signed,
            } => Some(if signed && bit_width > 0 && bit_width < 64 {
                let shift = 64 - bit_width;
                i128::from(((value << shift) as i64) >> shift)
            } else if signed && bit_width == 64 {
                i128::from(value as i64)
            } else {
                i128::from(value)
            }),
            _ => None,
        }
    }
}

pub(crate) fn mask_to_width(value: u64, bit_width: u32) -> u64 {
    if bit_width >= 64 {
        value
    } else {
        value & ((1u64 << bit_width) - 1)
    }
}

/// A position inside one of the unit's files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: FileId,
    pub offset: u32,
}

impl SourceLocation {
    pub fn new(file: FileId, offset: usize) -> Self {
        Self {
            file,
            offset: u32::try_from(offset).unwrap_or(u32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use target_lexicon::Triple;

    fn linux64() -> TargetInfo {
        TargetInfo::from_triple(Triple::from_str("x86_64-unknown-linux-gnu").unwrap())
    }

    #[test]
    fn test_long_follows_data_model() {
        let lp64 = linux64();
        let llp64 = TargetInfo::from_triple(Triple::from_str("x86_64-pc-windows-msvc").unwrap());
        assert_eq!(BuiltinKind::Long.size_align(&lp64), (8, 8));
        assert_eq!(BuiltinKind::Long.size_align(&llp64), (4, 4));
    }

    #[test]
    fn test_integral_masks_value() {
        let arg = TemplateArgument::integral(0x1ff, 8, false);
        assert_eq!(
            arg,
            TemplateArgument::Integral {
                value: 0xff,
                bit_width: 8,
                signed: false
            }
        );
    }

    #[test]
    fn test_signed_integral_value_is_sign_extended() {
        let arg = TemplateArgument::integral(u64::MAX, 32, true);
        assert_eq!(arg.integral_value(), Some(-1));
    }

    #[test]
    fn test_dependent_types() {
        let dependent = QualType::Array(Box::new(QualType::Builtin(BuiltinKind::Int)), ArrayBound::Param(1));
        assert!(dependent.is_dependent());
        assert!(!QualType::Builtin(BuiltinKind::Int).pointer_to().is_dependent());
        assert!(QualType::TemplateParam(0).pointer_to().is_dependent());
    }
}
