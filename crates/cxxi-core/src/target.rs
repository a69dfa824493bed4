//! Target platform information for layout and code generation
//!
//! This module defines the C data model of a target: the sizes and
//! alignments of the scalar types that header layouts are built from.

use target_lexicon::{Architecture, OperatingSystem, Triple, Vendor};

/// Target platform information for layout and code generation
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TargetInfo {
    /// Target triple (e.g., "x86_64-unknown-linux-gnu")
    pub triple: Triple,
    /// Pointer size in bytes (4 for 32-bit, 8 for 64-bit)
    pub pointer_size: u8,
    /// Byte order of the target platform
    pub endianness: Endianness,
    /// Size of `long` in bytes (LP64 vs. LLP64/ILP32)
    pub long_size: u8,
    /// Alignment of `long long` and `double` in bytes
    pub wide_scalar_align: u8,
    /// Whether plain `char` is signed
    pub char_is_signed: bool,
}

/// Byte order of the target platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little,
    Big,
}

impl TargetInfo {
    /// Create target info from a triple
    pub fn from_triple(triple: Triple) -> Self {
        let pointer_size = match triple.pointer_width() {
            Ok(target_lexicon::PointerWidth::U16) => 2,
            Ok(target_lexicon::PointerWidth::U32) => 4,
            Ok(target_lexicon::PointerWidth::U64) => 8,
            _ => 8, // Default to 64-bit
        };

        let endianness = match triple.endianness() {
            Ok(target_lexicon::Endianness::Little) => Endianness::Little,
            Ok(target_lexicon::Endianness::Big) => Endianness::Big,
            _ => Endianness::Little, // Default to little endian
        };

        let is_windows = triple.operating_system == OperatingSystem::Windows;

        // LP64 everywhere except Windows, which keeps `long` at 32 bits.
        let long_size = if pointer_size == 8 && !is_windows { 8 } else { 4 };

        // The i386 System V ABI aligns 8-byte scalars to 4 inside aggregates.
        let wide_scalar_align = match triple.architecture {
            Architecture::X86_32(_) if !is_windows => 4,
            _ => 8,
        };

        let char_is_signed = !matches!(
            triple.architecture,
            Architecture::Aarch64(_) | Architecture::Arm(_) | Architecture::Riscv64(_)
        ) || triple.vendor == Vendor::Apple;

        Self {
            triple,
            pointer_size,
            endianness,
            long_size,
            wide_scalar_align,
            char_is_signed,
        }
    }

    /// Get the default target for the current host
    pub fn host() -> Self {
        Self::from_triple(Triple::host())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_host_target() {
        let target = TargetInfo::host();

        // Should have reasonable values
        assert!(target.pointer_size == 4 || target.pointer_size == 8);
        assert!(target.long_size == 4 || target.long_size == 8);
    }

    #[test]
    fn test_x86_64_linux_target() {
        let triple = Triple::from_str("x86_64-unknown-linux-gnu").unwrap();
        let target = TargetInfo::from_triple(triple);

        assert_eq!(target.pointer_size, 8);
        assert_eq!(target.long_size, 8);
        assert_eq!(target.wide_scalar_align, 8);
        assert_eq!(target.endianness, Endianness::Little);
        assert!(target.char_is_signed);
    }

    #[test]
    fn test_x86_64_windows_is_llp64() {
        let triple = Triple::from_str("x86_64-pc-windows-msvc").unwrap();
        let target = TargetInfo::from_triple(triple);

        assert_eq!(target.pointer_size, 8);
        assert_eq!(target.long_size, 4);
    }

    #[test]
    fn test_i386_target() {
        let triple = Triple::from_str("i386-unknown-linux-gnu").unwrap();
        let target = TargetInfo::from_triple(triple);

        assert_eq!(target.pointer_size, 4);
        assert_eq!(target.long_size, 4);
        assert_eq!(target.wide_scalar_align, 4);
        assert_eq!(target.endianness, Endianness::Little);
    }

    #[test]
    fn test_aarch64_linux_char_is_unsigned() {
        let triple = Triple::from_str("aarch64-unknown-linux-gnu").unwrap();
        let target = TargetInfo::from_triple(triple);

        assert!(!target.char_is_signed);
    }
}
