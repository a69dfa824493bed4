//! A front-end session: parses one root unit from a file system handle and
//! hands the finished tree to an action.

use std::collections::HashSet;
use std::path::Path;

use cxxi_core::{CompilationPhase, Diagnostic, LanguageVariant, Span, TargetInfo};

use crate::errors::ParseFailure;
use crate::parser::{parse_unit, IncludeHandler, Included};
use crate::pch::{deserialize_unit, pch_name};
use crate::sema::Sema;
use crate::tree::TranslationUnit;
use crate::types::SourceLocation;
use crate::vfs::FileSystemHandle;

/// Receives the unit once parsing completes.
pub trait FrontendAction {
    fn handle_translation_unit(&mut self, unit: TranslationUnit);
}

pub struct Session {
    fs: FileSystemHandle,
    root_unit_name: String,
    language: LanguageVariant,
    target: TargetInfo,
    diagnostics: Vec<Diagnostic>,
    end_of_unit: Option<SourceLocation>,
}

impl Session {
    pub fn create(
        fs: FileSystemHandle,
        root_unit_name: impl Into<String>,
        language: LanguageVariant,
        target: TargetInfo,
    ) -> Self {
        Self {
            fs,
            root_unit_name: root_unit_name.into(),
            language,
            target,
            diagnostics: Vec::new(),
            end_of_unit: None,
        }
    }

    pub fn language(&self) -> LanguageVariant {
        self.language
    }

    pub fn target(&self) -> &TargetInfo {
        &self.target
    }

    pub fn root_unit_name(&self) -> &str {
        &self.root_unit_name
    }

    /// Diagnostics of the last run, warnings included.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Parse the root unit and pass the result to `action`.
    pub fn run(&mut self, action: &mut dyn FrontendAction) -> Result<(), ParseFailure> {
        self.diagnostics.clear();
        self.end_of_unit = None;

        let text = match self.fs.read_to_string(&self.root_unit_name) {
            Ok(text) => text,
            Err(error) => {
                self.diagnostics.push(Diagnostic::error(
                    CompilationPhase::Preprocessing,
                    self.root_unit_name.clone(),
                    Span::default(),
                    format!("cannot open '{}': {error}", self.root_unit_name),
                ));
                return Err(self.failure());
            }
        };
        tracing::debug!(unit = %self.root_unit_name, language = ?self.language, "parsing unit");

        let mut unit = TranslationUnit::new(&self.root_unit_name);
        let mut includes = SessionIncludes {
            fs: &self.fs,
            seen: HashSet::new(),
        };
        let mut sema = Sema::new(&mut unit, &self.target, self.language);
        let parsed = parse_unit(
            &mut sema,
            &mut includes,
            &self.root_unit_name,
            &text,
            &mut self.diagnostics,
        );
        if let Err(error) = parsed {
            self.diagnostics.push(error);
            return Err(self.failure());
        }

        let file = unit.add_file(&self.root_unit_name);
        self.end_of_unit = Some(SourceLocation::new(file, text.len()));
        tracing::debug!(
            unit = %self.root_unit_name,
            decls = unit.decl_count(),
            warnings = self.diagnostics.len(),
            "unit parsed"
        );
        action.handle_translation_unit(unit);
        Ok(())
    }

    /// Semantic actions over `unit` with this session's dialect and target.
    pub fn sema<'a>(&'a self, unit: &'a mut TranslationUnit) -> Sema<'a> {
        Sema::new(unit, &self.target, self.language)
    }

    /// Location just past the last byte of the root unit.
    pub fn end_of_unit_location(&self) -> Option<SourceLocation> {
        self.end_of_unit
    }

    fn failure(&self) -> ParseFailure {
        ParseFailure {
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// Resolves quoted includes through the session's file system and adopts
/// precompiled state when it is registered for the header.
struct SessionIncludes<'fs> {
    fs: &'fs FileSystemHandle,
    seen: HashSet<String>,
}

impl IncludeHandler for SessionIncludes<'_> {
    fn include(&mut self, sema: &mut Sema<'_>, path: &str, from: &str) -> Result<Included, String> {
        let base = Path::new(from).parent().unwrap_or(Path::new(""));
        let resolved = base.join(path).display().to_string();
        if !self.seen.insert(resolved.clone()) {
            return Ok(Included::Skipped);
        }

        let pch = pch_name(&resolved);
        if self.fs.is_virtual(&pch) {
            if !sema.unit().is_pristine() {
                return Err(format!(
                    "precompiled header '{pch}' must be included before any declaration"
                ));
            }
            let bytes = self
                .fs
                .read(&pch)
                .map_err(|e| format!("cannot read '{pch}': {e}"))?;
            let adopted = deserialize_unit(&bytes)
                .map_err(|e| format!("malformed precompiled header '{pch}': {e}"))?;
            tracing::debug!(header = %resolved, decls = adopted.decl_count(), "adopted precompiled header");
            *sema.unit_mut() = adopted;
            return Ok(Included::Adopted);
        }

        let text = self
            .fs
            .read_to_string(&resolved)
            .map_err(|e| format!("'{path}' file not found: {e}"))?;
        Ok(Included::Source {
            name: resolved,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pch::serialize_unit;
    use crate::sema::LookupResult;
    use crate::vfs::VirtualFileSystem;

    #[derive(Default)]
    struct Keep(Option<TranslationUnit>);

    impl FrontendAction for Keep {
        fn handle_translation_unit(&mut self, unit: TranslationUnit) {
            self.0 = Some(unit);
        }
    }

    fn session(vfs: &VirtualFileSystem, root: &str) -> Session {
        Session::create(
            vfs.handle(),
            root,
            LanguageVariant::Cxx,
            crate::parser::tests::linux64(),
        )
    }

    #[test]
    fn test_run_parses_virtual_files() {
        let vfs = VirtualFileSystem::new();
        vfs.add_file("/v/point.h", b"struct Point { int x; int y; };".to_vec());
        vfs.add_file("/v/unit.cc", b"#include \"point.h\"\nnamespace cxxi {}".to_vec());

        let mut session = session(&vfs, "/v/unit.cc");
        let mut keep = Keep::default();
        session.run(&mut keep).unwrap();

        let mut unit = keep.0.unwrap();
        let end = session.end_of_unit_location().unwrap();
        assert_eq!(end.offset as usize, "#include \"point.h\"\nnamespace cxxi {}".len());
        assert!(matches!(
            session.sema(&mut unit).find_tagged("Point"),
            LookupResult::Found(..)
        ));
    }

    #[test]
    fn test_precompiled_state_is_adopted() {
        // The header text on the overlay is broken; only the .gch is usable.
        let mut pch_unit = TranslationUnit::new("/v/lib.h");
        {
            let target = crate::parser::tests::linux64();
            let mut sema = Sema::new(&mut pch_unit, &target, LanguageVariant::Cxx);
            let mut diagnostics = Vec::new();
            parse_unit(
                &mut sema,
                &mut crate::parser::tests::NoIncludes,
                "/v/lib.h",
                "struct Lib { double d; };",
                &mut diagnostics,
            )
            .unwrap();
        }

        let vfs = VirtualFileSystem::new();
        vfs.add_file("/v/lib.h", b"this is not C++".to_vec());
        vfs.add_file("/v/lib.h.gch", serialize_unit(&pch_unit).unwrap());
        vfs.add_file("/v/unit.cc", b"#include \"lib.h\"\n".to_vec());

        let mut session = session(&vfs, "/v/unit.cc");
        let mut keep = Keep::default();
        session.run(&mut keep).unwrap();
        let mut unit = keep.0.unwrap();
        assert!(matches!(
            session.sema(&mut unit).find_tagged("Lib"),
            LookupResult::Found(..)
        ));
    }

    #[test]
    fn test_late_precompiled_include_is_rejected() {
        let vfs = VirtualFileSystem::new();
        let empty = TranslationUnit::new("/v/late.h");
        vfs.add_file("/v/late.h.gch", serialize_unit(&empty).unwrap());
        vfs.add_file("/v/unit.cc", b"struct First {};\n#include \"late.h\"\n".to_vec());

        let mut session = session(&vfs, "/v/unit.cc");
        let failure = session.run(&mut Keep::default()).unwrap_err();
        let error = failure.first_error().unwrap();
        assert_eq!(error.phase, CompilationPhase::Preprocessing);
        assert!(error.message.contains("must be included before"));
    }

    #[test]
    fn test_missing_root_unit() {
        let vfs = VirtualFileSystem::new();
        let mut session = session(&vfs, "/v/absent.cc");
        let failure = session.run(&mut Keep::default()).unwrap_err();
        assert_eq!(failure.diagnostics.len(), 1);
        assert!(session.end_of_unit_location().is_none());
    }
}
