//! Precompiled header state.
//!
//! A header is parsed on its own into a fresh unit, which is then
//! serialized with bincode. The result lives only in memory: a session
//! adopts it when the wrapper unit includes the header.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use cxxi_core::{Db, Diagnostic, HeaderFile, LanguageVariant, TargetInfo};
use derive_more::{Display, Error};
use salsa::Accumulator;

use crate::parser::{parse_unit, IncludeHandler, Included};
use crate::sema::Sema;
use crate::tree::TranslationUnit;

/// Extension of the in-memory precompiled state entry for a header.
pub const PCH_EXTENSION: &str = "gch";

/// One header compiled for one dialect and target.
#[salsa::interned(debug)]
pub struct PrecompileRequest<'db> {
    pub header: HeaderFile,
    pub language: LanguageVariant,
    pub target: TargetInfo,
}

/// Serialized semantic state of a header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecompiledHeader {
    pub bytes: Vec<u8>,
}

impl PrecompiledHeader {
    pub fn to_unit(&self) -> Result<TranslationUnit, bincode::Error> {
        deserialize_unit(&self.bytes)
    }
}

/// The header did not parse; the reasons are accumulated diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
#[display("failed to precompile '{}'", path.display())]
pub struct PrecompileFailure {
    #[error(not(source))]
    pub path: PathBuf,
}

/// Name of the precompiled state entry for `header`.
pub fn pch_name(header: &str) -> String {
    format!("{header}.{PCH_EXTENSION}")
}

pub fn serialize_unit(unit: &TranslationUnit) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(unit)
}

pub fn deserialize_unit(bytes: &[u8]) -> Result<TranslationUnit, bincode::Error> {
    bincode::deserialize(bytes)
}

/// Parse `request`'s header in isolation and serialize the resulting unit.
///
/// Quoted includes are read through the database relative to the including
/// file. Diagnostics are accumulated.
#[salsa::tracked]
pub fn precompile_header<'db>(
    db: &'db dyn Db,
    request: PrecompileRequest<'db>,
) -> Result<PrecompiledHeader, PrecompileFailure> {
    let header = request.header(db);
    let path = header.path(db);
    let name = path.display().to_string();
    let target = request.target(db);
    let language = request.language(db);
    tracing::debug!(header = %name, ?language, "precompiling header");

    let mut unit = TranslationUnit::new(&name);
    let mut sema = Sema::new(&mut unit, &target, language);
    let mut includes = DatabaseIncludes {
        db,
        seen: HashSet::from([path.clone()]),
    };
    let mut diagnostics = Vec::new();
    let parsed = parse_unit(
        &mut sema,
        &mut includes,
        &name,
        &header.text(db),
        &mut diagnostics,
    );
    for diagnostic in diagnostics {
        diagnostic.accumulate(db);
    }
    if let Err(error) = parsed {
        error.accumulate(db);
        return Err(PrecompileFailure { path });
    }

    match serialize_unit(&unit) {
        Ok(bytes) => {
            tracing::debug!(header = %name, size = bytes.len(), "precompiled header");
            Ok(PrecompiledHeader { bytes })
        }
        Err(error) => {
            Diagnostic::error(
                cxxi_core::CompilationPhase::Preprocessing,
                name,
                Default::default(),
                format!("cannot serialize precompiled state: {error}"),
            )
            .accumulate(db);
            Err(PrecompileFailure { path })
        }
    }
}

/// Reads quoted includes from disk through the salsa database.
struct DatabaseIncludes<'db> {
    db: &'db dyn Db,
    seen: HashSet<PathBuf>,
}

impl IncludeHandler for DatabaseIncludes<'_> {
    fn include(&mut self, _: &mut Sema<'_>, path: &str, from: &str) -> Result<Included, String> {
        let base = Path::new(from).parent().unwrap_or(Path::new(""));
        let header = self
            .db
            .input(base.join(path))
            .map_err(|e| format!("'{path}' file not found: {e}"))?;
        let resolved = header.path(self.db);
        if !self.seen.insert(resolved.clone()) {
            return Ok(Included::Skipped);
        }
        Ok(Included::Source {
            name: resolved.display().to_string(),
            text: header.text(self.db),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::{LookupCategory, LookupResult};
    use cxxi_core::CxxiDatabase;
    use std::fs;

    fn target() -> TargetInfo {
        crate::parser::tests::linux64()
    }

    fn find(unit: &mut TranslationUnit, name: &str) -> LookupResult {
        let target = target();
        Sema::new(unit, &target, LanguageVariant::Cxx).find_tagged(name)
    }

    #[test]
    fn test_precompile_round_trips_the_unit() {
        let db = CxxiDatabase::default();
        let header = HeaderFile::from_text(
            &db,
            "shapes.h",
            "namespace geo { struct Point { int x; int y; }; }".to_owned(),
        );
        let request = PrecompileRequest::new(&db, header, LanguageVariant::Cxx, target());
        let pch = precompile_header(&db, request).unwrap();

        let mut unit = pch.to_unit().unwrap();
        assert!(matches!(
            find(&mut unit, "geo::Point"),
            LookupResult::Found(LookupCategory::Class, _)
        ));
    }

    #[test]
    fn test_same_request_is_memoized() {
        let db = CxxiDatabase::default();
        let header = HeaderFile::from_text(&db, "a.h", "struct A { char c; };".to_owned());
        let first = PrecompileRequest::new(&db, header, LanguageVariant::Cxx, target());
        let second = PrecompileRequest::new(&db, header, LanguageVariant::Cxx, target());
        assert_eq!(first, second);
        assert_eq!(
            precompile_header(&db, first).unwrap(),
            precompile_header(&db, second).unwrap()
        );
    }

    #[test]
    fn test_parse_error_is_accumulated() {
        let db = CxxiDatabase::default();
        let header = HeaderFile::from_text(&db, "bad.h", "struct A { int x }".to_owned());
        let request = PrecompileRequest::new(&db, header, LanguageVariant::Cxx, target());
        let failure = precompile_header(&db, request).unwrap_err();
        assert_eq!(failure.path, PathBuf::from("bad.h"));

        let diagnostics = precompile_header::accumulated::<Diagnostic>(&db, request);
        assert!(diagnostics.iter().any(|d| d.is_error()));
    }

    #[test]
    fn test_includes_are_read_relative_to_the_header() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.h"), "struct Base { long id; };").unwrap();
        fs::write(
            dir.path().join("derived.h"),
            "#include \"base.h\"\n#include \"base.h\"\nstruct Derived : Base { int extra; };",
        )
        .unwrap();

        let db = CxxiDatabase::default();
        let header = db.input(dir.path().join("derived.h")).unwrap();
        let request = PrecompileRequest::new(&db, header, LanguageVariant::Cxx, target());
        let mut unit = precompile_header(&db, request).unwrap().to_unit().unwrap();
        assert!(matches!(
            find(&mut unit, "Base"),
            LookupResult::Found(LookupCategory::Class, _)
        ));
        assert!(matches!(
            find(&mut unit, "Derived"),
            LookupResult::Found(LookupCategory::Class, _)
        ));
    }

    #[test]
    fn test_pch_name() {
        assert_eq!(pch_name("include/widget.h"), "include/widget.h.gch");
    }
}
