use std::path::{Path, PathBuf};

use dashmap::{DashMap, Entry};

/// A header file read from disk, as seen by the precompile stage.
#[salsa::input(debug)]
pub struct HeaderFile {
    pub path: PathBuf,
    pub text: String,
}

impl HeaderFile {
    /// Create a header from in-memory text (tests and generated headers).
    pub fn from_text(db: &dyn salsa::Database, path: impl AsRef<Path>, text: String) -> Self {
        Self::new(db, path.as_ref().to_path_buf(), text)
    }
}

#[salsa::db]
pub trait Db: salsa::Database {
    /// Load a header from disk, reusing the input if it was read before.
    fn input(&self, path: PathBuf) -> std::io::Result<HeaderFile>;
}

#[derive(Default, Clone)]
#[salsa::db]
pub struct CxxiDatabase {
    storage: salsa::Storage<Self>,
    /// Cache of loaded headers, keyed by canonical path.
    files: DashMap<PathBuf, HeaderFile>,
}

#[salsa::db]
impl salsa::Database for CxxiDatabase {}

#[salsa::db]
impl Db for CxxiDatabase {
    fn input(&self, path: PathBuf) -> std::io::Result<HeaderFile> {
        let path = path.canonicalize()?;
        match self.files.entry(path.clone()) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let contents = std::fs::read_to_string(&path)?;
                let header = HeaderFile::new(self, path, contents);
                Ok(*entry.insert(header))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_input_is_cached_per_path() {
        let db = CxxiDatabase::default();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "struct A {{ int x; }};").unwrap();

        let first = db.input(file.path().to_path_buf()).unwrap();
        let second = db.input(file.path().to_path_buf()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.text(&db), "struct A { int x; };");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let db = CxxiDatabase::default();
        let err = db
            .input(PathBuf::from("/definitely/not/here.h"))
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
