//! Construction of the long-lived translation unit.
//!
//! A header is first precompiled on its own. A small wrapper unit that
//! includes the header is then registered next to the precompiled state in
//! an in-memory file system, and a session parses the wrapper. The
//! resulting tree belongs to the interface until it is dropped.

use std::path::{Path, PathBuf};

use cxxi_core::{CxxiDatabase, Db, Diagnostic, LanguageVariant, TargetInfo};
use cxxi_front::pch::pch_name;
use cxxi_front::{
    FrontendAction, PrecompileRequest, PrecompiledHeader, Sema, Session, SourceLocation,
    TranslationUnit, VirtualFileSystem, precompile_header,
};
use target_lexicon::Triple;

use crate::errors::{InterfaceError, InterfaceResult};
use crate::types::{TypeHandle, UnitId};

/// Namespace the wrapper unit reserves for synthesized declarations.
pub const INTERNAL_NAMESPACE: &str = "cxxi::__ffi_internal";

/// Options fixed at construction.
#[derive(Clone, Debug, Default)]
pub struct InterfaceOptions {
    pub language: LanguageVariant,
    /// Target to lay out and lower for; the host when absent.
    pub target: Option<Triple>,
    /// Stem of the synthetic wrapper unit's file name.
    pub wrapper_name: Option<String>,
}

impl InterfaceOptions {
    pub fn new(language: LanguageVariant) -> Self {
        Self {
            language,
            ..Self::default()
        }
    }

    pub fn with_target(mut self, triple: Triple) -> Self {
        self.target = Some(triple);
        self
    }

    pub fn with_wrapper_name(mut self, name: impl Into<String>) -> Self {
        self.wrapper_name = Some(name.into());
        self
    }

    fn target_info(&self) -> TargetInfo {
        match &self.target {
            Some(triple) => TargetInfo::from_triple(triple.clone()),
            None => TargetInfo::host(),
        }
    }

    fn wrapper_file_name(&self) -> String {
        let stem = self.wrapper_name.as_deref().unwrap_or("__cxxi_wrapper");
        format!("{stem}.{}", self.language.unit_extension())
    }
}

/// Construction progress of an interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildState {
    Unbuilt,
    Parsing,
    Ready,
}

/// Interoperability interface over one header.
pub struct CxxInterface {
    id: UnitId,
    options: InterfaceOptions,
    target: TargetInfo,
    db: CxxiDatabase,
    vfs: VirtualFileSystem,
    state: BuildState,
    header: Option<PathBuf>,
    session: Option<Session>,
    unit: Option<TranslationUnit>,
    /// Suffix of the next generated function name.
    anonymous_names: u32,
}

/// Keeps the unit a session hands over.
#[derive(Default)]
struct CaptureUnit(Option<TranslationUnit>);

impl FrontendAction for CaptureUnit {
    fn handle_translation_unit(&mut self, unit: TranslationUnit) {
        self.0 = Some(unit);
    }
}

impl CxxInterface {
    pub fn new(options: InterfaceOptions) -> Self {
        let target = options.target_info();
        Self {
            id: UnitId::fresh(),
            options,
            target,
            db: CxxiDatabase::default(),
            vfs: VirtualFileSystem::new(),
            state: BuildState::Unbuilt,
            header: None,
            session: None,
            unit: None,
            anonymous_names: 0,
        }
    }

    /// Create an interface and build it for `header_path`.
    pub fn open(header_path: impl AsRef<Path>, options: InterfaceOptions) -> InterfaceResult<Self> {
        let mut interface = Self::new(options);
        interface.construct(header_path)?;
        Ok(interface)
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn language(&self) -> LanguageVariant {
        self.options.language
    }

    pub fn target(&self) -> &TargetInfo {
        &self.target
    }

    /// Canonical path of the header, once built.
    pub fn header(&self) -> Option<&Path> {
        self.header.as_deref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Warnings of the wrapper parse.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.session
            .as_ref()
            .map(Session::diagnostics)
            .unwrap_or_default()
    }

    pub fn unit(&self) -> InterfaceResult<&TranslationUnit> {
        self.ensure_ready()?;
        self.unit
            .as_ref()
            .ok_or(InterfaceError::NotReady(self.state))
    }

    /// Compile `header_path` in isolation and capture its semantic state.
    pub fn build_precompiled_header(
        &self,
        header_path: impl AsRef<Path>,
    ) -> InterfaceResult<PrecompiledHeader> {
        let path = header_path.as_ref();
        let header = self
            .db
            .input(path.to_path_buf())
            .map_err(|source| InterfaceError::SystemError {
                path: path.to_path_buf(),
                source,
            })?;
        let request =
            PrecompileRequest::new(&self.db, header, self.options.language, self.target.clone());
        precompile_header(&self.db, request).map_err(|failure| {
            let diagnostics = precompile_header::accumulated::<Diagnostic>(&self.db, request)
                .into_iter()
                .cloned()
                .collect();
            InterfaceError::PrecompileError {
                path: failure.path,
                diagnostics,
            }
        })
    }

    /// Build the translation unit for `header_path`.
    ///
    /// A failed build leaves the interface `Unbuilt`; it may be retried.
    pub fn construct(&mut self, header_path: impl AsRef<Path>) -> InterfaceResult<()> {
        if self.state != BuildState::Unbuilt {
            return Err(InterfaceError::AlreadyBuilt);
        }
        self.state = BuildState::Parsing;
        match self.build(header_path.as_ref()) {
            Ok(()) => {
                self.state = BuildState::Ready;
                Ok(())
            }
            Err(error) => {
                tracing::debug!(%error, "construction failed");
                self.state = BuildState::Unbuilt;
                self.session = None;
                self.unit = None;
                self.header = None;
                Err(error)
            }
        }
    }

    fn build(&mut self, header_path: &Path) -> InterfaceResult<()> {
        let pch = self.build_precompiled_header(header_path)?;
        let header = self
            .db
            .input(header_path.to_path_buf())
            .map_err(|source| InterfaceError::SystemError {
                path: header_path.to_path_buf(),
                source,
            })?
            .path(&self.db);
        let header_name = header.display().to_string();

        let wrapper_name = self.options.wrapper_file_name();
        let wrapper = wrapper_source(&header_name, self.options.language);
        tracing::debug!(wrapper = %wrapper_name, header = %header_name, "registering wrapper unit");
        self.vfs.add_file(wrapper_name.clone(), wrapper.into_bytes());
        self.vfs.add_file(pch_name(&header_name), pch.bytes);

        let mut session = Session::create(
            self.vfs.handle(),
            wrapper_name,
            self.options.language,
            self.target.clone(),
        );
        let mut capture = CaptureUnit::default();
        session.run(&mut capture)?;
        for warning in session.diagnostics().iter().filter(|d| !d.is_error()) {
            tracing::warn!(file = %warning.file, "{}", warning.message);
        }

        let unit = capture.0.ok_or(InterfaceError::NotReady(self.state))?;
        tracing::debug!(header = %header_name, decls = unit.decl_count(), "translation unit ready");
        self.header = Some(header);
        self.session = Some(session);
        self.unit = Some(unit);
        Ok(())
    }

    fn ensure_ready(&self) -> InterfaceResult<()> {
        match self.state {
            BuildState::Ready => Ok(()),
            state => Err(InterfaceError::NotReady(state)),
        }
    }

    /// Run `f` with semantic actions over the unit.
    pub(crate) fn with_sema<R>(&mut self, f: impl FnOnce(&mut Sema<'_>) -> R) -> InterfaceResult<R> {
        self.ensure_ready()?;
        match (self.session.as_ref(), self.unit.as_mut()) {
            (Some(session), Some(unit)) => Ok(f(&mut session.sema(unit))),
            _ => Err(InterfaceError::NotReady(self.state)),
        }
    }

    /// Where synthesized declarations and instantiations are placed.
    pub(crate) fn end_of_unit(&self) -> InterfaceResult<SourceLocation> {
        self.session
            .as_ref()
            .and_then(Session::end_of_unit_location)
            .ok_or(InterfaceError::NotReady(self.state))
    }

    /// Reject handles minted by another interface.
    pub(crate) fn check_handle(&self, handle: &TypeHandle) -> InterfaceResult<()> {
        self.ensure_ready()?;
        match handle.unit() {
            Some(unit) if unit != self.id => Err(InterfaceError::StaleHandle),
            _ => Ok(()),
        }
    }

    pub(crate) fn check_unit(&self, unit: UnitId) -> InterfaceResult<()> {
        self.ensure_ready()?;
        if unit == self.id {
            Ok(())
        } else {
            Err(InterfaceError::StaleHandle)
        }
    }

    /// A function name unique within this interface.
    pub(crate) fn next_anonymous_name(&mut self) -> String {
        let name = format!("__cxxi_anon{}", self.anonymous_names);
        self.anonymous_names += 1;
        name
    }

    /// Stem used to name the lowered module.
    pub(crate) fn module_name(&self) -> &str {
        self.options.wrapper_name.as_deref().unwrap_or("__cxxi_wrapper")
    }
}

/// Source of the synthetic unit that pulls in `header`.
fn wrapper_source(header: &str, language: LanguageVariant) -> String {
    let mut source = format!("#include \"{header}\"\n");
    if language.is_cxx() {
        let scopes: Vec<&str> = INTERNAL_NAMESPACE.split("::").collect();
        for scope in &scopes {
            source.push_str(&format!("namespace {scope} {{ "));
        }
        source.push_str(&vec!["}"; scopes.len()].join(" "));
        source.push('\n');
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapper_source() {
        assert_eq!(
            wrapper_source("/inc/a.h", LanguageVariant::Cxx),
            "#include \"/inc/a.h\"\nnamespace cxxi { namespace __ffi_internal { } }\n"
        );
        assert_eq!(
            wrapper_source("/inc/a.h", LanguageVariant::C),
            "#include \"/inc/a.h\"\n"
        );
    }

    #[test]
    fn test_wrapper_file_name_follows_language() {
        let options = InterfaceOptions::new(LanguageVariant::C).with_wrapper_name("shim");
        assert_eq!(options.wrapper_file_name(), "shim.c");
        assert_eq!(
            InterfaceOptions::default().wrapper_file_name(),
            "__cxxi_wrapper.cc"
        );
    }

    #[test]
    fn test_unbuilt_interface_is_not_ready() {
        let interface = CxxInterface::new(InterfaceOptions::default());
        assert_eq!(interface.state(), BuildState::Unbuilt);
        assert!(matches!(
            interface.unit(),
            Err(InterfaceError::NotReady(BuildState::Unbuilt))
        ));
    }

    #[test]
    fn test_missing_header_is_a_system_error() {
        let mut interface = CxxInterface::new(InterfaceOptions::default());
        let error = interface.construct("/no/such/dir/header.h").unwrap_err();
        assert!(matches!(error, InterfaceError::SystemError { .. }));
        assert_eq!(interface.state(), BuildState::Unbuilt);
    }
}
