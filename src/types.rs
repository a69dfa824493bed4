//! Type handles: this crate's view of a type in the semantic tree.
//!
//! A handle names a builtin kind or a declaration of one translation unit.
//! Declaration-carrying handles remember which unit they came from, so a
//! handle cannot silently index another interface's arena.

use std::cell::OnceCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

use cxxi_front::{BuiltinKind, DeclRef};

/// Identity of one interface's translation unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnitId(u32);

impl UnitId {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        UnitId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a handle refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Nothing matched a lookup.
    Invalid,
    Builtin(BuiltinKind),
    /// Definition of a non-template class.
    Class(DeclRef),
    Enum(DeclRef),
    /// A class template, which has no layout of its own.
    TemplateClass(DeclRef),
    /// Definition of a class template specialization.
    SpecializedTemplateClass(DeclRef),
}

impl HandleKind {
    pub fn decl(self) -> Option<DeclRef> {
        match self {
            HandleKind::Invalid | HandleKind::Builtin(_) => None,
            HandleKind::Class(d)
            | HandleKind::Enum(d)
            | HandleKind::TemplateClass(d)
            | HandleKind::SpecializedTemplateClass(d) => Some(d),
        }
    }
}

/// Width and alignment of a type, in bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeLayout {
    pub bit_width: u64,
    pub bit_alignment: u64,
}

/// A type known to an interface, with a lazily filled layout cache.
#[derive(Clone)]
pub struct TypeHandle {
    kind: HandleKind,
    unit: Option<UnitId>,
    layout: OnceCell<TypeLayout>,
}

impl TypeHandle {
    pub const fn invalid() -> Self {
        Self {
            kind: HandleKind::Invalid,
            unit: None,
            layout: OnceCell::new(),
        }
    }

    /// Builtin handles are not tied to a unit.
    pub const fn builtin(kind: BuiltinKind) -> Self {
        Self {
            kind: HandleKind::Builtin(kind),
            unit: None,
            layout: OnceCell::new(),
        }
    }

    pub(crate) fn in_unit(kind: HandleKind, unit: UnitId) -> Self {
        match kind {
            HandleKind::Invalid => Self::invalid(),
            HandleKind::Builtin(builtin) => Self::builtin(builtin),
            _ => Self {
                kind,
                unit: Some(unit),
                layout: OnceCell::new(),
            },
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn is_valid(&self) -> bool {
        self.kind != HandleKind::Invalid
    }

    /// Declaration this handle refers to; `None` for builtins and `Invalid`.
    pub fn decl(&self) -> Option<DeclRef> {
        self.kind.decl()
    }

    pub fn unit(&self) -> Option<UnitId> {
        self.unit
    }

    /// The cached layout, if it has been computed.
    pub fn cached_layout(&self) -> Option<TypeLayout> {
        self.layout.get().copied()
    }

    /// Store `layout` unless one is cached already; returns the cached one.
    pub(crate) fn cache_layout(&self, layout: TypeLayout) -> TypeLayout {
        *self.layout.get_or_init(|| layout)
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.unit == other.unit
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.unit.hash(state);
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandle")
            .field("kind", &self.kind)
            .field("layout", &self.layout.get())
            .finish()
    }
}

impl From<BuiltinKind> for TypeHandle {
    fn from(kind: BuiltinKind) -> Self {
        Self::builtin(kind)
    }
}
