//! Entity references into the translation unit arena.
//!
//! Each ref type is a thin `u32` wrapper providing type-safe indexing
//! into `PrimaryMap` storage in `TranslationUnit`.

use cranelift_entity::entity_impl;
use serde::{Deserialize, Serialize};

/// Reference to a declaration in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclRef(u32);
entity_impl!(DeclRef, "decl");

/// Reference to a statement in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StmtRef(u32);
entity_impl!(StmtRef, "stmt");

/// Reference to an expression in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprRef(u32);
entity_impl!(ExprRef, "expr");

/// Reference to a source file known to the unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(u32);
entity_impl!(FileId, "file");
