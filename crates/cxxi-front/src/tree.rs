//! TranslationUnit: arena-based mutable semantic tree.
//!
//! Declarations, statements and expressions live in `PrimaryMap`s owned by
//! the unit. Everything else refers to them through `DeclRef`, `StmtRef`
//! and `ExprRef`, so references stay valid while the tree grows.

use std::collections::HashMap;
use std::fmt::Write;

use cranelift_entity::PrimaryMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::refs::{DeclRef, ExprRef, FileId, StmtRef};
use crate::types::{BuiltinKind, QualType, SourceLocation, TemplateArgument};

// ============================================================================
// Declarations
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decl {
    pub name: String,
    pub parent: Option<DeclRef>,
    pub location: SourceLocation,
    pub kind: DeclKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DeclKind {
    TranslationUnit(DeclContext),
    Namespace(DeclContext),
    Record(RecordDecl),
    ClassTemplate(ClassTemplateDecl),
    Enum(EnumDecl),
    Typedef(QualType),
    Function(FunctionDecl),
    Param(ParamDecl),
}

/// Declarations nested in a scope, in source order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeclContext {
    pub decls: Vec<DeclRef>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagKind {
    Struct,
    Class,
    Union,
}

impl TagKind {
    pub fn keyword(self) -> &'static str {
        match self {
            TagKind::Struct => "struct",
            TagKind::Class => "class",
            TagKind::Union => "union",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: QualType,
    pub location: SourceLocation,
}

/// Member function; only its name and dispatch matter for layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    pub is_virtual: bool,
    pub is_static: bool,
}

/// Constant operand of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrArg {
    Fixed(u64),
    /// Non-type template parameter, by position.
    Param(u32),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attr {
    /// `alignas(N)`, in bytes.
    Aligned(AttrArg),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecializationKind {
    /// Known to exist; nothing propagated from the template yet.
    Undeclared,
    /// Attributes substituted, no definition yet.
    Declared,
    ImplicitInstantiation,
    ExplicitInstantiationDefinition,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpecializationInfo {
    pub template: DeclRef,
    pub args: Vec<TemplateArgument>,
    pub kind: SpecializationKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordDecl {
    pub tag: TagKind,
    pub bases: Vec<QualType>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    /// Nested declarations (member classes, enums, aliases).
    pub decls: Vec<DeclRef>,
    pub attrs: Vec<Attr>,
    /// Has a virtual table pointer.
    pub is_dynamic: bool,
    /// The declaration carrying the body, once one exists.
    pub definition: Option<DeclRef>,
    pub specialization: Option<SpecializationInfo>,
}

impl RecordDecl {
    pub fn new(tag: TagKind) -> Self {
        Self {
            tag,
            bases: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            decls: Vec::new(),
            attrs: Vec::new(),
            is_dynamic: false,
            definition: None,
            specialization: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateParamKind {
    Type,
    NonType(BuiltinKind),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: String,
    pub kind: TemplateParamKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassTemplateDecl {
    pub params: Vec<TemplateParam>,
    /// The templated record whose members mention the parameters.
    pub pattern: DeclRef,
    /// Specializations keyed by their checked argument list.
    pub specializations: HashMap<Vec<TemplateArgument>, DeclRef>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Enumerator {
    pub name: String,
    pub value: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnumDecl {
    pub scoped: bool,
    pub underlying: BuiltinKind,
    pub fixed_underlying: bool,
    pub enumerators: Vec<Enumerator>,
    pub is_complete: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub ret: QualType,
    pub param_types: Vec<QualType>,
    pub params: SmallVec<[DeclRef; 4]>,
    pub body: Option<StmtRef>,
    /// Created after parsing rather than read from a header.
    pub is_synthesized: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamDecl {
    pub ty: QualType,
    pub function: DeclRef,
}

// ============================================================================
// Statements and expressions
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Return {
        value: Option<ExprRef>,
        location: SourceLocation,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    IntegerLiteral { value: u64, ty: QualType },
    FloatingLiteral { value: f64, ty: QualType },
    ParamRef { param: DeclRef, ty: QualType },
}

impl Expr {
    pub fn ty(&self) -> &QualType {
        match self {
            Expr::IntegerLiteral { ty, .. }
            | Expr::FloatingLiteral { ty, .. }
            | Expr::ParamRef { ty, .. } => ty,
        }
    }
}

// ============================================================================
// TranslationUnit
// ============================================================================

/// Arena-based mutable semantic tree.
///
/// Owns every declaration, statement and expression of one unit. The root
/// declaration is always `DeclKind::TranslationUnit`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranslationUnit {
    files: PrimaryMap<FileId, String>,
    decls: PrimaryMap<DeclRef, Decl>,
    stmts: PrimaryMap<StmtRef, Stmt>,
    exprs: PrimaryMap<ExprRef, Expr>,
    root: DeclRef,
}

impl TranslationUnit {
    /// Create an empty unit whose main file is `main_file`.
    pub fn new(main_file: &str) -> Self {
        let mut files = PrimaryMap::new();
        let file = files.push(main_file.to_owned());
        let mut decls = PrimaryMap::new();
        let root = decls.push(Decl {
            name: String::new(),
            parent: None,
            location: SourceLocation::new(file, 0),
            kind: DeclKind::TranslationUnit(DeclContext::default()),
        });
        Self {
            files,
            decls,
            stmts: PrimaryMap::new(),
            exprs: PrimaryMap::new(),
            root,
        }
    }

    pub fn root(&self) -> DeclRef {
        self.root
    }

    /// True when nothing but the root has been declared.
    pub fn is_pristine(&self) -> bool {
        self.decls.len() == 1
    }

    pub fn add_file(&mut self, name: &str) -> FileId {
        if let Some((id, _)) = self.files.iter().find(|(_, f)| f.as_str() == name) {
            return id;
        }
        self.files.push(name.to_owned())
    }

    pub fn file_name(&self, file: FileId) -> &str {
        &self.files[file]
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    /// Whether `decl` indexes into this unit's arena.
    pub fn contains(&self, decl: DeclRef) -> bool {
        self.decls.is_valid(decl)
    }

    pub fn decl(&self, decl: DeclRef) -> &Decl {
        &self.decls[decl]
    }

    pub fn decl_mut(&mut self, decl: DeclRef) -> &mut Decl {
        &mut self.decls[decl]
    }

    /// Push a declaration without attaching it to any scope.
    pub fn push_decl(&mut self, decl: Decl) -> DeclRef {
        self.decls.push(decl)
    }

    /// Push a declaration and append it to `parent`'s member list.
    pub fn add_decl(&mut self, parent: DeclRef, mut decl: Decl) -> DeclRef {
        decl.parent = Some(parent);
        let id = self.decls.push(decl);
        if let Some(members) = self.members_mut(parent) {
            members.push(id);
        }
        id
    }

    /// Declarations nested directly in a scope.
    pub fn members(&self, scope: DeclRef) -> &[DeclRef] {
        match &self.decls[scope].kind {
            DeclKind::TranslationUnit(ctx) | DeclKind::Namespace(ctx) => &ctx.decls,
            DeclKind::Record(record) => &record.decls,
            _ => &[],
        }
    }

    fn members_mut(&mut self, scope: DeclRef) -> Option<&mut Vec<DeclRef>> {
        match &mut self.decls[scope].kind {
            DeclKind::TranslationUnit(ctx) | DeclKind::Namespace(ctx) => Some(&mut ctx.decls),
            DeclKind::Record(record) => Some(&mut record.decls),
            _ => None,
        }
    }

    pub fn record(&self, decl: DeclRef) -> Option<&RecordDecl> {
        match &self.decls[decl].kind {
            DeclKind::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn record_mut(&mut self, decl: DeclRef) -> Option<&mut RecordDecl> {
        match &mut self.decls[decl].kind {
            DeclKind::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn class_template(&self, decl: DeclRef) -> Option<&ClassTemplateDecl> {
        match &self.decls[decl].kind {
            DeclKind::ClassTemplate(template) => Some(template),
            _ => None,
        }
    }

    pub fn class_template_mut(&mut self, decl: DeclRef) -> Option<&mut ClassTemplateDecl> {
        match &mut self.decls[decl].kind {
            DeclKind::ClassTemplate(template) => Some(template),
            _ => None,
        }
    }

    pub fn enum_decl(&self, decl: DeclRef) -> Option<&EnumDecl> {
        match &self.decls[decl].kind {
            DeclKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn function(&self, decl: DeclRef) -> Option<&FunctionDecl> {
        match &self.decls[decl].kind {
            DeclKind::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn function_mut(&mut self, decl: DeclRef) -> Option<&mut FunctionDecl> {
        match &mut self.decls[decl].kind {
            DeclKind::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn param(&self, decl: DeclRef) -> Option<&ParamDecl> {
        match &self.decls[decl].kind {
            DeclKind::Param(param) => Some(param),
            _ => None,
        }
    }

    pub fn push_stmt(&mut self, stmt: Stmt) -> StmtRef {
        self.stmts.push(stmt)
    }

    pub fn stmt(&self, stmt: StmtRef) -> &Stmt {
        &self.stmts[stmt]
    }

    pub fn push_expr(&mut self, expr: Expr) -> ExprRef {
        self.exprs.push(expr)
    }

    pub fn expr(&self, expr: ExprRef) -> &Expr {
        &self.exprs[expr]
    }

    /// `a::b::C` style name, without the leading `::`.
    pub fn qualified_name(&self, decl: DeclRef) -> String {
        let mut parts = Vec::new();
        let mut current = Some(decl);
        while let Some(d) = current {
            let data = &self.decls[d];
            if matches!(data.kind, DeclKind::TranslationUnit(_)) {
                break;
            }
            parts.push(data.name.as_str());
            current = data.parent;
        }
        parts.reverse();
        parts.join("::")
    }

    /// All function declarations reachable from the root, in scope order.
    pub fn functions(&self) -> Vec<DeclRef> {
        let mut out = Vec::new();
        self.collect_functions(self.root, &mut out);
        out
    }

    fn collect_functions(&self, scope: DeclRef, out: &mut Vec<DeclRef>) {
        for &member in self.members(scope) {
            match &self.decls[member].kind {
                DeclKind::Function(_) => out.push(member),
                DeclKind::Namespace(_) => self.collect_functions(member, out),
                _ => {}
            }
        }
    }

    /// Human-readable outline of the scope tree, one declaration per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_scope(self.root, 0, &mut out);
        out
    }

    fn dump_scope(&self, scope: DeclRef, depth: usize, out: &mut String) {
        for &member in self.members(scope) {
            let decl = &self.decls[member];
            let indent = "  ".repeat(depth);
            let _ = match &decl.kind {
                DeclKind::Namespace(_) => writeln!(out, "{indent}namespace {}", decl.name),
                DeclKind::Record(record) => writeln!(
                    out,
                    "{indent}{} {}{}",
                    record.tag.keyword(),
                    decl.name,
                    if record.definition.is_some() { "" } else { " (incomplete)" }
                ),
                DeclKind::ClassTemplate(template) => writeln!(
                    out,
                    "{indent}template {} ({} specializations)",
                    decl.name,
                    template.specializations.len()
                ),
                DeclKind::Enum(e) => writeln!(
                    out,
                    "{indent}enum {} : {} ({} enumerators)",
                    decl.name,
                    e.underlying,
                    e.enumerators.len()
                ),
                DeclKind::Typedef(_) => writeln!(out, "{indent}typedef {}", decl.name),
                DeclKind::Function(f) => writeln!(
                    out,
                    "{indent}function {}/{}{}",
                    decl.name,
                    f.param_types.len(),
                    if f.body.is_some() { " (defined)" } else { "" }
                ),
                DeclKind::TranslationUnit(_) | DeclKind::Param(_) => Ok(()),
            };
            self.dump_scope(member, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespace(unit: &TranslationUnit, name: &str) -> Decl {
        Decl {
            name: name.to_owned(),
            parent: None,
            location: unit.decl(unit.root()).location,
            kind: DeclKind::Namespace(DeclContext::default()),
        }
    }

    #[test]
    fn test_new_unit_is_pristine() {
        let unit = TranslationUnit::new("unit.cc");
        assert!(unit.is_pristine());
        assert_eq!(unit.file_name(unit.decl(unit.root()).location.file), "unit.cc");
    }

    #[test]
    fn test_add_decl_links_parent_and_members() {
        let mut unit = TranslationUnit::new("unit.cc");
        let root = unit.root();
        let outer = unit.add_decl(root, namespace(&unit, "outer"));
        let inner = unit.add_decl(outer, namespace(&unit, "inner"));

        assert_eq!(unit.members(root), &[outer]);
        assert_eq!(unit.members(outer), &[inner]);
        assert_eq!(unit.qualified_name(inner), "outer::inner");
        assert!(!unit.is_pristine());
    }

    #[test]
    fn test_add_file_deduplicates() {
        let mut unit = TranslationUnit::new("unit.cc");
        let a = unit.add_file("a.h");
        let b = unit.add_file("a.h");
        assert_eq!(a, b);
    }

    #[test]
    fn test_contains_rejects_out_of_range_refs() {
        let unit = TranslationUnit::new("unit.cc");
        assert!(unit.contains(unit.root()));
        assert!(!unit.contains(DeclRef::from_u32(7)));
    }
}
