//! Recursive-descent parser for the declaration subset of C and C++.
//!
//! The parser reads tokens and calls `Sema` to build declarations in the
//! unit as it goes. Only what matters for names and layout is modeled:
//! method declarations and inline bodies are skipped, and so are variables.
//! The first error stops parsing; warnings are collected alongside.

use std::collections::HashMap;

use cxxi_core::{CompilationPhase, Diagnostic, Span};
use smallvec::SmallVec;

use crate::errors::SemaError;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::refs::{DeclRef, FileId};
use crate::sema::Sema;
use crate::tree::{
    Attr, AttrArg, ClassTemplateDecl, Decl, DeclKind, EnumDecl, Enumerator, FieldDecl,
    FunctionDecl, MethodDecl, RecordDecl, SpecializationKind, TagKind, TemplateParam,
    TemplateParamKind,
};
use crate::types::{ArrayBound, BuiltinKind, QualType, SourceLocation, TemplateArgument};

/// What became of an `#include "..."` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Included {
    /// Parse this text in place of the directive.
    Source { name: String, text: String },
    /// The unit was replaced by precompiled state for the header.
    Adopted,
    /// Already included once.
    Skipped,
}

/// Resolves quoted includes for the parser.
pub trait IncludeHandler {
    /// Resolve `path`, included from the file named `from`.
    fn include(&mut self, sema: &mut Sema<'_>, path: &str, from: &str) -> Result<Included, String>;
}

type PResult<T> = Result<T, Diagnostic>;

/// Parse `text` into the root scope of the unit behind `sema`.
///
/// Warnings are appended to `diagnostics`; the error that stopped parsing
/// is returned.
pub fn parse_unit<H: IncludeHandler + ?Sized>(
    sema: &mut Sema<'_>,
    includes: &mut H,
    file_name: &str,
    text: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), Diagnostic> {
    let tokens = tokenize(text).map_err(|e| {
        Diagnostic::error(
            CompilationPhase::Parsing,
            file_name,
            Span::new(e.offset, e.offset),
            e.message,
        )
    })?;
    let file = sema.unit_mut().add_file(file_name);
    let root = sema.unit().root();
    let mut parser = Parser {
        sema,
        includes,
        diagnostics,
        file_name: file_name.to_owned(),
        file,
        tokens,
        pos: 0,
        scopes: vec![root],
        template_params: None,
        current_template: None,
    };
    parser.parse_all()
}

/// Fields and methods collected while reading a class body.
#[derive(Default)]
struct MemberList {
    fields: Vec<FieldDecl>,
    methods: Vec<MethodDecl>,
}

struct Parser<'p, 's, H: IncludeHandler + ?Sized> {
    sema: &'p mut Sema<'s>,
    includes: &'p mut H,
    diagnostics: &'p mut Vec<Diagnostic>,
    file_name: String,
    file: FileId,
    tokens: Vec<Token>,
    pos: usize,
    /// Innermost scope last.
    scopes: Vec<DeclRef>,
    /// Parameters of the class template whose pattern is being read.
    template_params: Option<Vec<TemplateParam>>,
    current_template: Option<DeclRef>,
}

const TAG_KEYWORDS: &[&str] = &["struct", "class", "union", "enum"];

const BUILTIN_WORDS: &[&str] = &[
    "void", "bool", "_Bool", "char", "short", "int", "long", "float", "double", "signed",
    "unsigned",
];

const SPECIFIERS: &[&str] = &[
    "const",
    "volatile",
    "static",
    "inline",
    "constexpr",
    "mutable",
    "register",
    "typename",
    "__inline",
    "__restrict",
];

impl<H: IncludeHandler + ?Sized> Parser<'_, '_, H> {
    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(punct))
    }

    fn at_ident(&self, name: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(name))
    }

    fn at_any_ident(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.at_ident(name))
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        let found = self.at_punct(punct);
        if found {
            self.pos += 1;
        }
        found
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        let found = self.at_ident(name);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_punct(&mut self, punct: &str) -> PResult<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{punct}'")))
        }
    }

    fn expect_name(&mut self, what: &str) -> PResult<String> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error_here(format!("expected {what}"))),
        }
    }

    fn current_span(&self) -> Span {
        match self.peek() {
            Some(token) => token.span,
            None => {
                let end = self.tokens.last().map_or(0, |t| t.span.end);
                Span::new(end, end)
            }
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.file, self.current_span().start)
    }

    fn error_here(&self, message: impl Into<String>) -> Diagnostic {
        let found = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Ident(s)) => format!("'{s}'"),
            Some(TokenKind::Punct(p)) => format!("'{p}'"),
            Some(TokenKind::Int(v)) => format!("'{v}'"),
            Some(_) => "directive".to_owned(),
            None => "end of file".to_owned(),
        };
        Diagnostic::error(
            CompilationPhase::Parsing,
            self.file_name.clone(),
            self.current_span(),
            format!("{}, found {found}", message.into()),
        )
    }

    fn sema_error(&self, error: SemaError) -> Diagnostic {
        let phase = match error {
            SemaError::RecursiveInstantiation { .. }
            | SemaError::InstantiationDepth { .. }
            | SemaError::UndefinedTemplate { .. } => CompilationPhase::Instantiation,
            _ => CompilationPhase::Semantic,
        };
        let span = match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(previous) => previous.span,
            None => self.current_span(),
        };
        Diagnostic::error(phase, self.file_name.clone(), span, error.to_string())
    }

    fn warn(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning(
            CompilationPhase::Parsing,
            self.file_name.clone(),
            span,
            message,
        ));
    }

    fn scope(&self) -> DeclRef {
        self.scopes
            .last()
            .copied()
            .unwrap_or_else(|| self.sema.unit().root())
    }

    fn is_cxx(&self) -> bool {
        self.sema.language().is_cxx()
    }

    /// Skip a `(...)`, `{...}` or `[...]` group starting at the current token.
    fn skip_balanced(&mut self) -> PResult<()> {
        let mut depth = 0usize;
        loop {
            let Some(token) = self.bump() else {
                return Err(self.error_here("unbalanced brackets"));
            };
            match token.kind {
                TokenKind::Punct("(" | "{" | "[") => depth += 1,
                TokenKind::Punct(")" | "}" | "]") => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ if depth == 0 => return Err(self.error_here("expected a bracketed group")),
                _ => {}
            }
        }
    }

    /// Skip to the end of the current statement, including the `;`.
    fn skip_statement(&mut self) -> PResult<()> {
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Punct(";") => {
                    self.pos += 1;
                    return Ok(());
                }
                TokenKind::Punct("(" | "{" | "[") => self.skip_balanced()?,
                _ => self.pos += 1,
            }
        }
        Err(self.error_here("expected ';'"))
    }

    /// Skip an initializer up to the `,`, `;` or `)` that ends it.
    fn skip_initializer(&mut self) -> PResult<()> {
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Punct("," | ";" | ")") => return Ok(()),
                TokenKind::Punct("(" | "{" | "[") => self.skip_balanced()?,
                _ => self.pos += 1,
            }
        }
        Err(self.error_here("unterminated initializer"))
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn parse_all(&mut self) -> PResult<()> {
        while self.peek().is_some() {
            self.parse_declaration()?;
        }
        Ok(())
    }

    fn parse_declaration(&mut self) -> PResult<()> {
        let Some(token) = self.peek().cloned() else {
            return Ok(());
        };
        match &token.kind {
            TokenKind::Include { path, system } => {
                self.pos += 1;
                self.handle_include(path, *system, token.span)
            }
            TokenKind::Directive(_) | TokenKind::Punct(";") => {
                self.pos += 1;
                Ok(())
            }
            TokenKind::Ident(word) => match word.as_str() {
                "namespace" if self.is_cxx() => self.parse_namespace(),
                "template" if self.is_cxx() => self.parse_template_declaration(),
                "using" if self.is_cxx() => self.parse_using(),
                "extern" if matches!(self.peek_at(1).map(|t| &t.kind), Some(TokenKind::Str(_))) => {
                    self.parse_linkage_spec()
                }
                "typedef" => self.parse_typedef(),
                "static_assert" | "_Static_assert" => self.skip_statement(),
                _ if self.at_tag_declaration() => self.parse_tag_statement(),
                _ => self.parse_function_or_variable(),
            },
            _ => Err(self.error_here("expected a declaration")),
        }
    }

    fn handle_include(&mut self, path: &str, system: bool, span: Span) -> PResult<()> {
        if system {
            self.warn(span, format!("system header <{path}> is not supported; skipped"));
            return Ok(());
        }
        let included = self
            .includes
            .include(self.sema, path, &self.file_name)
            .map_err(|message| {
                Diagnostic::error(
                    CompilationPhase::Preprocessing,
                    self.file_name.clone(),
                    span,
                    message,
                )
            })?;
        match included {
            Included::Skipped => Ok(()),
            Included::Adopted => {
                self.file = self.sema.unit_mut().add_file(&self.file_name);
                self.scopes = vec![self.sema.unit().root()];
                Ok(())
            }
            Included::Source { name, text } => {
                let tokens = tokenize(&text).map_err(|e| {
                    Diagnostic::error(
                        CompilationPhase::Parsing,
                        name.clone(),
                        Span::new(e.offset, e.offset),
                        e.message,
                    )
                })?;
                let file = self.sema.unit_mut().add_file(&name);
                let mut nested = Parser {
                    sema: &mut *self.sema,
                    includes: &mut *self.includes,
                    diagnostics: &mut *self.diagnostics,
                    file_name: name,
                    file,
                    tokens,
                    pos: 0,
                    scopes: self.scopes.clone(),
                    template_params: None,
                    current_template: None,
                };
                nested.parse_all()
            }
        }
    }

    fn parse_namespace(&mut self) -> PResult<()> {
        self.bump();
        let mut names = Vec::new();
        if !self.at_punct("{") {
            names.push(self.expect_name("namespace name")?);
            while self.eat_punct("::") {
                names.push(self.expect_name("namespace name")?);
            }
        } else {
            names.push(String::new());
        }
        if self.at_punct("=") {
            self.warn(self.current_span(), "namespace aliases are ignored");
            return self.skip_statement();
        }
        self.expect_punct("{")?;

        for name in &names {
            let location = self.location();
            let scope = self.scope();
            let existing = self
                .sema
                .lookup_in(scope, name)
                .into_iter()
                .find(|&d| matches!(self.sema.unit().decl(d).kind, DeclKind::Namespace(_)));
            let namespace = match existing {
                Some(namespace) => namespace,
                None => self.sema.unit_mut().add_decl(
                    scope,
                    Decl {
                        name: name.clone(),
                        parent: None,
                        location,
                        kind: DeclKind::Namespace(Default::default()),
                    },
                ),
            };
            self.scopes.push(namespace);
        }

        while !self.at_punct("}") {
            if self.peek().is_none() {
                return Err(self.error_here("expected '}' to close namespace"));
            }
            self.parse_declaration()?;
        }
        self.bump();
        for _ in &names {
            self.scopes.pop();
        }
        Ok(())
    }

    fn parse_linkage_spec(&mut self) -> PResult<()> {
        self.bump();
        self.bump();
        if !self.eat_punct("{") {
            return self.parse_declaration();
        }
        while !self.eat_punct("}") {
            if self.peek().is_none() {
                return Err(self.error_here("expected '}' to close linkage specification"));
            }
            self.parse_declaration()?;
        }
        Ok(())
    }

    fn parse_using(&mut self) -> PResult<()> {
        let span = self.current_span();
        self.bump();
        if self.at_ident("namespace") {
            self.warn(span, "using-directives are ignored");
            return self.skip_statement();
        }
        let is_alias =
            matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Ident(_)))
                && self.peek_at(1).is_some_and(|t| t.is_punct("="));
        if !is_alias {
            self.warn(span, "using-declarations are ignored");
            return self.skip_statement();
        }

        let location = self.location();
        let name = self.expect_name("alias name")?;
        self.expect_punct("=")?;
        let ty = self.parse_type()?;
        self.expect_punct(";")?;
        self.add_typedef(name, ty, location);
        Ok(())
    }

    fn parse_typedef(&mut self) -> PResult<()> {
        self.bump();
        let base = if self.at_tag_declaration() {
            let decl = self.parse_tag(true)?;
            self.type_of_tag(decl)
        } else {
            self.parse_decl_specifier()?
        };

        loop {
            let location = self.location();
            let (name, ty) = self.parse_declarator(base.clone())?;
            let Some(name) = name else {
                return Err(self.error_here("expected typedef name"));
            };
            // `typedef struct { ... } Name;` names the anonymous record.
            let anonymous = match &ty {
                QualType::Record(d) | QualType::Enum(d) if self.sema.unit().decl(*d).name.is_empty() => {
                    Some(*d)
                }
                _ => None,
            };
            if let Some(decl) = anonymous {
                self.sema.unit_mut().decl_mut(decl).name = name.clone();
            }
            self.add_typedef(name, ty, location);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(";")
    }

    fn add_typedef(&mut self, name: String, ty: QualType, location: SourceLocation) {
        let scope = self.scope();
        self.sema.unit_mut().add_decl(
            scope,
            Decl {
                name,
                parent: None,
                location,
                kind: DeclKind::Typedef(ty),
            },
        );
    }

    fn parse_function_or_variable(&mut self) -> PResult<()> {
        let location = self.location();
        self.eat_ident("extern");
        let base = self.parse_decl_specifier()?;
        if self.at_ident("operator") {
            self.skip_method()?;
            return Ok(());
        }
        let (name, ty) = self.parse_declarator(base)?;
        let Some(name) = name else {
            return Err(self.error_here("expected declarator name"));
        };
        if !self.at_punct("(") {
            return self.skip_statement();
        }

        let param_types = self.parse_parameter_list()?;
        while !self.at_punct(";") && !self.at_punct("{") {
            if self.peek().is_none() {
                return Err(self.error_here("expected ';' after function declaration"));
            }
            if self.at_punct("(") {
                self.skip_balanced()?;
            } else {
                self.pos += 1;
            }
        }
        if self.at_punct("{") {
            self.skip_balanced()?;
        } else {
            self.bump();
        }

        let scope = self.scope();
        self.sema.unit_mut().add_decl(
            scope,
            Decl {
                name,
                parent: None,
                location,
                kind: DeclKind::Function(FunctionDecl {
                    ret: ty,
                    param_types,
                    params: SmallVec::new(),
                    body: None,
                    is_synthesized: false,
                }),
            },
        );
        Ok(())
    }

    fn parse_parameter_list(&mut self) -> PResult<Vec<QualType>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if self.eat_punct(")") {
            return Ok(params);
        }
        if self.at_ident("void") && self.peek_at(1).is_some_and(|t| t.is_punct(")")) {
            self.pos += 2;
            return Ok(params);
        }
        loop {
            if self.eat_punct("...") {
                self.warn(self.current_span(), "variadic parameters are ignored");
                self.expect_punct(")")?;
                return Ok(params);
            }
            let base = self.parse_decl_specifier()?;
            let (_, ty) = self.parse_declarator(base)?;
            if self.eat_punct("=") {
                self.skip_initializer()?;
            }
            params.push(match ty {
                QualType::Array(element, _) => QualType::Pointer(element),
                function @ QualType::Function { .. } => function.pointer_to(),
                other => other,
            });
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                return Ok(params);
            }
        }
    }

    // ========================================================================
    // Types
    // ========================================================================

    /// Type-id: specifiers followed by an abstract declarator.
    fn parse_type(&mut self) -> PResult<QualType> {
        let base = self.parse_decl_specifier()?;
        let (name, ty) = self.parse_declarator(base)?;
        if let Some(name) = name {
            return Err(self.error_here(format!("unexpected name '{name}' in type")));
        }
        Ok(ty)
    }

    fn skip_specifiers(&mut self) {
        while self.at_any_ident(SPECIFIERS) {
            self.pos += 1;
        }
    }

    fn parse_decl_specifier(&mut self) -> PResult<QualType> {
        self.skip_specifiers();
        let ty = if self.at_any_ident(BUILTIN_WORDS) {
            self.parse_builtin()?
        } else if self.at_any_ident(TAG_KEYWORDS) && (self.is_cxx() || !self.at_ident("class")) {
            self.parse_elaborated_type()?
        } else if self.at_ident("alignas") {
            return Err(self.error_here("alignas on members is not supported"));
        } else {
            self.parse_type_name()?
        };
        self.skip_specifiers();
        Ok(ty)
    }

    fn parse_builtin(&mut self) -> PResult<QualType> {
        let mut signedness: Option<bool> = None;
        let mut shorts = 0;
        let mut longs = 0;
        let mut base: Option<String> = None;
        while let Some(TokenKind::Ident(word)) = self.peek().map(|t| t.kind.clone()) {
            match word.as_str() {
                "signed" => signedness = Some(true),
                "unsigned" => signedness = Some(false),
                "short" => shorts += 1,
                "long" => longs += 1,
                "const" | "volatile" => {}
                "void" | "bool" | "_Bool" | "char" | "int" | "float" | "double" => {
                    if base.is_some() {
                        return Err(self.error_here("two or more data types in declaration"));
                    }
                    base = Some(word);
                }
                _ => break,
            }
            self.pos += 1;
        }

        let unsigned = signedness == Some(false);
        let kind = match base.as_deref() {
            Some("void") => return Ok(QualType::Void),
            Some("bool" | "_Bool") => BuiltinKind::Bool,
            Some("char") => match signedness {
                Some(true) => BuiltinKind::SChar,
                Some(false) => BuiltinKind::UChar,
                None => BuiltinKind::Char,
            },
            Some("float") => BuiltinKind::Float,
            Some("double") if longs > 0 => {
                return Err(self.error_here("long double is not supported"));
            }
            Some("double") => BuiltinKind::Double,
            _ if shorts > 0 => {
                if unsigned {
                    BuiltinKind::UShort
                } else {
                    BuiltinKind::Short
                }
            }
            _ if longs >= 2 => {
                if unsigned {
                    BuiltinKind::ULongLong
                } else {
                    BuiltinKind::LongLong
                }
            }
            _ if longs == 1 => {
                if unsigned {
                    BuiltinKind::ULong
                } else {
                    BuiltinKind::Long
                }
            }
            _ if unsigned => BuiltinKind::UInt,
            _ => BuiltinKind::Int,
        };
        Ok(QualType::Builtin(kind))
    }

    /// `struct X`, `enum E`: looks only at tags. An unknown record name
    /// declares the record in the current scope.
    fn parse_elaborated_type(&mut self) -> PResult<QualType> {
        let Some(TokenKind::Ident(keyword)) = self.bump().map(|t| t.kind) else {
            return Err(self.error_here("expected a tag keyword"));
        };
        if keyword == "enum" {
            self.eat_ident("class");
            self.eat_ident("struct");
        }
        let location = self.location();
        let name = self.expect_name("tag name")?;
        let found = self.lookup_visible(&name, |kind| match kind {
            DeclKind::Enum(_) => keyword == "enum",
            DeclKind::Record(_) | DeclKind::ClassTemplate(_) => keyword != "enum",
            _ => false,
        });
        match found {
            Some(decl) => self.type_for_decl(decl, &name),
            None if keyword == "enum" => Err(self.sema_error(SemaError::UndeclaredName { name })),
            None => {
                let tag = tag_kind(&keyword);
                let scope = self.scope();
                let decl = self.sema.unit_mut().add_decl(
                    scope,
                    Decl {
                        name,
                        parent: None,
                        location,
                        kind: DeclKind::Record(RecordDecl::new(tag)),
                    },
                );
                Ok(QualType::Record(decl))
            }
        }
    }

    /// Innermost visible declaration of `name` accepted by `filter`.
    fn lookup_visible(&self, name: &str, filter: impl Fn(&DeclKind) -> bool) -> Option<DeclRef> {
        let mut current = Some(self.scope());
        while let Some(scope) = current {
            let found = self
                .sema
                .lookup_in(scope, name)
                .into_iter()
                .find(|&d| filter(&self.sema.unit().decl(d).kind));
            if found.is_some() {
                return found;
            }
            current = self.sema.unit().decl(scope).parent;
        }
        None
    }

    fn parse_type_name(&mut self) -> PResult<QualType> {
        let global = self.eat_punct("::");
        let name = self.expect_name("type name")?;

        if !global {
            if let Some(index) = self.template_param_index(&name, TemplateParamKind::Type) {
                return Ok(QualType::TemplateParam(index));
            }
        }

        let cxx = self.is_cxx();
        let found = if global {
            let root = self.sema.unit().root();
            self.sema.lookup_in(root, &name).first().copied()
        } else {
            self.lookup_visible(&name, |kind| {
                cxx || matches!(kind, DeclKind::Typedef(_))
            })
        };
        let Some(mut decl) = found else {
            if let Some(ty) = self.predefined_type(&name) {
                return Ok(ty);
            }
            return Err(self.sema_error(SemaError::UndeclaredName { name }));
        };

        let mut last = name;
        while self.at_punct("::") {
            let scope = match &self.sema.unit().decl(decl).kind {
                DeclKind::Namespace(_) => decl,
                DeclKind::Record(record) => record.definition.unwrap_or(decl),
                _ => return Err(self.error_here(format!("'{last}' is not a namespace or class"))),
            };
            self.bump();
            let segment = self.expect_name("name after '::'")?;
            decl = match self.sema.lookup_in(scope, &segment).first() {
                Some(&member) => member,
                None => {
                    return Err(self.sema_error(SemaError::UndeclaredName {
                        name: format!("{}::{segment}", self.sema.unit().qualified_name(scope)),
                    }));
                }
            };
            last = segment;
        }
        self.type_for_decl(decl, &last)
    }

    fn type_for_decl(&mut self, decl: DeclRef, name: &str) -> PResult<QualType> {
        let ty = match &self.sema.unit().decl(decl).kind {
            DeclKind::Record(_) => QualType::Record(decl),
            DeclKind::Enum(_) => QualType::Enum(decl),
            DeclKind::Typedef(ty) => ty.clone(),
            DeclKind::ClassTemplate(_) => return self.template_type(decl, name),
            _ => {
                return Err(self.sema_error(SemaError::NotAType {
                    name: name.to_owned(),
                }));
            }
        };
        Ok(ty)
    }

    fn template_type(&mut self, template: DeclRef, name: &str) -> PResult<QualType> {
        if self.at_punct("<") {
            let args = self.parse_template_args()?;
            self.template_id(template, args)
        } else if self.current_template == Some(template) {
            Ok(self.injected_class_type(template))
        } else {
            Err(self.error_here(format!(
                "use of class template '{name}' requires template arguments"
            )))
        }
    }

    /// The pattern's own name used inside it: `Box` means `Box<T>`.
    fn injected_class_type(&self, template: DeclRef) -> QualType {
        let args = self
            .template_params
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, param)| match param.kind {
                TemplateParamKind::Type => TemplateArgument::Type(QualType::TemplateParam(i as u32)),
                TemplateParamKind::NonType(_) => TemplateArgument::Param(i as u32),
            })
            .collect();
        QualType::TemplateSpecialization { template, args }
    }

    fn template_id(&mut self, template: DeclRef, args: Vec<TemplateArgument>) -> PResult<QualType> {
        let checked = self
            .sema
            .check_template_arguments(template, &args)
            .map_err(|e| self.sema_error(e))?;
        if checked.iter().any(TemplateArgument::is_dependent) {
            return Ok(QualType::TemplateSpecialization {
                template,
                args: checked,
            });
        }
        let spec = self
            .sema
            .require_specialization(template, checked)
            .map_err(|e| self.sema_error(e))?;
        Ok(QualType::Record(spec))
    }

    fn parse_template_args(&mut self) -> PResult<Vec<TemplateArgument>> {
        self.expect_punct("<")?;
        let mut args = Vec::new();
        if self.eat_punct(">") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_template_arg()?);
            if !self.eat_punct(",") {
                self.expect_punct(">")?;
                return Ok(args);
            }
        }
    }

    fn parse_template_arg(&mut self) -> PResult<TemplateArgument> {
        let negative = self.at_punct("-");
        let literal = self.peek_at(usize::from(negative)).and_then(|t| match t.kind {
            TokenKind::Int(v) => Some(v),
            _ => None,
        });
        if let Some(value) = literal {
            self.pos += 1 + usize::from(negative);
            let width = if value > i32::MAX as u64 { 64 } else { 32 };
            let value = if negative { value.wrapping_neg() } else { value };
            return Ok(TemplateArgument::integral(value, width, true));
        }
        if self.eat_ident("true") {
            return Ok(TemplateArgument::integral(1, 8, false));
        }
        if self.eat_ident("false") {
            return Ok(TemplateArgument::integral(0, 8, false));
        }
        if let Some(TokenKind::Ident(name)) = self.peek().map(|t| &t.kind) {
            if let Some(index) = self.non_type_param_index(name) {
                self.pos += 1;
                return Ok(TemplateArgument::Param(index));
            }
        }
        Ok(TemplateArgument::Type(self.parse_type()?))
    }

    fn template_param_index(&self, name: &str, kind: TemplateParamKind) -> Option<u32> {
        let params = self.template_params.as_ref()?;
        params
            .iter()
            .position(|p| {
                p.name == name
                    && std::mem::discriminant(&p.kind) == std::mem::discriminant(&kind)
            })
            .map(|i| i as u32)
    }

    fn non_type_param_index(&self, name: &str) -> Option<u32> {
        self.template_param_index(name, TemplateParamKind::NonType(BuiltinKind::Int))
    }

    /// Fixed-width and size aliases normally provided by system headers.
    fn predefined_type(&self, name: &str) -> Option<QualType> {
        let target = self.sema.target();
        let long_is_64 = target.long_size == 8;
        let pointer_is_64 = target.pointer_size == 8;
        let (signed_64, unsigned_64) = if long_is_64 {
            (BuiltinKind::Long, BuiltinKind::ULong)
        } else {
            (BuiltinKind::LongLong, BuiltinKind::ULongLong)
        };
        let (signed_ptr, unsigned_ptr) = if pointer_is_64 {
            (signed_64, unsigned_64)
        } else {
            (BuiltinKind::Int, BuiltinKind::UInt)
        };
        let kind = match name {
            "int8_t" => BuiltinKind::SChar,
            "uint8_t" => BuiltinKind::UChar,
            "int16_t" => BuiltinKind::Short,
            "uint16_t" => BuiltinKind::UShort,
            "int32_t" => BuiltinKind::Int,
            "uint32_t" => BuiltinKind::UInt,
            "int64_t" => signed_64,
            "uint64_t" => unsigned_64,
            "size_t" | "uintptr_t" => unsigned_ptr,
            "ssize_t" | "ptrdiff_t" | "intptr_t" => signed_ptr,
            _ => return None,
        };
        Some(QualType::Builtin(kind))
    }

    /// Pointer and reference operators, a name, then array bounds.
    fn parse_declarator(&mut self, base: QualType) -> PResult<(Option<String>, QualType)> {
        let mut ty = base;
        loop {
            self.skip_specifiers();
            if self.eat_punct("*") {
                ty = ty.pointer_to();
            } else if self.eat_punct("&") {
                self.eat_punct("&");
                ty = ty.reference_to();
            } else {
                break;
            }
        }

        // `ret (*name)(params)`
        if self.at_punct("(") && self.peek_at(1).is_some_and(|t| t.is_punct("*")) {
            self.pos += 2;
            let name = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Ident(_)) => Some(self.expect_name("name")?),
                _ => None,
            };
            self.expect_punct(")")?;
            let params = self.parse_parameter_list()?;
            let function = QualType::Function {
                ret: Box::new(ty),
                params,
            };
            return Ok((name, function.pointer_to()));
        }

        let name = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Ident(word)) if !is_reserved(word) => Some(self.expect_name("name")?),
            _ => None,
        };

        let mut bounds = Vec::new();
        while self.eat_punct("[") {
            let bound = match self.bump().map(|t| t.kind) {
                Some(TokenKind::Int(n)) => ArrayBound::Fixed(n),
                Some(TokenKind::Ident(param)) => match self.non_type_param_index(&param) {
                    Some(index) => ArrayBound::Param(index),
                    None => {
                        return Err(self.error_here(format!(
                            "array bound '{param}' is not a constant"
                        )));
                    }
                },
                _ => return Err(self.error_here("expected array bound")),
            };
            self.expect_punct("]")?;
            bounds.push(bound);
        }
        for bound in bounds.into_iter().rev() {
            ty = QualType::Array(Box::new(ty), bound);
        }
        Ok((name, ty))
    }

    // ========================================================================
    // Classes, templates and enums
    // ========================================================================

    /// Whether the current tokens start a tag declaration or definition
    /// rather than an elaborated type specifier.
    fn at_tag_declaration(&self) -> bool {
        let Some(TokenKind::Ident(keyword)) = self.peek().map(|t| &t.kind) else {
            return false;
        };
        if !TAG_KEYWORDS.contains(&keyword.as_str()) || (keyword == "class" && !self.is_cxx()) {
            return false;
        }
        let mut i = self.pos + 1;
        let ident_at = |i: usize, word: &str| self.tokens.get(i).is_some_and(|t| t.is_ident(word));
        if keyword == "enum" && (ident_at(i, "class") || ident_at(i, "struct")) {
            i += 1;
        }
        while ident_at(i, "alignas") {
            i += 1;
            i = self.matching_close(i).map_or(i, |close| close + 1);
        }
        if matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::Ident(_))) {
            i += 1;
        }
        self.tokens
            .get(i)
            .is_some_and(|t| t.is_punct("{") || t.is_punct(";") || t.is_punct(":"))
    }

    /// Index of the bracket closing the group that opens at `open`.
    fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::Punct("(" | "{" | "[") => depth += 1,
                TokenKind::Punct(")" | "}" | "]") => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ if depth == 0 => return None,
                _ => {}
            }
        }
        None
    }

    fn parse_tag_statement(&mut self) -> PResult<()> {
        self.parse_tag(false)?;
        if self.eat_punct(";") {
            Ok(())
        } else {
            self.skip_statement()
        }
    }

    fn type_of_tag(&self, decl: DeclRef) -> QualType {
        match self.sema.unit().decl(decl).kind {
            DeclKind::Enum(_) => QualType::Enum(decl),
            _ => QualType::Record(decl),
        }
    }

    fn parse_tag(&mut self, allow_anonymous: bool) -> PResult<DeclRef> {
        if self.at_ident("enum") {
            return self.parse_enum(allow_anonymous);
        }
        let Some(TokenKind::Ident(keyword)) = self.bump().map(|t| t.kind) else {
            return Err(self.error_here("expected a class key"));
        };
        let tag = tag_kind(&keyword);
        let attrs = self.parse_attributes()?;
        let location = self.location();
        let name = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Ident(_)) => self.expect_name("class name")?,
            _ if allow_anonymous => String::new(),
            _ => return Err(self.error_here("anonymous classes are not supported here")),
        };

        let scope = self.scope();
        let existing = if name.is_empty() {
            None
        } else {
            self.sema
                .lookup_in(scope, &name)
                .into_iter()
                .find(|&d| self.sema.unit().record(d).is_some())
        };

        if self.at_punct(";") {
            if let Some(decl) = existing {
                return Ok(decl);
            }
            return Ok(self.sema.unit_mut().add_decl(
                scope,
                Decl {
                    name,
                    parent: None,
                    location,
                    kind: DeclKind::Record(RecordDecl::new(tag)),
                },
            ));
        }

        let decl = match existing {
            Some(existing) if self.sema.unit().record(existing).and_then(|r| r.definition).is_some() => {
                return Err(self.sema_error(SemaError::Redefinition { name }));
            }
            Some(decl) => decl,
            None => self.sema.unit_mut().add_decl(
                scope,
                Decl {
                    name,
                    parent: None,
                    location,
                    kind: DeclKind::Record(RecordDecl::new(tag)),
                },
            ),
        };
        self.sema.unit_mut().decl_mut(decl).location = location;
        if let Some(record) = self.sema.unit_mut().record_mut(decl) {
            record.tag = tag;
            record.attrs = attrs;
        }
        self.parse_record_body(decl)?;
        Ok(decl)
    }

    /// `alignas(N)` and ignored `[[...]]` attribute lists.
    fn parse_attributes(&mut self) -> PResult<Vec<Attr>> {
        let mut attrs = Vec::new();
        loop {
            if self.eat_ident("alignas") {
                self.expect_punct("(")?;
                let arg = match self.bump().map(|t| t.kind) {
                    Some(TokenKind::Int(value)) => {
                        crate::sema::checked_alignment(value).map_err(|e| self.sema_error(e))?;
                        AttrArg::Fixed(value)
                    }
                    Some(TokenKind::Ident(param)) => match self.non_type_param_index(&param) {
                        Some(index) => AttrArg::Param(index),
                        None => {
                            return Err(self.error_here(format!(
                                "alignment '{param}' is not a constant"
                            )));
                        }
                    },
                    _ => return Err(self.error_here("expected alignment")),
                };
                self.expect_punct(")")?;
                attrs.push(Attr::Aligned(arg));
            } else if self.at_punct("[") && self.peek_at(1).is_some_and(|t| t.is_punct("[")) {
                self.skip_balanced()?;
            } else {
                return Ok(attrs);
            }
        }
    }

    fn parse_record_body(&mut self, decl: DeclRef) -> PResult<()> {
        let mut bases = Vec::new();
        if self.eat_punct(":") {
            loop {
                while self.at_any_ident(&["public", "private", "protected"]) {
                    self.pos += 1;
                }
                if self.at_ident("virtual") {
                    return Err(self.error_here("virtual base classes are not supported"));
                }
                let location = self.location();
                let base = self.parse_decl_specifier()?;
                match &base {
                    QualType::Record(_) => self
                        .sema
                        .require_complete_type(&base, location)
                        .map_err(|e| self.sema_error(e))?,
                    QualType::TemplateParam(_) | QualType::TemplateSpecialization { .. } => {}
                    _ => return Err(self.error_here("base specifier must name a class")),
                }
                bases.push(base);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct("{")?;

        self.scopes.push(decl);
        let mut members = MemberList::default();
        let result = self.parse_members(&mut members);
        self.scopes.pop();
        result?;
        self.expect_punct("}")?;

        let is_dynamic = members.methods.iter().any(|m| m.is_virtual)
            || bases.iter().any(|b| self.sema.is_dynamic_type(b));
        if let Some(record) = self.sema.unit_mut().record_mut(decl) {
            record.bases = bases;
            record.fields = members.fields;
            record.methods = members.methods;
            record.is_dynamic = is_dynamic;
            record.definition = Some(decl);
        }
        Ok(())
    }

    fn parse_members(&mut self, members: &mut MemberList) -> PResult<()> {
        loop {
            let Some(token) = self.peek().cloned() else {
                return Err(self.error_here("expected '}' to close class"));
            };
            match &token.kind {
                TokenKind::Punct("}") => return Ok(()),
                TokenKind::Punct(";") | TokenKind::Directive(_) => self.pos += 1,
                TokenKind::Include { .. } => {
                    return Err(self.error_here("#include inside a class is not supported"));
                }
                TokenKind::Ident(word) => match word.as_str() {
                    "public" | "private" | "protected"
                        if self.peek_at(1).is_some_and(|t| t.is_punct(":")) =>
                    {
                        self.pos += 2;
                    }
                    "friend" | "static_assert" => self.skip_statement()?,
                    "using" => self.parse_using()?,
                    "typedef" => self.parse_typedef()?,
                    "template" => {
                        self.pos += 1;
                        if self.at_punct("<") {
                            self.skip_angles()?;
                        }
                        if self.at_any_ident(TAG_KEYWORDS) {
                            return Err(self.error_here("member class templates are not supported"));
                        }
                        members.methods.push(self.skip_method()?);
                    }
                    "static" => {
                        if self.looks_like_method() {
                            members.methods.push(self.skip_method()?);
                        } else {
                            self.skip_statement()?;
                        }
                    }
                    _ if self.at_tag_declaration() => self.parse_nested_tag(members)?,
                    _ if self.looks_like_method() => members.methods.push(self.skip_method()?),
                    _ => self.parse_fields(members)?,
                },
                TokenKind::Punct("~") => members.methods.push(self.skip_method()?),
                _ => return Err(self.error_here("expected member declaration")),
            }
        }
    }

    fn skip_angles(&mut self) -> PResult<()> {
        let mut depth = 0usize;
        loop {
            let Some(token) = self.bump() else {
                return Err(self.error_here("expected '>'"));
            };
            if token.is_punct("<") {
                depth += 1;
            } else if token.is_punct(">") {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(());
                }
            }
        }
    }

    fn parse_nested_tag(&mut self, members: &mut MemberList) -> PResult<()> {
        if self.template_params.is_some() {
            return Err(self.error_here("nested classes in class templates are not supported"));
        }
        let location = self.location();
        let decl = self.parse_tag(true)?;
        let ty = self.type_of_tag(decl);
        if self.eat_punct(";") {
            // An anonymous struct or union member occupies storage in place.
            if self.sema.unit().decl(decl).name.is_empty() && matches!(ty, QualType::Record(_)) {
                members.fields.push(FieldDecl {
                    name: String::new(),
                    ty,
                    location,
                });
            }
            return Ok(());
        }
        self.parse_field_declarators(ty, members)
    }

    /// A member whose declarator has a parameter list (and is not a
    /// function pointer field).
    fn looks_like_method(&self) -> bool {
        let mut angle = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(self.pos) {
            match &token.kind {
                TokenKind::Ident(word) if word == "operator" => return true,
                TokenKind::Punct("<") => angle += 1,
                TokenKind::Punct(">") => angle = angle.saturating_sub(1),
                TokenKind::Punct("(") if angle == 0 => {
                    return !self.tokens.get(i + 1).is_some_and(|t| t.is_punct("*"));
                }
                TokenKind::Punct(";" | "{" | "=" | "[" | ":" | "}") if angle == 0 => return false,
                _ => {}
            }
        }
        false
    }

    /// Skip a member function declaration or inline definition.
    fn skip_method(&mut self) -> PResult<MethodDecl> {
        let mut name = String::new();
        let mut is_virtual = false;
        let mut is_static = false;
        while !self.at_punct("(") {
            let Some(token) = self.bump() else {
                return Err(self.error_here("expected '(' in function declaration"));
            };
            match &token.kind {
                TokenKind::Ident(word) if word == "virtual" => is_virtual = true,
                TokenKind::Ident(word) if word == "static" => is_static = true,
                TokenKind::Ident(word) if word == "operator" => {
                    name = "operator".to_owned();
                    // `operator()` names itself with a parenthesis pair.
                    if self.at_punct("(") && self.peek_at(1).is_some_and(|t| t.is_punct(")")) {
                        self.pos += 2;
                    }
                }
                TokenKind::Ident(word) if name != "operator" => name = word.clone(),
                TokenKind::Punct("~") if name != "operator" => {
                    if let Some(TokenKind::Ident(class)) = self.peek().map(|t| t.kind.clone()) {
                        self.pos += 1;
                        name = format!("~{class}");
                    }
                }
                _ => {}
            }
        }
        self.skip_balanced()?;

        loop {
            let Some(token) = self.peek().cloned() else {
                return Err(self.error_here("expected ';' after member function"));
            };
            match token.kind {
                TokenKind::Punct(";") => {
                    self.pos += 1;
                    break;
                }
                TokenKind::Punct("{") => {
                    self.skip_balanced()?;
                    self.eat_punct(";");
                    break;
                }
                TokenKind::Punct(":") => {
                    self.pos += 1;
                    self.skip_constructor_initializers()?;
                }
                TokenKind::Punct("(") => self.skip_balanced()?,
                _ => self.pos += 1,
            }
        }
        Ok(MethodDecl {
            name,
            is_virtual,
            is_static,
        })
    }

    /// `: a(1), b{2}` up to the constructor body.
    fn skip_constructor_initializers(&mut self) -> PResult<()> {
        loop {
            while !self.at_punct("(") && !self.at_punct("{") {
                if self.bump().is_none() {
                    return Err(self.error_here("expected constructor body"));
                }
            }
            self.skip_balanced()?;
            if !self.eat_punct(",") {
                return Ok(());
            }
        }
    }

    fn parse_fields(&mut self, members: &mut MemberList) -> PResult<()> {
        let base = self.parse_decl_specifier()?;
        self.parse_field_declarators(base, members)
    }

    fn parse_field_declarators(&mut self, base: QualType, members: &mut MemberList) -> PResult<()> {
        loop {
            let location = self.location();
            let (name, ty) = self.parse_declarator(base.clone())?;
            let Some(name) = name else {
                return Err(self.error_here("expected member name"));
            };
            if self.at_punct(":") {
                return Err(self.error_here("bit-fields are not supported"));
            }
            if self.eat_punct("=") || self.at_punct("{") {
                self.skip_initializer()?;
            }
            if !ty.is_dependent() {
                self.sema
                    .require_complete_type(&ty, location)
                    .map_err(|e| self.sema_error(e))?;
            }
            members.fields.push(FieldDecl { name, ty, location });
            if !self.eat_punct(",") {
                return self.expect_punct(";");
            }
        }
    }

    fn parse_template_declaration(&mut self) -> PResult<()> {
        let location = self.location();
        self.bump();
        if !self.at_punct("<") {
            return self.parse_explicit_instantiation(location);
        }
        self.bump();
        if self.at_punct(">") {
            return Err(self.error_here("explicit specializations are not supported"));
        }

        let mut params = Vec::new();
        loop {
            let kind = if self.eat_ident("typename") || self.eat_ident("class") {
                TemplateParamKind::Type
            } else {
                match self.parse_decl_specifier()? {
                    QualType::Builtin(kind) if kind.is_integral() => TemplateParamKind::NonType(kind),
                    _ => {
                        return Err(self.error_here(
                            "non-type template parameters must have integral type",
                        ));
                    }
                }
            };
            let name = self.expect_name("template parameter name")?;
            if self.at_punct("=") {
                return Err(self.error_here("default template arguments are not supported"));
            }
            params.push(TemplateParam { name, kind });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(">")?;

        if !self.at_any_ident(&["class", "struct", "union"]) {
            self.warn(self.current_span(), "function and alias templates are ignored");
            if self.looks_like_method() {
                self.skip_method()?;
                return Ok(());
            }
            return self.skip_statement();
        }
        self.parse_class_template(params)?;
        if self.eat_punct(";") {
            Ok(())
        } else {
            Err(self.error_here("expected ';' after class template"))
        }
    }

    fn parse_class_template(&mut self, params: Vec<TemplateParam>) -> PResult<DeclRef> {
        let Some(TokenKind::Ident(keyword)) = self.bump().map(|t| t.kind) else {
            return Err(self.error_here("expected a class key"));
        };
        let tag = tag_kind(&keyword);

        let saved_params = self.template_params.replace(params.clone());
        let attrs = self.parse_attributes();
        self.template_params = saved_params;
        let attrs = attrs?;

        let location = self.location();
        let name = self.expect_name("class template name")?;
        let scope = self.scope();
        let existing = self
            .sema
            .lookup_in(scope, &name)
            .into_iter()
            .find(|&d| self.sema.unit().class_template(d).is_some());

        let template = match existing {
            Some(template) => template,
            None => {
                let pattern = self.sema.unit_mut().push_decl(Decl {
                    name: name.clone(),
                    parent: Some(scope),
                    location,
                    kind: DeclKind::Record(RecordDecl::new(tag)),
                });
                self.sema.unit_mut().add_decl(
                    scope,
                    Decl {
                        name: name.clone(),
                        parent: None,
                        location,
                        kind: DeclKind::ClassTemplate(ClassTemplateDecl {
                            params: params.clone(),
                            pattern,
                            specializations: HashMap::new(),
                        }),
                    },
                )
            }
        };
        let Some(pattern) = self.sema.unit().class_template(template).map(|t| t.pattern) else {
            return Err(self.sema_error(SemaError::NotATemplate { name }));
        };
        if !attrs.is_empty() {
            if let Some(record) = self.sema.unit_mut().record_mut(pattern) {
                record.attrs = attrs;
            }
        }
        if self.at_punct(";") {
            return Ok(template);
        }
        if self.sema.unit().record(pattern).and_then(|r| r.definition).is_some() {
            return Err(self.sema_error(SemaError::Redefinition { name }));
        }
        if let Some(decl) = self.sema.unit_mut().class_template_mut(template) {
            decl.params = params.clone();
        }

        let saved_params = self.template_params.replace(params);
        let saved_template = self.current_template.replace(template);
        let result = self.parse_record_body(pattern);
        self.template_params = saved_params;
        self.current_template = saved_template;
        result?;
        Ok(template)
    }

    /// `template struct Box<int>;`
    fn parse_explicit_instantiation(&mut self, location: SourceLocation) -> PResult<()> {
        if !self.at_any_ident(&["class", "struct", "union"]) {
            return Err(self.error_here("expected explicit instantiation of a class template"));
        }
        self.bump();
        let ty = self.parse_type_name()?;
        let QualType::Record(spec) = ty else {
            return Err(self.error_here("explicit instantiation requires a template-id"));
        };
        if self.sema.specialization_kind(spec).is_none() {
            return Err(self.error_here("explicit instantiation of a non-template class"));
        }
        self.sema
            .instantiate_class_template_specialization(
                location,
                spec,
                SpecializationKind::ExplicitInstantiationDefinition,
            )
            .map_err(|e| self.sema_error(e))?;
        self.expect_punct(";")
    }

    fn parse_enum(&mut self, allow_anonymous: bool) -> PResult<DeclRef> {
        self.bump();
        let scoped = self.eat_ident("class") || self.eat_ident("struct");
        let location = self.location();
        let name = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Ident(_)) => self.expect_name("enum name")?,
            _ if allow_anonymous || self.at_punct("{") => String::new(),
            _ => return Err(self.error_here("expected enum name")),
        };

        let fixed = if self.eat_punct(":") {
            match self.parse_type()? {
                QualType::Builtin(kind) if kind.is_integral() => Some(kind),
                _ => return Err(self.error_here("enum underlying type must be integral")),
            }
        } else {
            None
        };

        let scope = self.scope();
        let existing = if name.is_empty() {
            None
        } else {
            self.sema
                .lookup_in(scope, &name)
                .into_iter()
                .find(|&d| self.sema.unit().enum_decl(d).is_some())
        };

        if self.at_punct(";") {
            if let Some(decl) = existing {
                return Ok(decl);
            }
            let decl = EnumDecl {
                scoped,
                underlying: fixed.unwrap_or(BuiltinKind::Int),
                fixed_underlying: fixed.is_some(),
                enumerators: Vec::new(),
                is_complete: fixed.is_some(),
            };
            return Ok(self.add_enum(scope, name, location, decl));
        }

        self.expect_punct("{")?;
        let mut enumerators: Vec<Enumerator> = Vec::new();
        let mut next: i128 = 0;
        while !self.at_punct("}") {
            let enumerator = self.expect_name("enumerator")?;
            let value = if self.eat_punct("=") {
                self.parse_constant(&enumerators)?
            } else {
                next
            };
            let stored = i64::try_from(value)
                .or_else(|_| u64::try_from(value).map(|v| v as i64))
                .map_err(|_| self.error_here("enumerator value is out of range"))?;
            enumerators.push(Enumerator {
                name: enumerator,
                value: stored,
            });
            next = value + 1;
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;

        let underlying = fixed.unwrap_or_else(|| underlying_for(&enumerators));
        let decl = EnumDecl {
            scoped,
            underlying,
            fixed_underlying: fixed.is_some(),
            enumerators,
            is_complete: true,
        };
        match existing {
            Some(existing) => {
                let redefined = self.sema.unit().enum_decl(existing).is_some_and(|e| !e.enumerators.is_empty());
                if redefined {
                    return Err(self.sema_error(SemaError::Redefinition { name }));
                }
                self.sema.unit_mut().decl_mut(existing).kind = DeclKind::Enum(decl);
                Ok(existing)
            }
            None => Ok(self.add_enum(scope, name, location, decl)),
        }
    }

    fn add_enum(&mut self, scope: DeclRef, name: String, location: SourceLocation, decl: EnumDecl) -> DeclRef {
        self.sema.unit_mut().add_decl(
            scope,
            Decl {
                name,
                parent: None,
                location,
                kind: DeclKind::Enum(decl),
            },
        )
    }

    // ========================================================================
    // Constant expressions (enumerator initializers)
    // ========================================================================

    fn parse_constant(&mut self, known: &[Enumerator]) -> PResult<i128> {
        let mut value = self.parse_shift(known)?;
        while self.eat_punct("|") {
            value |= self.parse_shift(known)?;
        }
        Ok(value)
    }

    fn parse_shift(&mut self, known: &[Enumerator]) -> PResult<i128> {
        let mut value = self.parse_additive(known)?;
        loop {
            let left = self.at_punct("<") && self.peek_at(1).is_some_and(|t| t.is_punct("<"));
            let right = self.at_punct(">") && self.peek_at(1).is_some_and(|t| t.is_punct(">"));
            if !left && !right {
                return Ok(value);
            }
            self.pos += 2;
            let amount = self.parse_additive(known)?;
            let amount = u32::try_from(amount)
                .ok()
                .filter(|&a| a < 64)
                .ok_or_else(|| self.error_here("shift amount is out of range"))?;
            value = if left { value << amount } else { value >> amount };
        }
    }

    fn parse_additive(&mut self, known: &[Enumerator]) -> PResult<i128> {
        let mut value = self.parse_unary(known)?;
        loop {
            if self.eat_punct("+") {
                value += self.parse_unary(known)?;
            } else if self.eat_punct("-") {
                value -= self.parse_unary(known)?;
            } else {
                return Ok(value);
            }
        }
    }

    fn parse_unary(&mut self, known: &[Enumerator]) -> PResult<i128> {
        if self.eat_punct("-") {
            return Ok(-self.parse_unary(known)?);
        }
        if self.eat_punct("~") {
            return Ok(!self.parse_unary(known)?);
        }
        if self.eat_punct("(") {
            let value = self.parse_constant(known)?;
            self.expect_punct(")")?;
            return Ok(value);
        }
        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Int(value)) => {
                self.pos += 1;
                Ok(i128::from(value))
            }
            Some(TokenKind::Ident(name)) => {
                let found = known.iter().find(|e| e.name == name);
                match found {
                    Some(e) => {
                        self.pos += 1;
                        Ok(i128::from(e.value))
                    }
                    None => Err(self.error_here(format!("'{name}' is not a known constant"))),
                }
            }
            _ => Err(self.error_here("expected a constant expression")),
        }
    }
}

fn tag_kind(keyword: &str) -> TagKind {
    match keyword {
        "class" => TagKind::Class,
        "union" => TagKind::Union,
        _ => TagKind::Struct,
    }
}

fn is_reserved(word: &str) -> bool {
    matches!(
        word,
        "const" | "volatile" | "override" | "final" | "noexcept" | "operator" | "throw"
    )
}

/// `int` when every value fits, then `unsigned int`, then `long long`.
fn underlying_for(enumerators: &[Enumerator]) -> BuiltinKind {
    let fits = |lo: i128, hi: i128| {
        enumerators
            .iter()
            .all(|e| (lo..=hi).contains(&i128::from(e.value)))
    };
    if fits(i128::from(i32::MIN), i128::from(i32::MAX)) {
        BuiltinKind::Int
    } else if fits(0, i128::from(u32::MAX)) {
        BuiltinKind::UInt
    } else {
        BuiltinKind::LongLong
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tree::TranslationUnit;
    use cxxi_core::{LanguageVariant, TargetInfo};
    use std::str::FromStr;
    use target_lexicon::Triple;

    pub(crate) struct NoIncludes;

    impl IncludeHandler for NoIncludes {
        fn include(&mut self, _: &mut Sema<'_>, path: &str, _: &str) -> Result<Included, String> {
            Err(format!("'{path}' file not found"))
        }
    }

    pub(crate) fn linux64() -> TargetInfo {
        TargetInfo::from_triple(Triple::from_str("x86_64-unknown-linux-gnu").unwrap())
    }

    pub(crate) fn parse_with(
        language: LanguageVariant,
        source: &str,
    ) -> Result<TranslationUnit, Diagnostic> {
        let target = linux64();
        let mut unit = TranslationUnit::new("test.h");
        let mut sema = Sema::new(&mut unit, &target, language);
        let mut diagnostics = Vec::new();
        parse_unit(&mut sema, &mut NoIncludes, "test.h", source, &mut diagnostics)?;
        Ok(unit)
    }

    pub(crate) fn parse(source: &str) -> TranslationUnit {
        parse_with(LanguageVariant::Cxx, source).unwrap()
    }

    fn record_named(unit: &TranslationUnit, name: &str) -> DeclRef {
        let target = linux64();
        let mut unit = unit.clone();
        let sema = Sema::new(&mut unit, &target, LanguageVariant::Cxx);
        match sema.find_tagged(name) {
            crate::sema::LookupResult::Found(_, decl) => decl,
            crate::sema::LookupResult::NotFound => panic!("{name} not found"),
        }
    }

    #[test]
    fn test_fields_and_methods() {
        let unit = parse(
            "class Point {
             public:
               Point(int x, int y) : x_(x), y_{y} {}
               int x() const { return x_; }
               static Point origin();
             private:
               int x_;
               int y_;
             };",
        );
        let point = record_named(&unit, "Point");
        let record = unit.record(point).unwrap();
        assert_eq!(
            record.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            ["x_", "y_"]
        );
        assert_eq!(record.methods.len(), 3);
        assert!(record.methods[2].is_static);
        assert!(!record.is_dynamic);
    }

    #[test]
    fn test_virtual_method_makes_class_dynamic() {
        let unit = parse("struct Shape { virtual ~Shape(); virtual double area() const = 0; };");
        let shape = record_named(&unit, "Shape");
        assert!(unit.record(shape).unwrap().is_dynamic);
    }

    #[test]
    fn test_function_pointer_field_is_not_a_method() {
        let unit = parse("struct Callbacks { void (*on_event)(int, void*); int count; };");
        let record = unit.record(record_named(&unit, "Callbacks")).unwrap();
        assert_eq!(record.fields.len(), 2);
        assert!(matches!(record.fields[0].ty, QualType::Pointer(_)));
    }

    #[test]
    fn test_namespaces_reopen() {
        let unit = parse("namespace a { struct X {}; } namespace a { struct Y { X x; }; }");
        let root = unit.root();
        assert_eq!(unit.members(root).len(), 1);
        record_named(&unit, "a::Y");
    }

    #[test]
    fn test_nested_namespace_definition() {
        let unit = parse("namespace a::b { struct Z { char c; }; }");
        record_named(&unit, "::a::b::Z");
    }

    #[test]
    fn test_typedef_names_anonymous_struct() {
        let unit = parse_with(
            LanguageVariant::C,
            "typedef struct { int x; int y; } Point; typedef Point* PointRef;",
        )
        .unwrap();
        record_named(&unit, "Point");
    }

    #[test]
    fn test_c_requires_elaborated_tags() {
        let err = parse_with(LanguageVariant::C, "struct A { int x; }; struct B { A a; };")
            .unwrap_err();
        assert!(err.message.contains("undeclared identifier 'A'"), "{}", err.message);

        parse_with(LanguageVariant::C, "struct A { int x; }; struct B { struct A a; };").unwrap();
    }

    #[test]
    fn test_enum_values_and_underlying() {
        let unit = parse(
            "enum Flags { None = 0, A = 1 << 0, B = 1 << 1, AB = A | B, Big = 0x100000000 };
             enum class Small : unsigned char { X, Y };",
        );
        let flags = match Sema::new(&mut unit.clone(), &linux64(), LanguageVariant::Cxx)
            .find_tagged("Flags")
        {
            crate::sema::LookupResult::Found(_, d) => d,
            _ => panic!("Flags missing"),
        };
        let e = unit.enum_decl(flags).unwrap();
        assert_eq!(
            e.enumerators.iter().map(|e| e.value).collect::<Vec<_>>(),
            [0, 1, 2, 3, 0x1_0000_0000]
        );
        assert_eq!(e.underlying, BuiltinKind::LongLong);
    }

    #[test]
    fn test_incomplete_field_is_an_error() {
        let err = parse_err("struct A; struct B { A a; };");
        assert!(err.message.contains("incomplete type 'A'"), "{}", err.message);
    }

    #[test]
    fn test_self_pointer_is_allowed() {
        parse("struct Node { int value; Node* next; };");
    }

    #[test]
    fn test_implicit_instantiation_of_member_type() {
        let unit = parse(
            "template <typename T> struct Box { T value; };
             struct Holder { Box<int> boxed; Box<double>* other; };",
        );
        let box_template = match Sema::new(&mut unit.clone(), &linux64(), LanguageVariant::Cxx)
            .find_tagged("Box")
        {
            crate::sema::LookupResult::Found(_, d) => d,
            _ => panic!("Box missing"),
        };
        let template = unit.class_template(box_template).unwrap();
        assert_eq!(template.specializations.len(), 2);

        let defined: Vec<_> = template
            .specializations
            .values()
            .map(|&s| unit.record(s).unwrap().definition.is_some())
            .collect();
        assert_eq!(defined.iter().filter(|d| **d).count(), 1);
    }

    #[test]
    fn test_recursive_instantiation_is_reported() {
        let err =
            parse_err("template <class T> struct Loop { Loop<T> inner; }; struct Use { Loop<int> l; };");
        assert_eq!(err.phase, CompilationPhase::Instantiation);
    }

    #[test]
    fn test_system_include_warns() {
        let target = linux64();
        let mut unit = TranslationUnit::new("test.h");
        let mut sema = Sema::new(&mut unit, &target, LanguageVariant::Cxx);
        let mut diagnostics = Vec::new();
        parse_unit(
            &mut sema,
            &mut NoIncludes,
            "test.h",
            "#include <stdint.h>\nstruct S { uint32_t v; };",
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
    }

    #[test]
    fn test_missing_quoted_include_is_an_error() {
        let err = parse_with(LanguageVariant::Cxx, "#include \"missing.h\"\n").unwrap_err();
        assert_eq!(err.phase, CompilationPhase::Preprocessing);
        assert!(err.message.contains("missing.h"));
    }

    #[test]
    fn test_free_functions_are_declared() {
        let unit = parse("extern \"C\" { int add(int a, int b); void reset(void); }");
        let names: Vec<_> = unit
            .functions()
            .into_iter()
            .map(|f| unit.decl(f).name.clone())
            .collect();
        assert_eq!(names, ["add", "reset"]);
        assert_eq!(unit.function(unit.functions()[0]).unwrap().param_types.len(), 2);
    }

    fn parse_err(source: &str) -> Diagnostic {
        parse_with(LanguageVariant::Cxx, source).unwrap_err()
    }

    #[test]
    fn test_redefinition_is_an_error() {
        let err = parse_err("struct A {}; struct A {};");
        assert!(err.message.contains("redefinition"));
    }
}
