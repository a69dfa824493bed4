//! Name lookup.

use crate::refs::DeclRef;
use crate::tree::DeclKind;

use super::Sema;

/// Which kind of declaration a tagged lookup matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LookupCategory {
    Template,
    Class,
    Enum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LookupResult {
    Found(LookupCategory, DeclRef),
    NotFound,
}

impl Sema<'_> {
    /// Members of `scope` called `name`, in declaration order.
    pub fn lookup_in(&self, scope: DeclRef, name: &str) -> Vec<DeclRef> {
        let unit = self.unit();
        unit.members(scope)
            .iter()
            .copied()
            .filter(|&d| unit.decl(d).name == name)
            .collect()
    }

    /// Innermost declaration of `name` visible from `scope`.
    pub fn lookup_unqualified(&self, scope: DeclRef, name: &str) -> Option<DeclRef> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if let Some(&found) = self.lookup_in(s, name).first() {
                return Some(found);
            }
            current = self.unit().decl(s).parent;
        }
        None
    }

    /// Declarations reached by walking `path` down from `start`.
    ///
    /// Every segment but the last must name a namespace or a defined class.
    pub fn lookup_path(&self, start: DeclRef, path: &[&str]) -> Vec<DeclRef> {
        let Some((last, scopes)) = path.split_last() else {
            return Vec::new();
        };
        let mut scope = start;
        for segment in scopes {
            let next = self.lookup_in(scope, segment).into_iter().find_map(|d| {
                match &self.unit().decl(d).kind {
                    DeclKind::Namespace(_) => Some(d),
                    DeclKind::Record(record) => record.definition,
                    _ => None,
                }
            });
            match next {
                Some(next) => scope = next,
                None => return Vec::new(),
            }
        }
        self.lookup_in(scope, last)
    }

    /// Find a class template, defined class or enum by its name qualified
    /// from the root scope. Templates win over classes, classes over enums.
    pub fn find_tagged(&self, qualified_name: &str) -> LookupResult {
        let trimmed = qualified_name.strip_prefix("::").unwrap_or(qualified_name);
        let path: Vec<&str> = trimmed.split("::").collect();
        if path.iter().any(|segment| segment.is_empty()) {
            return LookupResult::NotFound;
        }

        let candidates = self.lookup_path(self.unit().root(), &path);
        let unit = self.unit();

        let template = candidates
            .iter()
            .copied()
            .find(|&d| unit.class_template(d).is_some());
        if let Some(decl) = template {
            return LookupResult::Found(LookupCategory::Template, decl);
        }

        let class = candidates.iter().find_map(|&d| {
            unit.record(d)
                .filter(|r| r.specialization.is_none())
                .and_then(|r| r.definition)
        });
        if let Some(decl) = class {
            return LookupResult::Found(LookupCategory::Class, decl);
        }

        let enumeration = candidates
            .iter()
            .copied()
            .find(|&d| unit.enum_decl(d).is_some());
        match enumeration {
            Some(decl) => LookupResult::Found(LookupCategory::Enum, decl),
            None => LookupResult::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::{linux64, parse};
    use cxxi_core::LanguageVariant;

    fn find(source: &str, name: &str) -> LookupResult {
        let mut unit = parse(source);
        let target = linux64();
        Sema::new(&mut unit, &target, LanguageVariant::Cxx).find_tagged(name)
    }

    /// Give the only member called `from` the name `to`.
    fn rename(unit: &mut crate::tree::TranslationUnit, from: &str, to: &str) {
        let target = linux64();
        let root = unit.root();
        let decls = Sema::new(unit, &target, LanguageVariant::Cxx).lookup_in(root, from);
        unit.decl_mut(decls[0]).name = to.to_owned();
    }

    #[test]
    fn test_forward_declaration_is_not_found() {
        assert_eq!(find("struct Fwd;", "Fwd"), LookupResult::NotFound);
        assert_eq!(find("struct A { int x; };", "B"), LookupResult::NotFound);
    }

    #[test]
    fn test_qualified_names_reach_nested_classes() {
        let source = "namespace a { struct B { struct C { int x; }; int y; }; }";
        assert!(matches!(
            find(source, "a::B::C"),
            LookupResult::Found(LookupCategory::Class, _)
        ));
        assert!(matches!(
            find(source, "::a::B"),
            LookupResult::Found(LookupCategory::Class, _)
        ));
        assert_eq!(find(source, "a::"), LookupResult::NotFound);
        assert_eq!(find(source, "C"), LookupResult::NotFound);
    }

    #[test]
    fn test_templates_win_over_classes() {
        let mut unit = parse("template <typename T> struct Box { T v; }; struct Other { int x; };");
        rename(&mut unit, "Other", "Box");
        let target = linux64();
        let sema = Sema::new(&mut unit, &target, LanguageVariant::Cxx);
        assert!(matches!(
            sema.find_tagged("Box"),
            LookupResult::Found(LookupCategory::Template, _)
        ));
    }

    #[test]
    fn test_classes_win_over_enums() {
        let mut unit = parse("enum Shade { Dark }; struct Color { int rgb; };");
        rename(&mut unit, "Shade", "Color");
        let target = linux64();
        let sema = Sema::new(&mut unit, &target, LanguageVariant::Cxx);
        let LookupResult::Found(category, decl) = sema.find_tagged("Color") else {
            panic!("Color not found");
        };
        assert_eq!(category, LookupCategory::Class);
        assert!(sema.unit().record(decl).is_some());
    }

    #[test]
    fn test_enums_are_found() {
        assert!(matches!(
            find("namespace gfx { enum class Mode : char { On, Off }; }", "gfx::Mode"),
            LookupResult::Found(LookupCategory::Enum, _)
        ));
    }
}
