//! Comparison classes and defaultability of types.
//!
//! Generated members snapshot each argument according to its
//! [`ComparisonClass`]. The classification is conservative: anything the
//! model cannot prove comparable and thread-safe degrades to `Structural`
//! (needs `Debug`) or `Opaque` (nothing).

use super::member::ComparisonClass;
use super::types::TypeDeclaration;
use std::collections::HashMap;
use syn::{GenericArgument, PathArguments, Type};

const EQUATABLE_PRIMITIVES: &[&str] = &[
    "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32", "i64", "i128", "isize",
    "f32", "f64", "bool", "char", "str", "String", "PathBuf", "Path", "Duration", "IpAddr",
    "Ipv4Addr", "Ipv6Addr", "SocketAddr", "Ordering",
];

const EQUATABLE_CONTAINERS: &[&str] = &[
    "Vec", "Option", "Box", "VecDeque", "BTreeMap", "BTreeSet", "HashMap", "HashSet", "Result",
    "Arc",
];

const DEFAULT_CONTAINERS: &[&str] = &[
    "Vec", "VecDeque", "BTreeMap", "BTreeSet", "HashMap", "HashSet", "Option",
];

const DEFAULT_PRIMITIVES: &[&str] = &[
    "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32", "i64", "i128", "isize",
    "f32", "f64", "bool", "char", "str", "String", "PathBuf", "Duration",
];

/// Derived-trait facts about an analyzed type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclaredFacts {
    pub partial_eq: bool,
    pub clone: bool,
    pub debug: bool,
    pub default: bool,
    pub thread_safe: bool,
    pub has_lifetimes: bool,
}

impl DeclaredFacts {
    pub fn of(declaration: &TypeDeclaration) -> Self {
        Self {
            partial_eq: declaration.derives("PartialEq") || declaration.derives("Eq"),
            clone: declaration.derives("Clone") || declaration.derives("Copy"),
            debug: declaration.derives("Debug"),
            default: declaration.derives("Default"),
            thread_safe: declaration.thread_safe,
            has_lifetimes: declaration
                .generics
                .params
                .iter()
                .any(|param| param.kind == super::types::GenericKind::Lifetime),
        }
    }
}

/// Lookup of analyzed types by the name used in a signature.
pub trait TypeFacts {
    fn facts_for(&self, name: &str) -> Option<DeclaredFacts>;
}

impl TypeFacts for HashMap<String, DeclaredFacts> {
    fn facts_for(&self, name: &str) -> Option<DeclaredFacts> {
        self.get(name).copied()
    }
}

/// Generic parameters in scope and the facts about declared types.
pub struct ClassScope<'a> {
    pub facts: &'a dyn TypeFacts,
    /// Generic parameter name to its bounds.
    pub params: HashMap<String, Vec<String>>,
}

impl<'a> ClassScope<'a> {
    pub fn new(facts: &'a dyn TypeFacts) -> Self {
        Self {
            facts,
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, bounds: Vec<String>) -> Self {
        self.params.insert(name.into(), bounds);
        self
    }

    fn param_bounds(&self, name: &str) -> Option<&Vec<String>> {
        self.params.get(name)
    }

    /// Comparison class of a parameter type.
    pub fn classify(&self, ty: &Type) -> ComparisonClass {
        self.classify_at(ty, true)
    }

    fn classify_at(&self, ty: &Type, top_level: bool) -> ComparisonClass {
        match ty {
            Type::Reference(reference) => {
                let inner = self.classify_at(&reference.elem, top_level);
                if top_level {
                    inner
                } else {
                    weaken(inner)
                }
            }
            Type::Slice(slice) => self.classify_at(&slice.elem, false),
            Type::Array(array) => self.classify_at(&array.elem, false),
            Type::Paren(paren) => self.classify_at(&paren.elem, top_level),
            Type::Group(group) => self.classify_at(&group.elem, top_level),
            Type::Tuple(tuple) => combine(tuple.elems.iter().map(|elem| self.classify_at(elem, false))),
            Type::Path(type_path) => self.classify_path(type_path),
            _ => ComparisonClass::Opaque,
        }
    }

    fn classify_path(&self, type_path: &syn::TypePath) -> ComparisonClass {
        let segments = &type_path.path.segments;
        let Some(last) = segments.last() else {
            return ComparisonClass::Opaque;
        };
        let name = last.ident.to_string();

        if type_path.qself.is_some() {
            return ComparisonClass::Opaque;
        }
        if segments.len() == 2 && segments[0].ident == "Self" {
            return self.classify_param(&name);
        }
        if segments.len() == 1 && self.param_bounds(&name).is_some() {
            return self.classify_param(&name);
        }
        if name == "Self" {
            return ComparisonClass::Opaque;
        }

        let args = type_arguments(&last.arguments);
        if EQUATABLE_PRIMITIVES.contains(&name.as_str()) && args.is_empty() {
            return ComparisonClass::Equatable;
        }
        if EQUATABLE_CONTAINERS.contains(&name.as_str()) {
            return combine(args.iter().map(|arg| self.classify_at(arg, false)));
        }
        match self.facts.facts_for(&name) {
            Some(facts) => {
                let own = if facts.partial_eq
                    && facts.clone
                    && facts.debug
                    && facts.thread_safe
                    && !facts.has_lifetimes
                {
                    ComparisonClass::Equatable
                } else if facts.debug {
                    ComparisonClass::Structural
                } else {
                    ComparisonClass::Opaque
                };
                combine(
                    std::iter::once(own).chain(args.iter().map(|arg| self.classify_at(arg, false))),
                )
            }
            None => ComparisonClass::Opaque,
        }
    }

    fn classify_param(&self, name: &str) -> ComparisonClass {
        let Some(bounds) = self.param_bounds(name) else {
            return ComparisonClass::Opaque;
        };
        let has = |wanted: &[&str]| bounds.iter().any(|bound| wanted.iter().any(|w| bound_is(bound, w)));
        if has(&["PartialEq", "Eq"])
            && has(&["Clone", "Copy"])
            && has(&["Debug"])
            && has(&["Send"])
            && has(&["Sync"])
            && has(&["'static"])
        {
            ComparisonClass::Equatable
        } else if has(&["Debug"]) {
            ComparisonClass::Structural
        } else {
            ComparisonClass::Opaque
        }
    }

    /// Whether a return type is known to implement `Default`.
    pub fn is_defaultable(&self, ty: &Type) -> bool {
        match ty {
            Type::Tuple(tuple) => tuple.elems.iter().all(|elem| self.is_defaultable(elem)),
            Type::Array(array) => self.is_defaultable(&array.elem),
            Type::Paren(paren) => self.is_defaultable(&paren.elem),
            Type::Reference(reference) => {
                reference.mutability.is_none()
                    && matches!(&*reference.elem, Type::Path(path) if path.path.is_ident("str"))
            }
            Type::Path(type_path) => {
                let Some(last) = type_path.path.segments.last() else {
                    return false;
                };
                let name = last.ident.to_string();
                let segments = &type_path.path.segments;
                if type_path.qself.is_some() {
                    return false;
                }
                if segments.len() == 2 && segments[0].ident == "Self" {
                    return self.param_has(&name, "Default");
                }
                if segments.len() == 1 && self.param_bounds(&name).is_some() {
                    return self.param_has(&name, "Default");
                }
                if DEFAULT_PRIMITIVES.contains(&name.as_str()) || DEFAULT_CONTAINERS.contains(&name.as_str()) {
                    return true;
                }
                if name == "Box" || name == "Arc" {
                    return type_arguments(&last.arguments)
                        .first()
                        .is_some_and(|inner| self.is_defaultable(inner));
                }
                self.facts
                    .facts_for(&name)
                    .is_some_and(|facts| facts.default)
            }
            _ => false,
        }
    }

    fn param_has(&self, name: &str, bound: &str) -> bool {
        self.param_bounds(name)
            .is_some_and(|bounds| bounds.iter().any(|candidate| bound_is(candidate, bound)))
    }
}

fn bound_is(bound: &str, wanted: &str) -> bool {
    if wanted.starts_with('\'') {
        return bound.trim() == wanted;
    }
    let head = bound.split('<').next().unwrap_or(bound);
    head.rsplit("::").next().map(str::trim) == Some(wanted)
}

fn type_arguments(arguments: &PathArguments) -> Vec<&Type> {
    match arguments {
        PathArguments::AngleBracketed(angle) => angle
            .args
            .iter()
            .filter_map(|argument| match argument {
                GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn weaken(class: ComparisonClass) -> ComparisonClass {
    match class {
        ComparisonClass::Equatable => ComparisonClass::Structural,
        other => other,
    }
}

/// The weakest class among the parts; an empty list is equatable.
fn combine(classes: impl Iterator<Item = ComparisonClass>) -> ComparisonClass {
    classes.fold(ComparisonClass::Equatable, |acc, class| match (acc, class) {
        (ComparisonClass::Opaque, _) | (_, ComparisonClass::Opaque) => ComparisonClass::Opaque,
        (ComparisonClass::Structural, _) | (_, ComparisonClass::Structural) => {
            ComparisonClass::Structural
        }
        _ => ComparisonClass::Equatable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(source: &str) -> Type {
        syn::parse_str(source).unwrap()
    }

    fn facts() -> HashMap<String, DeclaredFacts> {
        let mut facts = HashMap::new();
        facts.insert(
            "User".to_string(),
            DeclaredFacts {
                partial_eq: true,
                clone: true,
                debug: true,
                default: true,
                thread_safe: true,
                has_lifetimes: false,
            },
        );
        facts.insert(
            "Handle".to_string(),
            DeclaredFacts {
                debug: true,
                ..DeclaredFacts::default()
            },
        );
        facts
    }

    #[test]
    fn test_primitives_and_containers_are_equatable() {
        let facts = facts();
        let scope = ClassScope::new(&facts);
        for source in ["u32", "&str", "String", "Vec<u8>", "&[String]", "Option<(u8, bool)>", "&Path"] {
            assert_eq!(scope.classify(&ty(source)), ComparisonClass::Equatable, "{}", source);
        }
    }

    #[test]
    fn test_declared_types_follow_derives() {
        let facts = facts();
        let scope = ClassScope::new(&facts);
        assert_eq!(scope.classify(&ty("&User")), ComparisonClass::Equatable);
        assert_eq!(scope.classify(&ty("Handle")), ComparisonClass::Structural);
        assert_eq!(scope.classify(&ty("Vec<Handle>")), ComparisonClass::Structural);
        assert_eq!(scope.classify(&ty("Unknown")), ComparisonClass::Opaque);
    }

    #[test]
    fn test_nested_references_are_weakened() {
        let facts = facts();
        let scope = ClassScope::new(&facts);
        assert_eq!(scope.classify(&ty("Vec<&str>")), ComparisonClass::Structural);
    }

    #[test]
    fn test_closures_and_trait_objects_are_opaque() {
        let facts = facts();
        let scope = ClassScope::new(&facts);
        assert_eq!(scope.classify(&ty("impl Fn(u32)")), ComparisonClass::Opaque);
        assert_eq!(scope.classify(&ty("Box<dyn Send>")), ComparisonClass::Opaque);
        assert_eq!(scope.classify(&ty("&dyn std::io::Write")), ComparisonClass::Opaque);
    }

    #[test]
    fn test_generic_params_use_bounds() {
        let facts = facts();
        let scope = ClassScope::new(&facts)
            .with_param("T", vec!["Debug".into()])
            .with_param(
                "K",
                vec!["Eq".into(), "Clone".into(), "std::fmt::Debug".into(), "Send".into(), "Sync".into(), "'static".into()],
            )
            .with_param("F", vec!["Fn()".into()]);
        assert_eq!(scope.classify(&ty("T")), ComparisonClass::Structural);
        assert_eq!(scope.classify(&ty("K")), ComparisonClass::Equatable);
        assert_eq!(scope.classify(&ty("F")), ComparisonClass::Opaque);
    }

    #[test]
    fn test_defaultability() {
        let facts = facts();
        let scope = ClassScope::new(&facts).with_param("T", vec!["Default".into()]);
        for source in ["u8", "String", "Vec<Handle>", "(u8, bool)", "&'static str", "User", "T", "Box<u8>"] {
            assert!(scope.is_defaultable(&ty(source)), "{}", source);
        }
        for source in ["Handle", "&mut String", "Box<dyn Send>", "Unknown"] {
            assert!(!scope.is_defaultable(&ty(source)), "{}", source);
        }
    }
}
