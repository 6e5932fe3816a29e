//! Declarations produced by the source analyzer.
//!
//! Everything here is plain owned data (strings rather than `syn` nodes) so
//! declarations can move between the parallel analysis and emission phases.

use super::member::{Member, Parameter};
use super::render::render_type;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// A type as written in source, plus its canonical descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TypeRef {
    /// Token string that re-parses with `syn::parse_str::<syn::Type>`.
    pub source: String,
    /// Canonical rendering with lifetimes erased, used in signatures.
    pub descriptor: String,
}

impl TypeRef {
    pub fn from_syn(ty: &syn::Type) -> Self {
        Self {
            source: quote::quote!(#ty).to_string(),
            descriptor: render_type(ty, true),
        }
    }

    pub fn parse(&self) -> syn::Result<syn::Type> {
        syn::parse_str(&self.source)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor)
    }
}

/// Where something was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    pub fn from_span(file: &std::path::Path, span: proc_macro2::Span) -> Self {
        let start = span.start();
        Self::new(file, start.line, start.column + 1)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeKind {
    /// A struct with a `Deref` base.
    Class,
    /// A trait.
    Protocol,
    /// Any other struct or enum.
    ValueType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Accessibility {
    Public,
    Crate,
    /// `pub(super)`, `pub(in path)`.
    Restricted(String),
    Private,
}

impl Accessibility {
    pub fn from_syn(visibility: &syn::Visibility) -> Self {
        match visibility {
            syn::Visibility::Public(_) => Self::Public,
            syn::Visibility::Restricted(restricted) => {
                let path = super::render::render_path(&restricted.path, false);
                if path == "crate" {
                    Self::Crate
                } else {
                    Self::Restricted(path)
                }
            }
            syn::Visibility::Inherited => Self::Private,
        }
    }

    /// Whether code in a sibling module can name the item.
    pub fn is_visible_outside_module(&self) -> bool {
        matches!(self, Self::Public | Self::Crate)
    }

    /// Visibility keyword for generated items.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Public => "pub",
            Self::Crate => "pub(crate)",
            Self::Restricted(_) | Self::Private => "pub(crate)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GenericKind {
    Type,
    Lifetime,
    Const,
}

/// A declared generic parameter with its constraints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GenericParam {
    pub kind: GenericKind,
    pub name: String,
    /// Bound sources, e.g. `Clone`, `Into<String>`, `'static`.
    pub bounds: Vec<String>,
    /// Full parameter source as declared (`T: Clone = u8`, `'a`, `const N: usize`).
    pub source: String,
    /// `T = u8`
    pub default: Option<TypeRef>,
}

impl GenericParam {
    pub fn has_bound(&self, name: &str) -> bool {
        self.bounds.iter().any(|bound| bound_names(bound, name))
    }
}

fn bound_names(bound: &str, name: &str) -> bool {
    let head = bound.split('<').next().unwrap_or(bound);
    head.rsplit("::").next().map(str::trim) == Some(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Generics {
    pub params: Vec<GenericParam>,
    /// Where-clause predicates as source strings.
    pub where_predicates: Vec<String>,
}

impl Generics {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.where_predicates.is_empty()
    }

    pub fn type_params(&self) -> impl Iterator<Item = &GenericParam> {
        self.params
            .iter()
            .filter(|param| param.kind == GenericKind::Type)
    }

    pub fn type_arity(&self) -> usize {
        self.type_params().count()
    }

    pub fn find(&self, name: &str) -> Option<&GenericParam> {
        self.type_params().find(|param| param.name == name)
    }

    /// Bounds of a type parameter, including those stated in the where clause.
    pub fn bounds_of(&self, name: &str) -> Vec<String> {
        let mut bounds = self
            .find(name)
            .map(|param| param.bounds.clone())
            .unwrap_or_default();
        let prefix = format!("{} :", name);
        for predicate in &self.where_predicates {
            if let Some(rest) = predicate.strip_prefix(&prefix) {
                bounds.extend(rest.split(" + ").map(|bound| bound.trim().to_string()));
            }
        }
        bounds
    }
}

/// `type Item: Bound;` inside a trait.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AssociatedType {
    pub name: String,
    pub bounds: Vec<String>,
    /// Default (`type Item = u8;`) when the trait provides one.
    pub default: Option<TypeRef>,
}

/// A reference to a supertype or conformance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SuperType {
    /// Path as written, without generic arguments (`io::Read`, `Base`).
    pub path: String,
    /// Last path segment.
    pub name: String,
    pub args: Vec<TypeRef>,
    /// Associated type bindings (`Base<Item = u8>`).
    pub bindings: Vec<(String, TypeRef)>,
}

impl SuperType {
    pub fn from_path(path: &syn::Path) -> Self {
        let mut bare = path.clone();
        let mut args = Vec::new();
        let mut bindings = Vec::new();
        if let Some(last) = bare.segments.last_mut() {
            if let syn::PathArguments::AngleBracketed(angle) = &last.arguments {
                for argument in &angle.args {
                    match argument {
                        syn::GenericArgument::Type(ty) => args.push(TypeRef::from_syn(ty)),
                        syn::GenericArgument::AssocType(assoc) => {
                            bindings.push((assoc.ident.to_string(), TypeRef::from_syn(&assoc.ty)))
                        }
                        _ => {}
                    }
                }
            }
            last.arguments = syn::PathArguments::None;
        }
        let name = bare
            .segments
            .last()
            .map(|segment| segment.ident.to_string())
            .unwrap_or_default();
        Self {
            path: super::render::render_path(&bare, false),
            name,
            args,
            bindings,
        }
    }
}

impl fmt::Display for SuperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.args.is_empty() {
            let args: Vec<&str> = self.args.iter().map(|arg| arg.descriptor.as_str()).collect();
            write!(f, "<{}>", args.join(", "))?;
        }
        Ok(())
    }
}

/// How an initializer produces its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum InitializerOutput {
    Plain,
    Optional,
    Fallible(TypeRef),
}

/// An associated function that constructs the type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Initializer {
    pub name: String,
    pub params: Vec<Parameter>,
    pub output: InitializerOutput,
    pub is_async: bool,
    pub location: SourceLocation,
}

/// A type whose interface was recovered from source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDeclaration {
    pub name: String,
    /// Module segments below the crate root.
    pub module_path: Vec<String>,
    pub kind: TypeKind,
    pub generics: Generics,
    pub associated_types: Vec<AssociatedType>,
    /// Supertraits of a trait, or analyzed traits a struct implements.
    pub supertypes: Vec<SuperType>,
    /// `Deref` target of a class.
    pub base: Option<SuperType>,
    /// The class also implements `DerefMut`.
    pub base_mutable: bool,
    pub accessibility: Accessibility,
    pub initializers: Vec<Initializer>,
    pub members: Vec<Member>,
    /// Trait items without a default that no mock can provide
    /// (associated consts, generic associated types, static functions).
    pub required_items: Vec<String>,
    /// Traits named in `#[derive(...)]`.
    pub derives: Vec<String>,
    /// False when a field mentions `Rc`, `RefCell`, `Cell` or a raw pointer.
    pub thread_safe: bool,
    pub is_unsafe: bool,
    /// Marked `#[mocksmith::skip]` or `#[mock(skip)]`.
    pub skip: bool,
    /// `use` items of the declaring module, rewritten to absolute paths.
    pub imports: Vec<String>,
    pub location: SourceLocation,
}

impl TypeDeclaration {
    pub fn new(name: impl Into<String>, kind: TypeKind, module_path: Vec<String>) -> Self {
        Self {
            name: name.into(),
            module_path,
            kind,
            generics: Generics::default(),
            associated_types: Vec::new(),
            supertypes: Vec::new(),
            base: None,
            base_mutable: false,
            accessibility: Accessibility::Public,
            initializers: Vec::new(),
            members: Vec::new(),
            required_items: Vec::new(),
            derives: Vec::new(),
            thread_safe: true,
            is_unsafe: false,
            skip: false,
            imports: Vec::new(),
            location: SourceLocation::default(),
        }
    }

    /// `crate::a::b::Name`.
    pub fn full_path(&self) -> String {
        full_path(&self.module_path, &self.name)
    }

    /// `crate::a::b`.
    pub fn module_path_string(&self) -> String {
        module_path_string(&self.module_path)
    }

    pub fn derives(&self, name: &str) -> bool {
        self.derives.iter().any(|derive| derive == name)
    }
}

pub fn module_path_string(module_path: &[String]) -> String {
    std::iter::once("crate")
        .chain(module_path.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("::")
}

pub fn full_path(module_path: &[String], name: &str) -> String {
    format!("{}::{}", module_path_string(module_path), name)
}
