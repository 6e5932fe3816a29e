//! Flattened, ready-to-emit view of a declaration.

use super::member::{Member, Signature};
use super::types::{Initializer, TypeDeclaration, TypeKind, TypeRef};
use crate::diagnostics::Diagnostic;
use serde::Serialize;

/// Where a conformance comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConformanceKind {
    /// A trait found in the analyzed sources; the mock implements its members.
    Declared,
    /// `Clone`, `Debug` or `Default`, which every mock provides itself.
    Provided,
}

/// A trait the mock implements, with generic arguments already substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conformance {
    /// Path usable from generated code (`crate::store::Repository`).
    pub path: String,
    pub name: String,
    pub kind: ConformanceKind,
    /// Lifetime arguments, which always precede `args`.
    pub lifetimes: Vec<String>,
    pub args: Vec<TypeRef>,
    /// Associated types and what the mock sets them to.
    pub associated: Vec<(String, TypeRef)>,
    /// Where-clause predicates of the trait after substitution.
    pub where_predicates: Vec<String>,
    /// Full path of the declaring trait.
    pub declared_by: String,
    /// Associated functions returning `Self`; the mock answers with a fresh mock.
    pub initializers: Vec<Initializer>,
    /// Required members that cannot be mocked; the impl cannot be written.
    pub unimplementable: Vec<String>,
}

impl Conformance {
    /// `path<args>` as written in an impl header.
    pub fn reference(&self) -> String {
        let args: Vec<&str> = self
            .lifetimes
            .iter()
            .map(String::as_str)
            .chain(self.args.iter().map(|arg| arg.source.as_str()))
            .collect();
        if args.is_empty() {
            self.path.clone()
        } else {
            format!("{}<{}>", self.path, args.join(", "))
        }
    }
}

/// An associated type threaded through the mock as a generic parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AssociatedTypeParam {
    pub name: String,
    pub bounds: Vec<String>,
}

/// A member of the flattened closure and where the mock must implement it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatMember {
    pub member: Member,
    /// Full path of the declaration that contributed the winning member.
    pub declared_by: String,
    /// Emitted as an inherent method of the mock.
    pub inherent: bool,
    /// Indices into [`MockableType::conformances`] whose impl carries this member.
    pub conformances: Vec<usize>,
    /// Depth of the declarer in the inheritance walk; 0 is the mocked type.
    pub depth: usize,
    /// Default body of the member as declared by each conformance.
    pub default_bodies: Vec<(usize, String)>,
    /// `Some(mutable)` when inherited through a `Deref` chain; `mutable`
    /// tells whether every link also implements `DerefMut`.
    pub through_deref: Option<bool>,
    /// The declared output can be cloned out of a borrowed real instance.
    pub output_clonable: bool,
}

impl FlatMember {
    pub fn signature(&self) -> Signature {
        self.member.signature()
    }

    pub fn selector(&self) -> String {
        self.signature().to_string()
    }

    pub fn default_body_for(&self, conformance: usize) -> Option<&str> {
        self.default_bodies
            .iter()
            .find(|(index, _)| *index == conformance)
            .map(|(_, body)| body.as_str())
    }
}

/// A declaration plus every member it inherits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MockableType {
    pub declaration: TypeDeclaration,
    pub associated: Vec<AssociatedTypeParam>,
    pub conformances: Vec<Conformance>,
    /// Supported members in flattened order.
    pub members: Vec<FlatMember>,
    /// Members excluded from the mock, with the reason.
    pub excluded: Vec<(String, String)>,
    /// Non-fatal findings of the flattening walk.
    pub warnings: Vec<Diagnostic>,
}

impl MockableType {
    pub fn new(declaration: TypeDeclaration) -> Self {
        Self {
            declaration,
            associated: Vec::new(),
            conformances: Vec::new(),
            members: Vec::new(),
            excluded: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    pub fn full_path(&self) -> String {
        self.declaration.full_path()
    }

    pub fn is_protocol(&self) -> bool {
        self.declaration.kind == TypeKind::Protocol
    }

    /// Mocks of structs and enums wrap an optional real value.
    pub fn wraps_real(&self) -> bool {
        !self.is_protocol()
    }

    pub fn find(&self, selector: &str) -> Option<&FlatMember> {
        self.members.iter().find(|member| member.selector() == selector)
    }

    pub fn selectors(&self) -> Vec<String> {
        self.members.iter().map(FlatMember::selector).collect()
    }

    pub fn declared_conformances(&self) -> impl Iterator<Item = (usize, &Conformance)> {
        self.conformances
            .iter()
            .enumerate()
            .filter(|(_, conformance)| conformance.kind == ConformanceKind::Declared)
    }
}
