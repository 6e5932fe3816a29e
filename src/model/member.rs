use super::types::{Generics, SourceLocation, TypeRef};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Accessor {
    Get,
    Set,
}

/// Member kinds as a tagged variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum MemberKind {
    Method,
    /// Accessor of a public field.
    Property { field: String, accessor: Accessor },
    /// `Index` / `IndexMut` implementation.
    Subscript { accessor: Accessor },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Receiver {
    /// `&self`
    Ref,
    /// `&mut self`
    RefMut,
    /// `self`
    Value,
    /// `mut self`
    ValueMut,
    /// `self: Box<Self>` and friends.
    Typed(TypeRef),
}

impl Receiver {
    pub fn source(&self) -> String {
        match self {
            Self::Ref => "&self".into(),
            Self::RefMut => "&mut self".into(),
            Self::Value => "self".into(),
            Self::ValueMut => "mut self".into(),
            Self::Typed(ty) => format!("self: {}", ty.source),
        }
    }

    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::RefMut | Self::ValueMut)
    }

    pub fn consumes(&self) -> bool {
        matches!(self, Self::Value | Self::ValueMut)
    }
}

/// How an argument can be captured for later matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ComparisonClass {
    /// Owned copy with typed equality.
    Equatable,
    /// `Debug` descriptor only.
    Structural,
    /// Nothing comparable; matched as wildcard.
    #[default]
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
    /// `&mut T`.
    pub inout: bool,
    /// C-variadic `...`.
    pub variadic: bool,
    /// Declared pattern when it is not a plain binding (`mut x`, `_`, `(a, b)`).
    pub pattern: Option<String>,
    /// Filled in by the model builder.
    pub comparison: ComparisonClass,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        let inout = ty.descriptor.starts_with("&mut ");
        Self {
            name: name.into(),
            ty,
            inout,
            variadic: false,
            pattern: None,
            comparison: ComparisonClass::Opaque,
        }
    }

    /// Whether the parameter is passed by reference.
    pub fn is_borrowed(&self) -> bool {
        self.ty.descriptor.starts_with('&')
    }
}

/// Return type classified by how stubs produce it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ReturnShape {
    Unit,
    Plain(TypeRef),
    /// `Option<T>`
    Optional(TypeRef),
    /// `Result<T, E>`; `error` is `None` for one-argument `Result` aliases.
    Fallible { ok: TypeRef, error: Option<TypeRef> },
}

impl ReturnShape {
    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }

    pub fn is_throwing(&self) -> bool {
        matches!(self, Self::Fallible { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Effects {
    pub throwing: bool,
    pub asynchronous: bool,
    pub mutating: bool,
}

impl fmt::Display for Effects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.asynchronous {
            parts.push("async");
        }
        if self.throwing {
            parts.push("throws");
        }
        if self.mutating {
            parts.push("mutating");
        }
        if parts.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

/// Disambiguating identity of a member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Signature {
    pub name: String,
    pub params: Vec<String>,
    pub generic_arity: usize,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.generic_arity > 0 {
            write!(f, "<{}>", self.generic_arity)?;
        }
        write!(f, "({})", self.params.join(", "))
    }
}

/// A method, property accessor or subscript accessor of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    pub receiver: Receiver,
    pub params: Vec<Parameter>,
    /// Declared return type; `None` for `()`.
    pub output: Option<TypeRef>,
    pub returns: ReturnShape,
    pub effects: Effects,
    pub generics: Generics,
    pub is_unsafe: bool,
    /// Body of a trait default method, as tokens.
    pub default_body: Option<String>,
    /// Why the member cannot be mocked.
    pub unsupported: Option<String>,
    /// Return type implements `Default`; filled in by the model builder.
    pub defaultable: bool,
    pub location: SourceLocation,
}

impl Member {
    pub fn signature(&self) -> Signature {
        let name = match &self.kind {
            MemberKind::Method => self.name.clone(),
            MemberKind::Property { field, accessor } => format!("{}.{}", field, accessor_name(*accessor)),
            MemberKind::Subscript { accessor } => format!("subscript.{}", accessor_name(*accessor)),
        };
        Signature {
            name,
            params: self.params.iter().map(|param| param.ty.descriptor.clone()).collect(),
            generic_arity: self.generics.type_arity(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.unsupported.is_none()
    }

    /// Receiver, effects and return type must agree for two members to merge.
    pub fn same_shape(&self, other: &Member) -> bool {
        self.receiver == other.receiver
            && self.effects == other.effects
            && self.output.as_ref().map(|ty| &ty.descriptor)
                == other.output.as_ref().map(|ty| &ty.descriptor)
    }

    pub fn mark_unsupported(&mut self, reason: impl Into<String>) {
        if self.unsupported.is_none() {
            self.unsupported = Some(reason.into());
        }
    }
}

fn accessor_name(accessor: Accessor) -> &'static str {
    match accessor {
        Accessor::Get => "get",
        Accessor::Set => "set",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(source: &str) -> TypeRef {
        TypeRef::from_syn(&syn::parse_str(source).unwrap())
    }

    fn method(name: &str, params: &[&str]) -> Member {
        Member {
            name: name.into(),
            kind: MemberKind::Method,
            receiver: Receiver::Ref,
            params: params
                .iter()
                .enumerate()
                .map(|(index, source)| Parameter::new(format!("p{}", index), ty(source)))
                .collect(),
            output: None,
            returns: ReturnShape::Unit,
            effects: Effects::default(),
            generics: Generics::default(),
            is_unsafe: false,
            default_body: None,
            unsupported: None,
            defaultable: true,
            location: SourceLocation::default(),
        }
    }

    #[test]
    fn test_signature_erases_lifetimes() {
        let signature = method("greet", &["&'a str", "u32"]).signature();
        assert_eq!(signature.to_string(), "greet(&str, u32)");
    }

    #[test]
    fn test_property_signatures_are_namespaced() {
        let mut getter = method("balance", &[]);
        getter.kind = MemberKind::Property {
            field: "balance".into(),
            accessor: Accessor::Get,
        };
        assert_eq!(getter.signature().to_string(), "balance.get()");
        assert_ne!(getter.signature(), method("balance", &[]).signature());
    }

    #[test]
    fn test_inout_detected_from_type() {
        let param = Parameter::new("buffer", ty("&mut Vec<u8>"));
        assert!(param.inout);
        assert!(param.is_borrowed());
    }
}
