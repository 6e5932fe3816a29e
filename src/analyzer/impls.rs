//! Facts recovered from `impl` blocks and how they attach to declarations.
//!
//! An `impl` may live in a different file than the type it extends, so the
//! analyzer records each block as [`ImplFacts`] and attaches it either right
//! away (same file) or during the symbol table merge.

use super::signature::{convert_generics, convert_initializer, convert_method, return_shape};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::model::{
    Accessibility, Accessor, Effects, Initializer, Member, MemberKind, Parameter, Receiver,
    ReturnShape, SourceLocation, SuperType, TypeDeclaration, TypeKind, TypeRef,
};
use quote::ToTokens;
use serde::Serialize;
use std::path::Path;
use syn::{ImplItem, ItemImpl, Type};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ImplKind {
    Inherent {
        members: Vec<Member>,
        initializers: Vec<Initializer>,
        /// Where predicates of the impl header.
        bounds: Vec<String>,
    },
    /// `impl Deref for T { type Target = Base; }`
    Deref { target: SuperType },
    DerefMut,
    /// `Index<K>` (getter) or `IndexMut<K>` (setter).
    Subscript {
        key: TypeRef,
        output: Option<TypeRef>,
        mutable: bool,
    },
    Conformance(SuperType),
}

/// One `impl` block, keyed by the path of its self type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImplFacts {
    /// Self type path as written, without generic arguments.
    pub self_path: String,
    pub self_name: String,
    /// Module the impl appears in.
    pub module_path: Vec<String>,
    pub kind: ImplKind,
    pub location: SourceLocation,
}

impl ImplFacts {
    /// IndexMut needs the Index output, so setters attach last.
    pub(crate) fn attach_order(&self) -> u8 {
        match &self.kind {
            ImplKind::Subscript { mutable: true, .. } => 2,
            ImplKind::Deref { .. } => 0,
            _ => 1,
        }
    }
}

fn self_path(ty: &Type) -> Option<(String, String)> {
    let Type::Path(path) = ty else {
        return None;
    };
    if path.qself.is_some() {
        return None;
    }
    let mut bare = path.path.clone();
    let last = bare.segments.last_mut()?;
    last.arguments = syn::PathArguments::None;
    let name = last.ident.to_string();
    Some((crate::model::render_path(&bare, false), name))
}

fn is_public(visibility: &syn::Visibility) -> bool {
    Accessibility::from_syn(visibility).is_visible_outside_module()
}

fn assoc_type<'a>(item: &'a ItemImpl, name: &str) -> Option<&'a Type> {
    item.items.iter().find_map(|impl_item| match impl_item {
        ImplItem::Type(assoc) if assoc.ident == name => Some(&assoc.ty),
        _ => None,
    })
}

/// Collect the facts of one `impl` block.
pub(crate) fn collect_impl(
    file: &Path,
    module_path: &[String],
    item: &ItemImpl,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ImplFacts> {
    if item.trait_.as_ref().is_some_and(|(negative, _, _)| negative.is_some()) {
        return None;
    }
    let (self_path, self_name) = self_path(&item.self_ty)?;
    let location = SourceLocation::from_span(file, item.impl_token.span);

    let kind = match &item.trait_ {
        None => collect_inherent(file, &self_name, item, diagnostics),
        Some((_, trait_path, _)) => {
            let super_type = SuperType::from_path(trait_path);
            match super_type.name.as_str() {
                "Deref" => ImplKind::Deref {
                    target: SuperType::from_path(&target_path(assoc_type(item, "Target")?)?),
                },
                "DerefMut" => ImplKind::DerefMut,
                "Index" | "IndexMut" => {
                    let key = super_type.args.first()?.clone();
                    let mutable = super_type.name == "IndexMut";
                    ImplKind::Subscript {
                        key,
                        output: assoc_type(item, "Output").map(TypeRef::from_syn),
                        mutable,
                    }
                }
                _ => {
                    let mut conformance = super_type;
                    for impl_item in &item.items {
                        if let ImplItem::Type(assoc) = impl_item {
                            if !conformance
                                .bindings
                                .iter()
                                .any(|(name, _)| *name == assoc.ident.to_string())
                            {
                                conformance
                                    .bindings
                                    .push((assoc.ident.to_string(), TypeRef::from_syn(&assoc.ty)));
                            }
                        }
                    }
                    ImplKind::Conformance(conformance)
                }
            }
        }
    };

    Some(ImplFacts {
        self_path,
        self_name,
        module_path: module_path.to_vec(),
        kind,
        location,
    })
}

fn target_path(ty: &Type) -> Option<syn::Path> {
    match ty {
        Type::Path(path) if path.qself.is_none() => Some(path.path.clone()),
        _ => None,
    }
}

fn collect_inherent(
    file: &Path,
    self_name: &str,
    item: &ItemImpl,
    diagnostics: &mut Vec<Diagnostic>,
) -> ImplKind {
    let mut members = Vec::new();
    let mut initializers = Vec::new();
    for impl_item in &item.items {
        let ImplItem::Fn(function) = impl_item else {
            continue;
        };
        if !is_public(&function.vis) || super::items::has_skip_attribute(&function.attrs) {
            continue;
        }
        if let Some(member) = convert_method(file, &function.sig, None) {
            members.push(member);
        } else if let Some(initializer) = convert_initializer(file, &function.sig, self_name) {
            initializers.push(initializer);
        } else {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::UnsupportedDeclaration,
                    format!(
                        "associated function `{}` is not an initializer and cannot be mocked",
                        function.sig.ident
                    ),
                )
                .at(&SourceLocation::from_span(file, function.sig.ident.span()))
                .for_type(self_name),
            );
        }
    }
    let generics = convert_generics(&item.generics);
    let mut bounds: Vec<String> = generics
        .params
        .iter()
        .filter(|param| !param.bounds.is_empty())
        .map(|param| format!("{} : {}", param.name, param.bounds.join(" + ")))
        .collect();
    bounds.extend(generics.where_predicates);
    ImplKind::Inherent {
        members,
        initializers,
        bounds,
    }
}

fn subscript_getter(key: &TypeRef, output: &TypeRef, location: &SourceLocation) -> Member {
    let (_, returns) = return_shape(&syn::ReturnType::Type(
        Default::default(),
        Box::new(output.parse().unwrap_or_else(|_| syn::parse_quote!(()))),
    ));
    Member {
        name: "subscript".into(),
        kind: MemberKind::Subscript {
            accessor: Accessor::Get,
        },
        receiver: Receiver::Ref,
        params: vec![Parameter::new("index", key.clone())],
        output: Some(output.clone()),
        effects: Effects {
            throwing: returns.is_throwing(),
            ..Effects::default()
        },
        returns,
        generics: Default::default(),
        is_unsafe: false,
        default_body: None,
        unsupported: None,
        defaultable: false,
        location: location.clone(),
    }
}

fn subscript_setter(key: &TypeRef, output: &TypeRef, location: &SourceLocation) -> Member {
    Member {
        name: "set_subscript".into(),
        kind: MemberKind::Subscript {
            accessor: Accessor::Set,
        },
        receiver: Receiver::RefMut,
        params: vec![
            Parameter::new("index", key.clone()),
            Parameter::new("value", output.clone()),
        ],
        output: None,
        returns: ReturnShape::Unit,
        effects: Effects {
            mutating: true,
            ..Effects::default()
        },
        generics: Default::default(),
        is_unsafe: false,
        default_body: None,
        unsupported: None,
        defaultable: false,
        location: location.clone(),
    }
}

/// Merge an impl block into its declaration.
pub(crate) fn attach(declaration: &mut TypeDeclaration, facts: &ImplFacts) {
    match &facts.kind {
        ImplKind::Inherent {
            members,
            initializers,
            bounds,
        } => {
            declaration.members.extend(members.iter().cloned());
            declaration.initializers.extend(initializers.iter().cloned());
            for bound in bounds {
                if !declaration.generics.where_predicates.contains(bound) {
                    declaration.generics.where_predicates.push(bound.clone());
                }
            }
        }
        ImplKind::Deref { target } => {
            declaration.base = Some(target.clone());
            if declaration.kind == TypeKind::ValueType {
                declaration.kind = TypeKind::Class;
            }
        }
        ImplKind::DerefMut => declaration.base_mutable = true,
        ImplKind::Subscript {
            key,
            output: Some(output),
            mutable: false,
        } => declaration
            .members
            .push(subscript_getter(key, output, &facts.location)),
        ImplKind::Subscript {
            key, mutable: true, ..
        } => {
            let output = declaration.members.iter().find_map(|member| match member.kind {
                MemberKind::Subscript {
                    accessor: Accessor::Get,
                } if member.params.first().map(|param| &param.ty.descriptor)
                    == Some(&key.descriptor) =>
                {
                    member.output.clone()
                }
                _ => None,
            });
            if let Some(output) = output {
                declaration
                    .members
                    .push(subscript_setter(key, &output, &facts.location));
            }
        }
        ImplKind::Subscript { .. } => {}
        ImplKind::Conformance(conformance) => {
            if !declaration
                .supertypes
                .iter()
                .any(|existing| existing.path == conformance.path && existing.args == conformance.args)
            {
                declaration.supertypes.push(conformance.clone());
            }
        }
    }
}

/// Source of the impl's self type for log messages.
pub(crate) fn describe(item: &ItemImpl) -> String {
    item.self_ty.to_token_stream().to_string()
}
