//! Generic parameters of a generated mock.
//!
//! A mock carries the mocked type's own parameters (type parameters gain a
//! `'static` bound so their values can be snapshotted) followed by one type
//! parameter per unbound associated type.

use super::{tokens, EmitResult};
use crate::model::{GenericKind, MockableType, TypeKind};
use proc_macro2::TokenStream;
use quote::quote;

pub(crate) struct MockGenerics {
    declarations: Vec<TokenStream>,
    arguments: Vec<TokenStream>,
    /// Declared parameters only; used to name the real type.
    real_arguments: Vec<TokenStream>,
    phantom: Vec<TokenStream>,
    predicates: Vec<TokenStream>,
}

impl MockGenerics {
    pub(crate) fn of(mockable: &MockableType) -> EmitResult<Self> {
        let declaration = &mockable.declaration;
        let mut generics = Self {
            declarations: Vec::new(),
            arguments: Vec::new(),
            real_arguments: Vec::new(),
            phantom: Vec::new(),
            predicates: Vec::new(),
        };

        let lifetimes = declaration
            .generics
            .params
            .iter()
            .filter(|param| param.kind == GenericKind::Lifetime);
        let others = declaration
            .generics
            .params
            .iter()
            .filter(|param| param.kind != GenericKind::Lifetime);
        for param in lifetimes.chain(others) {
            let name = tokens(&param.name)?;
            match param.kind {
                GenericKind::Lifetime => {
                    generics.declarations.push(tokens(&param.source)?);
                    generics.phantom.push(quote!(&#name ()));
                }
                GenericKind::Type => {
                    let bounds = bounds_with_static(&param.bounds)?;
                    generics.declarations.push(quote!(#name: #(#bounds)+*));
                    generics.phantom.push(name.clone());
                }
                GenericKind::Const => {
                    let source = param.source.split(" = ").next().unwrap_or(&param.source);
                    generics.declarations.push(tokens(source)?);
                }
            }
            generics.arguments.push(name.clone());
            generics.real_arguments.push(name);
        }

        for assoc in &mockable.associated {
            let name = tokens(&assoc.name)?;
            let bounds = bounds_with_static(&assoc.bounds)?;
            generics.declarations.push(quote!(#name: #(#bounds)+*));
            generics.phantom.push(name.clone());
            generics.arguments.push(name);
        }

        for predicate in &declaration.generics.where_predicates {
            if declaration.kind == TypeKind::Protocol && predicate.trim_start().starts_with("Self") {
                continue;
            }
            generics.predicates.push(tokens(predicate)?);
        }
        Ok(generics)
    }

    /// `<'a, T: Clone + 'static>` or nothing.
    pub(crate) fn declaration(&self) -> TokenStream {
        if self.declarations.is_empty() {
            return TokenStream::new();
        }
        let declarations = &self.declarations;
        quote!(<#(#declarations),*>)
    }

    /// `<'a, T>` or nothing.
    pub(crate) fn arguments(&self) -> TokenStream {
        angle(&self.arguments)
    }

    pub(crate) fn real_arguments(&self) -> TokenStream {
        angle(&self.real_arguments)
    }

    pub(crate) fn where_clause(&self, extra: &[TokenStream]) -> TokenStream {
        let predicates: Vec<&TokenStream> = self.predicates.iter().chain(extra).collect();
        if predicates.is_empty() {
            TokenStream::new()
        } else {
            quote!(where #(#predicates),*)
        }
    }

    /// Marker field type tying unused parameters to the mock.
    pub(crate) fn phantom(&self) -> Option<TokenStream> {
        if self.phantom.is_empty() {
            return None;
        }
        let phantom = &self.phantom;
        Some(quote!(::std::marker::PhantomData<fn() -> (#(#phantom,)*)>))
    }
}

fn angle(arguments: &[TokenStream]) -> TokenStream {
    if arguments.is_empty() {
        TokenStream::new()
    } else {
        quote!(<#(#arguments),*>)
    }
}

fn bounds_with_static(bounds: &[String]) -> EmitResult<Vec<TokenStream>> {
    let mut rendered = bounds
        .iter()
        .map(|bound| tokens(bound))
        .collect::<EmitResult<Vec<_>>>()?;
    if !bounds.iter().any(|bound| bound.trim() == "'static") {
        rendered.push(quote!('static));
    }
    Ok(rendered)
}
