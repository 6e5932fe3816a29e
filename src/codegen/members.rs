//! Forwarding members: record, answer, then value, call-through or default.

use super::{ident, tokens, EmitResult};
use crate::model::{
    Accessor, ComparisonClass, FlatMember, Member, MemberKind, Parameter, Receiver, ReturnShape,
};
use proc_macro2::{Ident, TokenStream};
use quote::{quote, ToTokens};

/// Where a member is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Site {
    /// Inherent method of the mock.
    Inherent,
    /// Inside `impl Trait for Mock`; the index names the conformance.
    Conformance(usize),
}

/// What the generated members refer to.
pub(crate) struct MemberContext<'a> {
    pub runtime: &'a TokenStream,
    /// `crate::store::Store<T>` for struct mocks.
    pub real: Option<&'a TokenStream>,
    /// Trait reference per conformance index, as written in impl headers.
    pub conformances: &'a [TokenStream],
}

pub(crate) fn render_member(
    cx: &MemberContext<'_>,
    flat: &FlatMember,
    constant: &Ident,
    site: Site,
) -> EmitResult<TokenStream> {
    let member = &flat.member;
    let runtime = cx.runtime;
    let name = ident(&member.name)?;
    let visibility = match site {
        Site::Inherent => quote!(pub),
        Site::Conformance(_) => TokenStream::new(),
    };
    let unsafety = member.is_unsafe.then(|| quote!(unsafe));
    let asyncness = member.effects.asynchronous.then(|| quote!(async));

    let generic_params = member
        .generics
        .params
        .iter()
        .map(|param| tokens(&param.source))
        .collect::<EmitResult<Vec<_>>>()?;
    let generics = if generic_params.is_empty() {
        TokenStream::new()
    } else {
        quote!(<#(#generic_params),*>)
    };
    let predicates = member
        .generics
        .where_predicates
        .iter()
        .map(|predicate| tokens(predicate))
        .collect::<EmitResult<Vec<_>>>()?;
    let where_clause = if predicates.is_empty() {
        TokenStream::new()
    } else {
        quote!(where #(#predicates),*)
    };

    let receiver = tokens(&member.receiver.source())?;
    let mut inputs = vec![receiver];
    let mut names = Vec::new();
    let mut snapshots = Vec::new();
    for param in &member.params {
        let param_name = ident(&param.name)?;
        let ty = tokens(&param.ty.source)?;
        inputs.push(quote!(#param_name: #ty));
        snapshots.push(snapshot(runtime, param, &param_name));
        names.push(param_name);
    }

    let output_type = match &member.output {
        Some(output) => tokens(&output.source)?,
        None => quote!(()),
    };
    let output = member.output.as_ref().map(|_| quote!(-> #output_type));
    let answer = match member.returns {
        ReturnShape::Unit | ReturnShape::Plain(_) => quote!(answer),
        ReturnShape::Optional(_) => quote!(answer_optional),
        ReturnShape::Fallible { .. } => quote!(answer_fallible),
    };

    let call_through = match site {
        Site::Conformance(index) if cx.real.is_none() => default_body(cx, flat, index)?,
        site => forward_to_real(cx, flat, site, &names)?,
    };
    let unstubbed = unstubbed(member);

    Ok(quote! {
        #visibility #unsafety #asyncness fn #name #generics (#(#inputs),*) #output #where_clause {
            let __invocation = self.__mocksmith.record(Self::#constant, vec![#(#snapshots),*]);
            let __answer: #runtime::Answer<#output_type> = self.__mocksmith.#answer(&__invocation);
            match __answer {
                #runtime::Answer::Value(__value) => __value,
                #runtime::Answer::CallThrough => #call_through,
                #runtime::Answer::Unstubbed => #unstubbed,
            }
        }
    })
}

/// Argument snapshot according to the parameter's comparison class.
fn snapshot(runtime: &TokenStream, param: &Parameter, name: &Ident) -> TokenStream {
    match param.comparison {
        ComparisonClass::Equatable if param.is_borrowed() => {
            quote!(#runtime::Arg::value(::std::borrow::ToOwned::to_owned(&*#name)))
        }
        ComparisonClass::Equatable => {
            quote!(#runtime::Arg::value(::std::clone::Clone::clone(&#name)))
        }
        ComparisonClass::Structural => quote!(#runtime::Arg::structural(&#name)),
        ComparisonClass::Opaque => quote!(#runtime::Arg::opaque(&#name)),
    }
}

fn raise_no_real(runtime: &TokenStream) -> TokenStream {
    quote!(self.__mocksmith.raise(&__invocation, #runtime::UnmatchedReason::NoRealImplementation))
}

/// Run the conformance's default body, rebinding declared patterns first.
/// The body is emitted as the arm's own block.
fn default_body(cx: &MemberContext<'_>, flat: &FlatMember, index: usize) -> EmitResult<TokenStream> {
    let Some(body) = flat.default_body_for(index) else {
        return Ok(raise_no_real(cx.runtime));
    };
    let body: syn::Block =
        syn::parse_str(body).map_err(|error| format!("default body does not parse: {}", error))?;
    let rebinds = flat
        .member
        .params
        .iter()
        .filter_map(|param| param.pattern.as_ref().map(|pattern| (pattern, &param.name)))
        .map(|(pattern, name)| {
            let pattern = tokens(pattern)?;
            let name = ident(name)?;
            Ok(quote!(let #pattern = #name;))
        })
        .collect::<EmitResult<Vec<_>>>()?;
    if rebinds.is_empty() {
        return Ok(body.into_token_stream());
    }
    // Rebinds share the body's scope so no nested block is emitted.
    let statements = &body.stmts;
    Ok(quote!({ #(#rebinds)* #(#statements)* }))
}

fn turbofish(member: &Member) -> EmitResult<TokenStream> {
    let params = member
        .generics
        .params
        .iter()
        .filter(|param| param.kind != crate::model::GenericKind::Lifetime)
        .map(|param| tokens(&param.name))
        .collect::<EmitResult<Vec<_>>>()?;
    Ok(if params.is_empty() {
        TokenStream::new()
    } else {
        quote!(::<#(#params),*>)
    })
}

/// Forward to the wrapped real instance of a struct mock.
fn forward_to_real(
    cx: &MemberContext<'_>,
    flat: &FlatMember,
    site: Site,
    names: &[Ident],
) -> EmitResult<TokenStream> {
    let runtime = cx.runtime;
    let Some(real) = cx.real else {
        return Ok(raise_no_real(runtime));
    };
    let member = &flat.member;
    let mutable_path = flat.through_deref.unwrap_or(true);
    let missing = raise_no_real(runtime);

    let with = |call: TokenStream| {
        quote!(self.__mocksmith_real.with(|__real| #call).unwrap_or_else(|| #missing))
    };

    match &member.kind {
        MemberKind::Property { field, accessor } => {
            let field = ident(field)?;
            Ok(match accessor {
                Accessor::Get if flat.output_clonable => {
                    with(quote!(::std::clone::Clone::clone(&__real.#field)))
                }
                Accessor::Set if mutable_path => with(quote!(__real.#field = value)),
                _ => missing.clone(),
            })
        }
        MemberKind::Subscript { accessor } => Ok(match accessor {
            Accessor::Get if flat.output_clonable => {
                with(quote!(::std::clone::Clone::clone(&__real[index])))
            }
            Accessor::Set if mutable_path => with(quote!(__real[index] = value)),
            _ => missing.clone(),
        }),
        MemberKind::Method => {
            let name = ident(&member.name)?;
            let turbofish = turbofish(member)?;
            let receiver = &member.receiver;
            let inherited = flat.through_deref.is_some();
            if matches!(receiver, Receiver::Typed(_))
                || (inherited && receiver.consumes())
                || (!mutable_path && receiver.is_mutating())
            {
                return Ok(missing.clone());
            }

            // Trait members go through the trait so inherent methods of the
            // same name are not picked instead.
            let call = |target: TokenStream| match site {
                Site::Conformance(index) => {
                    let conformance = &cx.conformances[index];
                    let target = match receiver {
                        Receiver::Ref => quote!(&*#target),
                        Receiver::RefMut => quote!(&mut *#target),
                        _ => target,
                    };
                    quote!(<#real as #conformance>::#name #turbofish (#target, #(#names),*))
                }
                Site::Inherent => quote!(#target.#name #turbofish (#(#names),*)),
            };

            if receiver.consumes() {
                let call = call(quote!(__real));
                let call = if member.effects.asynchronous {
                    quote!(#call.await)
                } else {
                    call
                };
                return Ok(quote! {
                    match self.__mocksmith_real.take() {
                        Some(__real) => #call,
                        None => #missing,
                    }
                });
            }

            if member.effects.asynchronous {
                let call = call(quote!((&mut __real)));
                return Ok(quote! {
                    match self.__mocksmith_real.take() {
                        Some(mut __real) => {
                            let __value = #call.await;
                            self.__mocksmith_real.restore(__real);
                            __value
                        }
                        None => #missing,
                    }
                });
            }

            Ok(with(call(quote!(__real))))
        }
    }
}

/// Unit members never need a stub; the rest follow the instance's policy.
fn unstubbed(member: &Member) -> TokenStream {
    let raise = quote!(self.__mocksmith.raise_unstubbed(&__invocation));
    match &member.returns {
        ReturnShape::Unit => quote!({}),
        ReturnShape::Optional(_) => quote! {
            if self.__mocksmith.type_defaults() { None } else { #raise }
        },
        ReturnShape::Plain(_) if member.defaultable => quote! {
            if self.__mocksmith.type_defaults() { ::std::default::Default::default() } else { #raise }
        },
        ReturnShape::Plain(_) | ReturnShape::Fallible { .. } => raise,
    }
}
