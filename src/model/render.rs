//! Canonical rendering of `syn` types.
//!
//! Signatures compare parameter types textually, so the rendering must be
//! stable and independent of how the source was spaced. Lifetimes can be
//! erased so `&'a str` and `&str` describe the same parameter.

use quote::ToTokens;
use syn::{
    GenericArgument, PathArguments, ReturnType, Type, TypeParamBound, TypePath,
};

/// Render a type, optionally dropping every lifetime.
pub fn render_type(ty: &Type, erase_lifetimes: bool) -> String {
    let mut out = String::new();
    write_type(&mut out, ty, erase_lifetimes);
    out
}

/// Render a path such as `std::collections::HashMap<K, V>`.
pub fn render_path(path: &syn::Path, erase_lifetimes: bool) -> String {
    let mut out = String::new();
    write_path(&mut out, path, erase_lifetimes);
    out
}

pub fn render_bound(bound: &TypeParamBound, erase_lifetimes: bool) -> String {
    let mut out = String::new();
    write_bound(&mut out, bound, erase_lifetimes);
    out
}

/// Compact rendering of arbitrary tokens (array lengths, const arguments).
pub fn render_tokens<T: ToTokens>(node: &T) -> String {
    node.to_token_stream()
        .to_string()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("")
}

fn write_type(out: &mut String, ty: &Type, erase: bool) {
    match ty {
        Type::Path(type_path) => write_type_path(out, type_path, erase),
        Type::Reference(reference) => {
            out.push('&');
            if let Some(lifetime) = reference.lifetime.as_ref().filter(|_| !erase) {
                out.push_str(&format!("'{} ", lifetime.ident));
            }
            if reference.mutability.is_some() {
                out.push_str("mut ");
            }
            write_type(out, &reference.elem, erase);
        }
        Type::Slice(slice) => {
            out.push('[');
            write_type(out, &slice.elem, erase);
            out.push(']');
        }
        Type::Array(array) => {
            out.push('[');
            write_type(out, &array.elem, erase);
            out.push_str("; ");
            out.push_str(&render_tokens(&array.len));
            out.push(']');
        }
        Type::Tuple(tuple) => {
            out.push('(');
            for (index, elem) in tuple.elems.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_type(out, elem, erase);
            }
            if tuple.elems.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        Type::Ptr(pointer) => {
            out.push_str(if pointer.mutability.is_some() {
                "*mut "
            } else {
                "*const "
            });
            write_type(out, &pointer.elem, erase);
        }
        Type::TraitObject(object) => {
            out.push_str("dyn ");
            write_bounds(out, object.bounds.iter(), erase);
        }
        Type::ImplTrait(implementation) => {
            out.push_str("impl ");
            write_bounds(out, implementation.bounds.iter(), erase);
        }
        Type::Paren(paren) => {
            out.push('(');
            write_type(out, &paren.elem, erase);
            out.push(')');
        }
        Type::Group(group) => write_type(out, &group.elem, erase),
        Type::Never(_) => out.push('!'),
        Type::Infer(_) => out.push('_'),
        Type::BareFn(function) => {
            if function.unsafety.is_some() {
                out.push_str("unsafe ");
            }
            out.push_str("fn(");
            for (index, input) in function.inputs.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_type(out, &input.ty, erase);
            }
            out.push(')');
            write_return(out, &function.output, erase);
        }
        other => out.push_str(&render_tokens(other)),
    }
}

fn write_type_path(out: &mut String, type_path: &TypePath, erase: bool) {
    match &type_path.qself {
        Some(qself) => {
            out.push('<');
            write_type(out, &qself.ty, erase);
            let segments: Vec<_> = type_path.path.segments.iter().collect();
            if qself.position > 0 {
                out.push_str(" as ");
                for (index, segment) in segments.iter().take(qself.position).enumerate() {
                    if index > 0 {
                        out.push_str("::");
                    }
                    write_segment(out, segment, erase);
                }
            }
            out.push('>');
            for segment in segments.iter().skip(qself.position) {
                out.push_str("::");
                write_segment(out, segment, erase);
            }
        }
        None => write_path(out, &type_path.path, erase),
    }
}

fn write_path(out: &mut String, path: &syn::Path, erase: bool) {
    if path.leading_colon.is_some() {
        out.push_str("::");
    }
    for (index, segment) in path.segments.iter().enumerate() {
        if index > 0 {
            out.push_str("::");
        }
        write_segment(out, segment, erase);
    }
}

fn write_segment(out: &mut String, segment: &syn::PathSegment, erase: bool) {
    out.push_str(&segment.ident.to_string());
    match &segment.arguments {
        PathArguments::None => {}
        PathArguments::AngleBracketed(arguments) => {
            let rendered: Vec<String> = arguments
                .args
                .iter()
                .filter_map(|argument| render_generic_argument(argument, erase))
                .collect();
            if !rendered.is_empty() {
                out.push('<');
                out.push_str(&rendered.join(", "));
                out.push('>');
            }
        }
        PathArguments::Parenthesized(arguments) => {
            out.push('(');
            for (index, input) in arguments.inputs.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_type(out, input, erase);
            }
            out.push(')');
            write_return(out, &arguments.output, erase);
        }
    }
}

fn render_generic_argument(argument: &GenericArgument, erase: bool) -> Option<String> {
    match argument {
        GenericArgument::Lifetime(lifetime) => {
            (!erase).then(|| format!("'{}", lifetime.ident))
        }
        GenericArgument::Type(ty) => Some(render_type(ty, erase)),
        GenericArgument::AssocType(assoc) => {
            Some(format!("{} = {}", assoc.ident, render_type(&assoc.ty, erase)))
        }
        GenericArgument::Constraint(constraint) => {
            let mut out = format!("{}: ", constraint.ident);
            write_bounds(&mut out, constraint.bounds.iter(), erase);
            Some(out)
        }
        other => Some(render_tokens(other)),
    }
}

fn write_return(out: &mut String, output: &ReturnType, erase: bool) {
    if let ReturnType::Type(_, ty) = output {
        out.push_str(" -> ");
        write_type(out, ty, erase);
    }
}

fn write_bounds<'a>(
    out: &mut String,
    bounds: impl Iterator<Item = &'a TypeParamBound>,
    erase: bool,
) {
    let rendered: Vec<String> = bounds
        .filter(|bound| !(erase && matches!(bound, TypeParamBound::Lifetime(_))))
        .map(|bound| render_bound(bound, erase))
        .collect();
    out.push_str(&rendered.join(" + "));
}

fn write_bound(out: &mut String, bound: &TypeParamBound, erase: bool) {
    match bound {
        TypeParamBound::Trait(trait_bound) => {
            if matches!(trait_bound.modifier, syn::TraitBoundModifier::Maybe(_)) {
                out.push('?');
            }
            write_path(out, &trait_bound.path, erase);
        }
        TypeParamBound::Lifetime(lifetime) => out.push_str(&format!("'{}", lifetime.ident)),
        other => out.push_str(&render_tokens(other)),
    }
}
