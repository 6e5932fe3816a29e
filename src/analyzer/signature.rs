//! Conversion of `syn` signatures into model members.

use crate::model::{
    render_bound, Effects, GenericKind, GenericParam, Generics, Initializer, InitializerOutput,
    Member, MemberKind, Parameter, Receiver, ReturnShape, SourceLocation, TypeRef,
};
use quote::ToTokens;
use std::path::Path;
use syn::visit::Visit;
use syn::{FnArg, GenericArgument, Pat, PathArguments, ReturnType, Type};

pub(crate) fn convert_generics(generics: &syn::Generics) -> Generics {
    let params = generics
        .params
        .iter()
        .map(|param| match param {
            syn::GenericParam::Type(type_param) => GenericParam {
                kind: GenericKind::Type,
                name: type_param.ident.to_string(),
                bounds: type_param
                    .bounds
                    .iter()
                    .map(|bound| render_bound(bound, false))
                    .collect(),
                source: param.to_token_stream().to_string(),
                default: type_param.default.as_ref().map(TypeRef::from_syn),
            },
            syn::GenericParam::Lifetime(lifetime) => GenericParam {
                kind: GenericKind::Lifetime,
                name: format!("'{}", lifetime.lifetime.ident),
                bounds: lifetime
                    .bounds
                    .iter()
                    .map(|bound| format!("'{}", bound.ident))
                    .collect(),
                source: param.to_token_stream().to_string(),
                default: None,
            },
            syn::GenericParam::Const(constant) => GenericParam {
                kind: GenericKind::Const,
                name: constant.ident.to_string(),
                bounds: Vec::new(),
                source: param.to_token_stream().to_string(),
                default: None,
            },
        })
        .collect();
    let where_predicates = generics
        .where_clause
        .iter()
        .flat_map(|clause| clause.predicates.iter())
        .map(|predicate| predicate.to_token_stream().to_string())
        .collect();
    Generics {
        params,
        where_predicates,
    }
}

fn convert_receiver(receiver: &syn::Receiver) -> Receiver {
    if receiver.colon_token.is_some() {
        return Receiver::Typed(TypeRef::from_syn(&receiver.ty));
    }
    match (&receiver.reference, &receiver.mutability) {
        (Some(_), Some(_)) => Receiver::RefMut,
        (Some(_), None) => Receiver::Ref,
        (None, Some(_)) => Receiver::ValueMut,
        (None, None) => Receiver::Value,
    }
}

pub(crate) fn convert_params<'a>(inputs: impl Iterator<Item = &'a FnArg>) -> Vec<Parameter> {
    inputs
        .filter_map(|input| match input {
            FnArg::Typed(typed) => Some(typed),
            FnArg::Receiver(_) => None,
        })
        .enumerate()
        .map(|(index, typed)| {
            let (name, pattern) = match &*typed.pat {
                Pat::Ident(ident)
                    if ident.by_ref.is_none()
                        && ident.mutability.is_none()
                        && ident.subpat.is_none() =>
                {
                    (ident.ident.to_string(), None)
                }
                Pat::Ident(ident) if ident.subpat.is_none() => (
                    ident.ident.to_string(),
                    Some(typed.pat.to_token_stream().to_string()),
                ),
                other => (
                    format!("arg{}", index),
                    Some(other.to_token_stream().to_string()),
                ),
            };
            let mut parameter = Parameter::new(name, TypeRef::from_syn(&typed.ty));
            parameter.pattern = pattern;
            parameter
        })
        .collect()
}

fn single_type_argument(arguments: &PathArguments) -> Vec<&Type> {
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

/// Classify a declared return type.
pub(crate) fn return_shape(output: &ReturnType) -> (Option<TypeRef>, ReturnShape) {
    let ty = match output {
        ReturnType::Default => return (None, ReturnShape::Unit),
        ReturnType::Type(_, ty) => ty,
    };
    if let Type::Tuple(tuple) = &**ty {
        if tuple.elems.is_empty() {
            return (None, ReturnShape::Unit);
        }
    }
    let declared = TypeRef::from_syn(ty);
    let shape = match &**ty {
        Type::Path(path) if path.qself.is_none() => match path.path.segments.last() {
            Some(last) => {
                let args = single_type_argument(&last.arguments);
                match (last.ident.to_string().as_str(), args.as_slice()) {
                    ("Option", [inner]) => ReturnShape::Optional(TypeRef::from_syn(inner)),
                    ("Result", [ok]) => ReturnShape::Fallible {
                        ok: TypeRef::from_syn(ok),
                        error: None,
                    },
                    ("Result", [ok, error]) => ReturnShape::Fallible {
                        ok: TypeRef::from_syn(ok),
                        error: Some(TypeRef::from_syn(error)),
                    },
                    _ => ReturnShape::Plain(declared.clone()),
                }
            }
            None => ReturnShape::Plain(declared.clone()),
        },
        _ => ReturnShape::Plain(declared.clone()),
    };
    (Some(declared), shape)
}

/// Finds what makes a return type impossible to produce from a stub.
#[derive(Default)]
struct ReturnScan<'a> {
    non_static_generics: Vec<&'a str>,
    borrowed: bool,
    opaque: bool,
    never: bool,
    generic: Option<String>,
}

impl<'ast> Visit<'ast> for ReturnScan<'_> {
    fn visit_type_reference(&mut self, reference: &'ast syn::TypeReference) {
        match &reference.lifetime {
            Some(lifetime) if lifetime.ident == "static" => {}
            _ => self.borrowed = true,
        }
        syn::visit::visit_type(self, &reference.elem);
    }

    fn visit_lifetime(&mut self, lifetime: &'ast syn::Lifetime) {
        if lifetime.ident != "static" {
            self.borrowed = true;
        }
    }

    fn visit_type_impl_trait(&mut self, _: &'ast syn::TypeImplTrait) {
        self.opaque = true;
    }

    fn visit_type_never(&mut self, _: &'ast syn::TypeNever) {
        self.never = true;
    }

    fn visit_type_path(&mut self, path: &'ast syn::TypePath) {
        if path.qself.is_none() && path.path.segments.len() == 1 {
            let ident = path.path.segments[0].ident.to_string();
            if self.non_static_generics.contains(&ident.as_str()) {
                self.generic = Some(ident);
            }
        }
        syn::visit::visit_type_path(self, path);
    }
}

/// Why a return type cannot be mocked, if it cannot.
pub(crate) fn unsupported_return(output: &ReturnType, generics: &Generics) -> Option<String> {
    let ReturnType::Type(_, ty) = output else {
        return None;
    };
    let names: Vec<String> = generics
        .type_params()
        .filter(|param| {
            !generics
                .bounds_of(&param.name)
                .iter()
                .any(|bound| bound.trim() == "'static")
        })
        .map(|param| param.name.clone())
        .collect();
    let mut scan = ReturnScan {
        non_static_generics: names.iter().map(String::as_str).collect(),
        ..ReturnScan::default()
    };
    scan.visit_type(ty);
    if scan.opaque {
        Some("returns `impl Trait`".to_string())
    } else if scan.borrowed {
        Some("returns a borrowed value".to_string())
    } else if scan.never {
        Some("returns `!`".to_string())
    } else {
        scan.generic.map(|name| {
            format!(
                "returns generic parameter `{}` without a `'static` bound",
                name
            )
        })
    }
}

/// Convert a method signature. Returns `None` for associated functions.
pub(crate) fn convert_method(
    file: &Path,
    sig: &syn::Signature,
    default_body: Option<&syn::Block>,
) -> Option<Member> {
    let receiver = match sig.inputs.first() {
        Some(FnArg::Receiver(receiver)) => convert_receiver(receiver),
        _ => return None,
    };
    let generics = convert_generics(&sig.generics);
    let (output, returns) = return_shape(&sig.output);
    let effects = Effects {
        throwing: returns.is_throwing(),
        asynchronous: sig.asyncness.is_some(),
        mutating: receiver.is_mutating(),
    };
    let mut member = Member {
        name: sig.ident.to_string(),
        kind: MemberKind::Method,
        receiver,
        params: convert_params(sig.inputs.iter()),
        output,
        returns,
        effects,
        is_unsafe: sig.unsafety.is_some(),
        default_body: default_body.map(|block| block.to_token_stream().to_string()),
        unsupported: None,
        defaultable: false,
        location: SourceLocation::from_span(file, sig.ident.span()),
        generics,
    };
    if sig.variadic.is_some() {
        member.mark_unsupported("takes C-variadic arguments");
    }
    if let Some(reason) = unsupported_return(&sig.output, &member.generics) {
        member.mark_unsupported(reason);
    }
    Some(member)
}

fn names_self(ty: &Type, type_name: &str) -> bool {
    match ty {
        Type::Path(path) if path.qself.is_none() => path
            .path
            .segments
            .last()
            .is_some_and(|last| last.ident == "Self" || (path.path.segments.len() == 1 && last.ident == type_name)),
        _ => false,
    }
}

/// Recognize `fn name(..) -> Self`, `Option<Self>` and `Result<Self, E>`.
pub(crate) fn convert_initializer(
    file: &Path,
    sig: &syn::Signature,
    type_name: &str,
) -> Option<Initializer> {
    if matches!(sig.inputs.first(), Some(FnArg::Receiver(_))) || !sig.generics.params.is_empty() {
        return None;
    }
    let ReturnType::Type(_, ty) = &sig.output else {
        return None;
    };
    let output = if names_self(ty, type_name) {
        InitializerOutput::Plain
    } else {
        let Type::Path(path) = &**ty else {
            return None;
        };
        let last = path.path.segments.last()?;
        let args = single_type_argument(&last.arguments);
        let first = args.first()?;
        if !names_self(first, type_name) {
            return None;
        }
        match (last.ident.to_string().as_str(), args.len()) {
            ("Option", 1) => InitializerOutput::Optional,
            ("Result", 1) => InitializerOutput::Fallible(TypeRef::from_syn(ty)),
            ("Result", 2) => InitializerOutput::Fallible(TypeRef::from_syn(ty)),
            _ => return None,
        }
    };
    Some(Initializer {
        name: sig.ident.to_string(),
        params: convert_params(sig.inputs.iter()),
        output,
        is_async: sig.asyncness.is_some(),
        location: SourceLocation::from_span(file, sig.ident.span()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(source: &str) -> syn::Signature {
        let item: syn::TraitItemFn = syn::parse_str(source).unwrap();
        item.sig
    }

    fn member(source: &str) -> Member {
        convert_method(Path::new("lib.rs"), &sig(source), None).unwrap()
    }

    #[test]
    fn test_receivers() {
        assert_eq!(member("fn a(&self);").receiver, Receiver::Ref);
        assert_eq!(member("fn a(&mut self);").receiver, Receiver::RefMut);
        assert_eq!(member("fn a(self);").receiver, Receiver::Value);
        assert!(matches!(member("fn a(self: Box<Self>);").receiver, Receiver::Typed(_)));
        assert!(convert_method(Path::new("lib.rs"), &sig("fn a() -> u8;"), None).is_none());
    }

    #[test]
    fn test_effects_and_shapes() {
        let load = member("async fn load(&mut self, id: u64) -> Result<String, Error>;");
        assert!(load.effects.asynchronous);
        assert!(load.effects.throwing);
        assert!(load.effects.mutating);
        assert!(matches!(load.returns, ReturnShape::Fallible { error: Some(_), .. }));

        let find = member("fn find(&self) -> Option<u8>;");
        assert!(matches!(find.returns, ReturnShape::Optional(_)));
        assert!(member("fn unit(&self) -> ();").returns.is_unit());
    }

    #[test]
    fn test_patterns_become_named_parameters() {
        let method = member("fn f(&self, mut count: u8, _: bool, (a, b): (u8, u8));");
        let names: Vec<&str> = method.params.iter().map(|param| param.name.as_str()).collect();
        assert_eq!(names, vec!["count", "arg1", "arg2"]);
        assert_eq!(method.params[0].pattern.as_deref(), Some("mut count"));
        assert_eq!(method.params[1].pattern.as_deref(), Some("_"));
    }

    #[test]
    fn test_unsupported_returns() {
        assert!(member("fn name(&self) -> &str;").unsupported.is_some());
        assert!(member("fn name(&self) -> &'static str;").unsupported.is_none());
        assert!(member("fn items(&self) -> impl Iterator<Item = u8>;").unsupported.is_some());
        assert!(member("fn get<T>(&self) -> T;").unsupported.is_some());
        assert!(member("fn get<T: 'static>(&self) -> T;").unsupported.is_none());
        assert!(member("fn view(&self) -> Cow<'_, str>;").unsupported.is_some());
    }

    #[test]
    fn test_initializers() {
        let file = Path::new("lib.rs");
        let plain = convert_initializer(file, &sig("fn new(name: String) -> Self;"), "User").unwrap();
        assert_eq!(plain.output, InitializerOutput::Plain);
        assert_eq!(plain.params.len(), 1);
        let optional = convert_initializer(file, &sig("fn parse(s: &str) -> Option<User>;"), "User").unwrap();
        assert_eq!(optional.output, InitializerOutput::Optional);
        let fallible = convert_initializer(file, &sig("fn open() -> io::Result<Self>;"), "User").unwrap();
        assert!(matches!(fallible.output, InitializerOutput::Fallible(_)));
        assert!(convert_initializer(file, &sig("fn count() -> usize;"), "User").is_none());
    }
}
