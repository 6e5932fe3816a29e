//! Token-level generic substitution.
//!
//! Substitution works on token streams rather than `syn` trees so the same
//! pass applies to types, bounds, where predicates and default bodies.

use crate::analyzer::return_shape;
use crate::model::{Member, Parameter, ReturnShape, TypeRef};
use proc_macro2::{Group, Punct, Spacing, TokenStream, TokenTree};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Generic parameter and associated type replacements for one inheritance edge.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    /// Generic parameter name to replacement tokens.
    params: HashMap<String, TokenStream>,
    /// `Self::Name` to replacement tokens.
    associated: HashMap<String, TokenStream>,
    /// Parameters without an argument or default.
    unresolved: HashSet<String>,
}

impl Substitution {
    pub fn is_identity(&self) -> bool {
        self.params.is_empty() && self.associated.is_empty() && self.unresolved.is_empty()
    }

    pub fn bind(&mut self, name: impl Into<String>, replacement: &TypeRef) {
        if let Ok(tokens) = TokenStream::from_str(&replacement.source) {
            self.params.insert(name.into(), tokens);
        }
    }

    pub fn bind_associated(&mut self, name: impl Into<String>, replacement: &TypeRef) {
        if let Ok(tokens) = TokenStream::from_str(&replacement.source) {
            self.associated.insert(name.into(), tokens);
        }
    }

    pub fn mark_unresolved(&mut self, name: impl Into<String>) {
        self.unresolved.insert(name.into());
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &String> {
        self.unresolved.iter()
    }

    /// Apply to a source string. `expression` wraps generic replacements
    /// followed by `::` in `<...>` so paths stay valid in expressions.
    pub fn apply_str(&self, source: &str, shadowed: &HashSet<String>, expression: bool) -> String {
        match TokenStream::from_str(source) {
            Ok(tokens) => self.apply_tokens(tokens, shadowed, expression).to_string(),
            Err(_) => source.to_string(),
        }
    }

    pub fn apply_type(&self, ty: &TypeRef, shadowed: &HashSet<String>) -> TypeRef {
        if self.is_identity() {
            return ty.clone();
        }
        let source = self.apply_str(&ty.source, shadowed, false);
        match syn::parse_str::<syn::Type>(&source) {
            Ok(parsed) => TypeRef::from_syn(&parsed),
            Err(_) => ty.clone(),
        }
    }

    /// Names of unresolved parameters mentioned by a source string.
    pub fn mentions_unresolved(&self, source: &str) -> Option<String> {
        let tokens = TokenStream::from_str(source).ok()?;
        find_ident(tokens, &self.unresolved)
    }

    fn apply_tokens(
        &self,
        tokens: TokenStream,
        shadowed: &HashSet<String>,
        expression: bool,
    ) -> TokenStream {
        let trees: Vec<TokenTree> = tokens.into_iter().collect();
        let mut out: Vec<TokenTree> = Vec::with_capacity(trees.len());
        let mut index = 0;
        while index < trees.len() {
            match &trees[index] {
                TokenTree::Ident(ident) if *ident == "Self" && is_path_sep(&trees, index + 1) => {
                    if let Some(TokenTree::Ident(name)) = trees.get(index + 3) {
                        if let Some(replacement) = self.associated.get(&name.to_string()) {
                            let followed_by_path = is_path_sep(&trees, index + 4);
                            push_replacement(&mut out, replacement, expression && followed_by_path);
                            index += 4;
                            continue;
                        }
                    }
                    out.push(trees[index].clone());
                    index += 1;
                }
                TokenTree::Ident(ident) => {
                    let name = ident.to_string();
                    let after_path_sep = index >= 2 && is_path_sep(&trees, index - 2);
                    match self.params.get(&name) {
                        Some(replacement) if !shadowed.contains(&name) && !after_path_sep => {
                            let followed_by_path = is_path_sep(&trees, index + 1);
                            push_replacement(&mut out, replacement, expression && followed_by_path);
                        }
                        _ => out.push(trees[index].clone()),
                    }
                    index += 1;
                }
                TokenTree::Group(group) => {
                    let inner = self.apply_tokens(group.stream(), shadowed, expression);
                    let mut rebuilt = Group::new(group.delimiter(), inner);
                    rebuilt.set_span(group.span());
                    out.push(TokenTree::Group(rebuilt));
                    index += 1;
                }
                other => {
                    out.push(other.clone());
                    index += 1;
                }
            }
        }
        out.into_iter().collect()
    }
}

fn is_path_sep(trees: &[TokenTree], index: usize) -> bool {
    matches!(
        (trees.get(index), trees.get(index + 1)),
        (Some(TokenTree::Punct(first)), Some(TokenTree::Punct(second)))
            if first.as_char() == ':' && first.spacing() == Spacing::Joint && second.as_char() == ':'
    )
}

fn push_replacement(out: &mut Vec<TokenTree>, replacement: &TokenStream, wrap: bool) {
    let is_simple = replacement.clone().into_iter().count() == 1;
    if wrap && !is_simple {
        out.push(TokenTree::Punct(Punct::new('<', Spacing::Alone)));
        out.extend(replacement.clone());
        out.push(TokenTree::Punct(Punct::new('>', Spacing::Alone)));
    } else {
        out.extend(replacement.clone());
    }
}

fn find_ident(tokens: TokenStream, names: &HashSet<String>) -> Option<String> {
    for tree in tokens {
        match tree {
            TokenTree::Ident(ident) if names.contains(&ident.to_string()) => {
                return Some(ident.to_string())
            }
            TokenTree::Group(group) => {
                if let Some(found) = find_ident(group.stream(), names) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

/// Apply a substitution to a member, honoring its own generic parameters.
pub fn substitute_member(member: &Member, subst: &Substitution) -> Member {
    if subst.is_identity() {
        return member.clone();
    }
    let shadowed: HashSet<String> = member
        .generics
        .params
        .iter()
        .map(|param| param.name.clone())
        .collect();
    let mut result = member.clone();
    result.params = member
        .params
        .iter()
        .map(|param| Parameter {
            ty: subst.apply_type(&param.ty, &shadowed),
            ..param.clone()
        })
        .collect();
    result.output = member
        .output
        .as_ref()
        .map(|output| subst.apply_type(output, &shadowed));
    result.returns = match result.output.as_ref().and_then(|output| output.parse().ok()) {
        Some(ty) => return_shape(&syn::ReturnType::Type(Default::default(), Box::new(ty))).1,
        None => ReturnShape::Unit,
    };
    result.effects.throwing = result.returns.is_throwing();
    for param in &mut result.generics.params {
        param.bounds = param
            .bounds
            .iter()
            .map(|bound| subst.apply_str(bound, &shadowed, false))
            .collect();
        param.source = subst.apply_str(&param.source, &shadowed, false);
    }
    result.generics.where_predicates = member
        .generics
        .where_predicates
        .iter()
        .map(|predicate| subst.apply_str(predicate, &shadowed, false))
        .collect();
    result.default_body = member
        .default_body
        .as_ref()
        .map(|body| subst.apply_str(body, &shadowed, true));

    let mut sources = result.params.iter().map(|param| param.ty.source.as_str()).collect::<Vec<_>>();
    if let Some(output) = &result.output {
        sources.push(output.source.as_str());
    }
    let unresolved = sources
        .into_iter()
        .find_map(|source| subst.mentions_unresolved(source));
    if let Some(name) = unresolved {
        result.mark_unsupported(format!("depends on unresolved generic parameter `{}`", name));
    }
    if let Some(body) = &result.default_body {
        if subst.mentions_unresolved(body).is_some() {
            result.default_body = None;
        }
    }
    result
}
