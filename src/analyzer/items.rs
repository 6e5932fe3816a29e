//! Walks the items of one parsed file.

use super::impls::{attach, collect_impl, describe, ImplFacts};
use super::signature::{convert_generics, convert_initializer, convert_method, return_shape};
use super::{FileAnalysis, TypeAlias};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::model::{
    render_bound, Accessibility, Accessor, AssociatedType, Effects, Member, MemberKind,
    Parameter, Receiver, ReturnShape, SourceLocation, SuperType, TypeDeclaration, TypeKind,
    TypeRef,
};
use quote::ToTokens;
use std::path::Path;
use syn::visit::Visit;
use syn::{Attribute, Fields, Item, TraitItem, TypeParamBound, UseTree};

const THREAD_UNSAFE: &[&str] = &["Rc", "RefCell", "Cell", "UnsafeCell", "Weak"];

/// `#[mocksmith::skip]` or `#[mock(skip)]`.
pub(crate) fn has_skip_attribute(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        let path = attr.path();
        let segments: Vec<String> = path
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();
        match segments.as_slice() {
            [krate, skip] if krate == "mocksmith" && skip == "skip" => true,
            [mock] if mock == "mock" => {
                let mut skip = false;
                let parsed = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("skip") {
                        skip = true;
                    }
                    Ok(())
                });
                if let Err(error) = parsed {
                    tracing::debug!(%error, skip, "malformed #[mock(...)] attribute");
                }
                skip
            }
            _ => false,
        }
    })
}

fn is_cfg_test(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("cfg")
            && attr
                .meta
                .to_token_stream()
                .to_string()
                .split(|c: char| !c.is_alphanumeric() && c != '_')
                .any(|word| word == "test")
    })
}

fn derives(attrs: &[Attribute]) -> Vec<String> {
    let mut names = Vec::new();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("derive")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if let Some(last) = meta.path.segments.last() {
                names.push(last.ident.to_string());
            }
            Ok(())
        });
        if let Err(error) = parsed {
            tracing::debug!(%error, kept = ?names, "malformed #[derive(...)] attribute");
        }
    }
    names
}

#[derive(Default)]
struct ThreadSafety {
    unsafe_found: bool,
}

impl<'ast> Visit<'ast> for ThreadSafety {
    fn visit_type_ptr(&mut self, _: &'ast syn::TypePtr) {
        self.unsafe_found = true;
    }

    fn visit_path_segment(&mut self, segment: &'ast syn::PathSegment) {
        if THREAD_UNSAFE.contains(&segment.ident.to_string().as_str()) {
            self.unsafe_found = true;
        }
        syn::visit::visit_path_segment(self, segment);
    }
}

fn fields_thread_safe<'a>(fields: impl Iterator<Item = &'a syn::Field>) -> bool {
    let mut scan = ThreadSafety::default();
    for field in fields {
        scan.visit_type(&field.ty);
    }
    !scan.unsafe_found
}

/// Rewrite a `use` tree so it resolves from any module of the crate.
fn absolutize(tree: &UseTree, module_path: &[String]) -> Option<String> {
    let rendered = tree.to_token_stream().to_string();
    let mut rest = rendered.as_str();
    let mut base: Vec<String> = module_path.to_vec();
    let mut relative = false;
    loop {
        if let Some(stripped) = rest.strip_prefix("self :: ") {
            rest = stripped;
            relative = true;
        } else if let Some(stripped) = rest.strip_prefix("super :: ") {
            base.pop()?;
            rest = stripped;
            relative = true;
        } else {
            break;
        }
    }
    if !relative {
        return Some(format!("use {} ;", rendered));
    }
    let prefix = std::iter::once("crate".to_string())
        .chain(base)
        .collect::<Vec<_>>()
        .join(" :: ");
    Some(format!("use {} :: {} ;", prefix, rest))
}

fn field_getter(file: &Path, field: &syn::Field, name: &str) -> Member {
    let ty: &syn::Type = &field.ty;
    let (output, returns) = return_shape(&syn::ReturnType::Type(
        Default::default(),
        Box::new(ty.clone()),
    ));
    let mut member = Member {
        name: name.to_string(),
        kind: MemberKind::Property {
            field: name.to_string(),
            accessor: Accessor::Get,
        },
        receiver: Receiver::Ref,
        params: Vec::new(),
        output,
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
        location: SourceLocation::from_span(file, field_span(field)),
    };
    if let Some(reason) = super::signature::unsupported_return(
        &syn::ReturnType::Type(Default::default(), Box::new(ty.clone())),
        &Default::default(),
    ) {
        member.mark_unsupported(reason);
    }
    member
}

fn field_setter(file: &Path, field: &syn::Field, name: &str) -> Member {
    let mut member = Member {
        name: format!("set_{}", name),
        kind: MemberKind::Property {
            field: name.to_string(),
            accessor: Accessor::Set,
        },
        receiver: Receiver::RefMut,
        params: vec![Parameter::new("value", TypeRef::from_syn(&field.ty))],
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
        location: SourceLocation::from_span(file, field_span(field)),
    };
    if TypeRef::from_syn(&field.ty).descriptor.starts_with('&') {
        member.mark_unsupported("field holds a borrowed value");
    }
    member
}

fn field_span(field: &syn::Field) -> proc_macro2::Span {
    field
        .ident
        .as_ref()
        .map(|ident| ident.span())
        .unwrap_or_else(proc_macro2::Span::call_site)
}

/// Walks one module (the file or an inline `mod` block).
pub(crate) struct ModuleWalker<'a> {
    pub file: &'a Path,
    pub analysis: &'a mut FileAnalysis,
}

impl ModuleWalker<'_> {
    pub(crate) fn walk(&mut self, items: &[Item], module_path: &[String]) {
        let imports: Vec<String> = items
            .iter()
            .filter_map(|item| match item {
                Item::Use(use_item) => absolutize(&use_item.tree, module_path),
                _ => None,
            })
            .collect();

        let first_new = self.analysis.declarations.len();
        let mut impls = Vec::new();

        for item in items {
            match item {
                Item::Trait(item_trait) => self.visit_trait(item_trait, module_path),
                Item::Struct(item_struct) => self.visit_struct(item_struct, module_path),
                Item::Enum(item_enum) => self.visit_enum(item_enum, module_path),
                Item::Impl(item_impl) => {
                    if let Some(facts) =
                        collect_impl(self.file, module_path, item_impl, &mut self.analysis.diagnostics)
                    {
                        impls.push(facts);
                    } else {
                        tracing::trace!(self_ty = %describe(item_impl), "impl block ignored");
                    }
                }
                Item::Type(alias) => self.analysis.aliases.push(TypeAlias {
                    name: alias.ident.to_string(),
                    module_path: module_path.to_vec(),
                    target: TypeRef::from_syn(&alias.ty),
                }),
                Item::Mod(module) => {
                    if is_cfg_test(&module.attrs) {
                        continue;
                    }
                    if let Some((_, nested)) = &module.content {
                        let mut path = module_path.to_vec();
                        path.push(module.ident.to_string());
                        self.walk(nested, &path);
                    }
                }
                _ => {}
            }
        }

        for declaration in &mut self.analysis.declarations[first_new..] {
            if declaration.module_path == module_path {
                declaration.imports = imports.clone();
            }
        }

        impls.sort_by_key(ImplFacts::attach_order);
        for facts in impls {
            let local = self.analysis.declarations[first_new..]
                .iter_mut()
                .find(|declaration| {
                    declaration.module_path == module_path
                        && declaration.kind != TypeKind::Protocol
                        && facts.self_path == declaration.name
                });
            match local {
                Some(declaration) => attach(declaration, &facts),
                None => self.analysis.impls.push(facts),
            }
        }
    }

    fn visit_trait(&mut self, item: &syn::ItemTrait, module_path: &[String]) {
        let name = item.ident.to_string();
        let mut declaration = TypeDeclaration::new(&name, TypeKind::Protocol, module_path.to_vec());
        declaration.generics = convert_generics(&item.generics);
        declaration.accessibility = Accessibility::from_syn(&item.vis);
        declaration.is_unsafe = item.unsafety.is_some();
        declaration.skip = has_skip_attribute(&item.attrs);
        declaration.location = SourceLocation::from_span(self.file, item.ident.span());
        declaration.supertypes = supertraits(item.supertraits.iter());
        if let Some(clause) = &item.generics.where_clause {
            for predicate in &clause.predicates {
                if let syn::WherePredicate::Type(bound) = predicate {
                    if matches!(&bound.bounded_ty, syn::Type::Path(path) if path.path.is_ident("Self")) {
                        declaration.supertypes.extend(supertraits(bound.bounds.iter()));
                    }
                }
            }
        }

        for trait_item in &item.items {
            match trait_item {
                TraitItem::Fn(function) => {
                    let skipped = has_skip_attribute(&function.attrs);
                    let body = function.default.as_ref();
                    if let Some(mut member) = convert_method(self.file, &function.sig, body) {
                        if skipped {
                            member.mark_unsupported("excluded by `skip` attribute");
                        }
                        declaration.members.push(member);
                    } else if let Some(initializer) =
                        convert_initializer(self.file, &function.sig, &name)
                    {
                        declaration.initializers.push(initializer);
                    } else if body.is_none() {
                        self.unsupported(
                            &declaration,
                            &function.sig.ident,
                            format!("associated function `{}` has no receiver", function.sig.ident),
                        );
                        declaration.required_items.push(function.sig.ident.to_string());
                    }
                }
                TraitItem::Type(assoc) => {
                    if !assoc.generics.params.is_empty() {
                        self.unsupported(
                            &declaration,
                            &assoc.ident,
                            format!("generic associated type `{}`", assoc.ident),
                        );
                        if assoc.default.is_none() {
                            declaration.required_items.push(assoc.ident.to_string());
                        }
                        continue;
                    }
                    declaration.associated_types.push(AssociatedType {
                        name: assoc.ident.to_string(),
                        bounds: assoc
                            .bounds
                            .iter()
                            .map(|bound| render_bound(bound, false))
                            .collect(),
                        default: assoc.default.as_ref().map(|(_, ty)| TypeRef::from_syn(ty)),
                    });
                }
                TraitItem::Const(constant) => {
                    self.unsupported(
                        &declaration,
                        &constant.ident,
                        format!("associated constant `{}`", constant.ident),
                    );
                    if constant.default.is_none() {
                        declaration.required_items.push(constant.ident.to_string());
                    }
                }
                _ => {}
            }
        }
        tracing::debug!(name = %declaration.full_path(), members = declaration.members.len(), "trait analyzed");
        self.analysis.declarations.push(declaration);
    }

    fn visit_struct(&mut self, item: &syn::ItemStruct, module_path: &[String]) {
        let mut declaration =
            TypeDeclaration::new(item.ident.to_string(), TypeKind::ValueType, module_path.to_vec());
        declaration.generics = convert_generics(&item.generics);
        declaration.accessibility = Accessibility::from_syn(&item.vis);
        declaration.derives = derives(&item.attrs);
        declaration.skip = has_skip_attribute(&item.attrs);
        declaration.thread_safe = fields_thread_safe(item.fields.iter());
        declaration.location = SourceLocation::from_span(self.file, item.ident.span());

        if let Fields::Named(named) = &item.fields {
            for field in &named.named {
                let Some(ident) = &field.ident else {
                    continue;
                };
                if !Accessibility::from_syn(&field.vis).is_visible_outside_module()
                    || has_skip_attribute(&field.attrs)
                {
                    continue;
                }
                let name = ident.to_string();
                declaration.members.push(field_getter(self.file, field, &name));
                declaration.members.push(field_setter(self.file, field, &name));
            }
        }
        self.analysis.declarations.push(declaration);
    }

    fn visit_enum(&mut self, item: &syn::ItemEnum, module_path: &[String]) {
        let mut declaration =
            TypeDeclaration::new(item.ident.to_string(), TypeKind::ValueType, module_path.to_vec());
        declaration.generics = convert_generics(&item.generics);
        declaration.accessibility = Accessibility::from_syn(&item.vis);
        declaration.derives = derives(&item.attrs);
        declaration.skip = has_skip_attribute(&item.attrs);
        declaration.thread_safe =
            fields_thread_safe(item.variants.iter().flat_map(|variant| variant.fields.iter()));
        declaration.location = SourceLocation::from_span(self.file, item.ident.span());
        self.analysis.declarations.push(declaration);
    }

    fn unsupported(&mut self, declaration: &TypeDeclaration, ident: &syn::Ident, message: String) {
        self.analysis.diagnostics.push(
            Diagnostic::warning(DiagnosticKind::UnsupportedDeclaration, message)
                .at(&SourceLocation::from_span(self.file, ident.span()))
                .for_type(declaration.full_path()),
        );
    }
}

fn supertraits<'a>(bounds: impl Iterator<Item = &'a TypeParamBound>) -> Vec<SuperType> {
    bounds
        .filter_map(|bound| match bound {
            TypeParamBound::Trait(trait_bound)
                if matches!(trait_bound.modifier, syn::TraitBoundModifier::None) =>
            {
                Some(SuperType::from_path(&trait_bound.path))
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_attribute_forms() {
        let skip: syn::ItemStruct = syn::parse_str("#[mocksmith::skip] struct A;").unwrap();
        let mock_skip: syn::ItemStruct = syn::parse_str("#[mock(skip)] struct A;").unwrap();
        let other: syn::ItemStruct = syn::parse_str("#[mock(rename = \"x\")] struct A;").unwrap();
        assert!(has_skip_attribute(&skip.attrs));
        assert!(has_skip_attribute(&mock_skip.attrs));
        assert!(!has_skip_attribute(&other.attrs));
    }

    #[test]
    fn test_malformed_attributes_keep_what_parsed() {
        let item: syn::ItemStruct =
            syn::parse_str("#[mock(skip, 7)] #[derive(Debug, Clone, 3)] struct A;").unwrap();
        assert!(has_skip_attribute(&item.attrs));
        assert_eq!(derives(&item.attrs), vec!["Debug", "Clone"]);
    }

    #[test]
    fn test_use_items_become_absolute() {
        let module = vec!["store".to_string(), "disk".to_string()];
        let tree = |source: &str| -> UseTree {
            let item: syn::ItemUse = syn::parse_str(source).unwrap();
            item.tree
        };
        assert_eq!(
            absolutize(&tree("use super::Record;"), &module).unwrap(),
            "use crate :: store :: Record ;"
        );
        assert_eq!(
            absolutize(&tree("use self::codec::{Codec, Frame};"), &module).unwrap(),
            "use crate :: store :: disk :: codec :: { Codec , Frame } ;"
        );
        assert_eq!(
            absolutize(&tree("use std::sync::Arc;"), &module).unwrap(),
            "use std :: sync :: Arc ;"
        );
    }

    #[test]
    fn test_thread_safety_scan() {
        let safe: syn::ItemStruct = syn::parse_str("struct A { items: Vec<Arc<String>> }").unwrap();
        let local: syn::ItemStruct = syn::parse_str("struct A { items: Rc<RefCell<u8>> }").unwrap();
        assert!(fields_thread_safe(safe.fields.iter()));
        assert!(!fields_thread_safe(local.fields.iter()));
    }
}
