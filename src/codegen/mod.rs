//! Code emitter: renders a [`MockableType`] into mock source.
//!
//! One file per mocked type. The layout is fixed so identical input always
//! produces byte-identical output:
//!
//! 1. header comment and an inner `allow` attribute
//! 2. the declaring module's `use` items and a glob import of the module
//! 3. the mock struct, its inherent impl (selector constants, constructors,
//!    inherent members), `Clone`/`Debug`/`Default`
//! 4. one impl per declared conformance
//!
//! Items are assembled as tokens, parsed into a `syn::File` and printed
//! with `prettyplease`; only the header comment is added as plain text.

mod generics;
mod members;
pub mod naming;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::model::{
    Accessibility, FlatMember, Initializer, InitializerOutput, MemberKind, MockableType,
};
use crate::runtime::DefaultPolicy;
use generics::MockGenerics;
use members::{render_member, MemberContext, Site};
use proc_macro2::{Ident, Literal, TokenStream, TokenTree};
use quote::quote;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

pub(crate) type EmitResult<T> = Result<T, String>;

pub const DEFAULT_HEADER: &str = "Generated by mocksmith. Do not edit.";

pub const DEFAULT_RUNTIME_PATH: &str = "mocksmith::runtime";

/// Names the mock itself defines on its inherent impl.
const RESERVED: &[&str] = &["new", "wrapping", "mocksmith", "real"];

const FILE_ALLOW: &str =
    "#![allow(unused_imports, unused_variables, unused_mut, dead_code, non_snake_case, clippy::all)]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    /// Policy every generated instance starts with.
    pub default_policy: DefaultPolicy,
    /// Path generated code uses to reach the runtime engine.
    pub runtime_path: String,
    /// Header comment; `None` uses [`DEFAULT_HEADER`].
    pub header: Option<String>,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            default_policy: DefaultPolicy::Strict,
            runtime_path: DEFAULT_RUNTIME_PATH.to_string(),
            header: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorConstant {
    pub name: String,
    pub selector: String,
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedUnit {
    /// Full path of the mocked type.
    pub type_path: String,
    pub mock_name: String,
    /// Module name the file is included under (`mock_store`).
    pub module_name: String,
    pub content: String,
    pub selectors: Vec<SelectorConstant>,
    pub warnings: Vec<Diagnostic>,
}

impl EmittedUnit {
    pub fn file_name(&self) -> String {
        format!("{}.rs", self.module_name)
    }
}

pub(crate) fn tokens(source: &str) -> EmitResult<TokenStream> {
    TokenStream::from_str(source).map_err(|error| format!("cannot tokenize `{}`: {}", source, error))
}

pub(crate) fn ident(name: &str) -> EmitResult<Ident> {
    syn::parse_str::<Ident>(name).map_err(|error| format!("`{}` is not an identifier: {}", name, error))
}

fn header_lines(header: Option<&str>) -> String {
    header
        .unwrap_or(DEFAULT_HEADER)
        .lines()
        .map(|line| match line.trim_end() {
            "" => "//\n".to_string(),
            line => format!("// {}\n", line),
        })
        .collect()
}

/// Replace every `name` identifier in a token stream with `Self`.
fn with_self(tokens: TokenStream, name: &str) -> TokenStream {
    tokens
        .into_iter()
        .map(|tree| match tree {
            TokenTree::Ident(ident) if ident == name => {
                TokenTree::Ident(Ident::new("Self", ident.span()))
            }
            TokenTree::Group(group) => {
                let mut rebuilt = proc_macro2::Group::new(group.delimiter(), with_self(group.stream(), name));
                rebuilt.set_span(group.span());
                TokenTree::Group(rebuilt)
            }
            other => other,
        })
        .collect()
}

fn mentions_self(source: &str) -> bool {
    fn scan(tokens: TokenStream) -> bool {
        tokens.into_iter().any(|tree| match tree {
            TokenTree::Ident(ident) => ident == "Self",
            TokenTree::Group(group) => scan(group.stream()),
            _ => false,
        })
    }
    TokenStream::from_str(source).map(scan).unwrap_or(true)
}

fn render_block(header: TokenStream, items: &[TokenStream]) -> TokenStream {
    quote!(#header { #(#items)* })
}

/// Parse the assembled items and pretty-print them.
fn format_items(items: TokenStream) -> EmitResult<String> {
    let file: syn::File = syn::parse2(items)
        .map_err(|error| format!("generated code does not parse: {}", error))?;
    Ok(prettyplease::unparse(&file))
}

/// Render the mock of one flattened type.
pub fn emit(mockable: &MockableType, options: &EmitOptions) -> Result<EmittedUnit, Diagnostic> {
    let type_path = mockable.full_path();
    let failure = |message: String| {
        Diagnostic::error(DiagnosticKind::EmissionError, message)
            .at(&mockable.declaration.location)
            .for_type(&type_path)
    };

    if mockable.members.is_empty() {
        return Err(failure(format!("`{}` has no members that can be mocked", type_path)));
    }
    for (_, conformance) in mockable.declared_conformances() {
        if !conformance.unimplementable.is_empty() {
            return Err(failure(format!(
                "cannot implement `{}`: {}",
                conformance.reference(),
                conformance.unimplementable.join("; ")
            )));
        }
    }

    let mut emitter = Emitter {
        mockable,
        options,
        warnings: Vec::new(),
    };
    let (content, selectors) = emitter.render().map_err(failure)?;

    tracing::debug!(
        name = %type_path,
        members = mockable.members.len(),
        bytes = content.len(),
        "mock emitted"
    );
    Ok(EmittedUnit {
        type_path,
        mock_name: naming::mock_name(mockable.name()),
        module_name: naming::module_name(mockable.name()),
        content,
        selectors,
        warnings: emitter.warnings,
    })
}

struct Emitter<'a> {
    mockable: &'a MockableType,
    options: &'a EmitOptions,
    warnings: Vec<Diagnostic>,
}

impl Emitter<'_> {
    fn render(&mut self) -> EmitResult<(String, Vec<SelectorConstant>)> {
        let mockable = self.mockable;
        let declaration = &mockable.declaration;
        let runtime = tokens(&self.options.runtime_path)?;
        let generics = MockGenerics::of(mockable)?;
        let params = generics.declaration();
        let args = generics.arguments();
        let mock = ident(&naming::mock_name(mockable.name()))?;
        let mock_label = Literal::string(&mock.to_string());
        let type_label = Literal::string(&mockable.full_path());
        let visibility = tokens(match declaration.accessibility {
            Accessibility::Public => "pub",
            _ => "pub(crate)",
        })?;

        let real = if mockable.wraps_real() {
            let path = tokens(&mockable.full_path())?;
            let real_args = generics.real_arguments();
            Some(quote!(#path #real_args))
        } else {
            None
        };

        let constant_names = naming::selector_constants(&mockable.members);
        let constants = constant_names
            .iter()
            .map(|name| ident(name))
            .collect::<EmitResult<Vec<_>>>()?;
        let selectors: Vec<SelectorConstant> = constant_names
            .iter()
            .zip(&mockable.members)
            .map(|(name, member)| SelectorConstant {
                name: name.clone(),
                selector: member.selector(),
            })
            .collect();

        let conformances = mockable
            .conformances
            .iter()
            .map(|conformance| tokens(&conformance.reference()))
            .collect::<EmitResult<Vec<_>>>()?;
        let cx = MemberContext {
            runtime: &runtime,
            real: real.as_ref(),
            conformances: &conformances,
        };

        let policy = match self.options.default_policy {
            DefaultPolicy::Strict => quote!(Strict),
            DefaultPolicy::TypeDefaults => quote!(TypeDefaults),
        };
        let mut fields = vec![quote!(__mocksmith: #runtime::MockState)];
        let mut inits = vec![quote!(__mocksmith: #runtime::MockState::with_policy(#type_label, #runtime::DefaultPolicy::#policy))];
        let mut clones = vec![quote!(__mocksmith: ::std::clone::Clone::clone(&self.__mocksmith))];
        if let Some(real) = &real {
            fields.push(quote!(__mocksmith_real: #runtime::RealSlot<#real>));
            inits.push(quote!(__mocksmith_real: #runtime::RealSlot::empty()));
            clones.push(quote!(__mocksmith_real: ::std::clone::Clone::clone(&self.__mocksmith_real)));
        }
        if let Some(phantom) = generics.phantom() {
            fields.push(quote!(__mocksmith_marker: #phantom));
            inits.push(quote!(__mocksmith_marker: ::std::marker::PhantomData));
            clones.push(quote!(__mocksmith_marker: ::std::marker::PhantomData));
        }
        let where_clause = generics.where_clause(&[]);
        let doc = Literal::string(&format!(" Mock of [`{}`].", mockable.full_path()));
        let struct_item = quote! {
            #[doc = #doc]
            #visibility struct #mock #params #where_clause {
                #(#fields),*
            }
        };

        // Inherent impl
        let mut inherent: Vec<TokenStream> = Vec::new();
        for (constant, member) in constants.iter().zip(&mockable.members) {
            let selector = Literal::string(&member.selector());
            inherent.push(quote!(pub const #constant: #runtime::Selector = #runtime::Selector::new(#selector);));
        }
        inherent.push(quote! {
            pub fn new() -> Self {
                Self { #(#inits),* }
            }
        });
        inherent.push(quote! {
            /// Invocation log, stubs and verification for this instance.
            pub fn mocksmith(&self) -> &#runtime::MockState {
                &self.__mocksmith
            }
        });

        let mut reserved: HashSet<String> = RESERVED.iter().map(|name| name.to_string()).collect();
        if let Some(real) = &real {
            inherent.push(quote! {
                /// Mock forwarding `call_through` stubs to `real`.
                pub fn wrapping(real: #real) -> Self {
                    let mock = Self::new();
                    mock.__mocksmith_real.set(real);
                    mock
                }
            });
            inherent.push(quote! {
                pub fn real(&self) -> &#runtime::RealSlot<#real> {
                    &self.__mocksmith_real
                }
            });
            for initializer in &declaration.initializers {
                if let Some(constructor) = self.constructor(initializer, real, &mut reserved)? {
                    inherent.push(constructor);
                }
            }
        }

        for (flat, constant) in inherent_members(mockable, &constants, &mut reserved, &mut self.warnings) {
            inherent.push(render_member(&cx, flat, constant, Site::Inherent)?);
        }

        let inherent_block = render_block(quote!(impl #params #mock #args #where_clause), &inherent);

        let clone_block = render_block(
            quote!(impl #params ::std::clone::Clone for #mock #args #where_clause),
            &[quote! {
                fn clone(&self) -> Self {
                    Self { #(#clones),* }
                }
            }],
        );
        let debug_block = render_block(
            quote!(impl #params ::std::fmt::Debug for #mock #args #where_clause),
            &[quote! {
                fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                    f.debug_struct(#mock_label).field("state", &self.__mocksmith).finish()
                }
            }],
        );
        let default_block = render_block(
            quote!(impl #params ::std::default::Default for #mock #args #where_clause),
            &[quote! {
                fn default() -> Self {
                    Self::new()
                }
            }],
        );

        let mut conformance_blocks = Vec::new();
        for (index, conformance) in mockable.declared_conformances() {
            let trait_ref = &conformances[index];
            let mut items = Vec::new();
            for (name, ty) in &conformance.associated {
                let name = ident(name)?;
                let ty = tokens(&ty.source)?;
                items.push(quote!(type #name = #ty;));
            }
            for initializer in &conformance.initializers {
                items.push(trait_initializer(initializer)?);
            }
            for (flat, constant) in mockable.members.iter().zip(&constants) {
                if flat.conformances.contains(&index) {
                    items.push(render_member(&cx, flat, constant, Site::Conformance(index))?);
                }
            }
            let known: HashSet<&String> = declaration.generics.where_predicates.iter().collect();
            let extra = conformance
                .where_predicates
                .iter()
                .filter(|predicate| !known.contains(predicate))
                .map(|predicate| tokens(predicate))
                .collect::<EmitResult<Vec<_>>>()?;
            let where_clause = generics.where_clause(&extra);
            conformance_blocks.push(render_block(
                quote!(impl #params #trait_ref for #mock #args #where_clause),
                &items,
            ));
        }

        let allow = tokens(FILE_ALLOW)?;
        let imports = declaration
            .imports
            .iter()
            .map(|import| tokens(import))
            .collect::<EmitResult<Vec<_>>>()?;
        let module = tokens(&declaration.module_path_string())?;
        let items = quote! {
            #allow
            #(#imports)*
            use #module::*;
            #struct_item
            #inherent_block
            #clone_block
            #debug_block
            #default_block
            #(#conformance_blocks)*
        };

        let mut content = header_lines(self.options.header.as_deref());
        content.push_str(&format!("// Mock of `{}`.\n\n", mockable.full_path()));
        content.push_str(&format_items(items)?);
        Ok((content, selectors))
    }

    /// `from_<initializer>` building the real instance.
    fn constructor(
        &self,
        initializer: &Initializer,
        real: &TokenStream,
        reserved: &mut HashSet<String>,
    ) -> EmitResult<Option<TokenStream>> {
        if initializer.params.iter().any(|param| mentions_self(&param.ty.source)) {
            tracing::trace!(initializer = %initializer.name, "constructor taking Self skipped");
            return Ok(None);
        }
        let raw_name = initializer.name.trim_start_matches("r#");
        let name = ident(&format!("from_{}", raw_name))?;
        if !reserved.insert(name.to_string()) {
            return Ok(None);
        }
        let target = ident(&initializer.name)?;
        let mut inputs = Vec::new();
        let mut names = Vec::new();
        for param in &initializer.params {
            let param_name = ident(&param.name)?;
            let ty = tokens(&param.ty.source)?;
            inputs.push(quote!(#param_name: #ty));
            names.push(param_name);
        }
        let asyncness = initializer.is_async.then(|| quote!(async));
        let awaited = initializer.is_async.then(|| quote!(.await));
        let (output, body) = match &initializer.output {
            InitializerOutput::Plain => (quote!(Self), quote!(Self::wrapping(__real))),
            InitializerOutput::Optional => (quote!(Option<Self>), quote!(__real.map(Self::wrapping))),
            InitializerOutput::Fallible(ty) => (
                with_self(tokens(&ty.source)?, self.mockable.name()),
                quote!(__real.map(Self::wrapping)),
            ),
        };
        let doc = Literal::string(&format!(" Mock wrapping the real value built by `{}`.", initializer.name));
        Ok(Some(quote! {
            #[doc = #doc]
            pub #asyncness fn #name(#(#inputs),*) -> #output {
                let __real = <#real>::#target(#(#names),*)#awaited;
                #body
            }
        }))
    }
}

/// Inherent members, methods before accessors; later name clashes are dropped.
fn inherent_members<'m>(
    mockable: &'m MockableType,
    constants: &'m [Ident],
    reserved: &mut HashSet<String>,
    warnings: &mut Vec<Diagnostic>,
) -> Vec<(&'m FlatMember, &'m Ident)> {
    let mut selected: Vec<(usize, &FlatMember)> = mockable
        .members
        .iter()
        .enumerate()
        .filter(|(_, flat)| flat.inherent)
        .collect();
    selected.sort_by_key(|(index, flat)| (!matches!(flat.member.kind, MemberKind::Method), *index));

    let mut kept = Vec::new();
    for (index, flat) in selected {
        if !reserved.insert(flat.member.name.clone()) {
            warnings.push(
                Diagnostic::warning(
                    DiagnosticKind::SignatureCollision,
                    format!(
                        "`{}` is not emitted: the mock already has a method named `{}`",
                        flat.selector(),
                        flat.member.name
                    ),
                )
                .at(&flat.member.location)
                .for_type(mockable.full_path()),
            );
            continue;
        }
        kept.push((index, flat));
    }
    kept.sort_by_key(|(index, _)| *index);
    kept.into_iter()
        .map(|(index, flat)| (flat, &constants[index]))
        .collect()
}

/// Trait initializers answer with a fresh mock.
fn trait_initializer(initializer: &Initializer) -> EmitResult<TokenStream> {
    let name = ident(&initializer.name)?;
    let inputs = initializer
        .params
        .iter()
        .map(|param| {
            let param_name = ident(&param.name)?;
            let ty = tokens(&param.ty.source)?;
            Ok(quote!(#param_name: #ty))
        })
        .collect::<EmitResult<Vec<_>>>()?;
    let asyncness = initializer.is_async.then(|| quote!(async));
    let (output, body) = match &initializer.output {
        InitializerOutput::Plain => (quote!(Self), quote!(Self::new())),
        InitializerOutput::Optional => (quote!(Option<Self>), quote!(Some(Self::new()))),
        InitializerOutput::Fallible(ty) => (tokens(&ty.source)?, quote!(Ok(Self::new()))),
    };
    Ok(quote! {
        #asyncness fn #name(#(#inputs),*) -> #output {
            #body
        }
    })
}

/// The `mod.rs` including every generated file, sorted by module name.
pub fn render_mod_file(units: &[EmittedUnit], header: Option<&str>) -> String {
    let mut modules: BTreeMap<&str, &str> = BTreeMap::new();
    for unit in units {
        modules.insert(&unit.module_name, &unit.mock_name);
    }
    let mut mock_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for mock in modules.values() {
        *mock_counts.entry(mock).or_default() += 1;
    }

    let mut content = header_lines(header);
    content.push('\n');
    for module in modules.keys() {
        content.push_str(&format!("pub mod {};\n", module));
    }
    let exports: Vec<String> = modules
        .iter()
        .filter(|(_, mock)| mock_counts[*mock] == 1)
        .map(|(module, mock)| format!("pub use {}::{};\n", module, mock))
        .collect();
    if !exports.is_empty() {
        content.push('\n');
        content.push_str(&exports.concat());
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze_source;
    use crate::flatten::{flatten, SymbolTable};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn emit_from(source: &str, path: &str) -> Result<EmittedUnit, Diagnostic> {
        let table = SymbolTable::merge(vec![analyze_source(Path::new("src/lib.rs"), source, &[])]);
        let mockable = flatten(&table, path).expect("flattens");
        emit(&mockable, &EmitOptions::default())
    }

    #[test]
    fn test_protocol_mock_shape() {
        let unit = emit_from(
            indoc! {r#"
                pub trait Store: Send + Sync {
                    fn get(&self, key: &str) -> Option<String>;
                    fn put(&mut self, key: String, value: String) -> Result<(), String>;
                    fn len(&self) -> usize { 0 }
                }
            "#},
            "crate::Store",
        )
        .unwrap();
        assert_eq!(unit.mock_name, "MockStore");
        assert_eq!(unit.file_name(), "mock_store.rs");
        let names: Vec<&str> = unit.selectors.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["SEL_GET", "SEL_PUT", "SEL_LEN"]);
        assert!(unit.content.starts_with("// Generated by mocksmith. Do not edit.\n"));
        assert!(unit.content.contains("pub struct MockStore"));
        assert!(unit.content.contains("impl crate::Store for MockStore {"));
        assert!(unit.content.contains("answer_optional"));
        assert!(unit.content.contains("answer_fallible"));
        assert!(unit.content.contains("use crate::*;"));
        syn::parse_file(&unit.content).unwrap();
    }

    #[test]
    fn test_default_bodies_are_not_double_braced() {
        let unit = emit_from(
            indoc! {r#"
                pub trait Gauge {
                    fn label(&self) -> String { String::from("gauge") }
                    fn widen(&self, mut by: u32) -> u32 { by += 1; by }
                }
            "#},
            "crate::Gauge",
        )
        .unwrap();
        let lines: Vec<&str> = unit.content.lines().map(str::trim).collect();
        assert!(!lines.contains(&"{"), "{}", unit.content);

        let rebind = lines.iter().position(|line| *line == "let mut by = by;").unwrap();
        assert_eq!(&lines[rebind + 1..rebind + 3], &["by += 1;", "by"]);
        assert!(lines.contains(&"String::from(\"gauge\")"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let source = "pub trait Clock { fn now(&self) -> u64; fn tick(&mut self, by: u64); }";
        let first = emit_from(source, "crate::Clock").unwrap();
        let second = emit_from(source, "crate::Clock").unwrap();
        assert_eq!(first.content, second.content);
    }

    #[test]
    fn test_overloads_get_distinct_constants() {
        let unit = emit_from(
            indoc! {r#"
                pub trait Bytes { fn send(&self, value: u8); }
                pub trait Text { fn send(&self, value: String); }
                pub trait Channel: Bytes + Text {}
            "#},
            "crate::Channel",
        )
        .unwrap();
        let names: Vec<&str> = unit.selectors.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["SEL_SEND_U8", "SEL_SEND_STRING"]);
        assert!(unit.content.contains("impl crate::Bytes for MockChannel {"));
        assert!(unit.content.contains("impl crate::Text for MockChannel {"));
    }

    #[test]
    fn test_type_without_members_is_an_emission_error() {
        let error = emit_from("pub trait Marker {}", "crate::Marker").unwrap_err();
        assert_eq!(error.kind, DiagnosticKind::EmissionError);
    }

    #[test]
    fn test_unimplementable_conformance_is_an_emission_error() {
        let error = emit_from(
            "pub trait Named { fn name(&self) -> &str; fn id(&self) -> u32; }",
            "crate::Named",
        )
        .unwrap_err();
        assert_eq!(error.kind, DiagnosticKind::EmissionError);
        assert!(error.message.contains("cannot implement"));
    }

    #[test]
    fn test_struct_mock_wraps_real_value() {
        let unit = emit_from(
            indoc! {r#"
                #[derive(Debug, Clone, PartialEq)]
                pub struct Account {
                    pub owner: String,
                    balance: u64,
                }
                impl Account {
                    pub fn new(owner: String) -> Self { Self { owner, balance: 0 } }
                    pub fn deposit(&mut self, amount: u64) { self.balance += amount; }
                    pub fn balance(&self) -> u64 { self.balance }
                }
            "#},
            "crate::Account",
        )
        .unwrap();
        let content = &unit.content;
        assert!(content.contains("__mocksmith_real: mocksmith::runtime::RealSlot<crate::Account>,"));
        assert!(content.contains("pub fn from_new(owner: String) -> Self {"));
        assert!(content.contains("pub fn set_owner"));
        assert!(content.contains("pub fn deposit"));
        syn::parse_file(content).unwrap();
    }

    #[test]
    fn test_associated_types_become_parameters() {
        let unit = emit_from(
            indoc! {r#"
                pub trait Source {
                    type Item: Clone;
                    fn next(&mut self) -> Option<Self::Item>;
                }
            "#},
            "crate::Source",
        )
        .unwrap();
        assert!(unit.content.contains("pub struct MockSource<Item: Clone + 'static>"));
        assert!(unit.content.contains("type Item = Item;"));
    }

    #[test]
    fn test_mod_file_lists_units_in_order() {
        let unit = |module: &str, mock: &str| EmittedUnit {
            type_path: String::new(),
            mock_name: mock.into(),
            module_name: module.into(),
            content: String::new(),
            selectors: Vec::new(),
            warnings: Vec::new(),
        };
        let content = render_mod_file(&[unit("mock_b", "MockB"), unit("mock_a", "MockA")], Some("custom"));
        assert_eq!(
            content,
            "// custom\n\npub mod mock_a;\npub mod mock_b;\n\npub use mock_a::MockA;\npub use mock_b::MockB;\n"
        );
    }
}
