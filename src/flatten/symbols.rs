//! Symbol table built from all file analyses.
//!
//! The merge is the single-writer phase of generation: it runs on one thread
//! after the parallel analysis and before the parallel flattening, so the
//! table itself needs no synchronization.

use crate::analyzer::{attach, FileAnalysis, ImplFacts, TypeAlias};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::model::{full_path, DeclaredFacts, TypeDeclaration, TypeFacts};
use std::collections::{BTreeMap, HashMap};

const ALIAS_DEPTH: usize = 8;

#[derive(Debug, Default)]
pub struct SymbolTable {
    declarations: BTreeMap<String, TypeDeclaration>,
    by_name: HashMap<String, Vec<String>>,
    aliases: HashMap<String, TypeAlias>,
    diagnostics: Vec<Diagnostic>,
}

impl SymbolTable {
    /// Insert every declaration, then attach impl blocks declared elsewhere.
    pub fn merge(analyses: Vec<FileAnalysis>) -> Self {
        let mut table = Self::default();
        let mut pending: Vec<ImplFacts> = Vec::new();

        for analysis in analyses {
            table.diagnostics.extend(analysis.diagnostics);
            for alias in analysis.aliases {
                table
                    .aliases
                    .insert(full_path(&alias.module_path, &alias.name), alias);
            }
            for declaration in analysis.declarations {
                table.insert(declaration);
            }
            pending.extend(analysis.impls);
        }

        pending.sort_by_key(ImplFacts::attach_order);
        for facts in pending {
            let target = table
                .resolve_key(&facts.self_path, &facts.module_path)
                .filter(|key| {
                    table
                        .declarations
                        .get(key)
                        .is_some_and(|declaration| !matches!(declaration.kind, crate::model::TypeKind::Protocol))
                });
            match target {
                Some(key) => {
                    if let Some(declaration) = table.declarations.get_mut(&key) {
                        attach(declaration, &facts);
                    }
                }
                None => tracing::trace!(self_path = %facts.self_path, "impl for a type outside the analyzed sources"),
            }
        }

        tracing::debug!(
            declarations = table.declarations.len(),
            aliases = table.aliases.len(),
            "symbol table merged"
        );
        table
    }

    fn insert(&mut self, declaration: TypeDeclaration) {
        let key = declaration.full_path();
        if let Some(existing) = self.declarations.get(&key) {
            self.diagnostics.push(
                Diagnostic::error(
                    DiagnosticKind::DuplicateDefinition,
                    format!("`{}` is also defined at {}", key, existing.location),
                )
                .at(&declaration.location)
                .for_type(&key),
            );
            return;
        }
        self.by_name
            .entry(declaration.name.clone())
            .or_default()
            .push(key.clone());
        self.declarations.insert(key, declaration);
    }

    pub fn get(&self, full_path: &str) -> Option<&TypeDeclaration> {
        self.declarations.get(full_path)
    }

    /// All declarations ordered by full path.
    pub fn declarations(&self) -> impl Iterator<Item = &TypeDeclaration> {
        self.declarations.values()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Diagnostics from analysis and merging.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Resolve a type referenced from `from_module`.
    pub fn resolve(&self, path: &str, from_module: &[String]) -> Option<&TypeDeclaration> {
        self.resolve_key(path, from_module)
            .and_then(|key| self.declarations.get(&key))
    }

    /// Full path of a referenced type: by full path, relative to the
    /// referencing module, then by unique simple name. Aliases are followed.
    pub fn resolve_key(&self, path: &str, from_module: &[String]) -> Option<String> {
        self.resolve_depth(path, from_module, 0)
    }

    fn resolve_depth(&self, path: &str, from_module: &[String], depth: usize) -> Option<String> {
        if depth > ALIAS_DEPTH {
            return None;
        }
        let segments: Vec<&str> = path.split("::").map(str::trim).filter(|s| !s.is_empty()).collect();
        let (last, init) = segments.split_last()?;

        let mut candidates: Vec<String> = Vec::new();
        match init.first().copied() {
            Some("crate") => candidates.push(path_of(&init[1..], last)),
            Some("self") => {
                let mut base = from_module.to_vec();
                base.extend(init[1..].iter().map(|s| s.to_string()));
                candidates.push(full_path(&base, last));
            }
            Some("super") => {
                let mut base = from_module.to_vec();
                let mut rest = init;
                while rest.first() == Some(&"super") {
                    base.pop()?;
                    rest = &rest[1..];
                }
                base.extend(rest.iter().map(|s| s.to_string()));
                candidates.push(full_path(&base, last));
            }
            _ => {
                let mut local = from_module.to_vec();
                local.extend(init.iter().map(|s| s.to_string()));
                candidates.push(full_path(&local, last));
                candidates.push(path_of(init, last));
            }
        }

        for candidate in &candidates {
            if self.declarations.contains_key(candidate) {
                return Some(candidate.clone());
            }
            if let Some(alias) = self.aliases.get(candidate) {
                return self.resolve_alias(alias, depth);
            }
        }

        if !init.is_empty() {
            return None;
        }
        match self.by_name.get(*last).map(Vec::as_slice) {
            Some([only]) => Some(only.clone()),
            _ => {
                let matches: Vec<&TypeAlias> = self
                    .aliases
                    .values()
                    .filter(|alias| alias.name == *last)
                    .collect();
                match matches.as_slice() {
                    [alias] => self.resolve_alias(alias, depth),
                    _ => None,
                }
            }
        }
    }

    fn resolve_alias(&self, alias: &TypeAlias, depth: usize) -> Option<String> {
        let target = alias.target.parse().ok()?;
        let syn::Type::Path(path) = target else {
            return None;
        };
        let mut bare = path.path.clone();
        if let Some(last) = bare.segments.last_mut() {
            last.arguments = syn::PathArguments::None;
        }
        let rendered = crate::model::render_path(&bare, false);
        self.resolve_depth(&rendered, &alias.module_path, depth + 1)
    }

    /// Whether `ancestor` is reachable from `descendant` through supertypes or bases.
    pub fn descends_from(&self, descendant: &str, ancestor: &str) -> bool {
        let mut stack = vec![descendant.to_string()];
        let mut seen = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let Some(declaration) = self.declarations.get(&current) else {
                continue;
            };
            for parent in declaration.supertypes.iter().chain(declaration.base.iter()) {
                if let Some(key) = self.resolve_key(&parent.path, &declaration.module_path) {
                    if key == ancestor {
                        return true;
                    }
                    stack.push(key);
                }
            }
        }
        false
    }
}

fn path_of(module: &[&str], name: &str) -> String {
    let module: Vec<String> = module.iter().map(|s| s.to_string()).collect();
    full_path(&module, name)
}

impl TypeFacts for SymbolTable {
    fn facts_for(&self, name: &str) -> Option<DeclaredFacts> {
        match self.by_name.get(name).map(Vec::as_slice) {
            Some([only]) => self.declarations.get(only).map(DeclaredFacts::of),
            _ => None,
        }
    }
}
