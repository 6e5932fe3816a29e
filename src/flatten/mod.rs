//! Declaration model builder: flattens inheritance into mockable types.
//!
//! The walk is depth-first over supertraits (for traits) or the `Deref` base
//! chain plus trait impls (for structs and enums). Members are collected in
//! walk order and merged by signature; the most derived declaration wins.

mod substitute;
mod symbols;

pub use substitute::{substitute_member, Substitution};
pub use symbols::SymbolTable;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::model::{
    AssociatedTypeParam, ClassScope, ComparisonClass, Conformance, ConformanceKind, FlatMember,
    GenericKind, Member, MockableType, ReturnShape, Signature, SuperType, TypeDeclaration,
    TypeKind, TypeRef,
};
use std::collections::HashSet;

/// Satisfied by every mock without further code.
const MARKER_TRAITS: &[&str] = &["Send", "Sync", "Unpin", "Sized"];

/// Implemented by every emitted mock.
const PROVIDED_TRAITS: &[&str] = &["Clone", "Debug", "Default"];

struct Candidate {
    member: Member,
    declared_by: String,
    conformance: Option<usize>,
    depth: usize,
    through_deref: Option<bool>,
}

struct Walk<'a> {
    table: &'a SymbolTable,
    root: String,
    in_progress: Vec<String>,
    seen_conformances: HashSet<String>,
    candidates: Vec<Candidate>,
    conformances: Vec<Conformance>,
    associated: Vec<AssociatedTypeParam>,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

/// Flatten the declaration stored under `full_path`.
pub fn flatten(table: &SymbolTable, full_path: &str) -> Result<MockableType, Vec<Diagnostic>> {
    let Some(declaration) = table.get(full_path) else {
        return Err(vec![Diagnostic::error(
            DiagnosticKind::UnresolvedReference,
            format!("`{}` is not among the analyzed declarations", full_path),
        )
        .for_type(full_path)]);
    };

    let mut walk = Walk {
        table,
        root: full_path.to_string(),
        in_progress: Vec::new(),
        seen_conformances: HashSet::new(),
        candidates: Vec::new(),
        conformances: Vec::new(),
        associated: Vec::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    match declaration.kind {
        TypeKind::Protocol => {
            let (lifetimes, args) = own_arguments(declaration);
            walk.visit_trait(declaration, Substitution::default(), 0, lifetimes, args, Vec::new());
        }
        TypeKind::Class | TypeKind::ValueType => {
            walk.visit_type(declaration, Substitution::default(), 0, None);
        }
    }

    let mut mockable = MockableType::new(declaration.clone());
    walk.merge(&mut mockable);
    if !walk.errors.is_empty() {
        let mut diagnostics = walk.errors;
        diagnostics.extend(walk.warnings);
        return Err(diagnostics);
    }
    mockable.associated = walk.associated;
    mockable.conformances = walk.conformances;
    mockable.warnings = walk.warnings;
    classify(table, &mut mockable);

    tracing::debug!(
        name = %full_path,
        members = mockable.members.len(),
        conformances = mockable.conformances.len(),
        excluded = mockable.excluded.len(),
        "type flattened"
    );
    Ok(mockable)
}

/// A trait's own parameters used as arguments of its own conformance.
fn own_arguments(declaration: &TypeDeclaration) -> (Vec<String>, Vec<TypeRef>) {
    let mut lifetimes = Vec::new();
    let mut args = Vec::new();
    for param in &declaration.generics.params {
        match param.kind {
            GenericKind::Lifetime => lifetimes.push(param.name.clone()),
            GenericKind::Type | GenericKind::Const => {
                if let Ok(ty) = syn::parse_str::<syn::Type>(&param.name) {
                    args.push(TypeRef::from_syn(&ty));
                }
            }
        }
    }
    (lifetimes, args)
}

impl Walk<'_> {
    fn enter(&mut self, declaration: &TypeDeclaration) -> bool {
        let key = declaration.full_path();
        if self.in_progress.contains(&key) {
            let chain = self
                .in_progress
                .iter()
                .chain(std::iter::once(&key))
                .cloned()
                .collect::<Vec<_>>()
                .join(" -> ");
            self.warnings.push(
                Diagnostic::warning(
                    DiagnosticKind::InheritanceCycle,
                    format!("inheritance cycle {} ignored", chain),
                )
                .at(&declaration.location)
                .for_type(&self.root),
            );
            return false;
        }
        self.in_progress.push(key);
        true
    }

    fn leave(&mut self) {
        self.in_progress.pop();
    }

    fn collision(&mut self, member: &Member, message: String) {
        self.errors.push(
            Diagnostic::error(DiagnosticKind::SignatureCollision, message)
                .at(&member.location)
                .for_type(&self.root),
        );
    }

    /// Push a declaration's own members, reporting duplicates within it.
    fn collect_members(
        &mut self,
        declaration: &TypeDeclaration,
        subst: &Substitution,
        conformance: Option<usize>,
        depth: usize,
        through_deref: Option<bool>,
    ) {
        let key = declaration.full_path();
        let mut seen: HashSet<Signature> = HashSet::new();
        for member in &declaration.members {
            let member = substitute_member(member, subst);
            if !seen.insert(member.signature()) {
                self.collision(
                    &member,
                    format!("`{}` is declared more than once in `{}`", member.signature(), key),
                );
                continue;
            }
            self.candidates.push(Candidate {
                member,
                declared_by: key.clone(),
                conformance,
                depth,
                through_deref,
            });
        }
    }

    fn visit_trait(
        &mut self,
        declaration: &TypeDeclaration,
        mut subst: Substitution,
        depth: usize,
        lifetimes: Vec<String>,
        args: Vec<TypeRef>,
        bindings: Vec<(String, TypeRef)>,
    ) {
        let key = declaration.full_path();
        let mut conformance = Conformance {
            path: key.clone(),
            name: declaration.name.clone(),
            kind: ConformanceKind::Declared,
            lifetimes,
            args,
            associated: Vec::new(),
            where_predicates: Vec::new(),
            declared_by: key.clone(),
            initializers: Vec::new(),
            unimplementable: Vec::new(),
        };
        if !self.enter(declaration) {
            return;
        }
        if !self.seen_conformances.insert(conformance.reference()) {
            self.leave();
            return;
        }

        for assoc in &declaration.associated_types {
            match bindings.iter().find(|(name, _)| *name == assoc.name) {
                Some((_, bound)) => {
                    subst.bind_associated(&assoc.name, bound);
                    conformance.associated.push((assoc.name.clone(), bound.clone()));
                }
                None => {
                    if !self.associated.iter().any(|param| param.name == assoc.name) {
                        self.associated.push(AssociatedTypeParam {
                            name: assoc.name.clone(),
                            bounds: assoc
                                .bounds
                                .iter()
                                .map(|bound| subst.apply_str(bound, &HashSet::new(), false))
                                .collect(),
                        });
                    }
                    if let Ok(ty) = syn::parse_str::<syn::Type>(&assoc.name) {
                        conformance
                            .associated
                            .push((assoc.name.clone(), TypeRef::from_syn(&ty)));
                    }
                }
            }
        }
        conformance.where_predicates = declaration
            .generics
            .where_predicates
            .iter()
            .filter(|predicate| !predicate.trim_start().starts_with("Self"))
            .map(|predicate| subst.apply_str(predicate, &HashSet::new(), false))
            .collect();
        conformance.initializers = declaration
            .initializers
            .iter()
            .map(|initializer| {
                let mut initializer = initializer.clone();
                for param in &mut initializer.params {
                    param.ty = subst.apply_type(&param.ty, &HashSet::new());
                }
                initializer
            })
            .collect();
        conformance.unimplementable = declaration
            .required_items
            .iter()
            .map(|item| format!("`{}` cannot be provided by a mock", item))
            .collect();
        for name in subst.unresolved() {
            conformance
                .unimplementable
                .push(format!("generic parameter `{}` has no argument", name));
        }

        let index = self.conformances.len();
        self.conformances.push(conformance);
        self.collect_members(declaration, &subst, Some(index), depth, None);

        for super_type in &declaration.supertypes {
            self.visit_supertype(declaration, super_type, &subst, depth + 1, true);
        }
        self.leave();
    }

    fn visit_supertype(
        &mut self,
        owner: &TypeDeclaration,
        super_type: &SuperType,
        subst: &Substitution,
        depth: usize,
        strict: bool,
    ) {
        if MARKER_TRAITS.contains(&super_type.name.as_str()) {
            return;
        }
        if PROVIDED_TRAITS.contains(&super_type.name.as_str())
            && self.table.resolve(&super_type.path, &owner.module_path).is_none()
        {
            if self.seen_conformances.insert(super_type.name.clone()) {
                self.conformances.push(Conformance {
                    path: super_type.path.clone(),
                    name: super_type.name.clone(),
                    kind: ConformanceKind::Provided,
                    lifetimes: Vec::new(),
                    args: Vec::new(),
                    associated: Vec::new(),
                    where_predicates: Vec::new(),
                    declared_by: super_type.path.clone(),
                    initializers: Vec::new(),
                    unimplementable: Vec::new(),
                });
            }
            return;
        }

        let resolved = self.table.resolve(&super_type.path, &owner.module_path);
        let Some(parent) = resolved.filter(|parent| parent.kind == TypeKind::Protocol) else {
            if strict {
                let message = match resolved {
                    Some(_) => format!("supertrait `{}` is not a trait", super_type),
                    None => format!("supertrait `{}` is not among the analyzed sources", super_type),
                };
                self.errors.push(
                    Diagnostic::error(DiagnosticKind::UnsupportedDeclaration, message)
                        .at(&owner.location)
                        .for_type(&self.root),
                );
            } else {
                tracing::trace!(conformance = %super_type, "trait outside the analyzed sources skipped");
            }
            return;
        };

        let empty = HashSet::new();
        let args: Vec<TypeRef> = super_type
            .args
            .iter()
            .map(|arg| subst.apply_type(arg, &empty))
            .collect();
        let bindings: Vec<(String, TypeRef)> = super_type
            .bindings
            .iter()
            .map(|(name, ty)| (name.clone(), subst.apply_type(ty, &empty)))
            .collect();

        let (child, full_args) = edge_substitution(parent, &args);
        self.visit_trait(parent, child, depth, Vec::new(), full_args, bindings);
    }

    fn visit_type(
        &mut self,
        declaration: &TypeDeclaration,
        subst: Substitution,
        depth: usize,
        through_deref: Option<bool>,
    ) {
        if !self.enter(declaration) {
            return;
        }
        self.collect_members(declaration, &subst, None, depth, through_deref);

        if let Some(base) = &declaration.base {
            let resolved = self
                .table
                .resolve(&base.path, &declaration.module_path)
                .filter(|parent| parent.kind != TypeKind::Protocol);
            match resolved {
                Some(parent) => {
                    let empty = HashSet::new();
                    let args: Vec<TypeRef> = base
                        .args
                        .iter()
                        .map(|arg| subst.apply_type(arg, &empty))
                        .collect();
                    let (child, _) = edge_substitution(parent, &args);
                    let mutable = declaration.base_mutable && through_deref.unwrap_or(true);
                    self.visit_type(parent, child, depth + 1, Some(mutable));
                }
                None => self.warnings.push(
                    Diagnostic::warning(
                        DiagnosticKind::UnresolvedReference,
                        format!(
                            "base `{}` is outside the analyzed sources; its members are not mocked",
                            base
                        ),
                    )
                    .at(&declaration.location)
                    .for_type(&self.root),
                ),
            }
        }

        if depth == 0 {
            for super_type in &declaration.supertypes {
                self.visit_supertype(declaration, super_type, &subst, depth + 1, false);
            }
        }
        self.leave();
    }

    fn exclude(&mut self, mockable: &mut MockableType, candidate: &Candidate, reason: &str) {
        let signature = candidate.member.signature().to_string();
        if let Some(index) = candidate.conformance {
            if candidate.member.default_body.is_none() {
                self.conformances[index]
                    .unimplementable
                    .push(format!("`{}` {}", signature, reason));
            }
        }
        if mockable.excluded.iter().any(|(excluded, _)| *excluded == signature) {
            return;
        }
        self.warnings.push(
            Diagnostic::warning(
                DiagnosticKind::UnsupportedDeclaration,
                format!("`{}` is not mocked: {}", signature, reason),
            )
            .at(&candidate.member.location)
            .for_type(&self.root),
        );
        mockable.excluded.push((signature, reason.to_string()));
    }

    /// Merge candidates by signature, most derived first.
    fn merge(&mut self, mockable: &mut MockableType) {
        let candidates = std::mem::take(&mut self.candidates);
        let mut excluded: HashSet<Signature> = HashSet::new();

        for candidate in candidates {
            let signature = candidate.member.signature();
            if let Some(reason) = candidate.member.unsupported.clone() {
                self.exclude(mockable, &candidate, &reason);
                excluded.insert(signature);
                continue;
            }
            if excluded.contains(&signature) {
                self.exclude(mockable, &candidate, "shadowed by a member that cannot be mocked");
                continue;
            }

            let position = mockable
                .members
                .iter()
                .position(|member| member.signature() == signature);
            let Some(position) = position else {
                mockable.members.push(FlatMember {
                    inherent: candidate.conformance.is_none(),
                    conformances: candidate.conformance.into_iter().collect(),
                    default_bodies: candidate
                        .conformance
                        .zip(candidate.member.default_body.clone())
                        .into_iter()
                        .collect(),
                    declared_by: candidate.declared_by,
                    depth: candidate.depth,
                    through_deref: candidate.through_deref,
                    output_clonable: false,
                    member: candidate.member,
                });
                continue;
            };
            let existing = &mut mockable.members[position];

            let candidate_derived = self
                .table
                .descends_from(&candidate.declared_by, &existing.declared_by);
            let existing_derived = self
                .table
                .descends_from(&existing.declared_by, &candidate.declared_by);
            if !existing.member.same_shape(&candidate.member) {
                let message = if candidate_derived || existing_derived {
                    format!(
                        "`{}` in `{}` shadows `{}` with a different receiver, effects or return type",
                        signature, existing.declared_by, candidate.declared_by
                    )
                } else {
                    format!(
                        "`{}` is inherited from `{}` and `{}` with different receivers, effects or return types",
                        signature, existing.declared_by, candidate.declared_by
                    )
                };
                let member = candidate.member.clone();
                self.collision(&member, message);
                continue;
            }

            if candidate_derived && !existing_derived {
                existing.member = candidate.member.clone();
                existing.declared_by = candidate.declared_by.clone();
                existing.depth = candidate.depth;
                existing.through_deref = candidate.through_deref;
            }
            match candidate.conformance {
                Some(index) => {
                    if !existing.conformances.contains(&index) {
                        existing.conformances.push(index);
                    }
                    if let Some(body) = candidate.member.default_body {
                        existing.default_bodies.push((index, body));
                    }
                }
                None => existing.inherent = true,
            }
        }
    }
}

/// Substitution for an inheritance edge, and the argument list it implies.
fn edge_substitution(parent: &TypeDeclaration, args: &[TypeRef]) -> (Substitution, Vec<TypeRef>) {
    let mut child = Substitution::default();
    let mut full_args = Vec::new();
    for (index, param) in parent.generics.type_params().enumerate() {
        match args.get(index) {
            Some(arg) => {
                child.bind(&param.name, arg);
                full_args.push(arg.clone());
            }
            None => match &param.default {
                Some(default) => {
                    let resolved = child.apply_type(default, &HashSet::new());
                    child.bind(&param.name, &resolved);
                    full_args.push(resolved);
                }
                None => child.mark_unresolved(&param.name),
            },
        }
    }
    (child, full_args)
}

/// Fill in comparison classes and defaultability.
fn classify(table: &SymbolTable, mockable: &mut MockableType) {
    let declaration = &mockable.declaration;
    let mut base_scope = ClassScope::new(table);
    for param in declaration.generics.type_params() {
        let mut bounds = declaration.generics.bounds_of(&param.name);
        bounds.push("'static".to_string());
        base_scope.params.insert(param.name.clone(), bounds);
    }
    for assoc in &mockable.associated {
        let mut bounds = assoc.bounds.clone();
        bounds.push("'static".to_string());
        base_scope.params.insert(assoc.name.clone(), bounds);
    }

    for flat in &mut mockable.members {
        let mut params = base_scope.params.clone();
        for param in flat.member.generics.type_params() {
            params.insert(param.name.clone(), flat.member.generics.bounds_of(&param.name));
        }
        let scope = ClassScope {
            facts: base_scope.facts,
            params,
        };
        for param in &mut flat.member.params {
            param.comparison = match param.ty.parse() {
                Ok(ty) => scope.classify(&ty),
                Err(_) => Default::default(),
            };
        }
        flat.output_clonable = flat
            .member
            .output
            .as_ref()
            .and_then(|output| output.parse().ok())
            .is_some_and(|ty| scope.classify(&ty) == ComparisonClass::Equatable);
        flat.member.defaultable = match &flat.member.returns {
            ReturnShape::Unit | ReturnShape::Optional(_) => true,
            ReturnShape::Plain(ty) => ty.parse().is_ok_and(|ty| scope.is_defaultable(&ty)),
            ReturnShape::Fallible { .. } => false,
        };
    }
}
