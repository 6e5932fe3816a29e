//! Pure selection of the declarations that get a mock.

use crate::errors::Result;
use crate::model::{TypeDeclaration, TypeKind};

/// Include/exclude globs over full type paths (`crate::store::*`).
#[derive(Debug, Clone, Default)]
pub struct TypeFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl TypeFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| glob::Pattern::new(pattern))
                .collect::<std::result::Result<Vec<_>, _>>()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// No include patterns means everything is included; exclusion wins.
    pub fn accepts(&self, full_path: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|pattern| pattern.matches(full_path));
        included && !self.exclude.iter().any(|pattern| pattern.matches(full_path))
    }
}

/// Whether a declaration has anything a mock could forward.
///
/// Every visible trait qualifies. Structs and enums need members, an
/// analyzed conformance or a `Deref` base; plain data types are left alone.
pub fn is_candidate(declaration: &TypeDeclaration) -> bool {
    if declaration.skip || !declaration.accessibility.is_visible_outside_module() {
        return false;
    }
    match declaration.kind {
        TypeKind::Protocol => true,
        TypeKind::Class | TypeKind::ValueType => {
            !declaration.members.is_empty()
                || !declaration.supertypes.is_empty()
                || declaration.base.is_some()
        }
    }
}

/// Full paths of the declarations to mock, sorted.
pub fn select_types<'a>(
    declarations: impl IntoIterator<Item = &'a TypeDeclaration>,
    filter: &TypeFilter,
) -> Vec<String> {
    let mut selected: Vec<String> = declarations
        .into_iter()
        .filter(|declaration| is_candidate(declaration))
        .map(TypeDeclaration::full_path)
        .filter(|full_path| filter.accepts(full_path))
        .collect();
    selected.sort();
    selected.dedup();
    selected
}
