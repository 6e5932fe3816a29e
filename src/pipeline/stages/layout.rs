//! Pure placement of emitted units in the output directory.

use crate::codegen::naming::snake_case;
use crate::codegen::EmittedUnit;
use std::collections::{BTreeMap, BTreeSet};

/// `crate::net::http::Client` -> `mock_net_http_client`.
fn qualified_module_name(type_path: &str) -> String {
    let segments: Vec<String> = type_path
        .split("::")
        .filter(|segment| *segment != "crate")
        .map(snake_case)
        .collect();
    format!("mock_{}", segments.join("_"))
}

/// Give every unit a distinct module (and file) name.
///
/// Types sharing a simple name in different modules are renamed after
/// their full path; anything still clashing gets a numeric suffix. Units
/// are expected in type-path order, which keeps the result deterministic.
pub fn assign_module_names(units: &mut [EmittedUnit]) {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, unit) in units.iter().enumerate() {
        groups.entry(unit.module_name.clone()).or_default().push(index);
    }

    let mut taken: BTreeSet<String> = groups
        .iter()
        .filter(|(_, members)| members.len() == 1)
        .map(|(name, _)| name.clone())
        .collect();

    for members in groups.values().filter(|members| members.len() > 1) {
        for &index in members {
            let base = qualified_module_name(&units[index].type_path);
            let mut name = base.clone();
            let mut suffix = 2;
            while taken.contains(&name) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            tracing::debug!(
                type_path = %units[index].type_path,
                module = %name,
                "module name disambiguated"
            );
            taken.insert(name.clone());
            units[index].module_name = name;
        }
    }
}
