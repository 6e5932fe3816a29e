//! Deterministic names for generated items.

use crate::model::FlatMember;
use std::collections::{BTreeMap, HashMap};

/// `HttpClient` -> `http_client`, `IOStream` -> `io_stream`.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (index, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let prev = index.checked_sub(1).map(|i| chars[i]);
            let next = chars.get(index + 1).copied();
            let boundary = match prev {
                Some(prev) if prev.is_lowercase() || prev.is_ascii_digit() => true,
                Some(prev) if prev.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else if ch.is_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

pub fn mock_name(type_name: &str) -> String {
    format!("Mock{}", type_name)
}

pub fn module_name(type_name: &str) -> String {
    format!("mock_{}", snake_case(type_name))
}

/// Upper-case identifier fragment from arbitrary text.
fn constant_fragment(text: &str) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn base_constant(member: &FlatMember) -> String {
    let name = member.signature().name;
    format!("SEL_{}", snake_case(&name).to_uppercase())
}

/// Selector constant name for every member, in member order.
///
/// Members sharing a name get a suffix built from their parameter types;
/// anything still ambiguous gets a positional suffix.
pub fn selector_constants(members: &[FlatMember]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for member in members {
        *counts.entry(base_constant(member)).or_default() += 1;
    }

    let mut names: Vec<String> = members
        .iter()
        .map(|member| {
            let base = base_constant(member);
            if counts[&base] == 1 {
                return base;
            }
            let signature = member.signature();
            let params = constant_fragment(&signature.params.join("_"));
            let arity = match signature.generic_arity {
                0 => String::new(),
                n => format!("_G{}", n),
            };
            if params.is_empty() {
                format!("{}{}_NONE", base, arity)
            } else {
                format!("{}{}_{}", base, arity, params)
            }
        })
        .collect();

    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    for name in &mut names {
        let count = seen.entry(name.clone()).or_default();
        *count += 1;
        if *count > 1 {
            name.push_str(&format!("_{}", count));
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("HttpClient"), "http_client");
        assert_eq!(snake_case("IOStream"), "io_stream");
        assert_eq!(snake_case("Store2Backend"), "store2_backend");
        assert_eq!(snake_case("name.get"), "name_get");
        assert_eq!(module_name("UserStore"), "mock_user_store");
    }

    #[test]
    fn test_constant_fragment() {
        assert_eq!(constant_fragment("&str, Vec<u8>"), "STR_VEC_U8");
    }
}
