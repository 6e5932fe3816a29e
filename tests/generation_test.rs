mod common;

use common::{generate_source, Fixture};
use indoc::indoc;
use mocksmith::io::WriteStatus;
use mocksmith::{generate, Config, DiagnosticKind};
use pretty_assertions::assert_eq;

const STORE: &str = indoc! {r#"
    use std::collections::HashMap;

    pub trait Store: Send + Sync {
        fn get(&self, key: &str) -> Option<String>;
        fn put(&mut self, key: String, value: String);
        fn len(&self) -> usize {
            0
        }
        fn dump(&self) -> HashMap<String, String>;
    }
"#};

fn store_fixture() -> Fixture {
    Fixture::new(&[("lib.rs", "pub mod store;\n"), ("store.rs", STORE)])
}

#[test]
fn test_generates_one_file_per_type_and_mod_file() {
    let fixture = store_fixture();
    let report = fixture.generate();

    assert!(!report.has_errors(), "{:?}", report.diagnostics);
    let paths: Vec<&str> = report.units.iter().map(|unit| unit.type_path.as_str()).collect();
    assert_eq!(paths, vec!["crate::store::Store"]);

    let unit = &report.units[0];
    let selectors: Vec<(&str, &str)> = unit
        .selectors
        .iter()
        .map(|constant| (constant.name.as_str(), constant.selector.as_str()))
        .collect();
    assert_eq!(
        selectors,
        vec![
            ("SEL_GET", "get(&str)"),
            ("SEL_PUT", "put(String, String)"),
            ("SEL_LEN", "len()"),
            ("SEL_DUMP", "dump()"),
        ]
    );

    let mock = fixture.generated("mock_store.rs");
    assert!(mock.contains("use std::collections::HashMap;"));
    assert!(mock.contains("use crate::store::*;"));
    assert!(mock.contains("impl crate::store::Store for MockStore {"));

    assert_eq!(
        fixture.generated("mod.rs"),
        "// Generated by mocksmith. Do not edit.\n\npub mod mock_store;\n\npub use mock_store::MockStore;\n"
    );
    assert_eq!(report.written, 2);
    assert_eq!(report.unchanged, 0);
}

#[test]
fn test_unchanged_outputs_are_not_rewritten() {
    let fixture = store_fixture();
    let first = fixture.generate();
    assert_eq!(first.written, 2);

    let second = fixture.generate();
    assert_eq!(second.written, 0);
    assert_eq!(second.unchanged, 2);
    assert!(second
        .files
        .iter()
        .all(|file| file.status == WriteStatus::Unchanged));
    let hashes = |report: &mocksmith::GenerationReport| -> Vec<u64> {
        report.files.iter().map(|file| file.hash).collect()
    };
    assert_eq!(hashes(&first), hashes(&second));

    fixture.write(
        "store.rs",
        &STORE.replace("fn len(&self)", "fn size(&self)"),
    );
    let third = fixture.generate();
    assert_eq!(third.written, 1);
    assert_eq!(third.unchanged, 1);
}

#[test]
fn test_generated_files_reparse_as_rust() {
    let report = generate_source(indoc! {r#"
        #[derive(Debug, Clone, PartialEq)]
        pub struct User {
            pub id: u64,
            pub name: String,
        }

        pub trait Repository<T> {
            fn find(&self, id: u64) -> Option<T>;
            fn save(&mut self, item: T) -> Result<(), String>;
        }

        pub trait Users: Repository<User> + Send + Sync {
            async fn refresh(&self) -> Result<usize, String>;
            fn by_name<'a>(&self, name: &'a str) -> Vec<User>;
        }

        pub trait Source {
            type Item: Clone;
            fn next(&mut self) -> Option<Self::Item>;
        }

        pub struct Account {
            pub owner: String,
            balance: u64,
        }

        impl Account {
            pub fn new(owner: String) -> Self {
                Self { owner, balance: 0 }
            }
            pub fn deposit(&mut self, amount: u64) {
                self.balance += amount;
            }
            pub fn balance(&self) -> u64 {
                self.balance
            }
        }
    "#});

    assert!(!report.has_errors(), "{:?}", report.diagnostics);
    let paths: Vec<&str> = report.units.iter().map(|unit| unit.type_path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "crate::Account",
            "crate::Repository",
            "crate::Source",
            "crate::User",
            "crate::Users",
        ]
    );
    for unit in &report.units {
        syn::parse_file(&unit.content)
            .unwrap_or_else(|error| panic!("{} does not parse: {}", unit.file_name(), error));
    }
    syn::parse_file(report.mod_file.as_deref().unwrap()).unwrap();
}

#[test]
fn test_overloads_get_unique_selectors_and_constants() {
    let report = generate_source(indoc! {r#"
        pub trait Bytes {
            fn send(&self, value: u8);
        }
        pub trait Text {
            fn send(&self, value: String);
            fn send_all<T: Into<String> + 'static>(&self, values: Vec<T>);
        }
        pub trait Channel: Bytes + Text {
            fn send(&self);
        }
    "#});

    let channel = report.unit("crate::Channel").unwrap();
    let names: Vec<&str> = channel.selectors.iter().map(|s| s.name.as_str()).collect();
    let selectors: Vec<&str> = channel.selectors.iter().map(|s| s.selector.as_str()).collect();
    assert_eq!(
        selectors,
        vec!["send()", "send(u8)", "send(String)", "send_all<1>(Vec<T>)"]
    );
    assert_eq!(
        names,
        vec!["SEL_SEND_NONE", "SEL_SEND_U8", "SEL_SEND_STRING", "SEL_SEND_ALL"]
    );

    let mut unique = selectors.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), selectors.len());
}

#[test]
fn test_most_derived_declaration_wins() {
    let report = generate_source(indoc! {r#"
        pub trait Base {
            fn describe(&self) -> String {
                String::from("base")
            }
            fn id(&self) -> u32;
        }
        pub trait Middle: Base {
            fn describe(&self) -> String {
                String::from("middle")
            }
        }
        pub trait Leaf: Middle + Base {}
    "#});

    let leaf = report.unit("crate::Leaf").unwrap();
    let selectors: Vec<&str> = leaf.selectors.iter().map(|s| s.selector.as_str()).collect();
    assert_eq!(selectors, vec!["describe()", "id()"]);
    assert!(leaf.content.contains("impl crate::Middle for MockLeaf {"));
    assert!(leaf.content.contains("impl crate::Base for MockLeaf {"));
    assert!(leaf.content.contains("\"middle\""));
}

#[test]
fn test_parse_failures_are_isolated_to_their_file() {
    let fixture = Fixture::new(&[
        ("lib.rs", "pub mod broken;\npub mod clock;\n"),
        ("broken.rs", "pub trait Broken {\n    fn half(&self) -> \n"),
        ("clock.rs", "pub trait Clock {\n    fn now(&self) -> u64;\n}\n"),
    ]);
    let report = fixture.generate();

    let failures: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.kind == DiagnosticKind::ParseFailure)
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].file.as_ref().unwrap().ends_with("broken.rs"));
    assert!(failures[0].line.is_some());

    assert_eq!(report.units.len(), 1);
    assert_eq!(report.units[0].type_path, "crate::clock::Clock");
    assert!(fixture.out().join("mock_clock.rs").is_file());
}

#[test]
fn test_same_name_in_two_modules_gets_distinct_files() {
    let fixture = Fixture::new(&[
        ("lib.rs", "pub mod cache;\npub mod disk;\n"),
        ("cache.rs", "pub trait Store {\n    fn get(&self, key: u64) -> Option<u64>;\n}\n"),
        ("disk.rs", "pub trait Store {\n    fn read(&self, path: String) -> Vec<u8>;\n}\n"),
    ]);
    let report = fixture.generate();

    let files: Vec<String> = report.units.iter().map(|unit| unit.file_name()).collect();
    assert_eq!(files, vec!["mock_cache_store.rs", "mock_disk_store.rs"]);
    let mod_file = fixture.generated("mod.rs");
    assert!(mod_file.contains("pub mod mock_cache_store;\npub mod mock_disk_store;\n"));
    assert!(!mod_file.contains("pub use"));
}

#[test]
fn test_include_and_exclude_patterns() {
    let fixture = Fixture::new(&[
        ("lib.rs", "pub mod net;\npub mod store;\n"),
        ("net.rs", "pub trait Client {\n    fn fetch(&self, url: String) -> Vec<u8>;\n}\n"),
        ("store.rs", STORE),
    ]);
    let config = Config {
        include: vec!["crate::net::*".to_string()],
        ..Config::default()
    };
    let report = generate(&fixture.request(config)).unwrap();
    let paths: Vec<&str> = report.units.iter().map(|unit| unit.type_path.as_str()).collect();
    assert_eq!(paths, vec!["crate::net::Client"]);

    let config = Config {
        exclude: vec!["crate::net::*".to_string()],
        ..Config::default()
    };
    let report = generate(&fixture.request(config)).unwrap();
    let paths: Vec<&str> = report.units.iter().map(|unit| unit.type_path.as_str()).collect();
    assert_eq!(paths, vec!["crate::store::Store"]);
}

#[test]
fn test_unsupported_members_are_reported_not_fatal() {
    let report = generate_source(indoc! {r#"
        pub trait Catalog {
            fn title(&self) -> &str {
                "catalog"
            }
            fn items(&self) -> impl Iterator<Item = u32>;
            fn count(&self) -> usize;
        }
    "#});

    let unsupported: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.kind == DiagnosticKind::UnsupportedDeclaration)
        .collect();
    assert!(!unsupported.is_empty());
    // `items` has no default body, so the trait cannot be implemented.
    assert!(report
        .diagnostics
        .iter()
        .any(|diagnostic| diagnostic.kind == DiagnosticKind::EmissionError));
    assert!(report.units.is_empty());
}

#[test]
fn test_type_defaults_policy_reaches_generated_code() {
    let fixture = store_fixture();
    let config = Config {
        default_policy: mocksmith::runtime::DefaultPolicy::TypeDefaults,
        header: Some("Custom header".to_string()),
        ..Config::default()
    };
    generate(&fixture.request(config)).unwrap();
    let mock = fixture.generated("mock_store.rs");
    assert!(mock.starts_with("// Custom header\n"));
    assert!(mock.contains("DefaultPolicy::TypeDefaults"));
}
