use std::str::FromStr;

use pep508_rs::Requirement;

use super::*;

const ZSTD: &str = r#"{
    "zstd": [{
        "attr": "zstd",
        "pypiName": "zstd",
        "src": "mirror://pypi/z/zstd/zstd-1.4.4.0.tar.gz",
        "version": "1.4.4.0"
    }]
}"#;

const PYTEST_RUNNER: &str = r#"{
    "pyTEST-runner": [{
        "attr": "pytestrunner",
        "pypiName": "pytest-runner",
        "src": "mirror://pypi/p/pytest-runner/pytest-runner-5.1.tar.gz",
        "version": "5.1"
    }]
}"#;

const MULTIVERSION: &str = r#"{
    "a": [
        {"attr": "a1", "pypiName": "a", "version": "1.0.1"},
        {"attr": "a3", "pypiName": "a", "version": "3.0.0"},
        {"attr": "a2", "pypiName": "a", "version": "2.3"}
    ]
}"#;

const COLLISION: &str = r#"{
    "a-b": [{
        "attr": "xxx",
        "pypiName": "a-b",
        "version": "1",
        "src": "mirror://pypi/a/a-b/a-b-1.tar.gz"
    }],
    "A_B": [{
        "attr": "yyy",
        "pypiName": "a-b",
        "version": "2",
        "src": "mirror://pypi/a/a-b/a-b-1.tar.gz"
    }]
}"#;

fn requirement(requirement: &str) -> Requirement {
    Requirement::from_str(requirement).unwrap()
}

#[test]
fn parse_json() {
    let nixpkgs = NixpkgsData::from_json(ZSTD).unwrap();
    let variants = nixpkgs.variants_for_name("zstd").unwrap();
    assert_eq!(variants.len(), 1);
    assert_eq!(
        variants[0].src.as_deref(),
        Some("mirror://pypi/z/zstd/zstd-1.4.4.0.tar.gz")
    );
}

#[test]
fn unknown_package() {
    let nixpkgs = NixpkgsData::from_json("{}").unwrap();
    assert!(matches!(
        nixpkgs.variants_for_name("zstd"),
        Err(Error::PackageNotFound(_))
    ));
    assert!(matches!(
        nixpkgs.variants_for_requirement(&requirement("zstd")),
        Err(Error::PackageNotFound(_))
    ));
}

#[test]
fn not_case_sensitive() {
    let nixpkgs = NixpkgsData::from_json(ZSTD).unwrap();
    assert!(nixpkgs.variants_for_name("ZSTD").is_ok());
}

#[test]
fn canonicalize() {
    let nixpkgs = NixpkgsData::from_json(PYTEST_RUNNER).unwrap();
    let variants = nixpkgs.variants_for_name("PYTEST_RUNNER").unwrap();
    assert_eq!(variants[0].attr, "pytestrunner");
    assert_eq!(variants[0].name.as_ref(), "pytest-runner");
    assert_eq!(variants[0].version, Version::from_str("5.1").unwrap());
}

#[test]
fn canonicalize_collision() {
    let nixpkgs = NixpkgsData::from_json(COLLISION).unwrap();
    assert_eq!(nixpkgs.len(), 1);

    let first = nixpkgs.variants_for_requirement(&requirement("a_B==1")).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].attr, "xxx");

    let second = nixpkgs.variants_for_requirement(&requirement("A-b==2")).unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].attr, "yyy");
}

#[test]
fn from_requirement() {
    let nixpkgs = NixpkgsData::from_json(MULTIVERSION).unwrap();
    let variants = nixpkgs.variants_for_requirement(&requirement("a>=3")).unwrap();
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].attr, "a3");
    assert_eq!(variants[0].version, Version::from_str("3.0.0").unwrap());
}

#[test]
fn descending_order() {
    let nixpkgs = NixpkgsData::from_json(MULTIVERSION).unwrap();
    let attrs: Vec<_> = nixpkgs
        .variants_for_requirement(&requirement("a>=2.0.0"))
        .unwrap()
        .iter()
        .map(|variant| variant.attr.clone())
        .collect();
    assert_eq!(attrs, vec!["a3", "a2"]);
}

#[test]
fn known_package_without_matching_version() {
    let nixpkgs = NixpkgsData::from_json(MULTIVERSION).unwrap();
    let variants = nixpkgs.variants_for_requirement(&requirement("a>5")).unwrap();
    assert!(variants.is_empty());
}

#[test]
fn invalid_versions_are_skipped() {
    let nixpkgs = NixpkgsData::from_json(
        r#"{"a": [
            {"attr": "a-git", "pypiName": "a", "version": "unstable-2020-01-01"},
            {"attr": "a", "pypiName": "a", "version": "1.0"}
        ]}"#,
    )
    .unwrap();
    let variants = nixpkgs.variants_for_name("a").unwrap();
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].attr, "a");
}

#[test]
fn invalid_name() {
    let err = NixpkgsData::from_json(
        r#"{"-a": [{"attr": "a", "pypiName": "a", "version": "1.0"}]}"#,
    )
    .unwrap_err();
    insta::assert_snapshot!(err, @"Invalid package name `-a` in the nixpkgs data");
}
