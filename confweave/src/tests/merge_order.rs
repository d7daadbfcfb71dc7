//! Tests for merge order and cross-source references

use super::Fixture;
use crate::writer::to_ini;
use crate::{Configurable, ImportIniConfig, ReadMode};

fn import_files(fx: &Fixture, files: &[&str]) -> ImportIniConfig {
    let list = files
        .iter()
        .map(|f| fx.path(f).display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let root = fx.write("root.conf", &format!("[import]\nconfig_files = list: {}\n", list));
    ImportIniConfig::open(root).unwrap()
}

#[test]
fn test_last_child_wins() {
    let fx = Fixture::new();
    fx.write("a.conf", "[s]\nkey = from a\nonly_a = 1\n");
    fx.write("b.conf", "[s]\nkey = from b\n");

    let config = import_files(&fx, &["a.conf", "b.conf"]);
    assert_eq!(config.get_option("key", Some("s")).unwrap(), "from b");
    assert_eq!(config.get_option("only_a", Some("s")).unwrap(), "1");

    let config = import_files(&fx, &["b.conf", "a.conf"]);
    assert_eq!(config.get_option("key", Some("s")).unwrap(), "from a");
}

#[test]
fn test_root_values_are_not_overwritten() {
    let fx = Fixture::new();
    let child = fx.write("child.conf", "[s]\nkey = child\nother = child\n");
    let root = fx.write(
        "root.conf",
        &format!("[import]\nconfig_file = {}\n\n[s]\nkey = root\n", child.display()),
    );
    let config = ImportIniConfig::open(root).unwrap();
    assert_eq!(config.get_option("key", Some("s")).unwrap(), "root");
    assert_eq!(config.get_option("other", Some("s")).unwrap(), "child");
}

#[test]
fn test_backward_reference_across_children() {
    let fx = Fixture::new();
    fx.write("a.conf", "[s1]\nx = 1\n");
    fx.write("b.yml", "s2:\n  y: ${s1:x}\n");
    let config = import_files(&fx, &["a.conf", "b.yml"]);
    assert_eq!(config.get_option("y", Some("s2")).unwrap(), "1");
}

#[test]
fn test_reimport_is_identical() {
    let fx = Fixture::new();
    fx.write("a.conf", "[s1]\nx = 1\npath = ${x}/data\n");
    fx.write("b.json", r#"{"s2": {"y": "${s1:path}", "n": 3}}"#);
    let first = import_files(&fx, &["a.conf", "b.json"]);
    let second = import_files(&fx, &["a.conf", "b.json"]);
    assert_eq!(
        to_ini(&first, ReadMode::Interpolated).unwrap(),
        to_ini(&second, ReadMode::Interpolated).unwrap()
    );
    assert_eq!(first.get_option("y", Some("s2")).unwrap(), "1/data");
}

#[test]
fn test_interpolated_child_values_survive_merge() {
    let fx = Fixture::new();
    let nested = fx.write("nested.conf", "[price]\namount = $$5\nlabel = ${amount} each\n");
    let root = fx.write(
        "root.conf",
        &format!(
            "[import]\nsections = list: nested_imp\n\n[nested_imp]\ntype = import\nconfig_file = {}\n",
            nested.display()
        ),
    );
    let config = ImportIniConfig::open(root).unwrap();
    assert_eq!(config.get_option("label", Some("price")).unwrap(), "$5 each");
    assert_eq!(
        config.option("price", "amount", ReadMode::Raw).unwrap().as_deref(),
        Some("$$5")
    );
}
