//! Tests for imports inside imports and helper section cleanup

use super::Fixture;
use crate::{Configurable, ConfigError, ImportIniConfig};

#[test]
fn test_nested_import_sees_earlier_sibling() {
    let fx = Fixture::new();
    let dir = fx.dir().to_path_buf();
    let first = fx.write("first.conf", &format!("[paths]\ndir = {}\n", dir.display()));
    fx.write("leaf.conf", "[leaf]\nname = leaf\nwhere = ${paths:dir}\n");
    let nested = fx.write(
        "nested.conf",
        "[import]\nsections = list: leaf_imp\n\n[leaf_imp]\nconfig_file = ${paths:dir}/leaf.conf\n",
    );
    let root = fx.write(
        "root.conf",
        &format!(
            "[import]\nconfig_file = {}\nsections = list: nested_imp\n\n\
             [nested_imp]\ntype = import\nconfig_file = {}\n",
            first.display(),
            nested.display()
        ),
    );
    let config = ImportIniConfig::open(root).unwrap();
    assert_eq!(config.get_option("name", Some("leaf")).unwrap(), "leaf");
    assert_eq!(
        config.get_option("where", Some("leaf")).unwrap(),
        dir.display().to_string()
    );
    assert_eq!(config.sections(), vec!["paths", "leaf"]);
}

#[test]
fn test_helper_sections_removed_but_resolvable() {
    let fx = Fixture::new();
    let child = fx.write("child.conf", "[db]\nhost = localhost\n");
    let root = fx.write(
        "root.conf",
        &format!(
            "[import]\nreferences = list: helper\nsections = list: db_imp\ncleanups = list: helper\n\n\
             [helper]\nbase = /srv\n\n\
             [db_imp]\nconfig_file = {}\n\n\
             [app]\ndir = ${{helper:base}}/app\nhost = ${{db:host}}\n",
            child.display()
        ),
    );
    let config = ImportIniConfig::open(root).unwrap();
    for removed in ["import", "helper", "db_imp"] {
        assert!(!config.has_section(removed), "{} left behind", removed);
    }
    assert_eq!(config.get_option("dir", Some("app")).unwrap(), "/srv/app");
    assert_eq!(config.get_option("host", Some("app")).unwrap(), "localhost");
}

#[test]
fn test_config_sections_kept_on_request() {
    let fx = Fixture::new();
    let child = fx.write("child.conf", "[db]\nhost = localhost\n");
    let root = fx.write(
        "root.conf",
        &format!(
            "[import]\nsections = list: db_imp\n\n[db_imp]\nconfig_file = {}\n",
            child.display()
        ),
    );
    let mut config = ImportIniConfig::from_path(root).exclude_config_sections(false);
    config.load().unwrap();
    assert!(config.has_section("import"));
    assert!(config.has_section("db_imp"));
}

#[test]
fn test_import_tree_descriptor() {
    let fx = Fixture::new();
    let a = fx.write("a.conf", "[a]\nx = 1\n");
    let b = fx.write(
        "b.yml",
        "b:\n  y: ${a:x}\ncondition:\n  if: True\n  then:\n    c:\n      z: 3\n",
    );
    let root = fx.write(
        "root.conf",
        &format!(
            "[import]\nsections = list: tree\n\n[tree]\ntype = importtree\nconfig_files =\n  {}\n  {}\n",
            a.display(),
            b.display()
        ),
    );
    let config = ImportIniConfig::open(&root).unwrap();
    assert_eq!(config.sections(), vec!["a", "b", "c"]);
    assert_eq!(config.get_option("y", Some("b")).unwrap(), "1");
    assert_eq!(config.get_option("z", Some("c")).unwrap(), "3");
    assert_eq!(config.source_files(), vec![root, a, b]);
}

#[test]
fn test_yaml_import_descriptor() {
    let fx = Fixture::new();
    let db = fx.write("db.conf", "[db]\nhost = localhost\n");
    let yml = fx.write(
        "app.yml",
        &format!(
            "import:\n  db_cli:\n    config_file: {}\napp:\n  url: pg://${{db:host}}/app\n",
            db.display()
        ),
    );
    let root = fx.write(
        "root.conf",
        &format!(
            "[import]\nsections = list: app_imp\n\n[app_imp]\ntype = import\nconfig_file = {}\n",
            yml.display()
        ),
    );
    let config = ImportIniConfig::open(root).unwrap();
    assert_eq!(
        config.get_option("url", Some("app")).unwrap(),
        "pg://localhost/app"
    );
    assert_eq!(config.get_option("host", Some("db")).unwrap(), "localhost");
}

#[test]
fn test_descriptor_errors() {
    let fx = Fixture::new();
    let cases = [
        "[import]\nsections = list: d\n\n[d]\ntype = ini\nclass_name = IniConfig\n",
        "[import]\nsections = list: d\n\n[d]\nanswer = 42\n",
        "[import]\nsections = list: d\n\n[d]\ntype = nosuch\n",
        "[import]\nsections = list: missing\n",
    ];
    let root = fx.path("root.conf");
    let results: Vec<ConfigError> = cases
        .iter()
        .map(|text| {
            std::fs::write(&root, text).unwrap();
            ImportIniConfig::open(&root).unwrap_err()
        })
        .collect();
    assert!(matches!(results[0], ConfigError::ConflictingLoader { .. }));
    assert!(matches!(results[1], ConfigError::NoLoader { .. }));
    assert!(matches!(results[2], ConfigError::UnknownType { .. }));
    assert!(matches!(results[3], ConfigError::NoSuchSection { .. }));
}
