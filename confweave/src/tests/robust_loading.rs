//! Tests for robust loading of sections that fail to resolve

use super::Fixture;
use crate::{Configurable, ImportIniConfig, LoadState};

const FIVE_SECTIONS: &str = "\
[s1]
a = 1

[s2]
b = ${s1:a}

[s3]
c = ${nowhere:x}

[s4]
d = plain

[s5]
e = ${s3:c}
";

#[test]
fn test_robust_drops_only_broken_sections() {
    let mut config = ImportIniConfig::from_text("five", FIVE_SECTIONS).robust(true);
    config.load().unwrap();
    assert_eq!(config.state(), LoadState::Ready);
    assert_eq!(config.sections(), vec!["s1", "s2", "s4"]);
    assert_eq!(config.get_option("b", Some("s2")).unwrap(), "1");

    let report = config.report();
    assert_eq!(report.dropped, vec!["s3", "s5"]);
    assert!(report
        .last_error
        .as_ref()
        .map(|e| e.is_interpolation())
        .unwrap_or(false));
}

#[test]
fn test_strict_load_is_all_or_nothing() {
    let mut config = ImportIniConfig::from_text("five", FIVE_SECTIONS);
    let err = config.load().unwrap_err();
    assert!(err.is_interpolation(), "{}", err);
    assert_eq!(config.state(), LoadState::Failed);
    assert!(config.sections().is_empty());
}

#[test]
fn test_robust_child_failure() {
    let fx = Fixture::new();
    let broken = fx.write("broken.conf", "[bad]\nv = ${missing:x}\n");
    let good = fx.write("good.conf", "[good]\nv = 1\n");
    let root = fx.write(
        "root.conf",
        &format!(
            "[import]\nconfig_files = list: {}, {}\n",
            broken.display(),
            good.display()
        ),
    );
    let mut config = ImportIniConfig::from_path(&root).robust(true);
    config.load().unwrap();
    assert_eq!(config.sections(), vec!["good"]);
    assert_eq!(config.report().dropped, vec!["bad"]);

    assert!(ImportIniConfig::open(&root).is_err());
}
