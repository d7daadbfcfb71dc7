//! Environment variables imported as a section

mod common;

use common::TestEnvironment;
use confweave::{Configurable, ImportIniConfig};
use serial_test::serial;

#[test]
#[serial]
fn test_environment_section_feeds_references() {
    let env = TestEnvironment::new();
    std::env::set_var("CONFWEAVE_TEST_ROOT", "/opt/demo");
    std::env::set_var("CONFWEAVE_TEST_PRICE", "$5");
    let root = env.write(
        "app.conf",
        "[import]\nsections = list: env_imp\n\n\
         [env_imp]\ntype = environment\nincludes = list: CONFWEAVE_TEST_ROOT, CONFWEAVE_TEST_PRICE\nskip_delimiter = True\n\n\
         [app]\ndir = ${env:confweave_test_root}/app\nprice = ${env:confweave_test_price}\n",
    );
    let result = ImportIniConfig::open(&root);
    std::env::remove_var("CONFWEAVE_TEST_ROOT");
    std::env::remove_var("CONFWEAVE_TEST_PRICE");

    let config = result.unwrap();
    assert_eq!(config.get_option("dir", Some("app")).unwrap(), "/opt/demo/app");
    assert_eq!(config.get_option("price", Some("app")).unwrap(), "$5");
    assert_eq!(
        config.get_options("env").unwrap().len(),
        2,
        "only included variables are imported"
    );
}

#[test]
#[serial]
fn test_named_environment_section() {
    let env = TestEnvironment::new();
    std::env::set_var("CONFWEAVE_TEST_MODE", "batch");
    let root = env.write(
        "app.conf",
        "[import]\nsections = list: env_imp\n\n\
         [env_imp]\ntype = env\nsection_name = process\nincludes = list: CONFWEAVE_TEST_MODE\n",
    );
    let result = ImportIniConfig::open(&root);
    std::env::remove_var("CONFWEAVE_TEST_MODE");

    let config = result.unwrap();
    assert_eq!(
        config.get_option("confweave_test_mode", Some("process")).unwrap(),
        "batch"
    );
}
