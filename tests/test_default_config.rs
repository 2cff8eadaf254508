//! The shipped config file must parse and match the built-in defaults.

use std::path::Path;
use std::time::Duration;

use tenant_sso_bot::config::{EnvOverrides, load_from};

#[test]
fn default_config_file_exists() {
    assert!(Path::new("config/default.toml").exists(), "config/default.toml missing");
}

#[test]
fn default_config_file_matches_builtin_defaults() {
    let overrides = EnvOverrides::default();
    let from_file = load_from(Some(Path::new("config/default.toml")), &overrides).unwrap();
    let builtin = load_from(None, &overrides).unwrap();

    assert_eq!(from_file.http.port, builtin.http.port);
    assert_eq!(from_file.http.host, builtin.http.host);
    assert_eq!(from_file.connector.scope, builtin.connector.scope);
    assert_eq!(from_file.auth.issuer, builtin.auth.issuer);
    assert_eq!(from_file.auth.clock_skew, Duration::from_secs(300));
    assert_eq!(from_file.typing.period, Duration::from_millis(2000));
    assert!(from_file.credentials.is_anonymous());
    assert_eq!(from_file.oauth_connection_name, None);
}
