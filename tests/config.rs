use std::{env, fs, time::Duration};

use chatfeed::{
    config::{Config, ConfigError},
    sync::LoadingPolicy,
    view::Retry,
};
use serial_test::serial;

const VARS: [&str; 7] = [
    "CHATFEED_CONFIG",
    "CHATFEED_URL",
    "CHATFEED_PATH",
    "CHATFEED_USER",
    "CHATFEED_AUTH",
    "CHATFEED_LOADING",
    "CHATFEED_RETRY",
];

fn clear_env_vars() {
    for var in VARS {
        env::remove_var(var);
    }
}

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("chatfeed.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn file_only() {
    clear_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
            database_url = "https://demo.firebaseio.com"
            user_name = "alice"
            loading = "buffer"
        "#,
    );

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.database_url.as_str(), "https://demo.firebaseio.com/");
    assert_eq!(config.user_name, "alice");
    assert_eq!(config.path, "messages");
    assert_eq!(config.view.loading, LoadingPolicy::Buffer);
    assert_eq!(config.view.retry, Retry::Manual);
}

#[test]
#[serial]
fn env_overrides_file() {
    clear_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
            database_url = "https://demo.firebaseio.com"
            user_name = "alice"
            loading = "buffer"
            retry_initial_ms = 500
        "#,
    );

    env::set_var("CHATFEED_USER", "bob");
    env::set_var("CHATFEED_PATH", "rooms/general");
    env::set_var("CHATFEED_LOADING", "drop");
    env::set_var("CHATFEED_RETRY", "backoff");

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.user_name, "bob");
    assert_eq!(config.path, "rooms/general");
    assert_eq!(config.view.loading, LoadingPolicy::Drop);
    assert_eq!(
        config.view.retry,
        Retry::Backoff {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            attempts: None,
        }
    );

    clear_env_vars();
}

#[test]
#[serial]
fn missing_file_uses_env() {
    clear_env_vars();
    let dir = tempfile::tempdir().unwrap();

    env::set_var("CHATFEED_URL", "memory://");
    env::set_var("CHATFEED_USER", "carol");

    let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
    assert!(config.is_memory());
    assert_eq!(config.user_name, "carol");
    assert!(config.open_feed().is_ok());

    clear_env_vars();
}

#[test]
#[serial]
fn invalid_override_is_reported() {
    clear_env_vars();
    let dir = tempfile::tempdir().unwrap();

    env::set_var("CHATFEED_URL", "memory://");
    env::set_var("CHATFEED_USER", "carol");
    env::set_var("CHATFEED_RETRY", "sometimes");

    let err = Config::load_from(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            key: "CHATFEED_RETRY",
            ..
        }
    ));

    clear_env_vars();
}

#[test]
#[serial]
fn missing_user_is_an_error() {
    clear_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"database_url = "https://demo.firebaseio.com""#);

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Missing { key: "user_name" }));
}

#[test]
#[serial]
fn config_path_from_env() {
    clear_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
            database_url = "memory://"
            user_name = "dave"
        "#,
    );

    env::set_var("CHATFEED_CONFIG", &path);
    let config = Config::load().unwrap();
    assert_eq!(config.user_name, "dave");

    clear_env_vars();
}
