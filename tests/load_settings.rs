use std::fs;
use std::path::PathBuf;

use serial_test::serial;

use somnosync::config::DEFAULT_SERVER_URL;
use somnosync::error::RunError;
use somnosync::load_config::load_settings;

const VALID: &str = "\
# somnosync settings
base_dir=/var/lib/somnosync
client_id=client-123
client_secret=secret-456
remote_name=cpap
remote_address=https://192.168.1.50/dav
";

#[test]
fn loads_a_valid_settings_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("somnosync.conf");
    fs::write(&path, VALID).unwrap();

    let settings = load_settings(Some(&path)).expect("settings should load");
    assert_eq!(settings.base_dir, PathBuf::from("/var/lib/somnosync"));
    assert_eq!(settings.client_id, "client-123");
    assert_eq!(settings.client_secret, "secret-456");
    assert_eq!(settings.remote_name, "cpap");
    assert_eq!(
        settings.remote_address.as_deref(),
        Some("https://192.168.1.50/dav")
    );
    assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
}

#[test]
fn server_url_override_is_normalised() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("somnosync.conf");
    fs::write(&path, format!("{VALID}server_url=https://staging.somnolog.com/\n")).unwrap();

    let settings = load_settings(Some(&path)).unwrap();
    assert_eq!(settings.server_url, "https://staging.somnolog.com");
}

#[test]
fn rejects_missing_required_key() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("somnosync.conf");
    // No client_secret.
    fs::write(
        &path,
        "base_dir=/data\nclient_id=abc\nremote_name=cpap\n",
    )
    .unwrap();

    let err = load_settings(Some(&path)).unwrap_err();
    assert!(matches!(err, RunError::ConfigurationMissing(_)), "{err}");
    assert!(err.to_string().contains("client_secret"));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn rejects_whitespace_only_secret() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("somnosync.conf");
    fs::write(
        &path,
        "base_dir=/data\nclient_id=abc\nclient_secret=   \nremote_name=cpap\n",
    )
    .unwrap();

    // A secret holding only whitespace must be rejected like a missing one.
    let err = load_settings(Some(&path)).unwrap_err();
    assert!(matches!(err, RunError::ConfigurationMissing(_)), "{err}");
}

#[test]
#[serial]
fn fails_when_neither_location_exists() {
    let home = tempfile::tempdir().unwrap();
    let old_home = std::env::var_os("HOME");
    std::env::set_var("HOME", home.path());

    let err = load_settings(Some(std::path::Path::new("/no/such/file.conf"))).unwrap_err();
    assert!(matches!(err, RunError::ConfigurationMissing(_)), "{err}");
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("/no/such/file.conf"));

    match old_home {
        Some(home) => std::env::set_var("HOME", home),
        None => std::env::remove_var("HOME"),
    }
}

#[test]
#[serial]
fn custom_location_wins_over_default() {
    let home = tempfile::tempdir().unwrap();
    let default_dir = home.path().join(".config/somnosync");
    fs::create_dir_all(&default_dir).unwrap();
    fs::write(
        default_dir.join("somnosync.conf"),
        "base_dir=/default\nclient_id=a\nclient_secret=b\nremote_name=default-remote\n",
    )
    .unwrap();

    let custom = home.path().join("custom.conf");
    fs::write(
        &custom,
        "base_dir=/custom\nclient_id=a\nclient_secret=b\nremote_name=custom-remote\n",
    )
    .unwrap();

    let old_home = std::env::var_os("HOME");
    std::env::set_var("HOME", home.path());

    let settings = load_settings(Some(&custom)).unwrap();
    assert_eq!(settings.remote_name, "custom-remote");

    let settings = load_settings(None).unwrap();
    assert_eq!(settings.remote_name, "default-remote");

    // A custom location that does not exist falls back to the default.
    let settings = load_settings(Some(&home.path().join("gone.conf"))).unwrap();
    assert_eq!(settings.remote_name, "default-remote");

    match old_home {
        Some(home) => std::env::set_var("HOME", home),
        None => std::env::remove_var("HOME"),
    }
}

#[test]
#[serial]
fn missing_default_location_is_configuration_missing() {
    let home = tempfile::tempdir().unwrap();
    let old_home = std::env::var_os("HOME");
    std::env::set_var("HOME", home.path());

    let err = load_settings(None).unwrap_err();
    assert!(matches!(err, RunError::ConfigurationMissing(_)), "{err}");

    match old_home {
        Some(home) => std::env::set_var("HOME", home),
        None => std::env::remove_var("HOME"),
    }
}
