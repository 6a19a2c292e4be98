use super::data::{path_display, Config, DEFAULT_SERVER_URL};
use super::defaults::{ConfigKey, ConfigKeyError};
use super::orchestrator::ConfigOrchestrator;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn config_orchestrator_detects_external_updates() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    let orchestrator = ConfigOrchestrator::new(config_path.clone());

    orchestrator
        .mutate(|config| {
            config.default_worksheet = Some("first".to_string());
            Ok(())
        })
        .expect("mutate failed");

    let persisted = Config::load_from_path(&config_path).expect("load failed");
    assert_eq!(persisted.default_worksheet.as_deref(), Some("first"));

    let cached = orchestrator.load_with_cache().expect("cached load failed");
    assert_eq!(cached.default_worksheet.as_deref(), Some("first"));

    std::thread::sleep(Duration::from_millis(1100));

    let external = Config {
        default_worksheet: Some("second".to_string()),
        ..Default::default()
    };
    external
        .save_to_path(&config_path)
        .expect("external save failed");

    let reloaded = orchestrator.load_with_cache().expect("reload failed");
    assert_eq!(reloaded.default_worksheet.as_deref(), Some("second"));
}

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("test_config.toml");

    let config = Config {
        server_url: Some("https://ws.example.org".to_string()),
        poll_cap_ms: Some(5000),
        ..Default::default()
    };
    config
        .save_to_path(&config_path)
        .expect("Failed to save config");
    let mut loaded = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(loaded, config);

    ConfigKey::PollCapMs.unset(&mut loaded);
    loaded
        .save_to_path(&config_path)
        .expect("Failed to save config");
    let reloaded = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(reloaded.poll_cap_ms, None);
    assert_eq!(reloaded.server_url.as_deref(), Some("https://ws.example.org"));
}

#[test]
fn invalid_toml_reports_parse_error_with_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "server_url = [unterminated").unwrap();

    let err = Config::load_from_path(&config_path).expect_err("parse should fail");
    let message = err.to_string();
    assert!(message.starts_with("Failed to parse config at"), "{message}");
}

#[test]
fn config_keys_parse_with_dashes_or_underscores() {
    assert_eq!(ConfigKey::parse("poll-step-ms"), Ok(ConfigKey::PollStepMs));
    assert_eq!(ConfigKey::parse("POLL_STEP_MS"), Ok(ConfigKey::PollStepMs));
    assert_eq!(
        ConfigKey::parse("theme"),
        Err(ConfigKeyError::UnknownKey("theme".to_string()))
    );
}

#[test]
fn numeric_keys_reject_garbage() {
    let mut config = Config::default();
    let err = ConfigKey::ToastMs.set(&mut config, "soon").unwrap_err();
    assert_eq!(
        err,
        ConfigKeyError::InvalidValue {
            key: "toast-ms",
            value: "soon".to_string()
        }
    );
    assert_eq!(config.toast_ms, None);

    ConfigKey::ToastMs.set(&mut config, " 1500 ").unwrap();
    assert_eq!(config.toast_duration(), Duration::from_millis(1500));
}

#[test]
fn server_url_is_normalized_on_set() {
    let mut config = Config::default();
    ConfigKey::ServerUrl
        .set(&mut config, "https://ws.example.org/")
        .unwrap();
    assert_eq!(config.server_url.as_deref(), Some("https://ws.example.org"));
}

#[test]
fn server_url_resolution_prefers_cli_override() {
    let config = Config {
        server_url: Some("https://configured.example".to_string()),
        ..Default::default()
    };
    assert_eq!(
        config.resolve_server_url(Some("https://cli.example")),
        "https://cli.example"
    );
    if std::env::var_os("QUIRE_SERVER").is_none() {
        assert_eq!(
            config.resolve_server_url(None),
            "https://configured.example"
        );
        assert_eq!(
            Config::default().resolve_server_url(None),
            DEFAULT_SERVER_URL
        );
    }
}

#[test]
fn poll_schedule_overrides_only_given_fields() {
    let config = Config {
        poll_cap_ms: Some(10_000),
        ..Default::default()
    };
    let schedule = config.poll_schedule();
    assert_eq!(schedule.cap, Duration::from_millis(10_000));
    assert_eq!(schedule.step, Duration::from_secs(1));
    assert_eq!(schedule.slow_factor, 5);
}

#[test]
fn poll_settings_never_reach_zero() {
    let mut config = Config::default();
    for key in [
        ConfigKey::PollStepMs,
        ConfigKey::PollCapMs,
        ConfigKey::PollSlowFactor,
    ] {
        assert_eq!(
            key.set(&mut config, "0"),
            Err(ConfigKeyError::ZeroValue(key.name()))
        );
    }
    assert_eq!(config.poll_step_ms, None);

    let edited = Config {
        poll_step_ms: Some(0),
        poll_cap_ms: Some(0),
        poll_slow_factor: Some(0),
        ..Default::default()
    };
    let schedule = edited.poll_schedule();
    assert_eq!(schedule, crate::core::poller::BackoffSchedule::default());
    assert_eq!(
        schedule.delay(2, Duration::ZERO),
        Duration::from_secs(2)
    );
}

#[test]
fn test_override_routes_load_and_mutate() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    Config::set_test_config_path(config_path.clone());

    Config::mutate(|config| {
        config.toast_ms = Some(42);
        Ok(())
    })
    .expect("mutate failed");
    let loaded = Config::load().expect("load failed");
    assert_eq!(Config::active_path(), config_path);

    Config::clear_test_config_override();
    assert_eq!(loaded.toast_ms, Some(42));
}

#[test]
fn test_path_display() {
    let relative = PathBuf::from("relative/config.toml");
    assert_eq!(path_display(&relative), "relative/config.toml");

    #[cfg(unix)]
    if let Some(home) = std::env::var_os("HOME") {
        let under_home = PathBuf::from(home).join(".config/quire/config.toml");
        assert_eq!(path_display(&under_home), "~/.config/quire/config.toml");
    }
}
