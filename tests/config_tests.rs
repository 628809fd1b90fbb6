use fac_gym::Config;
use std::io::Write;
use std::time::Duration;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.service.http.port, 7878);
    assert_eq!(cfg.facilitator.identity, "user");
    assert_eq!(cfg.timing.ptt_watchdog(), Duration::from_millis(1500));
    assert_eq!(cfg.timing.floor_open(), Duration::from_millis(3000));
    assert_eq!(cfg.participants.hidden, vec!["conductor-bot"]);
    assert_eq!(cfg.participants.avatars["bob"], "/avatars/mike.png");
}

#[test]
fn test_partial_file_keeps_defaults() {
    let file = write_config(
        r#"
[api]
base_url = "https://gym.example.com/api"

[timing]
ptt_watchdog_ms = 2500
clock_tick_ms = 0
"#,
    );

    let cfg = Config::load(file.path().to_str().unwrap()).unwrap();
    assert_eq!(cfg.api.base_url, "https://gym.example.com/api");
    assert_eq!(cfg.api.timeout_ms, 10_000);
    assert_eq!(cfg.timing.ptt_watchdog(), Duration::from_millis(2500));
    assert_eq!(cfg.timing.floor_open_ms, 3000);
    // Clamped to a usable period
    assert_eq!(cfg.timing.clock_tick(), Duration::from_millis(1));
    assert_eq!(cfg.service.name, "fac-gym");
}

#[test]
fn test_environment_overrides_file() {
    let file = write_config(
        r#"
[room]
nats_url = "nats://from-file:4222"
"#,
    );

    std::env::set_var("FAC_GYM__ROOM__NATS_URL", "nats://from-env:4222");
    let cfg = Config::load(file.path().to_str().unwrap());
    std::env::remove_var("FAC_GYM__ROOM__NATS_URL");

    assert_eq!(cfg.unwrap().room.nats_url, "nats://from-env:4222");
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(Config::load(path.to_str().unwrap()).is_err());
}
