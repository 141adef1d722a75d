use std::{env, fs};

use smartcity_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("smartcity.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
body_limit_bytes = 2048

[logging]
level = "debug"

[redis]
url = "redis://cache.internal:6379"
pool_size = 4
key_prefix = "dash:"

[cache]
max_entries = 500
warm_interval_secs = 60

[cache.ttl]
latest_secs = 15

[auth]
jwt_secret = "s3cret"

[simulator]
enabled = true
traffic_secs = 5
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses, unspecified keys keep defaults
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.logging.level.to_ascii_lowercase(), "debug");
    assert_eq!(
        cfg.redis.url.as_deref(),
        Some("redis://cache.internal:6379")
    );
    assert_eq!(cfg.redis.pool_size, 4);
    assert_eq!(cfg.redis.key_prefix, "dash:");
    assert_eq!(cfg.cache.max_entries, 500);
    assert_eq!(cfg.cache.default_ttl_secs, 300);
    assert_eq!(cfg.cache.ttl.latest_secs, 15);
    assert_eq!(cfg.cache.ttl.history_secs, 300);
    assert_eq!(cfg.auth.jwt_secret, "s3cret");
    assert!(cfg.simulator.enabled);
    assert_eq!(cfg.simulator.traffic_secs, 5);
    assert_eq!(cfg.simulator.air_secs, 60);

    // 2) Env override should win over file
    unsafe {
        env::set_var("SMARTCITY__CACHE__MAX_ENTRIES", "42");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.cache.max_entries, 42);
    unsafe {
        env::remove_var("SMARTCITY__CACHE__MAX_ENTRIES");
    }

    // 3) Invalid values are rejected
    let bad_path = dir.path().join("bad.toml");
    fs::write(
        &bad_path,
        r#"
[cache]
max_entries = 0
"#,
    )
    .expect("write bad toml");
    let err = load_config(bad_path.to_str()).expect_err("zero capacity must fail");
    assert!(err.contains("max_entries"));

    let bad_level = dir.path().join("bad_level.toml");
    fs::write(
        &bad_level,
        r#"
[logging]
level = "loud"
"#,
    )
    .expect("write bad toml");
    assert!(load_config(bad_level.to_str()).is_err());
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");
    let cfg = load_config(path.to_str()).expect("defaults are valid");
    assert_eq!(cfg.server.port, 5000);
    assert!(cfg.redis.url.is_none());
    assert!(!cfg.simulator.enabled);
}
