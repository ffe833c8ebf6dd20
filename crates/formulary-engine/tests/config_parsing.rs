use std::{env, fs};

use formulary_engine::config::loader::load_config;
use formulary_engine::{IndexMaintenance, StoreBackend};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    // Create a temporary TOML configuration file
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("formulary.toml");

    let toml_content = r#"
[store]
backend = "redis"

[store.redis]
url = "redis://cache.internal:6380"
pool_size = 4
timeout_ms = 750

[index]
key_prefix = "rx"
maintenance = "accretive"
max_tier = 6
default_filter_limit = 25

[prior_auth]
request_ttl_days = 14

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.store.backend, StoreBackend::Redis);
    assert_eq!(cfg.store.redis.url, "redis://cache.internal:6380");
    assert_eq!(cfg.store.redis.pool_size, 4);
    assert_eq!(cfg.index.key_prefix, "rx");
    assert_eq!(cfg.index.maintenance, IndexMaintenance::Accretive);
    assert_eq!(cfg.index.max_tier, 6);
    assert_eq!(cfg.index.default_filter_limit, 25);
    assert_eq!(cfg.prior_auth.request_ttl_days, 14);
    assert_eq!(cfg.logging.level.to_ascii_lowercase(), "debug");

    // 2) Env override should win over file
    unsafe {
        env::set_var("FORMULARY__INDEX__DEFAULT_FILTER_LIMIT", "9");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.index.default_filter_limit, 9);
    // cleanup env var
    unsafe {
        env::remove_var("FORMULARY__INDEX__DEFAULT_FILTER_LIMIT");
    }

    // 3) Missing file falls back to defaults
    let missing = dir.path().join("absent.toml");
    let cfg_default = load_config(missing.to_str()).expect("defaults should load");
    assert_eq!(cfg_default.store.backend, StoreBackend::Memory);
    assert_eq!(cfg_default.index.key_prefix, "formulary");
    assert_eq!(cfg_default.prior_auth.request_ttl_days, 30);

    // 4) Invalid config (prefix with a separator) should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[index]
key_prefix = "rx:prod"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("key_prefix must not contain"));

    // 5) Unknown maintenance mode fails to deserialize
    let bad_mode_path = dir.path().join("bad_mode.toml");
    fs::write(&bad_mode_path, "[index]\nmaintenance = \"lazy\"\n").expect("write toml");
    let err = load_config(bad_mode_path.to_str()).expect_err("expected deserialize error");
    assert!(err.contains("config deserialize error"));
}
