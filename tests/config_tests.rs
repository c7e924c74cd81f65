use saffi::{ConfigError, InterleavePolicy, PipelineConfig};

#[test]
fn defaults_match_the_documented_constants() {
    let config = PipelineConfig::default();
    assert_eq!(config.purity.threshold, 0.95);
    assert_eq!(config.purity.foreign_ceiling, 0.05);
    assert_eq!(config.purity.min_viable_chars, 20);
    assert_eq!(config.retry_budget, 2);
    assert_eq!(config.oracle_timeout_secs, 30);
    assert_eq!(config.interleave_policy, InterleavePolicy::DropMinority);
    assert_eq!(config.cache.capacity, 512);
    assert_eq!(config.cache.ttl_secs, 600);
    assert!(config.pattern_file.is_none());
}

#[test]
fn partial_config_files_fall_back_to_defaults() {
    let path = std::env::temp_dir().join("saffi_config_partial_test.json");
    std::fs::write(
        &path,
        r#"{"retry_budget":1,"interleave_policy":"insert_separator"}"#,
    )
    .unwrap();

    let config = PipelineConfig::load_from_file(&path).unwrap();
    assert_eq!(config.retry_budget, 1);
    assert_eq!(config.interleave_policy, InterleavePolicy::InsertSeparator);
    assert_eq!(config.purity.threshold, 0.95);
    assert_eq!(config.cache.capacity, 512);

    std::fs::remove_file(&path).ok();
}

#[test]
fn malformed_config_is_a_startup_error() {
    let path = std::env::temp_dir().join("saffi_config_malformed_test.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(matches!(
        PipelineConfig::load_from_file(&path),
        Err(ConfigError::Parse(_))
    ));
    std::fs::remove_file(&path).ok();

    let missing = std::env::temp_dir().join("saffi_config_missing_test.json");
    assert!(matches!(
        PipelineConfig::load_from_file(&missing),
        Err(ConfigError::Io(_))
    ));
}
