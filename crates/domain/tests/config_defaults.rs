use mt_domain::config::{Config, ConfigSeverity, SameSecondIds, DEFAULT_BASE_URL};

fn with_token() -> Config {
    let mut config = Config::default();
    config.client.tracer_token = Some("tk_test".into());
    config
}

#[test]
fn default_base_url_is_hosted_api() {
    let config = Config::default();
    assert_eq!(config.client.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.client.token_env, "MONKAI_TRACER_TOKEN");
}

#[test]
fn default_session_timeout_is_two_minutes() {
    let config = Config::default();
    assert_eq!(config.sessions.inactivity_timeout_secs, 120);
    assert!(!config.sessions.persistent);
    assert_eq!(config.sessions.same_second_ids, SameSecondIds::Suffix);
}

#[test]
fn default_batch_size_is_ten() {
    let config = Config::default();
    assert_eq!(config.batch.batch_size, 10);
    assert_eq!(config.batch.flush_interval_secs, 60);
}

#[test]
fn sections_parse() {
    let toml_str = r#"
[client]
tracer_token = "tk_abc"
chunk_size = 50

[sessions]
namespace = "customer-support"
inactivity_timeout_secs = 300
persistent = true

[batch]
batch_size = 1
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.client.chunk_size, 50);
    assert_eq!(config.sessions.namespace, "customer-support");
    assert_eq!(config.sessions.inactivity_timeout_secs, 300);
    assert!(config.sessions.persistent);
    assert_eq!(config.batch.batch_size, 1);
    assert!(config.validate().is_empty());
}

#[test]
fn valid_config_has_no_issues() {
    assert!(with_token().validate().is_empty());
}

#[test]
fn missing_token_is_an_error() {
    let mut config = Config::default();
    config.client.token_env = "MT_CONFIG_TEST_UNSET_TOKEN".into();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.field == "client.tracer_token" && i.severity == ConfigSeverity::Error));
}

#[test]
fn zero_sizes_are_errors() {
    let mut config = with_token();
    config.batch.batch_size = 0;
    config.client.chunk_size = 0;
    config.sessions.inactivity_timeout_secs = 0;
    let fields: Vec<String> = config.validate().into_iter().map(|i| i.field).collect();
    assert!(fields.contains(&"batch.batch_size".to_string()));
    assert!(fields.contains(&"client.chunk_size".to_string()));
    assert!(fields.contains(&"sessions.inactivity_timeout_secs".to_string()));
}

#[test]
fn malformed_namespace_is_an_error() {
    let mut config = with_token();
    config.sessions.namespace = "two words".into();
    let issues = config.validate();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "sessions.namespace");
}

#[test]
fn disabled_periodic_flush_is_a_warning() {
    let mut config = with_token();
    config.batch.flush_interval_secs = 0;
    let issues = config.validate();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, ConfigSeverity::Warning);
}
