use seda_core::config::*;
use std::collections::HashMap;
use std::env;
use std::fs;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_default_config() {
    let config = SedaConfig::default();
    assert!(config.validate().is_ok());

    // 验证默认值
    assert_eq!(config.app.name, "seda");
    assert!(config.app.function_name.is_none());
    assert_eq!(config.naming.schedule_group_name, "seda-f-{function_name}");
    assert_eq!(config.reconcile.schedule_create_max_attempts, 4);
    assert_eq!(config.reconcile.schedule_create_delay_seconds, 4);
    assert_eq!(config.reconcile.schedule_create_retry_pattern, "Scheduler.*role");
    assert_eq!(config.dispatch.unmatched_event, UnmatchedEventPolicy::Ignore);
    assert_eq!(config.dispatch.default_service, DispatchService::Topic);
}

#[test]
fn test_config_from_toml() {
    let toml_content = r#"
[app]
name = "billing"
function_name = "billing-api"

[remote]
region = "eu-central-1"
account_id = "123456789012"

[naming]
topic_name = "jobs-{function_name}"

[dispatch]
unmatched_event = "reject"
default_service = "invoke"

[reconcile]
schedule_create_max_attempts = 2
"#;

    let config = SedaConfig::from_toml(toml_content).unwrap();
    assert_eq!(config.app.name, "billing");
    assert_eq!(config.app.function_name.as_deref(), Some("billing-api"));
    assert_eq!(config.remote.region_or_default(), "eu-central-1");
    assert_eq!(config.naming.topic_name, "jobs-{function_name}");
    // 未出现的字段保持默认值
    assert_eq!(config.naming.schedule_name, "{path}-{uid}");
    assert_eq!(config.dispatch.unmatched_event, UnmatchedEventPolicy::Reject);
    assert_eq!(config.dispatch.default_service, DispatchService::Invoke);
    assert_eq!(config.reconcile.schedule_create_max_attempts, 2);
    assert_eq!(config.reconcile.group_deleting_delay_seconds, 2);
}

#[test]
fn test_config_roundtrip_toml() {
    let mut config = SedaConfig::default();
    config.app.function_name = Some("api".to_string());
    let toml = config.to_toml().unwrap();
    let parsed = SedaConfig::from_toml(&toml).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_validation() {
    let mut config = SedaConfig::default();
    config.reconcile.schedule_create_max_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = SedaConfig::default();
    config.reconcile.schedule_create_retry_pattern = "(unclosed".to_string();
    assert!(config.validate().is_err());

    let mut config = SedaConfig::default();
    config.observability.log_format = "xml".to_string();
    assert!(config.validate().is_err());

    let mut config = SedaConfig::default();
    config.remote.backend = "carrier-pigeon".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_remote_credentials_must_be_paired() {
    let mut remote = RemoteConfig::default();
    assert_eq!(remote.credentials().unwrap(), None);

    remote.access_key_id = Some("AKIAEXAMPLE".to_string());
    assert!(remote.credentials().is_err());
    assert!(remote.validate().is_err());

    remote.secret_access_key = Some("secret".to_string());
    remote.session_token = Some("token".to_string());
    let credentials = remote.credentials().unwrap().unwrap();
    assert_eq!(credentials.access_key_id, "AKIAEXAMPLE");
    assert_eq!(credentials.session_token.as_deref(), Some("token"));
    assert!(!format!("{credentials:?}").contains("secret"));

    let token_only = RemoteConfig {
        session_token: Some("token".to_string()),
        ..RemoteConfig::default()
    };
    assert!(token_only.validate().is_err());
}

#[test]
fn test_load_explicit_file() {
    let file = NamedTempFile::new().unwrap();
    fs::write(
        file.path(),
        "[app]\nfunction_name = \"from-file\"\n[remote]\nregion = \"ap-south-1\"\n",
    )
    .unwrap();

    let config = SedaConfig::load(file.path().to_str()).unwrap();
    assert_eq!(config.app.function_name.as_deref(), Some("from-file"));
    assert_eq!(config.remote.region.as_deref(), Some("ap-south-1"));
}

#[test]
fn test_load_missing_explicit_file_fails() {
    let result = SedaConfig::load(Some("/definitely/not/here/seda.toml"));
    assert!(result.is_err());
}

#[test]
fn test_load_from_app_dir() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config/seda.toml"),
        "[app]\nname = \"nested\"\n",
    )
    .unwrap();

    let config = SedaConfig::load_with(None, Some(dir.path())).unwrap();
    assert_eq!(config.app.name, "nested");

    // 根目录下的 seda.toml 优先
    fs::write(dir.path().join("seda.toml"), "[app]\nname = \"top\"\n").unwrap();
    let config = SedaConfig::load_with(None, Some(dir.path())).unwrap();
    assert_eq!(config.app.name, "top");
}

#[test]
fn test_environment_override() {
    env::set_var("SEDA_RECONCILE__GROUP_DELETING_MAX_POLLS", "7");
    let config = SedaConfig::load_with(None, Some(TempDir::new().unwrap().path()));
    env::remove_var("SEDA_RECONCILE__GROUP_DELETING_MAX_POLLS");

    assert_eq!(config.unwrap().reconcile.group_deleting_max_polls, 7);
}

#[test]
fn test_platform_env_fallbacks() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("AWS_LAMBDA_FUNCTION_NAME", "lambda-fn"),
        ("AWS_DEFAULT_REGION", "us-west-2"),
    ]);
    let mut config = SedaConfig::default();
    config.apply_env_fallbacks(|key| vars.get(key).map(|v| v.to_string()));
    assert_eq!(config.app.function_name.as_deref(), Some("lambda-fn"));
    assert_eq!(config.remote.region.as_deref(), Some("us-west-2"));

    // AWS_REGION 优先于 AWS_DEFAULT_REGION，已配置的值不会被覆盖
    let vars: HashMap<&str, &str> = HashMap::from([
        ("AWS_REGION", "eu-west-3"),
        ("AWS_DEFAULT_REGION", "us-west-2"),
        ("AWS_LAMBDA_FUNCTION_NAME", "ignored"),
    ]);
    let mut config = SedaConfig::default();
    config.app.function_name = Some("configured".to_string());
    config.apply_env_fallbacks(|key| vars.get(key).map(|v| v.to_string()));
    assert_eq!(config.app.function_name.as_deref(), Some("configured"));
    assert_eq!(config.remote.region.as_deref(), Some("eu-west-3"));
}
