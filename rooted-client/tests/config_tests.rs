use pretty_assertions::assert_eq;
use rooted_client::{
    ClientConfig, ClientError, Credential, MergePolicy, RetryPolicy, DEFAULT_TIMEOUT_SECS,
    ENV_BASE_URL, ENV_MAX_RETRIES, ENV_TIMEOUT_SECS, ENV_TOKEN_ID, ENV_TOKEN_KEY,
};
use serial_test::serial;
use std::time::Duration;

const ALL_VARS: [&str; 5] = [
    ENV_BASE_URL,
    ENV_TOKEN_ID,
    ENV_TOKEN_KEY,
    ENV_TIMEOUT_SECS,
    ENV_MAX_RETRIES,
];

fn set_env(vars: &[(&str, &str)]) {
    for name in ALL_VARS {
        // SAFETY: env tests are serialized with `#[serial]`.
        unsafe { std::env::remove_var(name) };
    }
    for (name, value) in vars {
        unsafe { std::env::set_var(name, value) };
    }
}

fn valid() -> ClientConfig {
    ClientConfig::new("https://bhe.example.com", Credential::new("id", "key"))
}

fn config_error<T>(result: Result<T, ClientError>) -> String {
    match result {
        Err(ClientError::Config(message)) => message,
        Err(other) => panic!("expected config error, got {other}"),
        Ok(_) => panic!("expected config error"),
    }
}

// ── Defaults ────────────────────────────────────────────────────

#[test]
fn new_config_uses_defaults() {
    let config = valid();
    assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    assert_eq!(config.timeout(), Duration::from_secs(10));
    assert_eq!(config.retry, RetryPolicy::default());
    assert_eq!(config.merge_policy, MergePolicy::PropsWin);
    assert!(config.user_agent.starts_with("rooted-client "));
    assert!(config.validate().is_ok());
}

#[test]
fn default_retry_policy() {
    let retry = RetryPolicy::default();
    assert_eq!(retry.max_retries, 5);
    for status in [429, 500, 502, 503, 504] {
        assert!(retry.is_retryable(status));
    }
    for status in [200, 400, 401, 403, 404, 501] {
        assert!(!retry.is_retryable(status));
    }
}

#[test]
fn backoff_doubles_from_half_a_second() {
    let retry = RetryPolicy::default();
    let delays: Vec<u128> = (1..=5).map(|n| retry.delay_for(n).as_millis()).collect();
    assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000]);
}

#[test]
fn backoff_is_capped() {
    let retry = RetryPolicy::default();
    assert_eq!(retry.delay_for(9), Duration::from_secs(120));
    assert_eq!(retry.delay_for(64), Duration::from_secs(120));
    assert_eq!(retry.max_backoff(), Duration::from_secs(120));
}

#[test]
fn url_for_joins_without_double_slash() {
    let mut config = valid();
    assert_eq!(config.url_for("/api/v2/users/U1"), "https://bhe.example.com/api/v2/users/U1");
    config.base_url = "https://bhe.example.com/".to_string();
    assert_eq!(config.url_for("/api/v2/users/U1"), "https://bhe.example.com/api/v2/users/U1");
}

// ── Validation ──────────────────────────────────────────────────

#[test]
fn validate_rejects_missing_base_url() {
    let mut config = valid();
    config.base_url = "  ".to_string();
    assert_eq!(config_error(config.validate()), "base_url is empty");
}

#[test]
fn validate_rejects_non_http_base_url() {
    let mut config = valid();
    config.base_url = "bhe.example.com".to_string();
    let message = config_error(config.validate());
    assert!(message.starts_with("base_url must start with http:// or https://"));
}

#[test]
fn validate_rejects_empty_credentials() {
    let config = ClientConfig::new("https://bhe.example.com", Credential::new("", "key"));
    assert_eq!(config_error(config.validate()), "token id is empty");

    let config = ClientConfig::new("https://bhe.example.com", Credential::new("id", ""));
    assert_eq!(config_error(config.validate()), "token key is empty");
}

#[test]
fn validate_rejects_zero_timeout() {
    let config = valid().with_timeout_secs(0);
    assert!(config.validate().is_err());
}

// ── Secrets ─────────────────────────────────────────────────────

#[test]
fn debug_output_redacts_token_key() {
    let config = ClientConfig::new(
        "https://bhe.example.com",
        Credential::new("id", "super-secret"),
    );
    let debug = format!("{config:?}");
    assert!(debug.contains("[REDACTED]"));
    assert!(!debug.contains("super-secret"));
}

#[test]
fn serialized_config_omits_token_key() {
    let config = ClientConfig::new(
        "https://bhe.example.com",
        Credential::new("id", "super-secret"),
    );
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"key_id\":\"id\""));
    assert!(!json.contains("super-secret"));
    assert!(!json.contains("secret_key"));
}

// ── Environment ─────────────────────────────────────────────────

#[test]
#[serial]
fn from_env_reads_required_vars() {
    set_env(&[
        (ENV_BASE_URL, "https://bhe.example.com"),
        (ENV_TOKEN_ID, "id"),
        (ENV_TOKEN_KEY, "key"),
    ]);

    let config = ClientConfig::from_env().unwrap();
    assert_eq!(config.base_url, "https://bhe.example.com");
    assert_eq!(config.credential.key_id, "id");
    assert_eq!(config.credential.secret_key, "key");
    assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    set_env(&[]);
}

#[test]
#[serial]
fn from_env_applies_overrides() {
    set_env(&[
        (ENV_BASE_URL, "https://bhe.example.com"),
        (ENV_TOKEN_ID, "id"),
        (ENV_TOKEN_KEY, "key"),
        (ENV_TIMEOUT_SECS, "30"),
        (ENV_MAX_RETRIES, "2"),
    ]);

    let config = ClientConfig::from_env().unwrap();
    assert_eq!(config.timeout_secs, 30);
    assert_eq!(config.retry.max_retries, 2);
    set_env(&[]);
}

#[test]
#[serial]
fn from_env_names_missing_var() {
    set_env(&[(ENV_BASE_URL, "https://bhe.example.com"), (ENV_TOKEN_ID, "id")]);
    assert_eq!(config_error(ClientConfig::from_env()), "ROOTED_TOKEN_KEY is not set");
    set_env(&[]);
}

#[test]
#[serial]
fn from_env_rejects_bad_number() {
    set_env(&[
        (ENV_BASE_URL, "https://bhe.example.com"),
        (ENV_TOKEN_ID, "id"),
        (ENV_TOKEN_KEY, "key"),
        (ENV_TIMEOUT_SECS, "soon"),
    ]);
    let message = config_error(ClientConfig::from_env());
    assert!(message.contains(ENV_TIMEOUT_SECS));
    set_env(&[]);
}

// ── Files ───────────────────────────────────────────────────────

#[test]
fn from_file_reads_json_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rooted.json");
    std::fs::write(
        &path,
        r#"{
            "base_url": "https://bhe.example.com",
            "credential": {"key_id": "id", "secret_key": "key"},
            "merge_policy": "reject",
            "retry": {"max_retries": 1}
        }"#,
    )
    .unwrap();

    let config = ClientConfig::from_file(&path).unwrap();
    assert_eq!(config.credential.secret_key, "key");
    assert_eq!(config.merge_policy, MergePolicy::Reject);
    assert_eq!(config.retry.max_retries, 1);
    assert_eq!(config.retry.backoff_factor_ms, 500);
    assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
}

#[test]
fn from_file_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rooted.json");
    std::fs::write(
        &path,
        r#"{"base_url": "ftp://x", "credential": {"key_id": "id", "secret_key": "key"}}"#,
    )
    .unwrap();

    assert!(matches!(ClientConfig::from_file(&path), Err(ClientError::Config(_))));
}

#[test]
fn from_file_reports_missing_file_and_bad_json() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        ClientConfig::from_file(dir.path().join("missing.json")),
        Err(ClientError::Io(_))
    ));

    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(matches!(
        ClientConfig::from_file(&path),
        Err(ClientError::Serialization(_))
    ));
}
