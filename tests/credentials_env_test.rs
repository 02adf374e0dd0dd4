//! Credential resolution tests
//!
//! These mutate process environment variables, so they run serially.

use mizuchi_mpu::config::S3Config;
use mizuchi_mpu::s3::{CredentialsError, CredentialsProvider};
use serial_test::serial;

fn clear_env() {
    std::env::remove_var("AWS_ACCESS_KEY_ID");
    std::env::remove_var("AWS_SECRET_ACCESS_KEY");
    std::env::remove_var("AWS_SESSION_TOKEN");
}

fn s3_config() -> S3Config {
    S3Config {
        bucket: "bucket".into(),
        region: "us-east-1".into(),
        endpoint: None,
        path_style: false,
        access_key: None,
        secret_key: None,
        session_token: None,
    }
}

#[test]
#[serial]
fn test_from_env() {
    clear_env();
    std::env::set_var("AWS_ACCESS_KEY_ID", "env-access");
    std::env::set_var("AWS_SECRET_ACCESS_KEY", "env-secret");
    std::env::set_var("AWS_SESSION_TOKEN", "env-token");

    let creds = CredentialsProvider::from_env().unwrap();
    assert_eq!(creds.access_key_id(), "env-access");
    assert_eq!(creds.secret_access_key(), "env-secret");
    assert_eq!(creds.session_token(), Some("env-token"));

    clear_env();
}

#[test]
#[serial]
fn test_from_env_missing() {
    clear_env();
    assert!(matches!(
        CredentialsProvider::from_env(),
        Err(CredentialsError::MissingCredentials(_))
    ));
    assert!(matches!(
        CredentialsProvider::resolve(&s3_config()),
        Err(CredentialsError::MissingCredentials(_))
    ));
}

#[test]
#[serial]
fn test_resolve_falls_back_to_env() {
    clear_env();
    std::env::set_var("AWS_ACCESS_KEY_ID", "fallback-access");
    std::env::set_var("AWS_SECRET_ACCESS_KEY", "fallback-secret");

    let creds = CredentialsProvider::resolve(&s3_config()).unwrap();
    assert_eq!(creds.access_key_id(), "fallback-access");
    assert_eq!(creds.secret_access_key(), "fallback-secret");
    assert!(creds.session_token().is_none());

    clear_env();
}

#[test]
#[serial]
fn test_resolve_prefers_config_over_env() {
    clear_env();
    std::env::set_var("AWS_ACCESS_KEY_ID", "env-access");
    std::env::set_var("AWS_SECRET_ACCESS_KEY", "env-secret");

    let mut config = s3_config();
    config.access_key = Some("cfg-access".into());
    config.secret_key = Some("cfg-secret".into());
    config.session_token = Some("cfg-token".into());

    let creds = CredentialsProvider::resolve(&config).unwrap();
    assert_eq!(creds.access_key_id(), "cfg-access");
    assert_eq!(creds.session_token(), Some("cfg-token"));

    clear_env();
}
