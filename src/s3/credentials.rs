//! S3 Credentials Module
//!
//! Loads the credential material the signer is built from: keys from the
//! `s3` config section, or the standard `AWS_*` environment variables.
//!
//! # Example
//!
//! ```
//! use mizuchi_mpu::config::S3Config;
//! use mizuchi_mpu::s3::CredentialsProvider;
//!
//! let config = S3Config {
//!     bucket: "my-bucket".into(),
//!     region: "us-east-1".into(),
//!     endpoint: None,
//!     path_style: false,
//!     access_key: Some("access-key".into()),
//!     secret_key: Some("secret-key".into()),
//!     session_token: None,
//! };
//!
//! let creds = CredentialsProvider::resolve(&config).unwrap();
//! assert_eq!(creds.access_key_id(), "access-key");
//! assert_eq!(creds.secret_access_key(), "secret-key");
//! ```

use crate::config::S3Config;
use std::fmt;
use thiserror::Error;

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Credentials for AWS authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl Credentials {
    /// Create new credentials
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Create credentials with session token (for temporary credentials)
    pub fn with_session_token(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: Some(session_token.into()),
        }
    }

    /// Get the access key ID
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Get the secret access key
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Get the session token (if any)
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    fn validate(self) -> Result<Self, CredentialsError> {
        if self.access_key_id.trim().is_empty() {
            return Err(CredentialsError::InvalidCredentials(
                "access key id is empty".into(),
            ));
        }
        if self.secret_access_key.is_empty() {
            return Err(CredentialsError::InvalidCredentials(
                "secret access key is empty".into(),
            ));
        }
        Ok(self)
    }
}

// Secrets never reach logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Factory methods for loading credentials
pub struct CredentialsProvider;

impl CredentialsProvider {
    /// Load credentials from environment variables
    ///
    /// Looks for:
    /// - `AWS_ACCESS_KEY_ID`
    /// - `AWS_SECRET_ACCESS_KEY`
    /// - `AWS_SESSION_TOKEN` (optional)
    pub fn from_env() -> Result<Credentials, CredentialsError> {
        let access_key = std::env::var("AWS_ACCESS_KEY_ID").map_err(|_| {
            CredentialsError::MissingCredentials("AWS_ACCESS_KEY_ID not set".into())
        })?;

        let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            CredentialsError::MissingCredentials("AWS_SECRET_ACCESS_KEY not set".into())
        })?;

        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        let creds = match session_token {
            Some(token) => Credentials::with_session_token(access_key, secret_key, token),
            None => Credentials::new(access_key, secret_key),
        };
        creds.validate()
    }

    /// Load credentials from S3Config
    ///
    /// Uses the `access_key`, `secret_key` and `session_token` fields.
    pub fn from_config(config: &S3Config) -> Result<Credentials, CredentialsError> {
        let access_key = config.access_key.as_ref().ok_or_else(|| {
            CredentialsError::MissingCredentials("access_key not set in config".into())
        })?;

        let secret_key = config.secret_key.as_ref().ok_or_else(|| {
            CredentialsError::MissingCredentials("secret_key not set in config".into())
        })?;

        let creds = match &config.session_token {
            Some(token) => {
                Credentials::with_session_token(access_key.clone(), secret_key.clone(), token.clone())
            }
            None => Credentials::new(access_key.clone(), secret_key.clone()),
        };
        creds.validate()
    }

    /// Configured credentials when both keys are present, environment otherwise
    pub fn resolve(config: &S3Config) -> Result<Credentials, CredentialsError> {
        if config.access_key.is_some() || config.secret_key.is_some() {
            Self::from_config(config)
        } else {
            tracing::debug!("No credentials in config, falling back to environment");
            Self::from_env()
        }
    }
}
