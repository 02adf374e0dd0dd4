//! Request signing
//!
//! Authentication is a capability object handed to whoever needs it. The
//! store client receives an `Arc<dyn RequestSigner>` at construction time and
//! passes the signing timestamp on every call, so a signer holds no mutable
//! state and can be shared freely between part workers.

use chrono::{DateTime, Utc};
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

pub mod sigv4;

pub use sigv4::SigV4Signer;

/// Signing errors
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("Invalid presign expiry {0:?}: must be between 1 second and 7 days")]
    InvalidExpiry(Duration),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Body of a request as seen by the signer
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Payload bytes, hashed into the signature
    Bytes(&'a [u8]),
    /// Payload excluded from the signature (`UNSIGNED-PAYLOAD`)
    Unsigned,
}

/// An outgoing request to be signed
#[derive(Debug, Clone, Copy)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    /// Extra headers that must be covered by the signature
    pub headers: &'a [(&'a str, &'a str)],
    pub payload: Payload<'a>,
}

impl<'a> SignableRequest<'a> {
    /// Request with no extra signed headers
    pub fn new(method: &'a str, url: &'a Url, payload: Payload<'a>) -> Self {
        Self {
            method,
            url,
            headers: &[],
            payload,
        }
    }
}

/// Produces authentication material for store requests
pub trait RequestSigner: Send + Sync {
    /// Sign a request and return the headers to attach to it.
    ///
    /// The `host` header is part of the signature but is not returned; the
    /// HTTP client derives it from the URL.
    fn sign(
        &self,
        request: &SignableRequest<'_>,
        at: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, SigningError>;

    /// Produce a time-bounded URL that authorizes `method` on `url` without
    /// any further headers.
    fn presign(
        &self,
        method: &str,
        url: &Url,
        expires_in: Duration,
        at: DateTime<Utc>,
    ) -> Result<Url, SigningError>;
}
