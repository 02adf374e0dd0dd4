//! AWS Signature Version 4
//!
//! Header signing for regular requests and query-string signing for
//! presigned URLs.

use super::{Payload, RequestSigner, SignableRequest, SigningError};
use crate::s3::Credentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Payload hash marker for unsigned bodies
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Longest validity SigV4 allows for a presigned URL
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Characters left unescaped in canonical query strings (RFC 3986 unreserved)
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// SigV4 signer bound to one set of credentials and a region
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: Credentials,
    region: String,
    service: String,
}

impl SigV4Signer {
    /// Create a signer for the S3 service
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        Self::with_service(credentials, region, "s3")
    }

    /// Create a signer for an arbitrary service name
    pub fn with_service(
        credentials: Credentials,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    /// Get the region
    pub fn region(&self) -> &str {
        &self.region
    }

    fn scope(&self, at: &DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            at.format("%Y%m%d"),
            self.region,
            self.service
        )
    }

    fn signature(&self, at: &DateTime<Utc>, canonical_request: &str) -> String {
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date(at),
            self.scope(at),
            sha256_hex(canonical_request.as_bytes())
        );

        let secret = format!("AWS4{}", self.credentials.secret_access_key());
        let k_date = hmac_sha256(secret.as_bytes(), at.format("%Y%m%d").to_string().as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        let k_signing = hmac_sha256(&k_service, b"aws4_request");

        hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()))
    }
}

impl RequestSigner for SigV4Signer {
    fn sign(
        &self,
        request: &SignableRequest<'_>,
        at: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, SigningError> {
        let host = host_header(request.url)?;
        let date = amz_date(&at);
        let payload_hash = match request.payload {
            Payload::Bytes(body) => sha256_hex(body),
            Payload::Unsigned => UNSIGNED_PAYLOAD.to_string(),
        };

        let mut headers = BTreeMap::new();
        for (name, value) in request.headers {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(SigningError::InvalidHeader((*name).to_string()));
            }
            headers.insert(name.to_ascii_lowercase(), value.trim().to_string());
        }
        headers.insert("host".to_string(), host);
        headers.insert("x-amz-date".to_string(), date);
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        if let Some(token) = self.credentials.session_token() {
            headers.insert("x-amz-security-token".to_string(), token.to_string());
        }

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value))
            .collect();
        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method,
            request.url.path(),
            canonical_query(request.url),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM,
            self.credentials.access_key_id(),
            self.scope(&at),
            signed_headers,
            self.signature(&at, &canonical_request)
        );

        // Only the x-amz-* headers the caller doesn't already set, plus authorization
        let mut out: Vec<(String, String)> = headers
            .into_iter()
            .filter(|(name, _)| name.starts_with("x-amz-"))
            .collect();
        out.push(("authorization".to_string(), authorization));
        Ok(out)
    }

    fn presign(
        &self,
        method: &str,
        url: &Url,
        expires_in: Duration,
        at: DateTime<Utc>,
    ) -> Result<Url, SigningError> {
        if expires_in.as_secs() == 0 || expires_in > MAX_PRESIGN_EXPIRY {
            return Err(SigningError::InvalidExpiry(expires_in));
        }
        let host = host_header(url)?;

        let mut presigned = url.clone();
        {
            let credential = format!("{}/{}", self.credentials.access_key_id(), self.scope(&at));
            let mut query = presigned.query_pairs_mut();
            query
                .append_pair("X-Amz-Algorithm", ALGORITHM)
                .append_pair("X-Amz-Credential", &credential)
                .append_pair("X-Amz-Date", &amz_date(&at))
                .append_pair("X-Amz-Expires", &expires_in.as_secs().to_string())
                .append_pair("X-Amz-SignedHeaders", "host");
            if let Some(token) = self.credentials.session_token() {
                query.append_pair("X-Amz-Security-Token", token);
            }
        }

        let canonical_request = format!(
            "{}\n{}\n{}\nhost:{}\n\nhost\n{}",
            method,
            presigned.path(),
            canonical_query(&presigned),
            host,
            UNSIGNED_PAYLOAD
        );
        let signature = self.signature(&at, &canonical_request);

        presigned
            .query_pairs_mut()
            .append_pair("X-Amz-Signature", &signature);
        Ok(presigned)
    }
}

fn amz_date(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

fn host_header(url: &Url) -> Result<String, SigningError> {
    let host = url
        .host_str()
        .ok_or_else(|| SigningError::MissingHost(url.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Sorted, strictly-encoded query string
fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (aws_encode(&k), aws_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn aws_encode(s: &str) -> String {
    utf8_percent_encode(s, QUERY_ENCODE_SET).to_string()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Hex-encoded SHA-256 digest
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
