//! XML bodies of the multipart API

use super::S3ClientError;
use crate::upload::{CompletedPart, CompletionManifest};
use serde::{Deserialize, Serialize};

/// Body of a CreateMultipartUpload response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "InitiateMultipartUploadResult")]
pub struct InitiateMultipartUploadResult {
    #[serde(rename = "Bucket", default)]
    pub bucket: Option<String>,
    #[serde(rename = "Key", default)]
    pub key: Option<String>,
    #[serde(rename = "UploadId")]
    pub upload_id: String,
}

/// Body of a CompleteMultipartUpload request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "CompleteMultipartUpload")]
pub struct CompleteMultipartUploadXml {
    #[serde(rename = "Part", default)]
    pub parts: Vec<PartXml>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartXml {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Body of a successful CompleteMultipartUpload response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename = "CompleteMultipartUploadResult")]
pub struct CompleteMultipartUploadResult {
    #[serde(rename = "Location", default)]
    pub location: Option<String>,
    #[serde(rename = "Bucket", default)]
    pub bucket: Option<String>,
    #[serde(rename = "Key", default)]
    pub key: Option<String>,
    #[serde(rename = "ETag", default)]
    pub etag: Option<String>,
}

/// S3 error document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename = "Error")]
pub struct ErrorXml {
    #[serde(rename = "Code", default)]
    pub code: Option<String>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

/// Parse the upload id out of a CreateMultipartUpload response
pub fn parse_initiate(body: &str) -> Result<InitiateMultipartUploadResult, S3ClientError> {
    let result: InitiateMultipartUploadResult = quick_xml::de::from_str(body).map_err(|e| {
        S3ClientError::ResponseError(format!("invalid InitiateMultipartUploadResult: {}", e))
    })?;
    if result.upload_id.trim().is_empty() {
        return Err(S3ClientError::ResponseError(
            "InitiateMultipartUploadResult has an empty UploadId".into(),
        ));
    }
    Ok(result)
}

/// Render the completion manifest as a CompleteMultipartUpload document
pub fn render_complete(manifest: &CompletionManifest) -> Result<String, S3ClientError> {
    let doc = CompleteMultipartUploadXml {
        parts: manifest
            .parts()
            .iter()
            .map(|p| PartXml {
                part_number: p.part_number,
                etag: p.etag.clone(),
            })
            .collect(),
    };
    quick_xml::se::to_string(&doc)
        .map_err(|e| S3ClientError::ResponseError(format!("cannot render manifest: {}", e)))
}

/// Parse a CompleteMultipartUpload document back into its parts, in document order
pub fn parse_complete(body: &str) -> Result<Vec<CompletedPart>, S3ClientError> {
    let doc: CompleteMultipartUploadXml = quick_xml::de::from_str(body).map_err(|e| {
        S3ClientError::ResponseError(format!("invalid CompleteMultipartUpload: {}", e))
    })?;
    Ok(doc
        .parts
        .into_iter()
        .map(|p| CompletedPart {
            part_number: p.part_number,
            etag: p.etag,
        })
        .collect())
}

/// Parse a CompleteMultipartUpload response; an empty body is accepted
pub fn parse_complete_result(body: &str) -> Result<CompleteMultipartUploadResult, S3ClientError> {
    if body.trim().is_empty() {
        return Ok(CompleteMultipartUploadResult::default());
    }
    quick_xml::de::from_str(body).map_err(|e| {
        S3ClientError::ResponseError(format!("invalid CompleteMultipartUploadResult: {}", e))
    })
}

/// Returns the error document if `body` is one.
///
/// CompleteMultipartUpload can fail after the server has already sent
/// `200 OK`, in which case the failure only shows up in the body.
pub fn parse_error(body: &str) -> Option<ErrorXml> {
    let mut rest = body.trim_start();
    if rest.starts_with("<?xml") {
        rest = rest.split_once("?>").map(|(_, r)| r.trim_start())?;
    }
    if !(rest.starts_with("<Error>") || rest.starts_with("<Error ")) {
        return None;
    }
    quick_xml::de::from_str(rest).ok()
}
