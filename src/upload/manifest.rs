//! Completion manifest
//!
//! The ordered `(part number, ETag)` list that tells the store how to
//! assemble the object. Order comes from an explicit sort, never from the
//! order in which parts finished.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Manifest validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("Manifest has no parts")]
    Empty,

    #[error("Part {0} appears more than once")]
    DuplicatePart(u32),

    #[error("Part {0} is missing")]
    MissingPart(u32),

    #[error("Part {0} has an empty ETag")]
    EmptyEtag(u32),

    #[error("Expected {expected} parts, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Part numbers start at 1, got {0}")]
    InvalidPartNumber(u32),
}

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

impl CompletedPart {
    pub fn new(part_number: u32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

/// Outcome of one successful part transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartResult {
    pub part_number: u32,
    pub etag: String,
    pub size: u64,
    pub duration: Option<Duration>,
    pub attempts: u32,
}

impl From<PartResult> for CompletedPart {
    fn from(result: PartResult) -> Self {
        CompletedPart::new(result.part_number, result.etag)
    }
}

/// Parts sorted ascending, numbered 1..=N without gaps or duplicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionManifest {
    parts: Vec<CompletedPart>,
}

impl CompletionManifest {
    /// Sort `parts` by part number and validate them
    pub fn from_parts(mut parts: Vec<CompletedPart>) -> Result<Self, ManifestError> {
        if parts.is_empty() {
            return Err(ManifestError::Empty);
        }

        parts.sort_unstable_by_key(|p| p.part_number);

        for (index, part) in parts.iter().enumerate() {
            if part.part_number == 0 {
                return Err(ManifestError::InvalidPartNumber(0));
            }
            if index > 0 && parts[index - 1].part_number == part.part_number {
                return Err(ManifestError::DuplicatePart(part.part_number));
            }
            let expected = index as u32 + 1;
            if part.part_number != expected {
                return Err(ManifestError::MissingPart(expected));
            }
            if part.etag.trim().is_empty() {
                return Err(ManifestError::EmptyEtag(part.part_number));
            }
        }

        Ok(Self { parts })
    }

    /// Build from collected results, checking one result per planned segment
    pub fn from_results(results: Vec<PartResult>, expected: usize) -> Result<Self, ManifestError> {
        if results.len() != expected {
            return Err(ManifestError::CountMismatch {
                expected,
                actual: results.len(),
            });
        }
        Self::from_parts(results.into_iter().map(CompletedPart::from).collect())
    }

    pub fn parts(&self) -> &[CompletedPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(part_number: u32, etag: &str) -> PartResult {
        PartResult {
            part_number,
            etag: etag.into(),
            size: 10,
            duration: None,
            attempts: 1,
        }
    }

    #[test]
    fn test_sorted_regardless_of_arrival_order() {
        let manifest = CompletionManifest::from_results(
            vec![result(3, "C"), result(1, "A"), result(2, "B")],
            3,
        )
        .unwrap();

        assert_eq!(
            manifest.parts(),
            &[
                CompletedPart::new(1, "A"),
                CompletedPart::new(2, "B"),
                CompletedPart::new(3, "C"),
            ]
        );
    }

    #[test]
    fn test_count_mismatch() {
        let err = CompletionManifest::from_results(vec![result(1, "A"), result(3, "C")], 3)
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::CountMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_gap_is_rejected() {
        let err = CompletionManifest::from_parts(vec![
            CompletedPart::new(1, "A"),
            CompletedPart::new(3, "C"),
        ])
        .unwrap_err();
        assert_eq!(err, ManifestError::MissingPart(2));
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let err = CompletionManifest::from_parts(vec![
            CompletedPart::new(1, "A"),
            CompletedPart::new(2, "B"),
            CompletedPart::new(2, "B2"),
        ])
        .unwrap_err();
        assert_eq!(err, ManifestError::DuplicatePart(2));
    }

    #[test]
    fn test_part_zero_is_rejected() {
        let err = CompletionManifest::from_parts(vec![CompletedPart::new(0, "A")]).unwrap_err();
        assert_eq!(err, ManifestError::InvalidPartNumber(0));
    }

    #[test]
    fn test_empty_etag_is_rejected() {
        let err = CompletionManifest::from_parts(vec![CompletedPart::new(1, " ")]).unwrap_err();
        assert_eq!(err, ManifestError::EmptyEtag(1));
    }

    #[test]
    fn test_empty_manifest() {
        assert_eq!(
            CompletionManifest::from_parts(Vec::new()).unwrap_err(),
            ManifestError::Empty
        );
    }

    #[test]
    fn test_serializes_as_json() {
        let manifest = CompletionManifest::from_parts(vec![CompletedPart::new(1, "\"a\"")]).unwrap();
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["parts"][0]["part_number"], 1);
        assert_eq!(json["parts"][0]["etag"], "\"a\"");
    }
}
