//! Part planning
//!
//! Splits an object of known size into the numbered byte ranges that are
//! uploaded as individual parts.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

/// Maximum parts allowed in one S3 multipart upload
pub const MAX_PARTS: u64 = 10_000;

/// Planning errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Part size must be greater than zero")]
    ZeroPartSize,

    #[error("Object is empty and the empty-object policy is 'reject'")]
    EmptyObject,

    #[error("Object needs {parts} parts, more than the maximum of {max}")]
    TooManyParts { parts: u64, max: u64 },
}

/// What to do with a zero-length object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyObjectPolicy {
    /// Fail planning with [`PlanError::EmptyObject`]
    #[default]
    Reject,
    /// Upload a single zero-length part
    SingleEmptyPart,
}

/// One planned part: a 1-based part number and the byte range it covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartSegment {
    pub part_number: u32,
    pub offset: u64,
    pub length: u64,
}

impl PartSegment {
    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Byte range covered by this part
    pub fn range(&self) -> Range<u64> {
        self.offset..self.end()
    }
}

/// Computes part segments for a fixed part size
#[derive(Debug, Clone)]
pub struct PartPlanner {
    part_size: u64,
    empty_object: EmptyObjectPolicy,
    max_parts: u64,
}

impl PartPlanner {
    /// Create a planner with the S3 part-count limit
    pub fn new(part_size: u64, empty_object: EmptyObjectPolicy) -> Self {
        Self {
            part_size,
            empty_object,
            max_parts: MAX_PARTS,
        }
    }

    /// Override the part-count limit (for stores other than S3)
    pub fn with_max_parts(mut self, max_parts: u64) -> Self {
        self.max_parts = max_parts;
        self
    }

    /// Get the part size
    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// Number of parts `file_size` splits into, before any policy applies
    pub fn part_count(&self, file_size: u64) -> Result<u64, PlanError> {
        if self.part_size == 0 {
            return Err(PlanError::ZeroPartSize);
        }
        Ok(file_size.div_ceil(self.part_size))
    }

    /// Plan the parts for an object of `file_size` bytes.
    ///
    /// Segments are returned in part-number order, starting at 1, and cover
    /// `[0, file_size)` exactly. Only the last segment may be shorter than
    /// the part size.
    pub fn plan(&self, file_size: u64) -> Result<Vec<PartSegment>, PlanError> {
        let count = self.part_count(file_size)?;

        if count == 0 {
            return match self.empty_object {
                EmptyObjectPolicy::Reject => Err(PlanError::EmptyObject),
                EmptyObjectPolicy::SingleEmptyPart => Ok(vec![PartSegment {
                    part_number: 1,
                    offset: 0,
                    length: 0,
                }]),
            };
        }

        if count > self.max_parts || count > u64::from(u32::MAX) {
            return Err(PlanError::TooManyParts {
                parts: count,
                max: self.max_parts,
            });
        }

        let segments = (0..count)
            .map(|i| {
                let offset = i * self.part_size;
                let end = file_size.min(offset.saturating_add(self.part_size));
                PartSegment {
                    part_number: (i + 1) as u32,
                    offset,
                    length: end - offset,
                }
            })
            .collect();

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_twelve_gigabytes_in_five_gib_parts() {
        let planner = PartPlanner::new(5 * GIB, EmptyObjectPolicy::Reject);
        let segments = planner.plan(12_000_000_000).unwrap();

        let ranges: Vec<_> = segments.iter().map(|s| s.range()).collect();
        assert_eq!(
            ranges,
            vec![
                0..5_368_709_120,
                5_368_709_120..10_737_418_240,
                10_737_418_240..12_000_000_000
            ]
        );
        let numbers: Vec<_> = segments.iter().map(|s| s.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_exact_multiple_has_no_short_tail() {
        let planner = PartPlanner::new(10, EmptyObjectPolicy::Reject);
        let segments = planner.plan(30).unwrap();

        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.length == 10));
    }

    #[test]
    fn test_object_smaller_than_part() {
        let planner = PartPlanner::new(100, EmptyObjectPolicy::Reject);
        let segments = planner.plan(1).unwrap();

        assert_eq!(
            segments,
            vec![PartSegment {
                part_number: 1,
                offset: 0,
                length: 1
            }]
        );
    }

    #[test]
    fn test_empty_object_rejected_by_default() {
        let planner = PartPlanner::new(100, EmptyObjectPolicy::default());
        assert_eq!(planner.plan(0), Err(PlanError::EmptyObject));
    }

    #[test]
    fn test_empty_object_single_part_policy() {
        let planner = PartPlanner::new(100, EmptyObjectPolicy::SingleEmptyPart);
        let segments = planner.plan(0).unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].part_number, 1);
        assert_eq!(segments[0].range(), 0..0);
    }

    #[test]
    fn test_zero_part_size() {
        let planner = PartPlanner::new(0, EmptyObjectPolicy::Reject);
        assert_eq!(planner.plan(10), Err(PlanError::ZeroPartSize));
    }

    #[test]
    fn test_too_many_parts() {
        let planner = PartPlanner::new(1, EmptyObjectPolicy::Reject);
        assert_eq!(
            planner.plan(MAX_PARTS + 1),
            Err(PlanError::TooManyParts {
                parts: MAX_PARTS + 1,
                max: MAX_PARTS
            })
        );
        assert_eq!(planner.plan(MAX_PARTS).unwrap().len(), MAX_PARTS as usize);
    }

    #[test]
    fn test_custom_part_limit() {
        let planner = PartPlanner::new(1, EmptyObjectPolicy::Reject).with_max_parts(3);
        assert!(planner.plan(3).is_ok());
        assert!(matches!(
            planner.plan(4),
            Err(PlanError::TooManyParts { parts: 4, max: 3 })
        ));
    }

    #[test]
    fn test_policy_deserializes_from_snake_case() {
        let policy: EmptyObjectPolicy = serde_yaml::from_str("single_empty_part").unwrap();
        assert_eq!(policy, EmptyObjectPolicy::SingleEmptyPart);
    }
}
