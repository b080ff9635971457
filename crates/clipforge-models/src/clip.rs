//! Clip metadata and detected time ranges.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A span of the source media, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
}

impl TimeRange {
    /// Create a range, rejecting empty, reversed or non-finite spans.
    pub fn new(start: f64, end: f64) -> Result<Self, ModelError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Check the range describes a positive, finite span starting at or after zero.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(ModelError::InvalidRange {
                start: self.start,
                end: self.end,
                reason: "bounds must be finite",
            });
        }
        if self.start < 0.0 {
            return Err(ModelError::InvalidRange {
                start: self.start,
                end: self.end,
                reason: "start must not be negative",
            });
        }
        if self.end <= self.start {
            return Err(ModelError::InvalidRange {
                start: self.start,
                end: self.end,
                reason: "end must be after start",
            });
        }
        Ok(())
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A generated clip file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Clip {
    /// Output filename
    pub filename: String,
    /// Full output path
    pub path: String,
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds
    pub end_time: f64,
    /// Clip duration in seconds (`end_time - start_time`)
    pub duration: f64,
}

impl Clip {
    pub fn new(filename: impl Into<String>, path: impl Into<String>, range: TimeRange) -> Self {
        Self {
            filename: filename.into(),
            path: path.into(),
            start_time: range.start,
            end_time: range.end,
            duration: range.duration(),
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }
}
