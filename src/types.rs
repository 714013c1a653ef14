use serde::{Deserialize, Serialize};

/// Containment semantics for a coordinate query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Match records whose span intersects a queried interval.
    #[default]
    Overlapping,
    /// Match only records whose span lies entirely inside a queried interval.
    Contained,
}

impl QueryMode {
    pub fn from_contained_flag(contained: bool) -> Self {
        if contained {
            QueryMode::Contained
        } else {
            QueryMode::Overlapping
        }
    }
}

/// How to treat records that fail to decode mid-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStringency {
    /// A malformed record aborts the scan.
    #[default]
    Strict,
    /// Malformed records are skipped with a warning.
    Lenient,
    /// Malformed records are skipped without notice.
    Silent,
}

impl ValidationStringency {
    pub fn skips_malformed(&self) -> bool {
        !matches!(self, ValidationStringency::Strict)
    }
}
