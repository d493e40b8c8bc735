//! Export configuration.

use crate::date::DateFormatter;
use crate::inflection::Inflection;
use serde::{Deserialize, Serialize};

/// How relationships appear in exported records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipExport {
    /// Relationships are left out.
    None,
    /// To-one as a nested object, to-many as an array of objects.
    #[default]
    Array,
    /// Rails-style `<key>_attributes` maps keyed by position.
    Nested,
}

/// How binary attributes appear in exported records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryExport {
    /// The stored bytes.
    #[default]
    Raw,
    /// The structured value the bytes encode.
    Decoded,
}

/// Options for turning persisted objects back into records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportOptions {
    /// Naming convention of exported keys.
    pub inflection: Inflection,
    /// Relationship rendering.
    pub relationships: RelationshipExport,
    /// Date rendering.
    pub date_formatter: DateFormatter,
    /// Binary rendering.
    pub binary: BinaryExport,
}

impl ExportOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the naming convention.
    #[must_use]
    pub const fn inflection(mut self, inflection: Inflection) -> Self {
        self.inflection = inflection;
        self
    }

    /// Sets relationship rendering.
    #[must_use]
    pub const fn relationships(mut self, mode: RelationshipExport) -> Self {
        self.relationships = mode;
        self
    }

    /// Sets the date formatter.
    #[must_use]
    pub fn date_formatter(mut self, formatter: DateFormatter) -> Self {
        self.date_formatter = formatter;
        self
    }

    /// Sets binary rendering.
    #[must_use]
    pub const fn binary(mut self, mode: BinaryExport) -> Self {
        self.binary = mode;
        self
    }
}
