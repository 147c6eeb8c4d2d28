//! Data classification levels and the protection policy.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Ordered sensitivity label attached to a field or payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataClassification {
    /// Public or non-sensitive data
    Unofficial,
    /// Routine business data
    Official,
    /// Personal or otherwise sensitive data
    OfficialSensitive,
    /// Credentials and identity attributes
    Protected,
}

impl DataClassification {
    /// Every level, lowest first.
    pub const ALL: [Self; 4] = [
        Self::Unofficial,
        Self::Official,
        Self::OfficialSensitive,
        Self::Protected,
    ];

    /// Whether data at this level must be envelope-encrypted.
    #[must_use]
    pub const fn requires_protection(self) -> bool {
        matches!(self, Self::OfficialSensitive | Self::Protected)
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unofficial => "unofficial",
            Self::Official => "official",
            Self::OfficialSensitive => "official-sensitive",
            Self::Protected => "protected",
        }
    }
}

impl fmt::Display for DataClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataClassification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "unofficial" => Ok(Self::Unofficial),
            "official" => Ok(Self::Official),
            "official-sensitive" => Ok(Self::OfficialSensitive),
            "protected" => Ok(Self::Protected),
            other => Err(format!("unknown classification: {other}")),
        }
    }
}

/// Whether data at `classification` must be envelope-encrypted.
#[must_use]
pub const fn requires_protection(classification: DataClassification) -> bool {
    classification.requires_protection()
}

/// Field identifier to classification table, built once at startup.
///
/// Fields missing from the table get the fallback level, which defaults to
/// [`DataClassification::Protected`].
#[derive(Debug, Clone)]
pub struct ClassificationMap {
    fields: HashMap<String, DataClassification>,
    fallback: DataClassification,
}

impl Default for ClassificationMap {
    fn default() -> Self {
        Self::new(DataClassification::Protected)
    }
}

impl ClassificationMap {
    /// Empty table with `fallback` for unknown fields.
    #[must_use]
    pub fn new(fallback: DataClassification) -> Self {
        Self {
            fields: HashMap::new(),
            fallback,
        }
    }

    /// Classify `field`.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, classification: DataClassification) -> Self {
        self.fields.insert(field.into(), classification);
        self
    }

    /// Classification of `field`, or the fallback level.
    #[must_use]
    pub fn classify(&self, field: &str) -> DataClassification {
        self.fields.get(field).copied().unwrap_or(self.fallback)
    }

    /// Level used for unknown fields.
    #[must_use]
    pub const fn fallback(&self) -> DataClassification {
        self.fallback
    }

    /// Number of classified fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, DataClassification)> for ClassificationMap {
    fn from_iter<I: IntoIterator<Item = (S, DataClassification)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::default(), |map, (field, c)| map.with_field(field, c))
    }
}
