//! Merge policy for writing elevations into tagged records.
//!
//! Records (CSV rows, GeoJSON features, map nodes) carry string tags. After a
//! lookup, [`TagPolicy::decide`] says whether the elevation tag is written or
//! the record is left as it is. A lookup without a value never adds a tag and
//! never removes one.

use crate::engine::ElevationResult;

/// Default tag name for elevations.
pub const DEFAULT_TAG: &str = "ele";

/// Default number of decimals written.
pub const DEFAULT_PRECISION: usize = 2;

/// What to do with a record's elevation tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAction {
    /// Set the tag to this value, adding it if absent.
    Write(String),
    /// Leave the record untouched.
    Keep,
}

/// How elevations are merged into records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    /// Name of the elevation tag.
    pub tag_name: String,
    /// Whether an existing tag is overwritten by a new value.
    pub replace_existing: bool,
    /// Decimals in the written value.
    pub precision: usize,
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self {
            tag_name: DEFAULT_TAG.to_string(),
            replace_existing: true,
            precision: DEFAULT_PRECISION,
        }
    }
}

impl TagPolicy {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Default::default()
        }
    }

    pub fn replace_existing(mut self, replace_existing: bool) -> Self {
        self.replace_existing = replace_existing;
        self
    }

    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Decide what to do with a record whose current tag value is `existing`.
    ///
    /// # Examples
    ///
    /// ```
    /// use eletile::engine::ElevationResult;
    /// use eletile::tagging::{TagAction, TagPolicy};
    ///
    /// let policy = TagPolicy::default();
    /// assert_eq!(
    ///     policy.decide(None, ElevationResult::Value(1234.567)),
    ///     TagAction::Write("1234.57".to_string())
    /// );
    /// assert_eq!(policy.decide(Some("12"), ElevationResult::Missing), TagAction::Keep);
    /// ```
    pub fn decide(&self, existing: Option<&str>, result: ElevationResult) -> TagAction {
        match result {
            ElevationResult::Value(v) if existing.is_none() || self.replace_existing => {
                TagAction::Write(self.format(v))
            }
            _ => TagAction::Keep,
        }
    }

    /// Format an elevation the way it is written into tags.
    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.precision, value)
    }

    /// Find the record's elevation tag among `keys`, ignoring ASCII case.
    pub fn find_key<'a, I>(&self, keys: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter()
            .find(|k| k.eq_ignore_ascii_case(&self.tag_name))
    }
}
