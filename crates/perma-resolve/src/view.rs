//! Materialized permanode views

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current attribute state of a permanode
///
/// Attribute names iterate in sorted order and values keep replay order,
/// so two views built from the same claims serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermanodeView {
    #[serde(rename = "attr")]
    attributes: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modified: Option<DateTime<Utc>>,
}

impl PermanodeView {
    /// Empty view
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute map
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.attributes
    }

    /// Values of `attribute`; empty if absent
    #[must_use]
    pub fn get(&self, attribute: &str) -> &[String] {
        self.attributes.get(attribute).map_or(&[], Vec::as_slice)
    }

    /// The value of `attribute` when it has exactly one
    #[must_use]
    pub fn single(&self, attribute: &str) -> Option<&str> {
        match self.get(attribute) {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    /// Timestamp of the last applied claim
    #[inline]
    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    /// `true` when no attribute is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub(crate) fn set(&mut self, attribute: &str, value: &str) {
        self.attributes
            .insert(attribute.to_owned(), vec![value.to_owned()]);
    }

    pub(crate) fn add(&mut self, attribute: &str, value: &str, dedup: bool) {
        let values = self.attributes.entry(attribute.to_owned()).or_default();
        if dedup && values.iter().any(|v| v == value) {
            return;
        }
        values.push(value.to_owned());
    }

    pub(crate) fn del(&mut self, attribute: &str, value: &str) {
        if value.is_empty() {
            self.attributes.remove(attribute);
            return;
        }
        let Some(values) = self.attributes.get_mut(attribute) else {
            return;
        };
        if let Some(pos) = values.iter().position(|v| v == value) {
            values.remove(pos);
        }
        if values.is_empty() {
            self.attributes.remove(attribute);
        }
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.modified = Some(self.modified.map_or(at, |prev| prev.max(at)));
    }
}
