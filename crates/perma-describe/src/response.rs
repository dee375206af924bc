//! Describe response types and their JSON shape
//!
//! ```json
//! {
//!   "blake3-…": { "blobRef": "blake3-…", "permanode": { "attr": { "title": ["…"] } } },
//!   "blake3-…": { "blobRef": "blake3-…", "error": { "kind": "notFound", "message": "…" } }
//! }
//! ```

use std::collections::BTreeMap;

use perma_blob::BlobRef;
use perma_resolve::PermanodeView;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Result of describing one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescribeOutcome {
    /// The reference is a permanode; here is its current view
    Permanode(PermanodeView),
    /// No blob with this reference exists
    NotFound,
    /// The blob exists but is not a permanode
    NotPermanode,
    /// The permanode's claims could not be replayed
    ResolutionError(String),
}

impl DescribeOutcome {
    /// Wire name of the failure kind; `None` on success
    #[must_use]
    pub fn error_kind(&self) -> Option<&'static str> {
        match self {
            Self::Permanode(_) => None,
            Self::NotFound => Some("notFound"),
            Self::NotPermanode => Some("notPermanode"),
            Self::ResolutionError(_) => Some("resolutionError"),
        }
    }

    fn error_message(&self) -> Option<&str> {
        match self {
            Self::Permanode(_) => None,
            Self::NotFound => Some("blob not found"),
            Self::NotPermanode => Some("blob is not a permanode"),
            Self::ResolutionError(message) => Some(message),
        }
    }
}

/// One item of a describe response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribedBlob {
    pub blob_ref: BlobRef,
    pub outcome: DescribeOutcome,
}

impl DescribedBlob {
    /// The view, if the item described a permanode
    #[must_use]
    pub fn view(&self) -> Option<&PermanodeView> {
        match &self.outcome {
            DescribeOutcome::Permanode(view) => Some(view),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    kind: &'static str,
    message: &'a str,
}

impl Serialize for DescribedBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("blobRef", &self.blob_ref)?;
        match (&self.outcome, self.outcome.error_kind(), self.outcome.error_message()) {
            (DescribeOutcome::Permanode(view), _, _) => map.serialize_entry("permanode", view)?,
            (_, Some(kind), Some(message)) => {
                map.serialize_entry("error", &ErrorBody { kind, message })?;
            }
            _ => {}
        }
        map.end()
    }
}

/// Describe results keyed by requested reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DescribeResponse {
    items: BTreeMap<BlobRef, DescribedBlob>,
}

impl DescribeResponse {
    pub(crate) fn insert(&mut self, blob_ref: BlobRef, outcome: DescribeOutcome) {
        self.items.insert(blob_ref, DescribedBlob { blob_ref, outcome });
    }

    #[must_use]
    pub fn get(&self, blob_ref: &BlobRef) -> Option<&DescribedBlob> {
        self.items.get(blob_ref)
    }

    /// View of `blob_ref`, if it resolved to a permanode
    #[must_use]
    pub fn view(&self, blob_ref: &BlobRef) -> Option<&PermanodeView> {
        self.get(blob_ref).and_then(DescribedBlob::view)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DescribedBlob> {
        self.items.values()
    }

    /// Number of items that failed
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.iter()
            .filter(|item| item.outcome.error_kind().is_some())
            .count()
    }
}
