//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of the different identifier spaces
//! (e.g., using a source-assigned message id where a locally generated record
//! id is expected) and make the code more self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A locally generated record identifier, unique per delivery attempt.
///
/// Assigned at dequeue time; a redelivered source message receives a fresh
/// `RecordId` on every delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generates a fresh random identifier.
    pub fn random() -> Self {
        RecordId(Uuid::new_v4())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        RecordId(id)
    }
}

/// The opaque identifier assigned by the source queue ("message id").
///
/// Unlike [`RecordId`], this repeats across redeliveries of the same source
/// message, which makes it the fingerprint the dedup store keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(s: impl Into<String>) -> Self {
        SourceId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque, source-scoped handle required to acknowledge a message or to
/// extend its visibility.
///
/// Receipts are only meaningful at the queue adapter and must never appear in
/// logs, so `Debug` redacts the contents.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Receipt(String);

impl Receipt {
    pub fn new(s: impl Into<String>) -> Self {
        Receipt(s.into())
    }

    /// Returns the raw handle for use in source API calls.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Receipt(..)")
    }
}
