//! Document metadata — the root of ownership for all ontology rows.
//!
//! A document's text is stored alongside its metadata because span validation
//! needs it: every span must reproduce the exact character slice it claims to
//! evidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// An ingested document. The id and checksum are immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
  pub doc_id:     Uuid,
  pub title:      String,
  pub source_uri: Option<String>,
  /// SHA-256 hex digest of `text`; UNIQUE across the store.
  pub checksum:   String,
  /// Byte length of `text`.
  pub bytes:      u64,
  pub text:       String,
  /// Server-assigned; never changes after creation.
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::OntologyStore::create_document`].
/// The id, checksum, byte size, and timestamps are all set by the store.
#[derive(Debug, Clone)]
pub struct NewDocument {
  pub title:      String,
  pub source_uri: Option<String>,
  pub text:       String,
}

/// SHA-256 hex digest of document text; the store's content checksum.
pub fn content_checksum(text: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(text.as_bytes());
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn checksum_is_stable_hex_sha256() {
    let a = content_checksum("quarterly revenue grew 12%");
    let b = content_checksum("quarterly revenue grew 12%");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn checksum_differs_for_different_text() {
    assert_ne!(content_checksum("alpha"), content_checksum("beta"));
  }
}
