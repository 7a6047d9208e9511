//! The `OntologyStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `loom-store-sqlite`).
//! Collaborators — extraction pipelines, navigation consumers, audit tooling
//! — depend on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  document::{Document, NewDocument},
  ontology::{Concept, ExtractionBatch, Mention, Relation, Span, Tag},
  provenance::{
    ChainReport, NewEvent, ProvenanceEvent, ProvenanceStatus, ProvenanceSummary,
  },
};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// What happens to a traced object's provenance log when its document is
/// deleted.
///
/// Ontology rows always cascade; the audit trail is a separate policy
/// decision. The default retains it, so deletions themselves stay auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvenanceRetention {
  #[default]
  Retain,
  CascadeDelete,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Loom ontology store backend.
///
/// Writes are either single-row creates or the atomic
/// [`commit_extraction`](Self::commit_extraction) batch; there are no
/// updates. Provenance appends never modify earlier events.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait OntologyStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Documents ─────────────────────────────────────────────────────────

  /// Create and persist a document. The store assigns the id, computes the
  /// content checksum and byte size, and sets both timestamps. Fails if a
  /// document with the same checksum already exists.
  fn create_document(
    &self,
    input: NewDocument,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  /// Retrieve a document. An unknown id is an error, not an empty result.
  fn get_document(
    &self,
    doc_id: Uuid,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  /// List all documents, newest first.
  fn list_documents(
    &self,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Delete a document and cascade its spans, concepts, relations, mentions,
  /// and tags. The provenance log is handled per the backend's
  /// [`ProvenanceRetention`] policy.
  fn delete_document(
    &self,
    doc_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Extraction — atomic batch write ───────────────────────────────────

  /// Commit one extraction run for one document in a single unit: all rows
  /// or none. Every structural invariant is validated first; a violation
  /// rejects the whole batch with a `ValidationError` naming the offending
  /// entity and rule. Two concurrent batches for the same document never
  /// interleave.
  fn commit_extraction(
    &self,
    batch: ExtractionBatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Ontology reads ────────────────────────────────────────────────────

  /// All concepts of a document, ordered by hierarchy level, then label,
  /// then id — the deterministic input shape the hierarchy builder expects.
  fn concepts_for_document(
    &self,
    doc_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Concept>, Self::Error>> + Send + '_;

  fn relations_for_document(
    &self,
    doc_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Relation>, Self::Error>> + Send + '_;

  fn spans_for_document(
    &self,
    doc_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Span>, Self::Error>> + Send + '_;

  fn get_concept(
    &self,
    concept_id: Uuid,
  ) -> impl Future<Output = Result<Concept, Self::Error>> + Send + '_;

  fn get_span(
    &self,
    span_id: Uuid,
  ) -> impl Future<Output = Result<Span, Self::Error>> + Send + '_;

  /// Evidence links for a concept. The concept must exist.
  fn mentions_for_concept(
    &self,
    concept_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Mention>, Self::Error>> + Send + '_;

  /// Tags scoped to a document plus global tags.
  fn tags_for_document(
    &self,
    doc_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Tag>, Self::Error>> + Send + '_;

  // ── Provenance log ────────────────────────────────────────────────────

  /// Append one event with a store-assigned strictly increasing id and
  /// timestamp. Chain linkage is deliberately NOT checked here: pipeline
  /// branches may record out of order, and judging linkage is the verifier's
  /// job.
  fn append_event(
    &self,
    input: NewEvent,
  ) -> impl Future<Output = Result<ProvenanceEvent, Self::Error>> + Send + '_;

  /// All events for a traced object, in creation order.
  fn events_for_object(
    &self,
    object_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ProvenanceEvent>, Self::Error>> + Send + '_;

  /// Run the chain verifier over an object's log and refresh the cached
  /// `verified` flags. An object with no events yields the vacuously valid
  /// empty report.
  fn verify_chain(
    &self,
    object_id: Uuid,
  ) -> impl Future<Output = Result<ChainReport, Self::Error>> + Send + '_;

  /// Aggregate audit view over an object's log.
  fn provenance_summary(
    &self,
    object_id: Uuid,
  ) -> impl Future<Output = Result<ProvenanceSummary, Self::Error>> + Send + '_;

  /// Pipeline completeness for a document.
  fn provenance_status(
    &self,
    object_id: Uuid,
  ) -> impl Future<Output = Result<ProvenanceStatus, Self::Error>> + Send + '_;
}
