//! Error types for `loom-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::ontology::HierarchyLevel;

/// An invariant violation detected while validating a write.
///
/// Every variant names the offending entity and the rule it broke. A batch
/// commit that produces one of these is rejected in full; nothing is written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
  #[error(
    "span {span_id}: offsets {start}..{end} out of range for document of \
     {doc_len} characters"
  )]
  SpanOutOfBounds {
    span_id: Uuid,
    start:   usize,
    end:     usize,
    doc_len: usize,
  },

  #[error("span {span_id}: text does not match document slice {start}..{end}")]
  SpanTextMismatch {
    span_id: Uuid,
    start:   usize,
    end:     usize,
  },

  #[error("{entity} {id}: {field} {value} outside [0.0, 1.0]")]
  ConfidenceOutOfRange {
    entity: &'static str,
    id:     Uuid,
    field:  &'static str,
    value:  f64,
  },

  #[error("provenance event for {object_id}: semantic_integrity {value} outside [0.0, 1.0]")]
  EventIntegrityOutOfRange { object_id: Uuid, value: f64 },

  #[error("{entity} {id}: doc_id {found} does not match batch document {expected}")]
  ForeignDocument {
    entity:   &'static str,
    id:       Uuid,
    found:    Uuid,
    expected: Uuid,
  },

  #[error("{entity} {id}: duplicate id")]
  DuplicateId { entity: &'static str, id: Uuid },

  #[error("relation {relation_id}: {role} concept {concept_id} does not exist in document")]
  DanglingRelationEndpoint {
    relation_id: Uuid,
    role:        &'static str,
    concept_id:  Uuid,
  },

  #[error("mention {mention_id}: concept {concept_id} does not exist in document")]
  DanglingMentionConcept {
    mention_id: Uuid,
    concept_id: Uuid,
  },

  #[error("mention {mention_id}: span {span_id} does not exist in document")]
  DanglingMentionSpan { mention_id: Uuid, span_id: Uuid },

  #[error("mention {mention_id}: span, concept, and mention doc_ids disagree")]
  MentionTriangle { mention_id: Uuid },

  #[error("concept {concept_id}: parent {parent_id} does not exist in document")]
  DanglingParent { concept_id: Uuid, parent_id: Uuid },

  #[error(
    "concept {concept_id}: parent {parent_id} has hierarchy level {found:?}, \
     expected {expected:?}"
  )]
  BadParentLevel {
    concept_id: Uuid,
    parent_id:  Uuid,
    expected:   HierarchyLevel,
    found:      Option<HierarchyLevel>,
  },

  #[error("concept {concept_id}: hierarchy level {level:?} incompatible with its parent pointers")]
  BadChildLevel {
    concept_id: Uuid,
    level:      Option<HierarchyLevel>,
  },

  #[error("concept {concept_id}: parent pointers form a cycle")]
  HierarchyCycle { concept_id: Uuid },
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("document not found: {0}")]
  DocumentNotFound(Uuid),

  #[error("concept not found: {0}")]
  ConceptNotFound(Uuid),

  #[error("span not found: {0}")]
  SpanNotFound(Uuid),

  #[error("a document with checksum {0} already exists")]
  DuplicateChecksum(String),

  #[error("unknown provenance event type: {0:?}")]
  UnknownEventType(String),

  /// A concurrent batch write touched the same document. Retryable; the
  /// losing batch was not applied at all.
  #[error("write conflict on document {0}; retry the whole batch")]
  Conflict(Uuid),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
