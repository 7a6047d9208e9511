//! Provenance events and the hash-chain verifier.
//!
//! Every transformation a traced object (document or concept) undergoes is
//! recorded as one append-only event. Events optionally carry a hash of the
//! artifact they produced (`vector_hash`) and the hash they claim to follow
//! (`parent_hash`). Recording never judges linkage; the verifier does that
//! after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Event type ──────────────────────────────────────────────────────────────

/// The known pipeline steps. Validated as a closed set at the boundary so a
/// typo cannot silently fragment an audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
  Ingested,
  TextExtracted,
  OntologyExtracted,
  SummariesGenerated,
  EmbeddingsGenerated,
}

impl EventType {
  /// The discriminant string stored in the `event_type` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Ingested => "ingested",
      Self::TextExtracted => "text_extracted",
      Self::OntologyExtracted => "ontology_extracted",
      Self::SummariesGenerated => "summaries_generated",
      Self::EmbeddingsGenerated => "embeddings_generated",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "ingested" => Ok(Self::Ingested),
      "text_extracted" => Ok(Self::TextExtracted),
      "ontology_extracted" => Ok(Self::OntologyExtracted),
      "summaries_generated" => Ok(Self::SummariesGenerated),
      "embeddings_generated" => Ok(Self::EmbeddingsGenerated),
      other => Err(Error::UnknownEventType(other.to_owned())),
    }
  }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// One recorded step in a traced object's transformation history.
/// Created once, never mutated; `verified` is a cache the verifier refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceEvent {
  /// Monotonically increasing, store-assigned.
  pub event_id:           i64,
  /// The traced object: a doc_id or a concept_id.
  pub object_id:          Uuid,
  pub event_type:         EventType,
  /// Server-assigned; creation order matches id order.
  pub timestamp:          DateTime<Utc>,
  /// Identity of the process or model that produced the event.
  pub actor:              Option<String>,
  /// Content checksum of the object at this pipeline step.
  pub checksum:           Option<String>,
  /// Quality score in [0, 1], when the producing step measures one.
  pub semantic_integrity: Option<f64>,
  /// Hash of this event's resulting artifact; the link target for the next
  /// event in the chain.
  pub vector_hash:        Option<String>,
  /// Hash this event claims to follow. `None` means the event does not
  /// participate in hash linkage.
  pub parent_hash:        Option<String>,
  /// Cached verifier verdict; always re-derivable from the chain.
  pub verified:           bool,
}

/// Input to [`crate::store::OntologyStore::append_event`].
/// The id and timestamp are always set by the store.
#[derive(Debug, Clone)]
pub struct NewEvent {
  pub object_id:          Uuid,
  pub event_type:         EventType,
  pub actor:              Option<String>,
  pub checksum:           Option<String>,
  pub semantic_integrity: Option<f64>,
  pub vector_hash:        Option<String>,
  pub parent_hash:        Option<String>,
}

impl NewEvent {
  /// Convenience constructor with all optional fields unset.
  pub fn new(object_id: Uuid, event_type: EventType) -> Self {
    Self {
      object_id,
      event_type,
      actor: None,
      checksum: None,
      semantic_integrity: None,
      vector_hash: None,
      parent_hash: None,
    }
  }
}

// ─── Chain verification ──────────────────────────────────────────────────────

/// The verifier's integrity report for one object's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainReport {
  /// True iff `broken_links` is empty.
  pub chain_valid:     bool,
  pub total_events:    usize,
  pub verified_events: usize,
  /// Event ids whose claimed parent hash failed to match.
  pub broken_links:    Vec<i64>,
  /// `verified_events / total_events`; 0.0 for an empty (vacuously valid)
  /// log.
  pub integrity_score: f64,
}

/// Verify the hash linkage of `events`, which must be in creation order.
///
/// An event is verified if its `parent_hash` is null (it does not participate
/// in linkage — not every pipeline step produces a vector hash) or matches
/// the predecessor's `vector_hash`. The first event may only carry a null
/// `parent_hash`: ancestry before the chain start cannot be checked, so a
/// claimed parent there is flagged broken, and processing continues so later
/// links are still judged independently.
///
/// Inconsistency is the expected output, never an error.
pub fn verify_chain(events: &[ProvenanceEvent]) -> ChainReport {
  if events.is_empty() {
    return ChainReport {
      chain_valid:     true,
      total_events:    0,
      verified_events: 0,
      broken_links:    Vec::new(),
      integrity_score: 0.0,
    };
  }

  let mut verified_events = 0;
  let mut broken_links = Vec::new();

  for (i, event) in events.iter().enumerate() {
    let linked = match event.parent_hash.as_deref() {
      None => true,
      Some(_) if i == 0 => false,
      Some(claimed) => events[i - 1].vector_hash.as_deref() == Some(claimed),
    };
    if linked {
      verified_events += 1;
    } else {
      broken_links.push(event.event_id);
    }
  }

  ChainReport {
    chain_valid: broken_links.is_empty(),
    total_events: events.len(),
    verified_events,
    integrity_score: verified_events as f64 / events.len() as f64,
    broken_links,
  }
}

// ─── Status & summary ────────────────────────────────────────────────────────

/// Coarse pipeline completeness for a document, derived from which event
/// types its log covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceStatus {
  /// All required pipeline steps are recorded.
  Verified,
  /// Some events exist but required steps are missing.
  Partial,
  /// No provenance data at all.
  None,
}

/// The steps a fully processed document must have recorded.
const REQUIRED_EVENTS: [EventType; 3] = [
  EventType::Ingested,
  EventType::OntologyExtracted,
  EventType::SummariesGenerated,
];

pub fn provenance_status(events: &[ProvenanceEvent]) -> ProvenanceStatus {
  if events.is_empty() {
    return ProvenanceStatus::None;
  }
  let covered = REQUIRED_EVENTS
    .iter()
    .all(|required| events.iter().any(|e| e.event_type == *required));
  if covered {
    ProvenanceStatus::Verified
  } else {
    ProvenanceStatus::Partial
  }
}

/// Aggregate view over one object's log, for audit dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceSummary {
  pub event_count:    usize,
  pub actor_count:    usize,
  /// Mean `semantic_integrity` over the events that carry one.
  pub avg_integrity:  Option<f64>,
  pub first_event:    Option<DateTime<Utc>>,
  pub last_event:     Option<DateTime<Utc>>,
  pub event_types:    Vec<EventType>,
}

pub fn summarize(events: &[ProvenanceEvent]) -> ProvenanceSummary {
  let mut actors: Vec<&str> = events
    .iter()
    .filter_map(|e| e.actor.as_deref())
    .collect();
  actors.sort_unstable();
  actors.dedup();

  let scores: Vec<f64> =
    events.iter().filter_map(|e| e.semantic_integrity).collect();
  let avg_integrity = if scores.is_empty() {
    None
  } else {
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
  };

  let mut event_types: Vec<EventType> =
    events.iter().map(|e| e.event_type).collect();
  event_types.sort_by_key(|t| t.as_str());
  event_types.dedup();

  ProvenanceSummary {
    event_count: events.len(),
    actor_count: actors.len(),
    avg_integrity,
    first_event: events.iter().map(|e| e.timestamp).min(),
    last_event: events.iter().map(|e| e.timestamp).max(),
    event_types,
  }
}
