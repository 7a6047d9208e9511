//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Alias lists are stored as
//! compact JSON. UUIDs are stored as hyphenated lowercase strings. Hierarchy
//! levels are stored as their integer encoding.

use chrono::{DateTime, Utc};
use loom_core::{
  document::Document,
  ontology::{Concept, HierarchyLevel, Mention, Relation, Span, Tag},
  provenance::{EventType, ProvenanceEvent},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_aliases(aliases: &[String]) -> Result<String> {
  Ok(serde_json::to_string(aliases)?)
}

pub fn decode_aliases(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_level(level: Option<HierarchyLevel>) -> Option<i64> {
  level.map(HierarchyLevel::as_i64)
}

pub fn decode_level(v: Option<i64>) -> Result<Option<HierarchyLevel>> {
  match v {
    None => Ok(None),
    Some(raw) => HierarchyLevel::from_i64(raw).map(Some).ok_or_else(|| {
      Error::CorruptColumn {
        column: "concepts.hierarchy_level",
        value:  raw.to_string(),
      }
    }),
  }
}

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `documents` row.
pub struct RawDocument {
  pub doc_id:     String,
  pub title:      String,
  pub source_uri: Option<String>,
  pub checksum:   String,
  pub bytes:      i64,
  pub text:       String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawDocument {
  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      doc_id:     decode_uuid(&self.doc_id)?,
      title:      self.title,
      source_uri: self.source_uri,
      checksum:   self.checksum,
      bytes:      self.bytes as u64,
      text:       self.text,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `spans` row.
pub struct RawSpan {
  pub span_id:      String,
  pub doc_id:       String,
  pub start_offset: i64,
  pub end_offset:   i64,
  pub text:         String,
  pub extractor:    Option<String>,
  pub quality:      Option<f64>,
}

impl RawSpan {
  pub fn into_span(self) -> Result<Span> {
    Ok(Span {
      span_id:   decode_uuid(&self.span_id)?,
      doc_id:    decode_uuid(&self.doc_id)?,
      start:     self.start_offset as usize,
      end:       self.end_offset as usize,
      text:      self.text,
      extractor: self.extractor,
      quality:   self.quality,
    })
  }
}

/// Raw strings read directly from a `concepts` row.
pub struct RawConcept {
  pub concept_id:        String,
  pub doc_id:            String,
  pub label:             String,
  pub kind:              String,
  pub confidence:        f64,
  pub aliases:           String,
  pub summary:           Option<String>,
  pub hierarchy_level:   Option<i64>,
  pub parent_cluster_id: Option<String>,
  pub parent_concept_id: Option<String>,
  pub coherence:         Option<f64>,
}

impl RawConcept {
  pub fn into_concept(self) -> Result<Concept> {
    Ok(Concept {
      concept_id:        decode_uuid(&self.concept_id)?,
      doc_id:            decode_uuid(&self.doc_id)?,
      label:             self.label,
      kind:              self.kind,
      confidence:        self.confidence,
      aliases:           decode_aliases(&self.aliases)?,
      summary:           self.summary,
      hierarchy_level:   decode_level(self.hierarchy_level)?,
      parent_cluster_id: decode_opt_uuid(self.parent_cluster_id)?,
      parent_concept_id: decode_opt_uuid(self.parent_concept_id)?,
      coherence:         self.coherence,
    })
  }
}

/// Raw strings read directly from a `relations` row.
pub struct RawRelation {
  pub relation_id: String,
  pub doc_id:      String,
  pub src:         String,
  pub rel:         String,
  pub dst:         String,
  pub confidence:  f64,
}

impl RawRelation {
  pub fn into_relation(self) -> Result<Relation> {
    Ok(Relation {
      relation_id: decode_uuid(&self.relation_id)?,
      doc_id:      decode_uuid(&self.doc_id)?,
      src:         decode_uuid(&self.src)?,
      rel:         self.rel,
      dst:         decode_uuid(&self.dst)?,
      confidence:  self.confidence,
    })
  }
}

/// Raw strings read directly from a `mentions` row.
pub struct RawMention {
  pub mention_id: String,
  pub concept_id: String,
  pub doc_id:     String,
  pub span_id:    String,
}

impl RawMention {
  pub fn into_mention(self) -> Result<Mention> {
    Ok(Mention {
      mention_id: decode_uuid(&self.mention_id)?,
      concept_id: decode_uuid(&self.concept_id)?,
      doc_id:     decode_uuid(&self.doc_id)?,
      span_id:    decode_uuid(&self.span_id)?,
    })
  }
}

/// Raw strings read directly from a `tags` row.
pub struct RawTag {
  pub tag_id:     String,
  pub doc_id:     Option<String>,
  pub category:   String,
  pub value:      String,
  pub confidence: f64,
}

impl RawTag {
  pub fn into_tag(self) -> Result<Tag> {
    Ok(Tag {
      tag_id:     decode_uuid(&self.tag_id)?,
      doc_id:     decode_opt_uuid(self.doc_id)?,
      category:   self.category,
      value:      self.value,
      confidence: self.confidence,
    })
  }
}

/// Raw strings read directly from a `provenance_events` row.
pub struct RawEvent {
  pub id:                 i64,
  pub object_id:          String,
  pub event_type:         String,
  pub timestamp:          String,
  pub actor:              Option<String>,
  pub checksum:           Option<String>,
  pub semantic_integrity: Option<f64>,
  pub vector_hash:        Option<String>,
  pub parent_hash:        Option<String>,
  pub verified:           bool,
}

impl RawEvent {
  pub fn into_event(self) -> Result<ProvenanceEvent> {
    Ok(ProvenanceEvent {
      event_id:           self.id,
      object_id:          decode_uuid(&self.object_id)?,
      event_type:         EventType::parse(&self.event_type)
        .map_err(Error::Core)?,
      timestamp:          decode_dt(&self.timestamp)?,
      actor:              self.actor,
      checksum:           self.checksum,
      semantic_integrity: self.semantic_integrity,
      vector_hash:        self.vector_hash,
      parent_hash:        self.parent_hash,
      verified:           self.verified,
    })
  }
}
