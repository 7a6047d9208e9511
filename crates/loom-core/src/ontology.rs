//! Ontology entity types — the semantic graph extracted from a document.
//!
//! All entities here are written through the store's atomic batch commit and
//! are immutable afterwards. Ids are minted by the extraction collaborator so
//! that relations and mentions inside one batch can reference sibling
//! entries.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Hierarchy level ─────────────────────────────────────────────────────────

/// Position of a concept in the four-level navigation hierarchy.
///
/// The integer encoding (0..=3) is what the hierarchy columns store and what
/// external extraction pipelines emit.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
  Document,
  Cluster,
  Refinement,
  Concept,
}

impl HierarchyLevel {
  pub fn as_i64(self) -> i64 {
    match self {
      Self::Document => 0,
      Self::Cluster => 1,
      Self::Refinement => 2,
      Self::Concept => 3,
    }
  }

  pub fn from_i64(v: i64) -> Option<Self> {
    match v {
      0 => Some(Self::Document),
      1 => Some(Self::Cluster),
      2 => Some(Self::Refinement),
      3 => Some(Self::Concept),
      _ => None,
    }
  }
}

// ─── Span ────────────────────────────────────────────────────────────────────

/// A character-accurate evidence excerpt from a document's text.
///
/// Offsets are **character** offsets with `0 <= start < end <= doc length`,
/// and `text` must equal the document text sliced at `[start, end)`.
/// Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
  pub span_id:   Uuid,
  pub doc_id:    Uuid,
  pub start:     usize,
  pub end:       usize,
  pub text:      String,
  /// Name of the extraction pass that produced this span.
  pub extractor: Option<String>,
  /// Extraction quality score in [0, 1].
  pub quality:   Option<f64>,
}

// ─── Concept ─────────────────────────────────────────────────────────────────

/// A typed node in the semantic graph.
///
/// The hierarchy fields are optional: legacy extractions carry none, and the
/// hierarchy builder degrades to grouping by `kind` in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
  pub concept_id: Uuid,
  pub doc_id:     Uuid,
  pub label:      String,
  /// Free-form type tag, e.g. "Metric", "Project", "Topic". Domain content,
  /// deliberately not a closed enum.
  #[serde(rename = "type")]
  pub kind:       String,
  /// Extraction confidence in [0, 1].
  pub confidence: f64,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub aliases:    Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub summary:    Option<String>,

  // ── Hierarchy extension ─────────────────────────────────────────────────
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hierarchy_level:   Option<HierarchyLevel>,
  /// Must reference a level-1 (cluster) concept in the same document.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parent_cluster_id: Option<Uuid>,
  /// Must reference a level-2 (refinement) concept in the same document.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parent_concept_id: Option<Uuid>,
  /// Mean confidence of intra-cluster relations; set on cluster nodes.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub coherence:         Option<f64>,
}

impl Concept {
  /// Convenience constructor for a flat (non-hierarchical) concept.
  pub fn new(doc_id: Uuid, label: impl Into<String>, kind: impl Into<String>) -> Self {
    Self {
      concept_id: Uuid::new_v4(),
      doc_id,
      label: label.into(),
      kind: kind.into(),
      confidence: 1.0,
      aliases: Vec::new(),
      summary: None,
      hierarchy_level: None,
      parent_cluster_id: None,
      parent_concept_id: None,
      coherence: None,
    }
  }

  /// True if this concept carries any hierarchy metadata at all.
  pub fn has_hierarchy_metadata(&self) -> bool {
    self.hierarchy_level.is_some()
      || self.parent_cluster_id.is_some()
      || self.parent_concept_id.is_some()
  }
}

// ─── Relation ────────────────────────────────────────────────────────────────

/// A directed, verb-labelled edge between two concepts of the same document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
  pub relation_id: Uuid,
  pub doc_id:      Uuid,
  pub src:         Uuid,
  /// Free-form relation verb, e.g. "defines", "depends_on", "measures".
  pub rel:         String,
  pub dst:         Uuid,
  pub confidence:  f64,
}

// ─── Mention ─────────────────────────────────────────────────────────────────

/// Links a concept to the span that evidences it.
///
/// Triangle consistency: the span's doc_id, the concept's doc_id, and the
/// mention's own doc_id must all agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
  pub mention_id: Uuid,
  pub concept_id: Uuid,
  pub doc_id:     Uuid,
  pub span_id:    Uuid,
}

// ─── Tag ─────────────────────────────────────────────────────────────────────

/// A filtering label; not part of the graph proper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
  pub tag_id:     Uuid,
  /// `None` marks a global tag, visible from every document.
  pub doc_id:     Option<Uuid>,
  pub category:   String,
  pub value:      String,
  pub confidence: f64,
}

// ─── Extraction batch ────────────────────────────────────────────────────────

/// Input to [`crate::store::OntologyStore::commit_extraction`]: the full
/// output of one extraction run over one document. Commits entirely or not at
/// all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionBatch {
  pub doc_id:    Uuid,
  #[serde(default)]
  pub spans:     Vec<Span>,
  #[serde(default)]
  pub concepts:  Vec<Concept>,
  #[serde(default)]
  pub relations: Vec<Relation>,
  #[serde(default)]
  pub mentions:  Vec<Mention>,
  #[serde(default)]
  pub tags:      Vec<Tag>,
}

impl ExtractionBatch {
  pub fn new(doc_id: Uuid) -> Self {
    Self { doc_id, ..Default::default() }
  }

  pub fn is_empty(&self) -> bool {
    self.spans.is_empty()
      && self.concepts.is_empty()
      && self.relations.is_empty()
      && self.mentions.is_empty()
      && self.tags.is_empty()
  }
}
