//! Batch validation — every invariant is checked before a single row is
//! written.
//!
//! The store calls [`validate_batch`] inside the commit path, with the
//! document and any previously stored concepts/spans for it. Validation never
//! coerces: the first violation fails the whole batch.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::{
  ValidationError,
  document::Document,
  ontology::{Concept, ExtractionBatch, HierarchyLevel, Span},
};

type ValidationResult = Result<(), ValidationError>;

/// Slice `text` by character offsets `[start, end)`.
///
/// Span offsets are character offsets, not byte offsets; extraction
/// collaborators count code points.
pub fn char_slice(text: &str, start: usize, end: usize) -> String {
  text.chars().skip(start).take(end - start).collect()
}

fn check_unit_interval(
  entity: &'static str,
  id: Uuid,
  field: &'static str,
  value: f64,
) -> ValidationResult {
  if (0.0..=1.0).contains(&value) && value.is_finite() {
    Ok(())
  } else {
    Err(ValidationError::ConfidenceOutOfRange { entity, id, field, value })
  }
}

/// Validate one extraction batch against the store's structural invariants.
///
/// `existing_concepts` and `existing_spans` are the rows already stored for
/// the document; relation endpoints, mention targets, and parent pointers may
/// resolve against them as well as against batch siblings.
pub fn validate_batch(
  doc: &Document,
  existing_concepts: &[Concept],
  existing_spans: &[Span],
  batch: &ExtractionBatch,
) -> ValidationResult {
  let doc_len = doc.text.chars().count();

  // ── Id uniqueness within the batch and against stored rows ──────────────
  let mut seen: HashSet<Uuid> = HashSet::new();
  for (entity, id) in batch
    .spans
    .iter()
    .map(|s| ("span", s.span_id))
    .chain(batch.concepts.iter().map(|c| ("concept", c.concept_id)))
    .chain(batch.relations.iter().map(|r| ("relation", r.relation_id)))
    .chain(batch.mentions.iter().map(|m| ("mention", m.mention_id)))
    .chain(batch.tags.iter().map(|t| ("tag", t.tag_id)))
  {
    if !seen.insert(id) {
      return Err(ValidationError::DuplicateId { entity, id });
    }
  }
  for c in existing_concepts {
    if seen.contains(&c.concept_id) {
      return Err(ValidationError::DuplicateId {
        entity: "concept",
        id:     c.concept_id,
      });
    }
  }
  for s in existing_spans {
    if seen.contains(&s.span_id) {
      return Err(ValidationError::DuplicateId { entity: "span", id: s.span_id });
    }
  }

  // ── Spans ───────────────────────────────────────────────────────────────
  for span in &batch.spans {
    if span.doc_id != doc.doc_id {
      return Err(ValidationError::ForeignDocument {
        entity:   "span",
        id:       span.span_id,
        found:    span.doc_id,
        expected: doc.doc_id,
      });
    }
    if span.start >= span.end || span.end > doc_len {
      return Err(ValidationError::SpanOutOfBounds {
        span_id: span.span_id,
        start:   span.start,
        end:     span.end,
        doc_len,
      });
    }
    if span.text != char_slice(&doc.text, span.start, span.end) {
      return Err(ValidationError::SpanTextMismatch {
        span_id: span.span_id,
        start:   span.start,
        end:     span.end,
      });
    }
    if let Some(q) = span.quality {
      check_unit_interval("span", span.span_id, "quality", q)?;
    }
  }

  // ── Concepts ────────────────────────────────────────────────────────────
  // Parent pointers resolve against batch siblings and stored concepts.
  let concept_index: HashMap<Uuid, &Concept> = batch
    .concepts
    .iter()
    .chain(existing_concepts.iter())
    .map(|c| (c.concept_id, c))
    .collect();

  for concept in &batch.concepts {
    if concept.doc_id != doc.doc_id {
      return Err(ValidationError::ForeignDocument {
        entity:   "concept",
        id:       concept.concept_id,
        found:    concept.doc_id,
        expected: doc.doc_id,
      });
    }
    check_unit_interval(
      "concept",
      concept.concept_id,
      "confidence",
      concept.confidence,
    )?;
    if let Some(coh) = concept.coherence {
      check_unit_interval("concept", concept.concept_id, "coherence", coh)?;
    }
    check_parent_pointers(concept, &concept_index)?;
  }
  check_acyclic(&concept_index, &batch.concepts)?;

  // ── Relations ───────────────────────────────────────────────────────────
  for relation in &batch.relations {
    if relation.doc_id != doc.doc_id {
      return Err(ValidationError::ForeignDocument {
        entity:   "relation",
        id:       relation.relation_id,
        found:    relation.doc_id,
        expected: doc.doc_id,
      });
    }
    check_unit_interval(
      "relation",
      relation.relation_id,
      "confidence",
      relation.confidence,
    )?;
    for (role, endpoint) in [("src", relation.src), ("dst", relation.dst)] {
      if !concept_index.contains_key(&endpoint) {
        return Err(ValidationError::DanglingRelationEndpoint {
          relation_id: relation.relation_id,
          role,
          concept_id: endpoint,
        });
      }
    }
  }

  // ── Mentions ────────────────────────────────────────────────────────────
  let span_docs: HashMap<Uuid, Uuid> = batch
    .spans
    .iter()
    .chain(existing_spans.iter())
    .map(|s| (s.span_id, s.doc_id))
    .collect();

  for mention in &batch.mentions {
    let Some(concept) = concept_index.get(&mention.concept_id) else {
      return Err(ValidationError::DanglingMentionConcept {
        mention_id: mention.mention_id,
        concept_id: mention.concept_id,
      });
    };
    let Some(span_doc) = span_docs.get(&mention.span_id) else {
      return Err(ValidationError::DanglingMentionSpan {
        mention_id: mention.mention_id,
        span_id:    mention.span_id,
      });
    };
    // Triangle consistency: span, concept, and mention agree on the doc.
    if mention.doc_id != doc.doc_id
      || concept.doc_id != mention.doc_id
      || *span_doc != mention.doc_id
    {
      return Err(ValidationError::MentionTriangle {
        mention_id: mention.mention_id,
      });
    }
  }

  // ── Tags ────────────────────────────────────────────────────────────────
  for tag in &batch.tags {
    if let Some(tag_doc) = tag.doc_id {
      if tag_doc != doc.doc_id {
        return Err(ValidationError::ForeignDocument {
          entity:   "tag",
          id:       tag.tag_id,
          found:    tag_doc,
          expected: doc.doc_id,
        });
      }
    }
    check_unit_interval("tag", tag.tag_id, "confidence", tag.confidence)?;
  }

  Ok(())
}

/// Parent pointers must resolve to the right level in the same document, and
/// the child's own level must be compatible with the pointers it carries.
fn check_parent_pointers(
  concept: &Concept,
  index: &HashMap<Uuid, &Concept>,
) -> ValidationResult {
  if let Some(cluster_id) = concept.parent_cluster_id {
    let Some(parent) = index.get(&cluster_id) else {
      return Err(ValidationError::DanglingParent {
        concept_id: concept.concept_id,
        parent_id:  cluster_id,
      });
    };
    if parent.hierarchy_level != Some(HierarchyLevel::Cluster) {
      return Err(ValidationError::BadParentLevel {
        concept_id: concept.concept_id,
        parent_id:  cluster_id,
        expected:   HierarchyLevel::Cluster,
        found:      parent.hierarchy_level,
      });
    }
    if !matches!(
      concept.hierarchy_level,
      Some(HierarchyLevel::Refinement) | Some(HierarchyLevel::Concept)
    ) {
      return Err(ValidationError::BadChildLevel {
        concept_id: concept.concept_id,
        level:      concept.hierarchy_level,
      });
    }
  }

  if let Some(refinement_id) = concept.parent_concept_id {
    let Some(parent) = index.get(&refinement_id) else {
      return Err(ValidationError::DanglingParent {
        concept_id: concept.concept_id,
        parent_id:  refinement_id,
      });
    };
    if parent.hierarchy_level != Some(HierarchyLevel::Refinement) {
      return Err(ValidationError::BadParentLevel {
        concept_id: concept.concept_id,
        parent_id:  refinement_id,
        expected:   HierarchyLevel::Refinement,
        found:      parent.hierarchy_level,
      });
    }
    if concept.hierarchy_level != Some(HierarchyLevel::Concept) {
      return Err(ValidationError::BadChildLevel {
        concept_id: concept.concept_id,
        level:      concept.hierarchy_level,
      });
    }
  }

  Ok(())
}

/// Walk each concept's parent chain with a visited set.
///
/// The level rules above already force levels to strictly decrease along
/// parent pointers, but pointer data is externally supplied; fail closed
/// rather than trusting that.
fn check_acyclic(
  index: &HashMap<Uuid, &Concept>,
  batch_concepts: &[Concept],
) -> ValidationResult {
  for concept in batch_concepts {
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut current = Some(concept.concept_id);
    while let Some(id) = current {
      if !visited.insert(id) {
        return Err(ValidationError::HierarchyCycle {
          concept_id: concept.concept_id,
        });
      }
      current = index
        .get(&id)
        .and_then(|c| c.parent_concept_id.or(c.parent_cluster_id));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{
    document::content_checksum,
    ontology::{Mention, Relation},
  };

  fn doc(text: &str) -> Document {
    let now = Utc::now();
    Document {
      doc_id:     Uuid::new_v4(),
      title:      "test".into(),
      source_uri: None,
      checksum:   content_checksum(text),
      bytes:      text.len() as u64,
      text:       text.to_owned(),
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn char_slice_counts_code_points() {
    assert_eq!(char_slice("naïve café", 6, 10), "café");
  }

  #[test]
  fn accepts_matching_span() {
    let d = doc("revenue grew 12% in Q3");
    let mut batch = ExtractionBatch::new(d.doc_id);
    batch.spans.push(Span {
      span_id:   Uuid::new_v4(),
      doc_id:    d.doc_id,
      start:     0,
      end:       7,
      text:      "revenue".into(),
      extractor: Some("regex@v1".into()),
      quality:   Some(0.9),
    });
    assert!(validate_batch(&d, &[], &[], &batch).is_ok());
  }

  #[test]
  fn rejects_span_past_document_end() {
    let d = doc("short");
    let mut batch = ExtractionBatch::new(d.doc_id);
    batch.spans.push(Span {
      span_id:   Uuid::new_v4(),
      doc_id:    d.doc_id,
      start:     0,
      end:       99,
      text:      "short".into(),
      extractor: None,
      quality:   None,
    });
    assert!(matches!(
      validate_batch(&d, &[], &[], &batch),
      Err(ValidationError::SpanOutOfBounds { .. })
    ));
  }

  #[test]
  fn rejects_span_text_mismatch() {
    let d = doc("revenue grew");
    let mut batch = ExtractionBatch::new(d.doc_id);
    batch.spans.push(Span {
      span_id:   Uuid::new_v4(),
      doc_id:    d.doc_id,
      start:     0,
      end:       7,
      text:      "REVENUE".into(),
      extractor: None,
      quality:   None,
    });
    assert!(matches!(
      validate_batch(&d, &[], &[], &batch),
      Err(ValidationError::SpanTextMismatch { .. })
    ));
  }

  #[test]
  fn rejects_confidence_out_of_range() {
    let d = doc("text");
    let mut batch = ExtractionBatch::new(d.doc_id);
    let mut c = Concept::new(d.doc_id, "Revenue", "Metric");
    c.confidence = 1.2;
    batch.concepts.push(c);
    assert!(matches!(
      validate_batch(&d, &[], &[], &batch),
      Err(ValidationError::ConfidenceOutOfRange { .. })
    ));
  }

  #[test]
  fn rejects_relation_with_dangling_dst() {
    let d = doc("text");
    let mut batch = ExtractionBatch::new(d.doc_id);
    let c = Concept::new(d.doc_id, "Revenue", "Metric");
    let src = c.concept_id;
    batch.concepts.push(c);
    batch.relations.push(Relation {
      relation_id: Uuid::new_v4(),
      doc_id:      d.doc_id,
      src,
      rel:         "measures".into(),
      dst:         Uuid::new_v4(),
      confidence:  0.8,
    });
    assert!(matches!(
      validate_batch(&d, &[], &[], &batch),
      Err(ValidationError::DanglingRelationEndpoint { role: "dst", .. })
    ));
  }

  #[test]
  fn rejects_mention_triangle_violation() {
    let d = doc("evidence text");
    let other_doc = Uuid::new_v4();
    let mut batch = ExtractionBatch::new(d.doc_id);
    let span = Span {
      span_id:   Uuid::new_v4(),
      doc_id:    d.doc_id,
      start:     0,
      end:       8,
      text:      "evidence".into(),
      extractor: None,
      quality:   None,
    };
    let concept = Concept::new(d.doc_id, "Evidence", "Topic");
    batch.mentions.push(Mention {
      mention_id: Uuid::new_v4(),
      concept_id: concept.concept_id,
      doc_id:     other_doc,
      span_id:    span.span_id,
    });
    batch.spans.push(span);
    batch.concepts.push(concept);
    assert!(matches!(
      validate_batch(&d, &[], &[], &batch),
      Err(ValidationError::MentionTriangle { .. })
    ));
  }

  #[test]
  fn rejects_parent_cluster_of_wrong_level() {
    let d = doc("text");
    let mut batch = ExtractionBatch::new(d.doc_id);
    let mut not_a_cluster = Concept::new(d.doc_id, "Leaf", "Topic");
    not_a_cluster.hierarchy_level = Some(HierarchyLevel::Concept);
    let mut child = Concept::new(d.doc_id, "Child", "Topic");
    child.hierarchy_level = Some(HierarchyLevel::Concept);
    child.parent_cluster_id = Some(not_a_cluster.concept_id);
    batch.concepts.push(not_a_cluster);
    batch.concepts.push(child);
    assert!(matches!(
      validate_batch(&d, &[], &[], &batch),
      Err(ValidationError::BadParentLevel { .. })
    ));
  }

  #[test]
  fn rejects_dangling_parent_cluster() {
    let d = doc("text");
    let mut batch = ExtractionBatch::new(d.doc_id);
    let mut child = Concept::new(d.doc_id, "Child", "Topic");
    child.hierarchy_level = Some(HierarchyLevel::Concept);
    child.parent_cluster_id = Some(Uuid::new_v4());
    batch.concepts.push(child);
    assert!(matches!(
      validate_batch(&d, &[], &[], &batch),
      Err(ValidationError::DanglingParent { .. })
    ));
  }

  #[test]
  fn accepts_well_formed_hierarchy() {
    let d = doc("text");
    let mut batch = ExtractionBatch::new(d.doc_id);

    let mut cluster = Concept::new(d.doc_id, "Finance", "Cluster");
    cluster.hierarchy_level = Some(HierarchyLevel::Cluster);
    cluster.coherence = Some(0.85);

    let mut refinement = Concept::new(d.doc_id, "Revenue", "Refinement");
    refinement.hierarchy_level = Some(HierarchyLevel::Refinement);
    refinement.parent_cluster_id = Some(cluster.concept_id);

    let mut leaf = Concept::new(d.doc_id, "Q3 revenue", "Metric");
    leaf.hierarchy_level = Some(HierarchyLevel::Concept);
    leaf.parent_cluster_id = Some(cluster.concept_id);
    leaf.parent_concept_id = Some(refinement.concept_id);

    batch.concepts.extend([cluster, refinement, leaf]);
    assert!(validate_batch(&d, &[], &[], &batch).is_ok());
  }
}
