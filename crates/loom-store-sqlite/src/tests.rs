//! Integration tests for `SqliteStore` against an in-memory database.

use loom_core::{
  document::{Document, NewDocument},
  ontology::{
    Concept, ExtractionBatch, HierarchyLevel, Mention, Relation, Span, Tag,
  },
  provenance::{EventType, NewEvent, ProvenanceStatus},
  store::{OntologyStore, ProvenanceRetention},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_doc(title: &str, text: &str) -> NewDocument {
  NewDocument {
    title:      title.into(),
    source_uri: None,
    text:       text.into(),
  }
}

/// A span sliced out of the document's text by character offsets, so bounds
/// and text checks hold by construction.
fn span_of(doc: &Document, start: usize, end: usize) -> Span {
  Span {
    span_id:   Uuid::new_v4(),
    doc_id:    doc.doc_id,
    start,
    end,
    text:      doc.text.chars().skip(start).take(end - start).collect(),
    extractor: Some("test-extractor".into()),
    quality:   Some(0.9),
  }
}

fn is_core(err: &Error, check: impl Fn(&loom_core::Error) -> bool) -> bool {
  matches!(err, Error::Core(inner) if check(inner))
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_document() {
  let s = store().await;

  let doc = s
    .create_document(new_doc("Q3 Report", "Revenue grew 20% in Q3."))
    .await
    .unwrap();
  assert_eq!(doc.bytes, "Revenue grew 20% in Q3.".len() as u64);
  assert_eq!(doc.checksum.len(), 64);

  let fetched = s.get_document(doc.doc_id).await.unwrap();
  assert_eq!(fetched.doc_id, doc.doc_id);
  assert_eq!(fetched.title, "Q3 Report");
  assert_eq!(fetched.checksum, doc.checksum);
  assert_eq!(fetched.text, doc.text);
}

#[tokio::test]
async fn get_missing_document_is_an_error() {
  let s = store().await;
  let err = s.get_document(Uuid::new_v4()).await.unwrap_err();
  assert!(is_core(&err, |e| {
    matches!(e, loom_core::Error::DocumentNotFound(_))
  }));
}

#[tokio::test]
async fn duplicate_checksum_is_rejected() {
  let s = store().await;
  s.create_document(new_doc("First", "same body")).await.unwrap();

  let err = s
    .create_document(new_doc("Second, different title", "same body"))
    .await
    .unwrap_err();
  assert!(is_core(&err, |e| {
    matches!(e, loom_core::Error::DuplicateChecksum(_))
  }));

  assert_eq!(s.list_documents().await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_documents_newest_first() {
  let s = store().await;
  s.create_document(new_doc("older", "a")).await.unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  s.create_document(new_doc("newer", "b")).await.unwrap();

  let docs = s.list_documents().await.unwrap();
  assert_eq!(docs.len(), 2);
  assert_eq!(docs[0].title, "newer");
  assert_eq!(docs[1].title, "older");
}

// ─── Batch commit ────────────────────────────────────────────────────────────

#[tokio::test]
async fn commit_full_batch_and_read_back() {
  let s = store().await;
  let doc = s
    .create_document(new_doc("Q3 Report", "Revenue grew 20% in Q3."))
    .await
    .unwrap();

  let span = span_of(&doc, 0, 7); // "Revenue"
  let mut revenue = Concept::new(doc.doc_id, "Revenue", "Metric");
  revenue.confidence = 0.95;
  revenue.aliases = vec!["turnover".into()];
  let growth = Concept::new(doc.doc_id, "Growth", "Topic");

  let mut batch = ExtractionBatch::new(doc.doc_id);
  batch.spans.push(span.clone());
  batch.relations.push(Relation {
    relation_id: Uuid::new_v4(),
    doc_id:      doc.doc_id,
    src:         revenue.concept_id,
    rel:         "exhibits".into(),
    dst:         growth.concept_id,
    confidence:  0.8,
  });
  batch.mentions.push(Mention {
    mention_id: Uuid::new_v4(),
    concept_id: revenue.concept_id,
    doc_id:     doc.doc_id,
    span_id:    span.span_id,
  });
  batch.tags.push(Tag {
    tag_id:     Uuid::new_v4(),
    doc_id:     Some(doc.doc_id),
    category:   "department".into(),
    value:      "finance".into(),
    confidence: 1.0,
  });
  batch.concepts.extend([revenue.clone(), growth]);

  s.commit_extraction(batch).await.unwrap();

  let concepts = s.concepts_for_document(doc.doc_id).await.unwrap();
  assert_eq!(concepts.len(), 2);
  // Flat concepts sort by label.
  assert_eq!(concepts[0].label, "Growth");
  assert_eq!(concepts[1].label, "Revenue");
  assert_eq!(concepts[1].aliases, vec!["turnover".to_owned()]);

  let spans = s.spans_for_document(doc.doc_id).await.unwrap();
  assert_eq!(spans.len(), 1);
  assert_eq!(spans[0].text, "Revenue");

  let relations = s.relations_for_document(doc.doc_id).await.unwrap();
  assert_eq!(relations.len(), 1);
  assert_eq!(relations[0].rel, "exhibits");

  let mentions = s.mentions_for_concept(revenue.concept_id).await.unwrap();
  assert_eq!(mentions.len(), 1);
  assert_eq!(mentions[0].span_id, span.span_id);

  let fetched = s.get_span(span.span_id).await.unwrap();
  assert_eq!(fetched.start, 0);
  assert_eq!(fetched.end, 7);
}

#[tokio::test]
async fn invalid_batch_leaves_store_unchanged() {
  let s = store().await;
  let doc = s
    .create_document(new_doc("doc", "Revenue grew 20% in Q3."))
    .await
    .unwrap();

  let mut bad_span = span_of(&doc, 0, 7);
  bad_span.text = "Profits".into(); // does not match the slice

  let mut batch = ExtractionBatch::new(doc.doc_id);
  batch.concepts.push(Concept::new(doc.doc_id, "Revenue", "Metric"));
  batch.spans.push(bad_span);

  let err = s.commit_extraction(batch).await.unwrap_err();
  assert!(is_core(&err, |e| {
    matches!(
      e,
      loom_core::Error::Validation(
        loom_core::ValidationError::SpanTextMismatch { .. }
      )
    )
  }));

  // Nothing from the batch landed, valid concept included.
  assert!(s.concepts_for_document(doc.doc_id).await.unwrap().is_empty());
  assert!(s.spans_for_document(doc.doc_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn out_of_range_confidence_is_rejected() {
  let s = store().await;
  let doc = s.create_document(new_doc("doc", "text")).await.unwrap();

  let mut concept = Concept::new(doc.doc_id, "Thing", "Topic");
  concept.confidence = 1.2;
  let mut batch = ExtractionBatch::new(doc.doc_id);
  batch.concepts.push(concept);

  let err = s.commit_extraction(batch).await.unwrap_err();
  assert!(is_core(&err, |e| {
    matches!(
      e,
      loom_core::Error::Validation(
        loom_core::ValidationError::ConfidenceOutOfRange { .. }
      )
    )
  }));
}

#[tokio::test]
async fn commit_for_unknown_document_is_an_error() {
  let s = store().await;
  let batch = ExtractionBatch::new(Uuid::new_v4());
  let err = s.commit_extraction(batch).await.unwrap_err();
  assert!(is_core(&err, |e| {
    matches!(e, loom_core::Error::DocumentNotFound(_))
  }));
}

#[tokio::test]
async fn second_batch_may_reference_earlier_concepts() {
  let s = store().await;
  let doc = s.create_document(new_doc("doc", "some text")).await.unwrap();

  let first = Concept::new(doc.doc_id, "Alpha", "Topic");
  let mut batch = ExtractionBatch::new(doc.doc_id);
  batch.concepts.push(first.clone());
  s.commit_extraction(batch).await.unwrap();

  // A relation in a later batch may point at a stored concept.
  let second = Concept::new(doc.doc_id, "Beta", "Topic");
  let mut batch = ExtractionBatch::new(doc.doc_id);
  batch.relations.push(Relation {
    relation_id: Uuid::new_v4(),
    doc_id:      doc.doc_id,
    src:         second.concept_id,
    rel:         "refines".into(),
    dst:         first.concept_id,
    confidence:  0.7,
  });
  batch.concepts.push(second);
  s.commit_extraction(batch).await.unwrap();

  assert_eq!(s.concepts_for_document(doc.doc_id).await.unwrap().len(), 2);
  assert_eq!(s.relations_for_document(doc.doc_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concepts_read_back_hierarchy_ordered() {
  let s = store().await;
  let doc = s.create_document(new_doc("doc", "body")).await.unwrap();

  let mut cluster = Concept::new(doc.doc_id, "Finance", "Cluster");
  cluster.hierarchy_level = Some(HierarchyLevel::Cluster);
  cluster.coherence = Some(0.8);
  let mut leaf = Concept::new(doc.doc_id, "Revenue", "Metric");
  leaf.hierarchy_level = Some(HierarchyLevel::Concept);
  leaf.parent_cluster_id = Some(cluster.concept_id);
  let flat = Concept::new(doc.doc_id, "Aside", "Topic");

  let mut batch = ExtractionBatch::new(doc.doc_id);
  batch.concepts.extend([leaf, flat, cluster]);
  s.commit_extraction(batch).await.unwrap();

  let concepts = s.concepts_for_document(doc.doc_id).await.unwrap();
  let labels: Vec<_> = concepts.iter().map(|c| c.label.as_str()).collect();
  // Levelled rows first in level order; unlevelled rows trail.
  assert_eq!(labels, vec!["Finance", "Revenue", "Aside"]);
  assert_eq!(concepts[0].coherence, Some(0.8));
}

// ─── Tags ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn tags_include_global_rows() {
  let s = store().await;
  let doc_a = s.create_document(new_doc("a", "text a")).await.unwrap();
  let doc_b = s.create_document(new_doc("b", "text b")).await.unwrap();

  let mut batch = ExtractionBatch::new(doc_a.doc_id);
  batch.tags.push(Tag {
    tag_id:     Uuid::new_v4(),
    doc_id:     Some(doc_a.doc_id),
    category:   "department".into(),
    value:      "finance".into(),
    confidence: 1.0,
  });
  batch.tags.push(Tag {
    tag_id:     Uuid::new_v4(),
    doc_id:     None,
    category:   "corpus".into(),
    value:      "reports".into(),
    confidence: 1.0,
  });
  s.commit_extraction(batch).await.unwrap();

  assert_eq!(s.tags_for_document(doc_a.doc_id).await.unwrap().len(), 2);
  // The global tag is visible from the other document too.
  let b_tags = s.tags_for_document(doc_b.doc_id).await.unwrap();
  assert_eq!(b_tags.len(), 1);
  assert_eq!(b_tags[0].category, "corpus");
}

// ─── Deletion ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_document_cascades_ontology_rows() {
  let s = store().await;
  let doc = s
    .create_document(new_doc("doc", "Revenue grew 20% in Q3."))
    .await
    .unwrap();

  let span = span_of(&doc, 0, 7);
  let concept = Concept::new(doc.doc_id, "Revenue", "Metric");
  let mut batch = ExtractionBatch::new(doc.doc_id);
  batch.mentions.push(Mention {
    mention_id: Uuid::new_v4(),
    concept_id: concept.concept_id,
    doc_id:     doc.doc_id,
    span_id:    span.span_id,
  });
  batch.spans.push(span.clone());
  batch.concepts.push(concept.clone());
  s.commit_extraction(batch).await.unwrap();

  s.delete_document(doc.doc_id).await.unwrap();

  let err = s.get_document(doc.doc_id).await.unwrap_err();
  assert!(is_core(&err, |e| {
    matches!(e, loom_core::Error::DocumentNotFound(_))
  }));
  let err = s.get_concept(concept.concept_id).await.unwrap_err();
  assert!(is_core(&err, |e| {
    matches!(e, loom_core::Error::ConceptNotFound(_))
  }));
  let err = s.get_span(span.span_id).await.unwrap_err();
  assert!(is_core(&err, |e| matches!(e, loom_core::Error::SpanNotFound(_))));
}

#[tokio::test]
async fn delete_missing_document_is_an_error() {
  let s = store().await;
  let err = s.delete_document(Uuid::new_v4()).await.unwrap_err();
  assert!(is_core(&err, |e| {
    matches!(e, loom_core::Error::DocumentNotFound(_))
  }));
}

#[tokio::test]
async fn retain_policy_keeps_provenance_after_delete() {
  let s = store().await; // default policy: retain
  let doc = s.create_document(new_doc("doc", "body")).await.unwrap();
  s.append_event(NewEvent::new(doc.doc_id, EventType::Ingested))
    .await
    .unwrap();

  s.delete_document(doc.doc_id).await.unwrap();

  // The audit trail outlives the document.
  let events = s.events_for_object(doc.doc_id).await.unwrap();
  assert_eq!(events.len(), 1);
  assert_eq!(events[0].event_type, EventType::Ingested);
}

#[tokio::test]
async fn cascade_policy_drops_document_and_concept_events() {
  let s = SqliteStore::open_in_memory_with_retention(
    ProvenanceRetention::CascadeDelete,
  )
  .await
  .unwrap();

  let doc = s.create_document(new_doc("doc", "body")).await.unwrap();
  let concept = Concept::new(doc.doc_id, "Thing", "Topic");
  let mut batch = ExtractionBatch::new(doc.doc_id);
  batch.concepts.push(concept.clone());
  s.commit_extraction(batch).await.unwrap();

  s.append_event(NewEvent::new(doc.doc_id, EventType::Ingested))
    .await
    .unwrap();
  s.append_event(NewEvent::new(
    concept.concept_id,
    EventType::EmbeddingsGenerated,
  ))
  .await
  .unwrap();

  s.delete_document(doc.doc_id).await.unwrap();

  assert!(s.events_for_object(doc.doc_id).await.unwrap().is_empty());
  assert!(
    s.events_for_object(concept.concept_id)
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Provenance log ──────────────────────────────────────────────────────────

#[tokio::test]
async fn append_assigns_increasing_ids() {
  let s = store().await;
  let object = Uuid::new_v4();

  let first = s
    .append_event(NewEvent::new(object, EventType::Ingested))
    .await
    .unwrap();
  let second = s
    .append_event(NewEvent::new(object, EventType::TextExtracted))
    .await
    .unwrap();
  assert!(second.event_id > first.event_id);
  assert!(!first.verified);

  let events = s.events_for_object(object).await.unwrap();
  assert_eq!(events.len(), 2);
  assert_eq!(events[0].event_id, first.event_id);
  assert_eq!(events[1].event_id, second.event_id);
}

#[tokio::test]
async fn append_rejects_out_of_range_integrity() {
  let s = store().await;
  let mut input = NewEvent::new(Uuid::new_v4(), EventType::Ingested);
  input.semantic_integrity = Some(1.5);

  let err = s.append_event(input).await.unwrap_err();
  assert!(is_core(&err, |e| {
    matches!(
      e,
      loom_core::Error::Validation(
        loom_core::ValidationError::EventIntegrityOutOfRange { .. }
      )
    )
  }));
}

#[tokio::test]
async fn verify_chain_reports_and_caches_verdicts() {
  let s = store().await;
  let object = Uuid::new_v4();

  let mut e1 = NewEvent::new(object, EventType::Ingested);
  e1.vector_hash = Some("h1".into());
  s.append_event(e1).await.unwrap();

  let mut e2 = NewEvent::new(object, EventType::OntologyExtracted);
  e2.vector_hash = Some("h2".into());
  e2.parent_hash = Some("h1".into());
  s.append_event(e2).await.unwrap();

  let mut e3 = NewEvent::new(object, EventType::SummariesGenerated);
  e3.parent_hash = Some("FORGED".into());
  let broken = s.append_event(e3).await.unwrap();

  let report = s.verify_chain(object).await.unwrap();
  assert!(!report.chain_valid);
  assert_eq!(report.total_events, 3);
  assert_eq!(report.verified_events, 2);
  assert_eq!(report.broken_links, vec![broken.event_id]);
  assert!((report.integrity_score - 2.0 / 3.0).abs() < 1e-9);

  // The cached flags now reflect the verdict.
  let events = s.events_for_object(object).await.unwrap();
  assert!(events[0].verified);
  assert!(events[1].verified);
  assert!(!events[2].verified);

  // Re-running changes nothing.
  let again = s.verify_chain(object).await.unwrap();
  assert_eq!(again, report);
}

#[tokio::test]
async fn verify_chain_on_empty_log_is_vacuously_valid() {
  let s = store().await;
  let report = s.verify_chain(Uuid::new_v4()).await.unwrap();
  assert!(report.chain_valid);
  assert_eq!(report.total_events, 0);
  assert_eq!(report.integrity_score, 0.0);
}

#[tokio::test]
async fn status_and_summary_follow_the_log() {
  let s = store().await;
  let doc = s.create_document(new_doc("doc", "body")).await.unwrap();

  assert_eq!(
    s.provenance_status(doc.doc_id).await.unwrap(),
    ProvenanceStatus::None
  );

  let mut input = NewEvent::new(doc.doc_id, EventType::Ingested);
  input.actor = Some("ingest@v1".into());
  input.semantic_integrity = Some(0.9);
  s.append_event(input).await.unwrap();

  assert_eq!(
    s.provenance_status(doc.doc_id).await.unwrap(),
    ProvenanceStatus::Partial
  );

  s.append_event(NewEvent::new(doc.doc_id, EventType::OntologyExtracted))
    .await
    .unwrap();
  s.append_event(NewEvent::new(doc.doc_id, EventType::SummariesGenerated))
    .await
    .unwrap();

  assert_eq!(
    s.provenance_status(doc.doc_id).await.unwrap(),
    ProvenanceStatus::Verified
  );

  let summary = s.provenance_summary(doc.doc_id).await.unwrap();
  assert_eq!(summary.event_count, 3);
  assert_eq!(summary.actor_count, 1);
  assert!((summary.avg_integrity.unwrap() - 0.9).abs() < 1e-9);
  assert_eq!(summary.event_types.len(), 3);
}
