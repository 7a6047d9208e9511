//! [`SqliteStore`] — the SQLite implementation of [`OntologyStore`].

use std::{
  collections::HashMap,
  path::Path,
  sync::{Arc, Mutex as StdMutex},
};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use loom_core::{
  document::{Document, NewDocument, content_checksum},
  ontology::{Concept, ExtractionBatch, Mention, Relation, Span, Tag},
  provenance::{
    ChainReport, NewEvent, ProvenanceEvent, ProvenanceStatus, ProvenanceSummary,
  },
  store::{OntologyStore, ProvenanceRetention},
  validate::validate_batch,
};

use crate::{
  Error, Result,
  encode::{
    RawConcept, RawDocument, RawEvent, RawMention, RawRelation, RawSpan,
    RawTag, encode_aliases, encode_dt, encode_level, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Loom ontology store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All database
/// work runs serialized on the connection's worker thread; on top of that,
/// batch commits and deletes take a per-document async lock so that
/// validation and insertion of one batch can never interleave with another
/// batch for the same document.
#[derive(Clone)]
pub struct SqliteStore {
  conn:      tokio_rusqlite::Connection,
  retention: ProvenanceRetention,
  doc_locks: Arc<StdMutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with the default provenance
  /// retention policy and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_retention(path, ProvenanceRetention::default()).await
  }

  /// Open (or create) a store at `path` with an explicit retention policy.
  pub async fn open_with_retention(
    path: impl AsRef<Path>,
    retention: ProvenanceRetention,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self::new(conn, retention);
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with_retention(ProvenanceRetention::default()).await
  }

  pub async fn open_in_memory_with_retention(
    retention: ProvenanceRetention,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self::new(conn, retention);
    store.init_schema().await?;
    Ok(store)
  }

  fn new(conn: tokio_rusqlite::Connection, retention: ProvenanceRetention) -> Self {
    Self {
      conn,
      retention,
      doc_locks: Arc::new(StdMutex::new(HashMap::new())),
    }
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The per-document write lock, created on first use.
  fn doc_lock(&self, doc_id: Uuid) -> Arc<AsyncMutex<()>> {
    let mut locks = self.doc_locks.lock().expect("doc_locks poisoned");
    locks.entry(doc_id).or_default().clone()
  }

  /// Fail with `DocumentNotFound` unless the document exists. Distinguishes
  /// "no data" from "wrong id" on the per-document read paths.
  async fn ensure_document(&self, doc_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(doc_id);
    let exists: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM documents WHERE doc_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    if exists {
      Ok(())
    } else {
      Err(Error::Core(loom_core::Error::DocumentNotFound(doc_id)))
    }
  }
}

/// Map SQLITE_BUSY on the batch-commit path to the retryable conflict error.
fn map_commit_err(err: tokio_rusqlite::Error, doc_id: Uuid) -> Error {
  if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
    ffi,
    _,
  )) = &err
  {
    if matches!(
      ffi.code,
      rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
    ) {
      return Error::Core(loom_core::Error::Conflict(doc_id));
    }
  }
  Error::Database(err)
}

const DOCUMENT_COLS: &str =
  "doc_id, title, source_uri, checksum, bytes, text, created_at, updated_at";

fn read_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDocument> {
  Ok(RawDocument {
    doc_id:     row.get(0)?,
    title:      row.get(1)?,
    source_uri: row.get(2)?,
    checksum:   row.get(3)?,
    bytes:      row.get(4)?,
    text:       row.get(5)?,
    created_at: row.get(6)?,
    updated_at: row.get(7)?,
  })
}

const EVENT_COLS: &str = "id, object_id, event_type, timestamp, actor, \
                          checksum, semantic_integrity, vector_hash, \
                          parent_hash, verified";

fn read_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEvent> {
  Ok(RawEvent {
    id:                 row.get(0)?,
    object_id:          row.get(1)?,
    event_type:         row.get(2)?,
    timestamp:          row.get(3)?,
    actor:              row.get(4)?,
    checksum:           row.get(5)?,
    semantic_integrity: row.get(6)?,
    vector_hash:        row.get(7)?,
    parent_hash:        row.get(8)?,
    verified:           row.get(9)?,
  })
}

// ─── OntologyStore impl ──────────────────────────────────────────────────────

impl OntologyStore for SqliteStore {
  type Error = Error;

  // ── Documents ─────────────────────────────────────────────────────────────

  async fn create_document(&self, input: NewDocument) -> Result<Document> {
    let now = Utc::now();
    let doc = Document {
      doc_id:     Uuid::new_v4(),
      title:      input.title,
      source_uri: input.source_uri,
      checksum:   content_checksum(&input.text),
      bytes:      input.text.len() as u64,
      text:       input.text,
      created_at: now,
      updated_at: now,
    };

    let id_str       = encode_uuid(doc.doc_id);
    let title        = doc.title.clone();
    let source_uri   = doc.source_uri.clone();
    let checksum     = doc.checksum.clone();
    let bytes        = doc.bytes as i64;
    let text         = doc.text.clone();
    let created_str  = encode_dt(doc.created_at);
    let updated_str  = encode_dt(doc.updated_at);

    // Check-then-insert runs as one unit on the connection thread, so two
    // concurrent creates with the same checksum cannot race past the check.
    let inserted: bool = self
      .conn
      .call(move |conn| {
        let exists: bool = conn
          .query_row(
            "SELECT 1 FROM documents WHERE checksum = ?1",
            rusqlite::params![checksum],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if exists {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO documents (
             doc_id, title, source_uri, checksum, bytes, text,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            title,
            source_uri,
            checksum,
            bytes,
            text,
            created_str,
            updated_str,
          ],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::Core(loom_core::Error::DuplicateChecksum(
        doc.checksum,
      )));
    }
    Ok(doc)
  }

  async fn get_document(&self, doc_id: Uuid) -> Result<Document> {
    let id_str = encode_uuid(doc_id);

    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DOCUMENT_COLS} FROM documents WHERE doc_id = ?1"),
              rusqlite::params![id_str],
              read_document_row,
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some(raw) => raw.into_document(),
      None => Err(Error::Core(loom_core::Error::DocumentNotFound(doc_id))),
    }
  }

  async fn list_documents(&self) -> Result<Vec<Document>> {
    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DOCUMENT_COLS} FROM documents
           ORDER BY created_at DESC, doc_id"
        ))?;
        let rows = stmt
          .query_map([], read_document_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_document).collect()
  }

  async fn delete_document(&self, doc_id: Uuid) -> Result<()> {
    let lock = self.doc_lock(doc_id);
    let _guard = lock.lock_owned().await;

    let id_str = encode_uuid(doc_id);
    let cascade_provenance =
      self.retention == ProvenanceRetention::CascadeDelete;

    let existed: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists: bool = tx
          .query_row(
            "SELECT 1 FROM documents WHERE doc_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(false);
        }

        // Concept ids are needed before the cascade wipes them: their
        // provenance logs are keyed by concept id.
        let concept_ids: Vec<String> = if cascade_provenance {
          let mut stmt =
            tx.prepare("SELECT concept_id FROM concepts WHERE doc_id = ?1")?;
          let ids = stmt
            .query_map(rusqlite::params![id_str], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          ids
        } else {
          Vec::new()
        };

        tx.execute(
          "DELETE FROM documents WHERE doc_id = ?1",
          rusqlite::params![id_str],
        )?;

        if cascade_provenance {
          tx.execute(
            "DELETE FROM provenance_events WHERE object_id = ?1",
            rusqlite::params![id_str],
          )?;
          let mut stmt = tx
            .prepare("DELETE FROM provenance_events WHERE object_id = ?1")?;
          for concept_id in &concept_ids {
            stmt.execute(rusqlite::params![concept_id])?;
          }
        }

        tx.commit()?;
        Ok(true)
      })
      .await?;

    if existed {
      Ok(())
    } else {
      Err(Error::Core(loom_core::Error::DocumentNotFound(doc_id)))
    }
  }

  // ── Extraction — atomic batch write ───────────────────────────────────────

  async fn commit_extraction(&self, batch: ExtractionBatch) -> Result<()> {
    let doc_id = batch.doc_id;

    // Held across validation and insertion: a second batch for the same
    // document waits here instead of interleaving.
    let lock = self.doc_lock(doc_id);
    let _guard = lock.lock_owned().await;

    let doc = self.get_document(doc_id).await?;
    let existing_concepts = self.concepts_for_document(doc_id).await?;
    let existing_spans = self.spans_for_document(doc_id).await?;

    validate_batch(&doc, &existing_concepts, &existing_spans, &batch)
      .map_err(Error::validation)?;

    // Encode every row up front; the closure below only executes SQL.
    let span_rows: Vec<_> = batch
      .spans
      .iter()
      .map(|s| {
        (
          encode_uuid(s.span_id),
          encode_uuid(s.doc_id),
          s.start as i64,
          s.end as i64,
          s.text.clone(),
          s.extractor.clone(),
          s.quality,
        )
      })
      .collect();

    let concept_rows: Vec<_> = batch
      .concepts
      .iter()
      .map(|c| {
        Ok((
          encode_uuid(c.concept_id),
          encode_uuid(c.doc_id),
          c.label.clone(),
          c.kind.clone(),
          c.confidence,
          encode_aliases(&c.aliases)?,
          c.summary.clone(),
          encode_level(c.hierarchy_level),
          c.parent_cluster_id.map(encode_uuid),
          c.parent_concept_id.map(encode_uuid),
          c.coherence,
        ))
      })
      .collect::<Result<_>>()?;

    let relation_rows: Vec<_> = batch
      .relations
      .iter()
      .map(|r| {
        (
          encode_uuid(r.relation_id),
          encode_uuid(r.doc_id),
          encode_uuid(r.src),
          r.rel.clone(),
          encode_uuid(r.dst),
          r.confidence,
        )
      })
      .collect();

    let mention_rows: Vec<_> = batch
      .mentions
      .iter()
      .map(|m| {
        (
          encode_uuid(m.mention_id),
          encode_uuid(m.concept_id),
          encode_uuid(m.doc_id),
          encode_uuid(m.span_id),
        )
      })
      .collect();

    let tag_rows: Vec<_> = batch
      .tags
      .iter()
      .map(|t| {
        (
          encode_uuid(t.tag_id),
          t.doc_id.map(encode_uuid),
          t.category.clone(),
          t.value.clone(),
          t.confidence,
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(
          rusqlite::TransactionBehavior::Immediate,
        )?;

        {
          let mut stmt = tx.prepare(
            "INSERT INTO spans (
               span_id, doc_id, start_offset, end_offset, text, extractor,
               quality
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          )?;
          for (id, doc, start, end, text, extractor, quality) in &span_rows {
            stmt.execute(rusqlite::params![
              id, doc, start, end, text, extractor, quality
            ])?;
          }
        }

        {
          let mut stmt = tx.prepare(
            "INSERT INTO concepts (
               concept_id, doc_id, label, kind, confidence, aliases, summary,
               hierarchy_level, parent_cluster_id, parent_concept_id,
               coherence
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          )?;
          for (
            id,
            doc,
            label,
            kind,
            confidence,
            aliases,
            summary,
            level,
            parent_cluster,
            parent_concept,
            coherence,
          ) in &concept_rows
          {
            stmt.execute(rusqlite::params![
              id,
              doc,
              label,
              kind,
              confidence,
              aliases,
              summary,
              level,
              parent_cluster,
              parent_concept,
              coherence,
            ])?;
          }
        }

        {
          let mut stmt = tx.prepare(
            "INSERT INTO relations (
               relation_id, doc_id, src, rel, dst, confidence
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          )?;
          for (id, doc, src, rel, dst, confidence) in &relation_rows {
            stmt
              .execute(rusqlite::params![id, doc, src, rel, dst, confidence])?;
          }
        }

        {
          let mut stmt = tx.prepare(
            "INSERT INTO mentions (mention_id, concept_id, doc_id, span_id)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for (id, concept, doc, span) in &mention_rows {
            stmt.execute(rusqlite::params![id, concept, doc, span])?;
          }
        }

        {
          let mut stmt = tx.prepare(
            "INSERT INTO tags (tag_id, doc_id, category, value, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for (id, doc, category, value, confidence) in &tag_rows {
            stmt
              .execute(rusqlite::params![id, doc, category, value, confidence])?;
          }
        }

        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(|e| map_commit_err(e, doc_id))?;

    Ok(())
  }

  // ── Ontology reads ────────────────────────────────────────────────────────

  async fn concepts_for_document(&self, doc_id: Uuid) -> Result<Vec<Concept>> {
    self.ensure_document(doc_id).await?;
    let id_str = encode_uuid(doc_id);

    let raws: Vec<RawConcept> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT concept_id, doc_id, label, kind, confidence, aliases,
                  summary, hierarchy_level, parent_cluster_id,
                  parent_concept_id, coherence
           FROM concepts
           WHERE doc_id = ?1
           ORDER BY (hierarchy_level IS NULL), hierarchy_level, label,
                    concept_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawConcept {
              concept_id:        row.get(0)?,
              doc_id:            row.get(1)?,
              label:             row.get(2)?,
              kind:              row.get(3)?,
              confidence:        row.get(4)?,
              aliases:           row.get(5)?,
              summary:           row.get(6)?,
              hierarchy_level:   row.get(7)?,
              parent_cluster_id: row.get(8)?,
              parent_concept_id: row.get(9)?,
              coherence:         row.get(10)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawConcept::into_concept).collect()
  }

  async fn relations_for_document(&self, doc_id: Uuid) -> Result<Vec<Relation>> {
    self.ensure_document(doc_id).await?;
    let id_str = encode_uuid(doc_id);

    let raws: Vec<RawRelation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT relation_id, doc_id, src, rel, dst, confidence
           FROM relations WHERE doc_id = ?1
           ORDER BY rel, relation_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawRelation {
              relation_id: row.get(0)?,
              doc_id:      row.get(1)?,
              src:         row.get(2)?,
              rel:         row.get(3)?,
              dst:         row.get(4)?,
              confidence:  row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRelation::into_relation).collect()
  }

  async fn spans_for_document(&self, doc_id: Uuid) -> Result<Vec<Span>> {
    self.ensure_document(doc_id).await?;
    let id_str = encode_uuid(doc_id);

    let raws: Vec<RawSpan> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT span_id, doc_id, start_offset, end_offset, text, extractor,
                  quality
           FROM spans WHERE doc_id = ?1
           ORDER BY start_offset, end_offset, span_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawSpan {
              span_id:      row.get(0)?,
              doc_id:       row.get(1)?,
              start_offset: row.get(2)?,
              end_offset:   row.get(3)?,
              text:         row.get(4)?,
              extractor:    row.get(5)?,
              quality:      row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSpan::into_span).collect()
  }

  async fn get_concept(&self, concept_id: Uuid) -> Result<Concept> {
    let id_str = encode_uuid(concept_id);

    let raw: Option<RawConcept> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT concept_id, doc_id, label, kind, confidence, aliases,
                      summary, hierarchy_level, parent_cluster_id,
                      parent_concept_id, coherence
               FROM concepts WHERE concept_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawConcept {
                  concept_id:        row.get(0)?,
                  doc_id:            row.get(1)?,
                  label:             row.get(2)?,
                  kind:              row.get(3)?,
                  confidence:        row.get(4)?,
                  aliases:           row.get(5)?,
                  summary:           row.get(6)?,
                  hierarchy_level:   row.get(7)?,
                  parent_cluster_id: row.get(8)?,
                  parent_concept_id: row.get(9)?,
                  coherence:         row.get(10)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some(raw) => raw.into_concept(),
      None => Err(Error::Core(loom_core::Error::ConceptNotFound(concept_id))),
    }
  }

  async fn get_span(&self, span_id: Uuid) -> Result<Span> {
    let id_str = encode_uuid(span_id);

    let raw: Option<RawSpan> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT span_id, doc_id, start_offset, end_offset, text,
                      extractor, quality
               FROM spans WHERE span_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawSpan {
                  span_id:      row.get(0)?,
                  doc_id:       row.get(1)?,
                  start_offset: row.get(2)?,
                  end_offset:   row.get(3)?,
                  text:         row.get(4)?,
                  extractor:    row.get(5)?,
                  quality:      row.get(6)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some(raw) => raw.into_span(),
      None => Err(Error::Core(loom_core::Error::SpanNotFound(span_id))),
    }
  }

  async fn mentions_for_concept(&self, concept_id: Uuid) -> Result<Vec<Mention>> {
    // Distinguish "wrong concept id" from "concept with no evidence".
    self.get_concept(concept_id).await?;
    let id_str = encode_uuid(concept_id);

    let raws: Vec<RawMention> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT mention_id, concept_id, doc_id, span_id
           FROM mentions WHERE concept_id = ?1
           ORDER BY mention_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawMention {
              mention_id: row.get(0)?,
              concept_id: row.get(1)?,
              doc_id:     row.get(2)?,
              span_id:    row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMention::into_mention).collect()
  }

  async fn tags_for_document(&self, doc_id: Uuid) -> Result<Vec<Tag>> {
    self.ensure_document(doc_id).await?;
    let id_str = encode_uuid(doc_id);

    let raws: Vec<RawTag> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT tag_id, doc_id, category, value, confidence
           FROM tags WHERE doc_id = ?1 OR doc_id IS NULL
           ORDER BY category, value, tag_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawTag {
              tag_id:     row.get(0)?,
              doc_id:     row.get(1)?,
              category:   row.get(2)?,
              value:      row.get(3)?,
              confidence: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTag::into_tag).collect()
  }

  // ── Provenance log ────────────────────────────────────────────────────────

  async fn append_event(&self, input: NewEvent) -> Result<ProvenanceEvent> {
    if let Some(score) = input.semantic_integrity {
      if !(0.0..=1.0).contains(&score) || !score.is_finite() {
        return Err(Error::validation(
          loom_core::ValidationError::EventIntegrityOutOfRange {
            object_id: input.object_id,
            value:     score,
          },
        ));
      }
    }

    let timestamp = Utc::now();
    let object_str = encode_uuid(input.object_id);
    let type_str = input.event_type.as_str();
    let ts_str = encode_dt(timestamp);
    let actor = input.actor.clone();
    let checksum = input.checksum.clone();
    let integrity = input.semantic_integrity;
    let vector_hash = input.vector_hash.clone();
    let parent_hash = input.parent_hash.clone();

    let event_id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO provenance_events (
             object_id, event_type, timestamp, actor, checksum,
             semantic_integrity, vector_hash, parent_hash
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            object_str,
            type_str,
            ts_str,
            actor,
            checksum,
            integrity,
            vector_hash,
            parent_hash,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(ProvenanceEvent {
      event_id,
      object_id: input.object_id,
      event_type: input.event_type,
      timestamp,
      actor: input.actor,
      checksum: input.checksum,
      semantic_integrity: input.semantic_integrity,
      vector_hash: input.vector_hash,
      parent_hash: input.parent_hash,
      verified: false,
    })
  }

  async fn events_for_object(
    &self,
    object_id: Uuid,
  ) -> Result<Vec<ProvenanceEvent>> {
    let id_str = encode_uuid(object_id);

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_COLS} FROM provenance_events
           WHERE object_id = ?1
           ORDER BY timestamp, id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], read_event_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn verify_chain(&self, object_id: Uuid) -> Result<ChainReport> {
    let events = self.events_for_object(object_id).await?;
    let report = loom_core::provenance::verify_chain(&events);

    // Refresh the cached verdicts; they stay re-derivable from the chain.
    let updates: Vec<(i64, bool)> = events
      .iter()
      .map(|e| (e.event_id, !report.broken_links.contains(&e.event_id)))
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "UPDATE provenance_events SET verified = ?2 WHERE id = ?1",
          )?;
          for (id, verified) in &updates {
            stmt.execute(rusqlite::params![id, verified])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(report)
  }

  async fn provenance_summary(
    &self,
    object_id: Uuid,
  ) -> Result<ProvenanceSummary> {
    let events = self.events_for_object(object_id).await?;
    Ok(loom_core::provenance::summarize(&events))
  }

  async fn provenance_status(
    &self,
    object_id: Uuid,
  ) -> Result<ProvenanceStatus> {
    let events = self.events_for_object(object_id).await?;
    Ok(loom_core::provenance::provenance_status(&events))
  }
}
