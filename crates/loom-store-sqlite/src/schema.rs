//! SQL schema for the Loom SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Ontology tables cascade from `documents`. `provenance_events` carries no
/// foreign key on purpose: whether an audit trail outlives its document is a
/// retention policy, not a schema constraint.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS documents (
    doc_id      TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    source_uri  TEXT,
    checksum    TEXT NOT NULL UNIQUE,  -- SHA-256 hex of text
    bytes       INTEGER NOT NULL,
    text        TEXT NOT NULL,
    created_at  TEXT NOT NULL,         -- ISO 8601 UTC; server-assigned
    updated_at  TEXT NOT NULL
);

-- Spans are immutable evidence excerpts; offsets are character offsets.
CREATE TABLE IF NOT EXISTS spans (
    span_id       TEXT PRIMARY KEY,
    doc_id        TEXT NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
    start_offset  INTEGER NOT NULL,
    end_offset    INTEGER NOT NULL,
    text          TEXT NOT NULL,
    extractor     TEXT,
    quality       REAL
);

CREATE TABLE IF NOT EXISTS concepts (
    concept_id        TEXT PRIMARY KEY,
    doc_id            TEXT NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
    label             TEXT NOT NULL,
    kind              TEXT NOT NULL,   -- free-form type tag
    confidence        REAL NOT NULL,
    aliases           TEXT NOT NULL DEFAULT '[]',
    summary           TEXT,
    -- Hierarchy columns. Parent pointers are validated in loom-core before
    -- commit; no FK so a batch can insert parents and children together.
    hierarchy_level   INTEGER,         -- 0=document 1=cluster 2=refinement 3=concept
    parent_cluster_id TEXT,
    parent_concept_id TEXT,
    coherence         REAL
);

CREATE TABLE IF NOT EXISTS relations (
    relation_id TEXT PRIMARY KEY,
    doc_id      TEXT NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
    src         TEXT NOT NULL REFERENCES concepts(concept_id) ON DELETE CASCADE,
    rel         TEXT NOT NULL,         -- free-form relation verb
    dst         TEXT NOT NULL REFERENCES concepts(concept_id) ON DELETE CASCADE,
    confidence  REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS mentions (
    mention_id  TEXT PRIMARY KEY,
    concept_id  TEXT NOT NULL REFERENCES concepts(concept_id) ON DELETE CASCADE,
    doc_id      TEXT NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
    span_id     TEXT NOT NULL REFERENCES spans(span_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS tags (
    tag_id      TEXT PRIMARY KEY,
    doc_id      TEXT REFERENCES documents(doc_id) ON DELETE CASCADE,  -- NULL = global
    category    TEXT NOT NULL,
    value       TEXT NOT NULL,
    confidence  REAL NOT NULL
);

-- Strictly append-only. No UPDATE is ever issued against this table except
-- to refresh the cached `verified` flag, which the verifier re-derives.
CREATE TABLE IF NOT EXISTS provenance_events (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    object_id          TEXT NOT NULL,  -- doc_id or concept_id
    event_type         TEXT NOT NULL,
    timestamp          TEXT NOT NULL,  -- ISO 8601 UTC; server-assigned
    actor              TEXT,
    checksum           TEXT,
    semantic_integrity REAL,
    vector_hash        TEXT,
    parent_hash        TEXT,
    verified           INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS spans_doc_idx        ON spans(doc_id);
CREATE INDEX IF NOT EXISTS concepts_doc_idx     ON concepts(doc_id);
CREATE INDEX IF NOT EXISTS relations_doc_idx    ON relations(doc_id);
CREATE INDEX IF NOT EXISTS mentions_doc_idx     ON mentions(doc_id);
CREATE INDEX IF NOT EXISTS mentions_concept_idx ON mentions(concept_id);
CREATE INDEX IF NOT EXISTS tags_doc_idx         ON tags(doc_id);
CREATE INDEX IF NOT EXISTS prov_object_idx      ON provenance_events(object_id);
CREATE INDEX IF NOT EXISTS prov_timestamp_idx   ON provenance_events(timestamp);
CREATE INDEX IF NOT EXISTS prov_vector_hash_idx ON provenance_events(vector_hash);

PRAGMA user_version = 1;
";
