//! `loom` — command-line front end for the Loom ontology store.
//!
//! # Usage
//!
//! ```
//! loom ingest notes.txt --title "Q3 Notes"
//! loom commit <doc-id> extraction.json
//! loom tree <doc-id>
//! loom verify <doc-id>
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use loom_core::{
  document::NewDocument,
  hierarchy::{TreeNode, build_hierarchy},
  ontology::ExtractionBatch,
  provenance::{EventType, NewEvent},
  store::{OntologyStore, ProvenanceRetention},
};
use loom_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "loom", about = "Ontology store for extracted documents")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Override the store path from the config file.
  #[arg(long, value_name = "FILE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Ingest a text file as a new document and record the ingestion event.
  Ingest {
    file: PathBuf,
    /// Document title; defaults to the file name.
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    source_uri: Option<String>,
  },
  /// List all documents, newest first.
  Docs,
  /// Commit an extraction batch (JSON file) for a document.
  Commit { doc_id: Uuid, file: PathBuf },
  /// Print a document's navigation hierarchy.
  Tree {
    doc_id: Uuid,
    /// Emit the tree as JSON instead of indented text.
    #[arg(long)]
    json: bool,
  },
  /// List the provenance log of a document or concept.
  Events { object_id: Uuid },
  /// Verify the provenance hash chain of a document or concept.
  Verify { object_id: Uuid },
  /// Show pipeline status and an audit summary for a document.
  Status { doc_id: Uuid },
  /// Delete a document and its ontology rows.
  Delete { doc_id: Uuid },
}

// ─── Config file ─────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file; every key can also be set through
/// the environment as `LOOM_*`.
#[derive(Deserialize)]
struct AppConfig {
  store_path: String,
  #[serde(default)]
  provenance_retention: RetentionSetting,
}

#[derive(Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum RetentionSetting {
  #[default]
  Retain,
  CascadeDelete,
}

impl From<RetentionSetting> for ProvenanceRetention {
  fn from(s: RetentionSetting) -> Self {
    match s {
      RetentionSetting::Retain => Self::Retain,
      RetentionSetting::CascadeDelete => Self::CascadeDelete,
    }
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .set_default("store_path", "loom.db")?
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("LOOM"))
    .build()
    .context("failed to read config")?;
  let app_cfg: AppConfig = settings
    .try_deserialize()
    .context("failed to deserialise config")?;

  let store_path = cli
    .store
    .unwrap_or_else(|| PathBuf::from(&app_cfg.store_path));
  let store = SqliteStore::open_with_retention(
    &store_path,
    app_cfg.provenance_retention.into(),
  )
  .await
  .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Ingest { file, title, source_uri } => {
      ingest(&store, file, title, source_uri).await
    }
    Command::Docs => docs(&store).await,
    Command::Commit { doc_id, file } => commit(&store, doc_id, file).await,
    Command::Tree { doc_id, json } => tree(&store, doc_id, json).await,
    Command::Events { object_id } => events(&store, object_id).await,
    Command::Verify { object_id } => verify(&store, object_id).await,
    Command::Status { doc_id } => status(&store, doc_id).await,
    Command::Delete { doc_id } => {
      store.delete_document(doc_id).await?;
      println!("deleted {doc_id}");
      Ok(())
    }
  }
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn ingest(
  store: &SqliteStore,
  file: PathBuf,
  title: Option<String>,
  source_uri: Option<String>,
) -> anyhow::Result<()> {
  let text = std::fs::read_to_string(&file)
    .with_context(|| format!("reading {}", file.display()))?;
  let title = title.unwrap_or_else(|| {
    file
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "untitled".into())
  });

  let doc = store
    .create_document(NewDocument { title, source_uri, text })
    .await?;

  let mut event = NewEvent::new(doc.doc_id, EventType::Ingested);
  event.actor = Some(format!("loom-cli@{}", env!("CARGO_PKG_VERSION")));
  event.checksum = Some(doc.checksum.clone());
  store.append_event(event).await?;

  println!("{}  {}", doc.doc_id, doc.title);
  Ok(())
}

async fn docs(store: &SqliteStore) -> anyhow::Result<()> {
  for doc in store.list_documents().await? {
    println!(
      "{}  {}  {:>8} B  {}",
      doc.doc_id,
      doc.created_at.format("%Y-%m-%d %H:%M"),
      doc.bytes,
      doc.title,
    );
  }
  Ok(())
}

async fn commit(
  store: &SqliteStore,
  doc_id: Uuid,
  file: PathBuf,
) -> anyhow::Result<()> {
  let raw = std::fs::read_to_string(&file)
    .with_context(|| format!("reading {}", file.display()))?;
  let mut batch: ExtractionBatch =
    serde_json::from_str(&raw).context("parsing extraction batch")?;
  batch.doc_id = doc_id;

  store.commit_extraction(batch).await?;

  let mut event = NewEvent::new(doc_id, EventType::OntologyExtracted);
  event.actor = Some(format!("loom-cli@{}", env!("CARGO_PKG_VERSION")));
  store.append_event(event).await?;

  println!("committed batch for {doc_id}");
  Ok(())
}

async fn tree(
  store: &SqliteStore,
  doc_id: Uuid,
  json: bool,
) -> anyhow::Result<()> {
  let doc = store.get_document(doc_id).await?;
  let concepts = store.concepts_for_document(doc_id).await?;
  let root = build_hierarchy(doc_id, &doc.title, &concepts);

  if json {
    println!("{}", serde_json::to_string_pretty(&root)?);
  } else {
    print_tree(&root, 0);
  }
  Ok(())
}

fn print_tree(node: &TreeNode, depth: usize) {
  let indent = "  ".repeat(depth);
  match &node.kind {
    Some(kind) => println!("{indent}{} ({kind})", node.label),
    None => println!("{indent}{}", node.label),
  }
  for child in &node.children {
    print_tree(child, depth + 1);
  }
}

async fn events(store: &SqliteStore, object_id: Uuid) -> anyhow::Result<()> {
  for event in store.events_for_object(object_id).await? {
    println!(
      "{:>6}  {}  {:<20}  {}  {}",
      event.event_id,
      event.timestamp.format("%Y-%m-%d %H:%M:%S"),
      event.event_type.as_str(),
      if event.verified { "ok" } else { "--" },
      event.actor.as_deref().unwrap_or("-"),
    );
  }
  Ok(())
}

async fn verify(store: &SqliteStore, object_id: Uuid) -> anyhow::Result<()> {
  let report = store.verify_chain(object_id).await?;
  println!(
    "chain {}: {}/{} events verified (integrity {:.2})",
    if report.chain_valid { "valid" } else { "BROKEN" },
    report.verified_events,
    report.total_events,
    report.integrity_score,
  );
  for id in &report.broken_links {
    println!("  broken link at event {id}");
  }
  Ok(())
}

async fn status(store: &SqliteStore, doc_id: Uuid) -> anyhow::Result<()> {
  // Fail early on an unknown document rather than reporting an empty log.
  store.get_document(doc_id).await?;

  let status = store.provenance_status(doc_id).await?;
  let summary = store.provenance_summary(doc_id).await?;

  println!("status: {status:?}");
  println!("events: {}", summary.event_count);
  println!("actors: {}", summary.actor_count);
  if let Some(avg) = summary.avg_integrity {
    println!("avg integrity: {avg:.2}");
  }
  if let (Some(first), Some(last)) = (summary.first_event, summary.last_event)
  {
    println!("first: {}", first.to_rfc3339());
    println!("last:  {}", last.to_rfc3339());
  }
  let types: Vec<_> =
    summary.event_types.iter().map(|t| t.as_str()).collect();
  println!("steps: {}", types.join(", "));
  Ok(())
}
