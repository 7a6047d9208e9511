//! Error type for `loom-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] loom_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column held a value outside its domain (e.g. an unknown
  /// hierarchy level). Indicates out-of-band tampering with the database.
  #[error("corrupt column {column}: {value:?}")]
  CorruptColumn { column: &'static str, value: String },
}

impl Error {
  /// Convenience for wrapping a core validation error.
  pub fn validation(e: loom_core::ValidationError) -> Self {
    Self::Core(loom_core::Error::Validation(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
