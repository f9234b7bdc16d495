//! Error type for `questionnaire-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] questionnaire_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("subject not found: {0}")]
  SubjectNotFound(i64),

  #[error("run info not found: {0}")]
  RunInfoNotFound(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
