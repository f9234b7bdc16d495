//! Error types for `questionnaire-core`.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot advance {0} by one year: date out of range")]
  DateOutOfRange(NaiveDate),

  #[error("unknown {field} value: {value:?}")]
  UnknownVariant {
    field: &'static str,
    value: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
