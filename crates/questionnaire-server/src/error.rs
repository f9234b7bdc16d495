//! Error type and axum `IntoResponse` implementation.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Wrong or missing trigger code, or the trigger is disabled.
  #[error("not found")]
  NotFound,
  #[error(transparent)]
  Job(#[from] questionnaire_reminders::Error),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
      Error::Job(e) => {
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
      }
    }
  }
}
