//! Error type for `questionnaire-reminders`.
//!
//! The first three variants are configuration errors and abort a whole
//! reminder cycle. The others are raised while handling one recipient.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no questionnaire given and `default_questionnaire` is not configured")]
  QuestionnaireNotConfigured,

  #[error("questionnaire not found: {0:?}")]
  QuestionnaireNotFound(String),

  #[error("no question sets for questionnaire {0:?}")]
  NoQuestionSets(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("core error: {0}")]
  Core(#[from] questionnaire_core::Error),

  #[error("template error: {0}")]
  Template(#[from] tera::Error),

  #[error("email template {0:?} not found")]
  TemplateNotFound(String),

  #[error("rendered email has no line break after the subject line")]
  MissingSubjectLine,

  #[error("subject {0} has no email address")]
  MissingEmail(i64),

  #[error("invalid address {address:?}: {reason}")]
  Address { address: String, reason: String },

  #[error("cannot build message: {0}")]
  Message(String),

  #[error("mail transport error: {0}")]
  Transport(String),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
