//! Questionnaires and their ordered question sets.

use serde::{Deserialize, Serialize};

/// A named questionnaire. Its questions live in question sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Questionnaire {
  pub questionnaire_id: i64,
  pub name:             String,
}

/// An ordered group of questions within a questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSet {
  pub questionset_id:   i64,
  pub questionnaire_id: i64,
  /// Sort key; the set with the lowest value is the questionnaire's entry
  /// point.
  pub sortid:           i32,
  pub heading:          String,
}
