//! The `ReminderStore` trait.
//!
//! Implemented by storage backends (e.g. `questionnaire-store-sqlite`). The
//! reminder job and the server depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  questionnaire::{QuestionSet, Questionnaire},
  run::{NewRunInfo, Run, RunInfo, RunInfoDetail},
  subject::{NewSubject, Subject},
};

/// Abstraction over a questionnaire store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ReminderStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Questionnaires ────────────────────────────────────────────────────

  /// Create a questionnaire. Names are unique.
  fn add_questionnaire<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Questionnaire, Self::Error>> + Send + 'a;

  /// Look a questionnaire up by name. Returns `None` if not found.
  fn find_questionnaire<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Questionnaire>, Self::Error>> + Send + 'a;

  fn add_question_set<'a>(
    &'a self,
    questionnaire_id: i64,
    sortid: i32,
    heading: &'a str,
  ) -> impl Future<Output = Result<QuestionSet, Self::Error>> + Send + 'a;

  /// All question sets of a questionnaire, ordered by `sortid`.
  fn question_sets(
    &self,
    questionnaire_id: i64,
  ) -> impl Future<Output = Result<Vec<QuestionSet>, Self::Error>> + Send + '_;

  // ── Subjects ──────────────────────────────────────────────────────────

  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Retrieve a subject by id. Returns `None` if not found.
  fn get_subject(
    &self,
    subject_id: i64,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Persist every mutable field of `subject`.
  fn update_subject<'a>(
    &'a self,
    subject: &'a Subject,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Active subjects whose `nextrun` is on or before `today`.
  fn due_subjects(
    &self,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  // ── Runs ──────────────────────────────────────────────────────────────

  /// Return the run with `runid`, creating it first if needed.
  fn get_or_create_run<'a>(
    &'a self,
    runid: &'a str,
  ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'a;

  /// The `RunInfo` for `(subject_id, run_pk)`, if one exists.
  fn find_run_info(
    &self,
    subject_id: i64,
    run_pk: i64,
  ) -> impl Future<Output = Result<Option<RunInfo>, Self::Error>> + Send + '_;

  /// Insert a new `RunInfo` with `emailcount = 0` and `created` set by the
  /// store. Fails if `(subject_id, run_pk)` already has one.
  fn insert_run_info(
    &self,
    input: NewRunInfo,
  ) -> impl Future<Output = Result<RunInfo, Self::Error>> + Send + '_;

  /// Persist every mutable field of `run_info`.
  fn update_run_info<'a>(
    &'a self,
    run_info: &'a RunInfo,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// All `RunInfo` rows of one subject, oldest first.
  fn list_run_infos(
    &self,
    subject_id: i64,
  ) -> impl Future<Output = Result<Vec<RunInfo>, Self::Error>> + Send + '_;

  /// `RunInfo` rows of email subjects whose question set belongs to
  /// `questionnaire_id`, joined with subject and run, in insertion order.
  fn email_run_infos(
    &self,
    questionnaire_id: i64,
  ) -> impl Future<Output = Result<Vec<RunInfoDetail>, Self::Error>> + Send + '_;
}
