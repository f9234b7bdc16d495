//! Runs and the per-subject `RunInfo` tracking records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subject::Subject;

/// Runs whose id starts with this prefix are test runs and are never emailed.
pub const TEST_RUN_PREFIX: &str = "test:";

/// `emailcount` value marking a `RunInfo` as permanently suppressed.
pub const EMAIL_SUPPRESSED: i32 = -1;

/// A yearly scheduling bucket shared by every subject whose next run falls in
/// the same year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
  pub run_pk: i64,
  pub runid:  String,
}

impl Run {
  pub fn is_test(&self) -> bool { self.runid.starts_with(TEST_RUN_PREFIX) }
}

/// One subject's progress through one run. `(subject_id, run_pk)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
  pub runinfo_id:     i64,
  pub subject_id:     i64,
  pub run_pk:         i64,
  /// Unguessable per-run access code embedded in the reminder.
  pub random:         String,
  pub created:        DateTime<Utc>,
  /// 0 = never sent, -1 = suppressed, N > 0 = sent N times.
  pub emailcount:     i32,
  pub emailsent:      Option<DateTime<Utc>>,
  pub lastemailerror: Option<String>,
  pub questionset_id: Option<i64>,
}

impl RunInfo {
  pub fn is_suppressed(&self) -> bool { self.emailcount == EMAIL_SUPPRESSED }

  pub fn never_sent(&self) -> bool { self.emailcount == 0 }
}

/// Input to [`crate::store::ReminderStore::insert_run_info`].
#[derive(Debug, Clone)]
pub struct NewRunInfo {
  pub subject_id:     i64,
  pub run_pk:         i64,
  pub random:         String,
  pub questionset_id: Option<i64>,
}

/// A `RunInfo` joined with its owning subject and run, as read by the email
/// phase of the reminder job.
#[derive(Debug, Clone)]
pub struct RunInfoDetail {
  pub run_info: RunInfo,
  pub subject:  Subject,
  pub run:      Run,
}
