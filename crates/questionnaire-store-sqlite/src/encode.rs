//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as ISO 8601
//! `YYYY-MM-DD` (so lexical order equals date order), and enumerations as
//! their lowercase names.

use chrono::{DateTime, NaiveDate, Utc};
use questionnaire_core::{
  questionnaire::{QuestionSet, Questionnaire},
  run::{Run, RunInfo, RunInfoDetail},
  subject::Subject,
};

use crate::{Error, Result};

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate
// ────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const SUBJECT_COLUMNS: &str =
  "subject_id, surname, givenname, gender, email, language, nextrun, state, formtype";

pub const RUNINFO_COLUMNS: &str = "runinfo_id, subject_id, run_pk, random, created, \
   emailcount, emailsent, lastemailerror, questionset_id";

// ─── Raw row types ───────────────────────────────────────────────────────────

/// Raw column values from a `subjects` row before domain decoding.
pub struct RawSubject {
  pub subject_id: i64,
  pub surname:    String,
  pub givenname:  String,
  pub gender:     String,
  pub email:      Option<String>,
  pub language:   String,
  pub nextrun:    Option<String>,
  pub state:      String,
  pub formtype:   String,
}

impl RawSubject {
  /// Read the subject columns starting at column index `at`.
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id: row.get(at)?,
      surname:    row.get(at + 1)?,
      givenname:  row.get(at + 2)?,
      gender:     row.get(at + 3)?,
      email:      row.get(at + 4)?,
      language:   row.get(at + 5)?,
      nextrun:    row.get(at + 6)?,
      state:      row.get(at + 7)?,
      formtype:   row.get(at + 8)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id: self.subject_id,
      surname:    self.surname,
      givenname:  self.givenname,
      gender:     self.gender.parse()?,
      email:      self.email,
      language:   self.language,
      nextrun:    self.nextrun.as_deref().map(decode_date).transpose()?,
      state:      self.state.parse()?,
      formtype:   self.formtype.parse()?,
    })
  }
}

/// Raw column values from a `runinfos` row.
pub struct RawRunInfo {
  pub runinfo_id:     i64,
  pub subject_id:     i64,
  pub run_pk:         i64,
  pub random:         String,
  pub created:        String,
  pub emailcount:     i32,
  pub emailsent:      Option<String>,
  pub lastemailerror: Option<String>,
  pub questionset_id: Option<i64>,
}

impl RawRunInfo {
  /// Read the run-info columns starting at column index `at`.
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      runinfo_id:     row.get(at)?,
      subject_id:     row.get(at + 1)?,
      run_pk:         row.get(at + 2)?,
      random:         row.get(at + 3)?,
      created:        row.get(at + 4)?,
      emailcount:     row.get(at + 5)?,
      emailsent:      row.get(at + 6)?,
      lastemailerror: row.get(at + 7)?,
      questionset_id: row.get(at + 8)?,
    })
  }

  pub fn into_run_info(self) -> Result<RunInfo> {
    Ok(RunInfo {
      runinfo_id:     self.runinfo_id,
      subject_id:     self.subject_id,
      run_pk:         self.run_pk,
      random:         self.random,
      created:        decode_dt(&self.created)?,
      emailcount:     self.emailcount,
      emailsent:      self.emailsent.as_deref().map(decode_dt).transpose()?,
      lastemailerror: self.lastemailerror,
      questionset_id: self.questionset_id,
    })
  }
}

/// A joined `runinfos` + `subjects` + `runs` row.
pub struct RawRunInfoDetail {
  pub run_info: RawRunInfo,
  pub subject:  RawSubject,
  pub run:      Run,
}

impl RawRunInfoDetail {
  pub fn into_detail(self) -> Result<RunInfoDetail> {
    Ok(RunInfoDetail {
      run_info: self.run_info.into_run_info()?,
      subject:  self.subject.into_subject()?,
      run:      self.run,
    })
  }
}

pub fn questionnaire_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Questionnaire> {
  Ok(Questionnaire {
    questionnaire_id: row.get(0)?,
    name:             row.get(1)?,
  })
}

pub fn question_set_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuestionSet> {
  Ok(QuestionSet {
    questionset_id:   row.get(0)?,
    questionnaire_id: row.get(1)?,
    sortid:           row.get(2)?,
    heading:          row.get(3)?,
  })
}
