//! [`SqliteStore`] — the SQLite implementation of [`ReminderStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;

use questionnaire_core::{
  questionnaire::{QuestionSet, Questionnaire},
  run::{NewRunInfo, Run, RunInfo, RunInfoDetail},
  store::ReminderStore,
  subject::{NewSubject, Subject},
};

use crate::{
  encode::{
    RUNINFO_COLUMNS, RawRunInfo, RawRunInfoDetail, RawSubject, SUBJECT_COLUMNS,
    encode_date, encode_dt, question_set_from_row, questionnaire_from_row,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A questionnaire store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_run_info(&self, runinfo_id: i64) -> Result<Option<RunInfo>> {
    let raw: Option<RawRunInfo> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {RUNINFO_COLUMNS} FROM runinfos WHERE runinfo_id = ?1"),
            rusqlite::params![runinfo_id],
            |row| RawRunInfo::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRunInfo::into_run_info).transpose()
  }
}

// ─── ReminderStore impl ──────────────────────────────────────────────────────

impl ReminderStore for SqliteStore {
  type Error = Error;

  // ── Questionnaires ────────────────────────────────────────────────────────

  async fn add_questionnaire(&self, name: &str) -> Result<Questionnaire> {
    let name = name.to_owned();

    let questionnaire = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO questionnaires (name) VALUES (?1)",
          rusqlite::params![name],
        )?;
        Ok(Questionnaire {
          questionnaire_id: conn.last_insert_rowid(),
          name,
        })
      })
      .await?;

    Ok(questionnaire)
  }

  async fn find_questionnaire(&self, name: &str) -> Result<Option<Questionnaire>> {
    let name = name.to_owned();

    let found = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT questionnaire_id, name FROM questionnaires WHERE name = ?1",
            rusqlite::params![name],
            questionnaire_from_row,
          )
          .optional()?)
      })
      .await?;

    Ok(found)
  }

  async fn add_question_set(
    &self,
    questionnaire_id: i64,
    sortid: i32,
    heading: &str,
  ) -> Result<QuestionSet> {
    let heading = heading.to_owned();

    let set = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO questionsets (questionnaire_id, sortid, heading) VALUES (?1, ?2, ?3)",
          rusqlite::params![questionnaire_id, sortid, heading],
        )?;
        Ok(QuestionSet {
          questionset_id: conn.last_insert_rowid(),
          questionnaire_id,
          sortid,
          heading,
        })
      })
      .await?;

    Ok(set)
  }

  async fn question_sets(&self, questionnaire_id: i64) -> Result<Vec<QuestionSet>> {
    let sets = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT questionset_id, questionnaire_id, sortid, heading
           FROM questionsets
           WHERE questionnaire_id = ?1
           ORDER BY sortid, questionset_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![questionnaire_id], question_set_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(sets)
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn add_subject(&self, input: NewSubject) -> Result<Subject> {
    let nextrun_str = input.nextrun.map(encode_date);
    let gender_str  = input.gender.as_str();
    let state_str   = input.state.as_str();
    let form_str    = input.formtype.as_str();
    let row         = input.clone();

    let subject_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (
             surname, givenname, gender, email, language, nextrun, state, formtype
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            row.surname,
            row.givenname,
            gender_str,
            row.email,
            row.language,
            nextrun_str,
            state_str,
            form_str,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Subject {
      subject_id,
      surname:   input.surname,
      givenname: input.givenname,
      gender:    input.gender,
      email:     input.email,
      language:  input.language,
      nextrun:   input.nextrun,
      state:     input.state,
      formtype:  input.formtype,
    })
  }

  async fn get_subject(&self, subject_id: i64) -> Result<Option<Subject>> {
    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1"),
            rusqlite::params![subject_id],
            |row| RawSubject::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn update_subject(&self, subject: &Subject) -> Result<()> {
    let subject_id  = subject.subject_id;
    let row         = subject.clone();
    let nextrun_str = subject.nextrun.map(encode_date);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subjects
           SET surname = ?2, givenname = ?3, gender = ?4, email = ?5,
               language = ?6, nextrun = ?7, state = ?8, formtype = ?9
           WHERE subject_id = ?1",
          rusqlite::params![
            row.subject_id,
            row.surname,
            row.givenname,
            row.gender.as_str(),
            row.email,
            row.language,
            nextrun_str,
            row.state.as_str(),
            row.formtype.as_str(),
          ],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::SubjectNotFound(subject_id));
    }
    Ok(())
  }

  async fn due_subjects(&self, today: NaiveDate) -> Result<Vec<Subject>> {
    let today_str = encode_date(today);

    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBJECT_COLUMNS} FROM subjects
           WHERE state = 'active' AND nextrun IS NOT NULL AND nextrun <= ?1
           ORDER BY subject_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![today_str], |row| RawSubject::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  // ── Runs ──────────────────────────────────────────────────────────────────

  async fn get_or_create_run(&self, runid: &str) -> Result<Run> {
    let runid = runid.to_owned();

    let run = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT OR IGNORE INTO runs (runid) VALUES (?1)",
          rusqlite::params![runid],
        )?;
        if inserted > 0 {
          tracing::debug!(%runid, "created run");
        }
        Ok(conn.query_row(
          "SELECT run_pk, runid FROM runs WHERE runid = ?1",
          rusqlite::params![runid],
          |row| Ok(Run { run_pk: row.get(0)?, runid: row.get(1)? }),
        )?)
      })
      .await?;

    Ok(run)
  }

  async fn find_run_info(&self, subject_id: i64, run_pk: i64) -> Result<Option<RunInfo>> {
    let raw: Option<RawRunInfo> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {RUNINFO_COLUMNS} FROM runinfos WHERE subject_id = ?1 AND run_pk = ?2"
            ),
            rusqlite::params![subject_id, run_pk],
            |row| RawRunInfo::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRunInfo::into_run_info).transpose()
  }

  async fn insert_run_info(&self, input: NewRunInfo) -> Result<RunInfo> {
    let created_str = encode_dt(Utc::now());

    let runinfo_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO runinfos (
             subject_id, run_pk, random, created, emailcount, questionset_id
           ) VALUES (?1, ?2, ?3, ?4, 0, ?5)",
          rusqlite::params![
            input.subject_id,
            input.run_pk,
            input.random,
            created_str,
            input.questionset_id,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    self
      .get_run_info(runinfo_id)
      .await?
      .ok_or(Error::RunInfoNotFound(runinfo_id))
  }

  async fn update_run_info(&self, run_info: &RunInfo) -> Result<()> {
    let runinfo_id    = run_info.runinfo_id;
    let row           = run_info.clone();
    let emailsent_str = run_info.emailsent.map(encode_dt);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE runinfos
           SET random = ?2, emailcount = ?3, emailsent = ?4,
               lastemailerror = ?5, questionset_id = ?6
           WHERE runinfo_id = ?1",
          rusqlite::params![
            row.runinfo_id,
            row.random,
            row.emailcount,
            emailsent_str,
            row.lastemailerror,
            row.questionset_id,
          ],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::RunInfoNotFound(runinfo_id));
    }
    Ok(())
  }

  async fn list_run_infos(&self, subject_id: i64) -> Result<Vec<RunInfo>> {
    let raws: Vec<RawRunInfo> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RUNINFO_COLUMNS} FROM runinfos WHERE subject_id = ?1 ORDER BY runinfo_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![subject_id], |row| RawRunInfo::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRunInfo::into_run_info).collect()
  }

  async fn email_run_infos(&self, questionnaire_id: i64) -> Result<Vec<RunInfoDetail>> {
    let raws: Vec<RawRunInfoDetail> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT ri.runinfo_id, ri.subject_id, ri.run_pk, ri.random, ri.created,
                  ri.emailcount, ri.emailsent, ri.lastemailerror, ri.questionset_id,
                  s.subject_id, s.surname, s.givenname, s.gender, s.email,
                  s.language, s.nextrun, s.state, s.formtype,
                  r.run_pk, r.runid
           FROM runinfos ri
           JOIN subjects s      ON s.subject_id      = ri.subject_id
           JOIN runs r          ON r.run_pk          = ri.run_pk
           JOIN questionsets qs ON qs.questionset_id = ri.questionset_id
           WHERE s.formtype = 'email' AND qs.questionnaire_id = ?1
           ORDER BY ri.runinfo_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![questionnaire_id], |row| {
            Ok(RawRunInfoDetail {
              run_info: RawRunInfo::from_row(row, 0)?,
              subject:  RawSubject::from_row(row, 9)?,
              run:      Run { run_pk: row.get(18)?, runid: row.get(19)? },
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRunInfoDetail::into_detail).collect()
  }
}
