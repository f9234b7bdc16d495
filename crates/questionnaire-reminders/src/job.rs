//! The reminder cycle: open runs for due subjects, then email every subject
//! whose reminder is due.

use std::{fmt, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use rand_core::{OsRng, RngCore};
use tracing::{debug, info, warn};

use questionnaire_core::{
  questionnaire::QuestionSet,
  run::{NewRunInfo, RunInfo, RunInfoDetail},
  schedule::{NONCE_MAX, access_token, email_due, next_run_after, run_id_for},
  store::ReminderStore,
  subject::Subject,
};

use crate::{Error, Mailer, ReminderSettings, ReminderTemplates, Result};

// ─── Report ──────────────────────────────────────────────────────────────────

/// One line of the reminder report, per attempted email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
  Sent {
    runid:     String,
    surname:   String,
    givenname: String,
  },
  /// The server refused the message; `status` is the recorded status text.
  Refused {
    runid:     String,
    surname:   String,
    givenname: String,
    status:    String,
  },
  /// Any other error while handling the recipient.
  Exception {
    runid:   String,
    surname: String,
    error:   String,
  },
}

impl fmt::Display for ReportLine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Sent { runid, surname, givenname } => {
        write!(f, "[{runid}] {surname}, {givenname}: OK")
      }
      Self::Refused { runid, surname, givenname, status } => {
        write!(f, "[{runid}] {surname}, {givenname}: {status}")
      }
      Self::Exception { runid, surname, error } => {
        write!(f, "Exception: [{runid}] {surname}: {error}")
      }
    }
  }
}

/// The outcome of one reminder cycle, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderReport {
  pub lines: Vec<ReportLine>,
}

impl ReminderReport {
  pub fn sent(&self) -> usize {
    self.lines.iter().filter(|l| matches!(l, ReportLine::Sent { .. })).count()
  }

  /// Plain-text body returned by the HTTP trigger.
  pub fn to_http_body(&self) -> String {
    let lines: Vec<String> = self.lines.iter().map(ToString::to_string).collect();
    format!("Sent Questionnaire Emails:\n  {}", lines.join("\n  "))
  }
}

impl fmt::Display for ReminderReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, line) in self.lines.iter().enumerate() {
      if i > 0 {
        f.write_str("\n")?;
      }
      write!(f, "{line}")?;
    }
    Ok(())
  }
}

// ─── Job ─────────────────────────────────────────────────────────────────────

/// Everything one reminder cycle needs. Cloning is cheap.
pub struct Reminders<S, M> {
  pub store:     Arc<S>,
  pub mailer:    Arc<M>,
  pub templates: Arc<ReminderTemplates>,
  pub settings:  Arc<ReminderSettings>,
}

impl<S, M> Clone for Reminders<S, M> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      mailer:    Arc::clone(&self.mailer),
      templates: Arc::clone(&self.templates),
      settings:  Arc::clone(&self.settings),
    }
  }
}

impl<S, M> Reminders<S, M>
where
  S: ReminderStore,
  M: Mailer,
{
  /// Run one full reminder cycle for `questionnaire` (or the configured
  /// default) at `now`.
  ///
  /// Configuration and store errors while resolving the questionnaire or
  /// opening runs abort the cycle. Errors for a single recipient are
  /// reported in the returned lines and never stop the batch.
  pub async fn send_emails(
    &self,
    questionnaire: Option<&str>,
    now: DateTime<Utc>,
  ) -> Result<ReminderReport> {
    let name = questionnaire
      .or(self.settings.default_questionnaire.as_deref())
      .ok_or(Error::QuestionnaireNotConfigured)?;

    let questionnaire = self
      .store
      .find_questionnaire(name)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::QuestionnaireNotFound(name.to_owned()))?;

    let entry_set = self
      .store
      .question_sets(questionnaire.questionnaire_id)
      .await
      .map_err(Error::store)?
      .into_iter()
      .next()
      .ok_or_else(|| Error::NoQuestionSets(name.to_owned()))?;

    // New runs for every due subject, whether or not they receive email.
    let due = self
      .store
      .due_subjects(now.date_naive())
      .await
      .map_err(Error::store)?;
    for mut subject in due {
      let Some(nextrun) = subject.nextrun else { continue };
      self.open_run_info(&mut subject, nextrun, &entry_set).await?;
    }

    let candidates = self
      .store
      .email_run_infos(questionnaire.questionnaire_id)
      .await
      .map_err(Error::store)?;

    let mut report = ReminderReport::default();
    for mut detail in candidates {
      let decision = email_due(&detail, now);
      if !decision.should_send() {
        debug!(
          runinfo_id = detail.run_info.runinfo_id,
          runid = %detail.run.runid,
          ?decision,
          "reminder not due"
        );
        continue;
      }
      report.lines.push(self.attempt(&mut detail, now).await);
    }

    info!(
      questionnaire = name,
      attempted = report.lines.len(),
      sent = report.sent(),
      "reminder cycle finished"
    );
    Ok(report)
  }

  /// Create or reuse the `RunInfo` for the run starting on `nextrun`, point it
  /// at `questionset`, then advance the subject's next run by one year.
  ///
  /// An existing `RunInfo` keeps its token and email bookkeeping.
  pub async fn open_run_info(
    &self,
    subject: &mut Subject,
    nextrun: NaiveDate,
    questionset: &QuestionSet,
  ) -> Result<RunInfo> {
    let run = self
      .store
      .get_or_create_run(&run_id_for(nextrun))
      .await
      .map_err(Error::store)?;

    let existing = self
      .store
      .find_run_info(subject.subject_id, run.run_pk)
      .await
      .map_err(Error::store)?;

    let mut run_info = match existing {
      Some(existing) => existing,
      None => {
        let nonce = draw_nonce(&mut OsRng);
        self
          .store
          .insert_run_info(NewRunInfo {
            subject_id:     subject.subject_id,
            run_pk:         run.run_pk,
            random:         access_token(
              subject.subject_id,
              &subject.surname,
              subject.nextrun,
              nonce,
            ),
            questionset_id: Some(questionset.questionset_id),
          })
          .await
          .map_err(Error::store)?
      }
    };

    run_info.questionset_id = Some(questionset.questionset_id);
    self
      .store
      .update_run_info(&run_info)
      .await
      .map_err(Error::store)?;

    subject.nextrun = Some(next_run_after(nextrun)?);
    self
      .store
      .update_subject(subject)
      .await
      .map_err(Error::store)?;

    info!(
      subject_id = subject.subject_id,
      runid = %run.runid,
      nextrun = ?subject.nextrun,
      "opened run"
    );
    Ok(run_info)
  }

  async fn attempt(&self, detail: &mut RunInfoDetail, now: DateTime<Utc>) -> ReportLine {
    let runid = detail.run.runid.clone();
    let surname = detail.subject.surname.clone();

    match self.send_email(detail, now).await {
      Ok(true) => {
        info!(runinfo_id = detail.run_info.runinfo_id, %runid, "reminder sent");
        ReportLine::Sent {
          runid,
          surname,
          givenname: detail.subject.givenname.clone(),
        }
      }
      Ok(false) => {
        let status = detail.run_info.lastemailerror.clone().unwrap_or_default();
        warn!(runinfo_id = detail.run_info.runinfo_id, %runid, %status, "reminder refused");
        ReportLine::Refused {
          runid,
          surname,
          givenname: detail.subject.givenname.clone(),
          status,
        }
      }
      Err(e) => {
        warn!(runinfo_id = detail.run_info.runinfo_id, %runid, error = %e, "reminder failed");
        ReportLine::Exception {
          runid,
          surname,
          error: e.to_string(),
        }
      }
    }
  }
}

/// Uniform nonce in `1..=NONCE_MAX`; draws above the last whole multiple of
/// `NONCE_MAX` are rejected.
fn draw_nonce(rng: &mut impl RngCore) -> u32 {
  let zone = u32::MAX - u32::MAX % NONCE_MAX;
  loop {
    let n = rng.next_u32();
    if n < zone {
      return n % NONCE_MAX + 1;
    }
  }
}
