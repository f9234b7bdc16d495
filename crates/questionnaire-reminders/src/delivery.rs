//! Rendering and sending one reminder.

use chrono::{DateTime, Utc};
use questionnaire_core::{run::RunInfoDetail, store::ReminderStore};

use crate::{
  Error, MailError, Mailer, OutgoingEmail, Reminders, Result,
  address::{encode_address, recipient},
  template::EmailContext,
};

/// Status recorded on a `RunInfo` after a successful send.
pub const ACCEPTED_STATUS: &str = "OK, accepted by server";

impl<S, M> Reminders<S, M>
where
  S: ReminderStore,
  M: Mailer,
{
  /// Render and send the reminder for `detail`, updating its bookkeeping.
  ///
  /// Returns `Ok(true)` when the server accepted the message and `Ok(false)`
  /// when it refused it for one of the classified reasons; in that case only
  /// `lastemailerror` changes. Every other failure is returned as an error
  /// and leaves the `RunInfo` untouched.
  pub async fn send_email(&self, detail: &mut RunInfoDetail, now: DateTime<Utc>) -> Result<bool> {
    let email = self.compose(detail)?;

    let info = &mut detail.run_info;
    match self.mailer.send(&email).await {
      Ok(()) => {
        info.emailcount += 1;
        info.emailsent = Some(now);
        info.lastemailerror = Some(ACCEPTED_STATUS.to_owned());
        self.store.update_run_info(info).await.map_err(Error::store)?;
        Ok(true)
      }
      Err(MailError::Rejected(rejection)) => {
        info.lastemailerror = Some(rejection.status_message().to_owned());
        self.store.update_run_info(info).await.map_err(Error::store)?;
        Ok(false)
      }
      Err(MailError::Message(reason)) => Err(Error::Message(reason)),
      Err(MailError::Transport(reason)) => Err(Error::Transport(reason)),
    }
  }

  /// Build the message for `detail` in the subject's language.
  pub fn compose(&self, detail: &RunInfoDetail) -> Result<OutgoingEmail> {
    let subject = &detail.subject;
    let to = recipient(subject)?;
    let from = encode_address(&self.settings.sender_for(&detail.run_info.random))?;

    let to_address = to.email.to_string();
    let rendered = self.templates.render(&EmailContext {
      surname:   &subject.surname,
      givenname: &subject.givenname,
      gender:    subject.gender,
      email:     &to_address,
      random:    &detail.run_info.random,
      runid:     &detail.run.runid,
      created:   detail.run_info.created,
      site:      self.settings.site(),
      language:  &subject.language,
    })?;

    Ok(OutgoingEmail {
      from,
      to,
      subject: rendered.subject,
      body: rendered.body,
    })
  }
}
