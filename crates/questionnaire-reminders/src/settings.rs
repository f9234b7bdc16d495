//! Reminder job settings, deserialised from the `[reminders]` table of the
//! server configuration.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

/// Token in [`ReminderSettings::email_from`] replaced with the run's access
/// token, so replies can be routed per recipient.
pub const RUNINFO_PLACEHOLDER: &str = "$RUNINFO";

/// Value of the `site` template variable when no site URL is configured.
pub const SITE_URL_UNSET: &str = "(site_url not set)";

#[derive(Deserialize, Clone)]
pub struct ReminderSettings {
  /// Questionnaire used when the caller does not name one.
  pub default_questionnaire: Option<String>,
  /// Shared secret for the HTTP trigger; the trigger is disabled when unset.
  pub email_code:            Option<String>,
  /// Sender address, e.g. `Survey <survey+$RUNINFO@example.org>`.
  pub email_from:            String,
  pub site_url:              Option<String>,
  #[serde(default = "default_template_dir")]
  pub template_dir:          PathBuf,
  #[serde(default = "default_email_template")]
  pub email_template:        String,
  #[serde(default)]
  pub smtp:                  SmtpSettings,
}

fn default_template_dir() -> PathBuf { PathBuf::from("templates") }

fn default_email_template() -> String { "reminder.txt".to_owned() }

impl ReminderSettings {
  /// The sender address for one run, with the placeholder substituted.
  pub fn sender_for(&self, random: &str) -> String {
    self.email_from.replace(RUNINFO_PLACEHOLDER, random)
  }

  pub fn site(&self) -> &str { self.site_url.as_deref().unwrap_or(SITE_URL_UNSET) }
}

// ─── SMTP ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
  /// Plain-text session.
  #[default]
  None,
  /// Upgrade with `STARTTLS` after `EHLO`.
  StartTls,
  /// TLS from the first byte (usually port 465).
  Tls,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct SmtpSettings {
  pub host:         String,
  pub port:         u16,
  pub security:     SmtpSecurity,
  pub username:     Option<String>,
  pub password:     Option<String>,
  /// Name sent with `EHLO`; defaults to the local hostname.
  pub hello_name:   Option<String>,
  pub timeout_secs: u64,
}

impl Default for SmtpSettings {
  fn default() -> Self {
    Self {
      host:         "localhost".to_owned(),
      port:         25,
      security:     SmtpSecurity::None,
      username:     None,
      password:     None,
      hello_name:   None,
      timeout_secs: 30,
    }
  }
}

impl SmtpSettings {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}
