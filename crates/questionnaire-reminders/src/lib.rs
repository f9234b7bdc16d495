//! The yearly reminder cycle of the questionnaire service.
//!
//! [`Reminders::send_emails`] moves due subjects into their next run and
//! emails every subject whose reminder is due, through any
//! [`ReminderStore`](questionnaire_core::store::ReminderStore) and any
//! [`Mailer`].

pub mod address;
pub mod delivery;
pub mod error;
pub mod job;
pub mod mailer;
pub mod settings;
pub mod smtp;
pub mod template;

pub use error::{Error, Result};
pub use job::{ReminderReport, ReportLine, Reminders};
pub use mailer::{MailError, Mailer, OutgoingEmail, Rejection};
pub use settings::{ReminderSettings, SmtpSecurity, SmtpSettings};
pub use smtp::SmtpMailer;
pub use template::ReminderTemplates;
