//! The `Mailer` trait: the seam between the reminder job and mail transport.

use std::future::Future;

use lettre::message::{Mailbox, Message, header::ContentType};
use thiserror::Error;

/// A rendered reminder ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
  pub from:    Mailbox,
  pub to:      Mailbox,
  pub subject: String,
  pub body:    String,
}

impl OutgoingEmail {
  /// Build the RFC 5322 message. Non-ASCII header text is encoded by lettre.
  pub fn to_message(&self) -> Result<Message, MailError> {
    Message::builder()
      .from(self.from.clone())
      .to(self.to.clone())
      .subject(self.subject.clone())
      .header(ContentType::TEXT_PLAIN)
      .body(self.body.clone())
      .map_err(|e| MailError::Message(e.to_string()))
  }
}

/// A classified refusal by the SMTP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
  /// A `RCPT TO` was refused.
  RecipientRefused,
  /// The greeting or `EHLO` was answered with an error.
  HeloError,
  /// `MAIL FROM` was refused.
  SenderRefused,
  /// `DATA` or the message content was refused.
  DataError,
}

impl Rejection {
  /// The status text recorded on the `RunInfo`.
  pub fn status_message(self) -> &'static str {
    match self {
      Self::RecipientRefused => "SMTP Recipient Refused",
      Self::HeloError => "SMTP Helo Error",
      Self::SenderRefused => "SMTP Sender Refused",
      Self::DataError => "SMTP Data Error",
    }
  }
}

#[derive(Debug, Error)]
pub enum MailError {
  #[error("{}", .0.status_message())]
  Rejected(Rejection),

  #[error("cannot build message: {0}")]
  Message(String),

  #[error("transport error: {0}")]
  Transport(String),
}

/// Delivers one email per call.
///
/// Implementations return [`MailError::Rejected`] only for the four refusals
/// in [`Rejection`]; everything else is unclassified.
pub trait Mailer: Send + Sync {
  fn send<'a>(
    &'a self,
    email: &'a OutgoingEmail,
  ) -> impl Future<Output = Result<(), MailError>> + Send + 'a;
}
