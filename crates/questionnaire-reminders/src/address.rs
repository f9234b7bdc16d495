//! Address parsing for reminder emails.
//!
//! Display names may contain any Unicode text. They are kept as-is in the
//! [`Mailbox`] and written as RFC 2047 encoded-words when the message is
//! formatted, so the headers on the wire are pure ASCII.

use lettre::{Address, message::Mailbox};
use questionnaire_core::subject::Subject;

use crate::{Error, Result};

/// Parse `addr@host`, `Name <addr@host>` or `"Name, Quoted" <addr@host>`.
pub fn encode_address(address: &str) -> Result<Mailbox> {
  address.trim().parse::<Mailbox>().map_err(|e| Error::Address {
    address: address.to_owned(),
    reason:  e.to_string(),
  })
}

/// `"{surname}, {givenname}" <{email}>` for a subject.
pub fn recipient(subject: &Subject) -> Result<Mailbox> {
  let email = subject
    .email
    .as_deref()
    .filter(|e| !e.trim().is_empty())
    .ok_or(Error::MissingEmail(subject.subject_id))?;

  let addr: Address = email.trim().parse().map_err(|e| Error::Address {
    address: email.to_owned(),
    reason:  format!("{e}"),
  })?;
  Ok(Mailbox::new(
    Some(format!("{}, {}", subject.surname, subject.givenname)),
    addr,
  ))
}
