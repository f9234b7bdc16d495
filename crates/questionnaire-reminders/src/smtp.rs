//! [`SmtpMailer`] — delivers reminders over SMTP with lettre.
//!
//! Each message gets its own session, driven command by command so a refusal
//! can be attributed to the stage that caused it:
//!
//! | Stage | Refusal |
//! |-------|---------|
//! | greeting, `EHLO`, `STARTTLS` re-`EHLO` | [`Rejection::HeloError`] |
//! | `MAIL FROM` | [`Rejection::SenderRefused`] |
//! | `RCPT TO` | [`Rejection::RecipientRefused`] |
//! | `DATA`, message content | [`Rejection::DataError`] |
//!
//! Network, TLS, timeout and authentication failures are not refusals and
//! surface as [`MailError::Transport`].

use lettre::{
  Message,
  transport::smtp::{
    self,
    authentication::{Credentials, Mechanism},
    client::{SmtpConnection, TlsParameters},
    commands::{Data, Mail, Rcpt},
    extension::ClientId,
  },
};

use tracing::debug;

use crate::{MailError, Mailer, OutgoingEmail, Rejection, SmtpSecurity, SmtpSettings};

#[derive(Clone)]
pub struct SmtpMailer {
  settings: SmtpSettings,
}

impl SmtpMailer {
  pub fn new(settings: SmtpSettings) -> Self { Self { settings } }
}

impl Mailer for SmtpMailer {
  async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
    let message = email.to_message()?;
    let settings = self.settings.clone();

    tokio::task::spawn_blocking(move || deliver(&settings, &message))
      .await
      .map_err(|e| MailError::Transport(format!("smtp task failed: {e}")))?
  }
}

fn deliver(settings: &SmtpSettings, message: &Message) -> Result<(), MailError> {
  let hello = settings
    .hello_name
    .clone()
    .map(ClientId::Domain)
    .unwrap_or_default();

  let tls = match settings.security {
    SmtpSecurity::None => None,
    SmtpSecurity::StartTls | SmtpSecurity::Tls => {
      Some(TlsParameters::new(settings.host.clone()).map_err(transport)?)
    }
  };
  let implicit_tls = match settings.security {
    SmtpSecurity::Tls => tls.as_ref(),
    _ => None,
  };

  let mut conn = SmtpConnection::connect(
    (settings.host.as_str(), settings.port),
    Some(settings.timeout()),
    &hello,
    implicit_tls,
    None,
  )
  .map_err(|e| classify(e, Rejection::HeloError))?;

  if let (SmtpSecurity::StartTls, Some(tls)) = (settings.security, tls.as_ref()) {
    if !conn.can_starttls() {
      return Err(MailError::Transport("server does not offer STARTTLS".to_owned()));
    }
    conn
      .starttls(tls, &hello)
      .map_err(|e| classify(e, Rejection::HeloError))?;
  }

  if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
    let credentials = Credentials::new(username.clone(), password.clone());
    conn
      .auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
      .map_err(transport)?;
  }

  let sent = transmit(&mut conn, message);
  // A refused transaction still ends the session cleanly.
  if !matches!(sent, Err(MailError::Transport(_)))
    && let Err(e) = conn.quit()
  {
    debug!(error = %e, "SMTP QUIT failed");
  }
  sent
}

/// `MAIL`, `RCPT`, `DATA` and the message itself on an open session.
fn transmit(conn: &mut SmtpConnection, message: &Message) -> Result<(), MailError> {
  let envelope = message.envelope();
  conn
    .command(Mail::new(envelope.from().cloned(), vec![]))
    .map_err(|e| classify(e, Rejection::SenderRefused))?;
  for to in envelope.to() {
    conn
      .command(Rcpt::new(to.clone(), vec![]))
      .map_err(|e| classify(e, Rejection::RecipientRefused))?;
  }
  conn
    .command(Data)
    .map_err(|e| classify(e, Rejection::DataError))?;
  conn
    .message(&message.formatted())
    .map_err(|e| classify(e, Rejection::DataError))?;
  Ok(())
}

/// A negative server reply at `stage` is a refusal; anything else is a
/// transport failure.
fn classify(err: smtp::Error, stage: Rejection) -> MailError {
  if err.is_permanent() || err.is_transient() {
    debug!(error = %err, ?stage, "SMTP server refused");
    MailError::Rejected(stage)
  } else {
    transport(err)
  }
}

fn transport(err: smtp::Error) -> MailError { MailError::Transport(err.to_string()) }

#[cfg(test)]
mod tests {
  use std::{
    io::{BufRead, BufReader, Write},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    thread,
  };

  use super::*;
  use crate::address::encode_address;

  /// Reply code the scripted server sends for each stage.
  #[derive(Clone, Copy)]
  struct Script {
    greeting: &'static str,
    ehlo:     &'static str,
    mail:     &'static str,
    rcpt:     &'static str,
    data:     &'static str,
    message:  &'static str,
  }

  const ACCEPT_ALL: Script = Script {
    greeting: "220 test ESMTP",
    ehlo:     "250 test",
    mail:     "250 2.1.0 Ok",
    rcpt:     "250 2.1.5 Ok",
    data:     "354 End data with <CR><LF>.<CR><LF>",
    message:  "250 2.0.0 Queued",
  };

  fn reply(w: &mut TcpStream, line: &str) {
    let _ = w.write_all(format!("{line}\r\n").as_bytes());
  }

  /// Serve one SMTP session on a local port; the received commands are sent
  /// back over the returned channel when the client disconnects.
  fn serve(script: Script) -> (u16, mpsc::Receiver<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
      let (stream, _) = listener.accept().unwrap();
      let mut writer = stream.try_clone().unwrap();
      let mut reader = BufReader::new(stream);
      let mut seen = Vec::new();

      reply(&mut writer, script.greeting);
      let mut line = String::new();
      while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
        let command = line.trim_end().to_owned();
        line.clear();
        let verb = command.split([' ', ':']).next().unwrap_or("").to_uppercase();
        seen.push(command);
        match verb.as_str() {
          "EHLO" | "HELO" => reply(&mut writer, script.ehlo),
          "MAIL" => reply(&mut writer, script.mail),
          "RCPT" => reply(&mut writer, script.rcpt),
          "DATA" => {
            reply(&mut writer, script.data);
            if !script.data.starts_with('3') {
              continue;
            }
            let mut body = String::new();
            while reader.read_line(&mut body).map(|n| n > 0).unwrap_or(false) {
              if body.trim_end() == "." {
                break;
              }
              body.clear();
            }
            reply(&mut writer, script.message);
          }
          "QUIT" => {
            reply(&mut writer, "221 Bye");
            break;
          }
          _ => reply(&mut writer, "502 Command not implemented"),
        }
      }
      let _ = tx.send(seen);
    });

    (port, rx)
  }

  fn mailer(port: u16) -> SmtpMailer {
    SmtpMailer::new(SmtpSettings {
      host:         "127.0.0.1".to_owned(),
      port,
      hello_name:   Some("client.test".to_owned()),
      timeout_secs: 5,
      ..SmtpSettings::default()
    })
  }

  fn email() -> OutgoingEmail {
    OutgoingEmail {
      from:    encode_address("Survey <survey+7zab12cd@example.org>").unwrap(),
      to:      encode_address(r#""Muster, Erika" <erika@example.org>"#).unwrap(),
      subject: "Reminder".to_owned(),
      body:    "Please answer.\n".to_owned(),
    }
  }

  async fn send_with(script: Script) -> (Result<(), MailError>, Vec<String>) {
    let (port, rx) = serve(script);
    let result = mailer(port).send(&email()).await;
    let seen = rx.recv().unwrap();
    (result, seen)
  }

  #[tokio::test]
  async fn accepted_message_goes_through_every_stage() {
    let (result, seen) = send_with(ACCEPT_ALL).await;
    assert!(result.is_ok(), "{result:?}");
    assert!(seen.iter().any(|c| c == "EHLO client.test"), "{seen:?}");
    assert!(seen.iter().any(|c| c == "MAIL FROM:<survey+7zab12cd@example.org>"), "{seen:?}");
    assert!(seen.iter().any(|c| c == "RCPT TO:<erika@example.org>"), "{seen:?}");
    assert!(seen.iter().any(|c| c == "DATA"), "{seen:?}");
    assert_eq!(seen.last().map(String::as_str), Some("QUIT"), "{seen:?}");
  }

  #[tokio::test]
  async fn refused_recipient_is_classified() {
    let script = Script { rcpt: "550 5.1.1 No such user", ..ACCEPT_ALL };
    let (result, seen) = send_with(script).await;
    assert!(matches!(result, Err(MailError::Rejected(Rejection::RecipientRefused))));
    assert!(!seen.iter().any(|c| c == "DATA"), "{seen:?}");
    assert_eq!(seen.last().map(String::as_str), Some("QUIT"), "{seen:?}");
  }

  #[tokio::test]
  async fn refused_sender_is_classified() {
    let script = Script { mail: "553 5.7.1 Sender rejected", ..ACCEPT_ALL };
    let (result, seen) = send_with(script).await;
    assert!(matches!(result, Err(MailError::Rejected(Rejection::SenderRefused))));
    assert_eq!(seen.last().map(String::as_str), Some("QUIT"), "{seen:?}");
  }

  #[tokio::test]
  async fn refused_ehlo_is_classified() {
    let script = Script { ehlo: "554 5.7.1 Go away", ..ACCEPT_ALL };
    let (result, _) = send_with(script).await;
    assert!(matches!(result, Err(MailError::Rejected(Rejection::HeloError))));
  }

  #[tokio::test]
  async fn refused_message_is_classified() {
    let script = Script { message: "552 5.3.4 Message too big", ..ACCEPT_ALL };
    let (result, seen) = send_with(script).await;
    assert!(matches!(result, Err(MailError::Rejected(Rejection::DataError))));
    assert_eq!(seen.last().map(String::as_str), Some("QUIT"), "{seen:?}");
  }

  #[tokio::test]
  async fn unreachable_server_is_a_transport_error() {
    let port = {
      let listener = TcpListener::bind("127.0.0.1:0").unwrap();
      listener.local_addr().unwrap().port()
    };
    let result = mailer(port).send(&email()).await;
    assert!(matches!(result, Err(MailError::Transport(_))), "{result:?}");
  }
}
