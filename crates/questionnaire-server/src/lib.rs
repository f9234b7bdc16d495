//! HTTP surface of the questionnaire reminder service.
//!
//! Exposes an axum [`Router`] with the keyed reminder trigger, backed by any
//! [`ReminderStore`] and any [`Mailer`].

pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::{Query, State},
  http::header,
  response::{IntoResponse, Response},
  routing::get,
};
use chrono::Utc;
use questionnaire_core::store::ReminderStore;
use questionnaire_reminders::{Mailer, ReminderSettings, Reminders};
use serde::Deserialize;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::error;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and `QUESTIONNAIRE__*`
/// environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  pub reminders:  ReminderSettings,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8000 }

fn default_store_path() -> PathBuf { PathBuf::from("questionnaire.db") }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the handlers.
pub struct AppState<S, M> {
  pub reminders: Reminders<S, M>,
  /// Held for the length of a cycle so overlapping triggers queue up.
  pub run_lock:  Arc<Mutex<()>>,
}

impl<S, M> AppState<S, M> {
  pub fn new(reminders: Reminders<S, M>) -> Self {
    Self { reminders, run_lock: Arc::new(Mutex::new(())) }
  }
}

impl<S, M> Clone for AppState<S, M> {
  fn clone(&self) -> Self {
    Self {
      reminders: self.reminders.clone(),
      run_lock:  Arc::clone(&self.run_lock),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the reminder service.
pub fn router<S, M>(state: AppState<S, M>) -> Router
where
  S: ReminderStore + 'static,
  M: Mailer + 'static,
{
  Router::new()
    .route("/emails/", get(send_emails_handler::<S, M>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[derive(Deserialize)]
pub struct TriggerQuery {
  code: Option<String>,
}

/// `GET /emails/?code=…`: run one reminder cycle for the default
/// questionnaire and list the attempted emails.
async fn send_emails_handler<S, M>(
  State(state): State<AppState<S, M>>,
  Query(query): Query<TriggerQuery>,
) -> Result<Response, Error>
where
  S: ReminderStore + 'static,
  M: Mailer + 'static,
{
  let expected = state
    .reminders
    .settings
    .email_code
    .as_deref()
    .filter(|code| !code.is_empty())
    .ok_or(Error::NotFound)?;
  if query.code.as_deref() != Some(expected) {
    return Err(Error::NotFound);
  }

  let _running = state.run_lock.lock().await;
  let report = state
    .reminders
    .send_emails(None, Utc::now())
    .await
    .inspect_err(|e| error!(error = %e, "reminder cycle aborted"))?;

  Ok(
    (
      [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
      report.to_http_body(),
    )
      .into_response(),
  )
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Mutex as StdMutex;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use chrono::{Days, Utc};
  use questionnaire_core::subject::NewSubject;
  use questionnaire_reminders::{
    MailError, OutgoingEmail, ReminderTemplates, SmtpSettings,
  };
  use questionnaire_store_sqlite::SqliteStore;
  use tera::Tera;
  use tower::ServiceExt;

  use super::*;

  #[derive(Default)]
  struct Outbox(StdMutex<Vec<OutgoingEmail>>);

  impl Mailer for Outbox {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
      self.0.lock().unwrap().push(email.clone());
      Ok(())
    }
  }

  async fn make_state(
    email_code: Option<&str>,
    default_questionnaire: Option<&str>,
  ) -> AppState<SqliteStore, Outbox> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let questionnaire = store.add_questionnaire("yearly-survey").await.unwrap();
    store
      .add_question_set(questionnaire.questionnaire_id, 1, "welcome")
      .await
      .unwrap();
    let yesterday = Utc::now().date_naive() - Days::new(1);
    store
      .add_subject(NewSubject {
        email: Some("ada@example.org".into()),
        nextrun: Some(yesterday),
        ..NewSubject::new("Lovelace", "Ada")
      })
      .await
      .unwrap();

    let mut tera = Tera::default();
    tera
      .add_raw_template("reminder.txt", "Questionnaire {{ runid }}\nHello {{ givenname }}\n")
      .unwrap();

    AppState::new(Reminders {
      store:     Arc::new(store),
      mailer:    Arc::new(Outbox::default()),
      templates: Arc::new(ReminderTemplates::from_tera(tera, "reminder.txt").unwrap()),
      settings:  Arc::new(ReminderSettings {
        default_questionnaire: default_questionnaire.map(str::to_owned),
        email_code:            email_code.map(str::to_owned),
        email_from:            "survey@example.org".to_owned(),
        site_url:              None,
        template_dir:          PathBuf::from("templates"),
        email_template:        "reminder.txt".to_owned(),
        smtp:                  SmtpSettings::default(),
      }),
    })
  }

  async fn get(state: AppState<SqliteStore, Outbox>, uri: &str) -> (StatusCode, String) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
  }

  #[tokio::test]
  async fn correct_code_runs_the_cycle() {
    let state = make_state(Some("s3cret"), Some("yearly-survey")).await;
    let outbox = Arc::clone(&state.reminders.mailer);
    let runid = (Utc::now().date_naive() - Days::new(1)).format("%Y").to_string();

    let req = Request::builder().uri("/emails/?code=s3cret").body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/plain"), "{content_type}");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(
      std::str::from_utf8(&bytes).unwrap(),
      format!("Sent Questionnaire Emails:\n  [{runid}] Lovelace, Ada: OK")
    );
    assert_eq!(outbox.0.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn second_trigger_sends_nothing_new() {
    let state = make_state(Some("s3cret"), Some("yearly-survey")).await;
    get(state.clone(), "/emails/?code=s3cret").await;

    let (status, body) = get(state.clone(), "/emails/?code=s3cret").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Sent Questionnaire Emails:\n  ");
    assert_eq!(state.reminders.mailer.0.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn wrong_code_is_not_found() {
    let state = make_state(Some("s3cret"), Some("yearly-survey")).await;
    let outbox = Arc::clone(&state.reminders.mailer);
    let (status, _) = get(state, "/emails/?code=guess").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(outbox.0.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn missing_code_is_not_found() {
    let state = make_state(Some("s3cret"), Some("yearly-survey")).await;
    let (status, _) = get(state, "/emails/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn trigger_disabled_without_configured_code() {
    let state = make_state(None, Some("yearly-survey")).await;
    let (status, _) = get(state, "/emails/?code=").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn configuration_error_is_500() {
    let state = make_state(Some("s3cret"), None).await;
    let (status, body) = get(state, "/emails/?code=s3cret").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("default_questionnaire"), "{body}");
  }
}
