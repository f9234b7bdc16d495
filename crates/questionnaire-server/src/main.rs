//! `questionnaire` binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, and either runs one reminder cycle, serves the HTTP trigger, or
//! enrols questionnaires and subjects.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use questionnaire_core::{
  store::ReminderStore,
  subject::{FormType, Gender, NewSubject, SubjectState},
};
use questionnaire_reminders::{ReminderTemplates, Reminders, SmtpMailer};
use questionnaire_server::{AppState, ServerConfig};
use questionnaire_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Questionnaire reminder service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Open runs for due subjects and send due reminder emails.
  SendEmails {
    /// Questionnaire name; defaults to `reminders.default_questionnaire`.
    #[arg(long)]
    questionnaire: Option<String>,
  },
  /// Serve the HTTP trigger at `/emails/`.
  Serve,
  /// Create a questionnaire with its question sets.
  AddQuestionnaire {
    name: String,
    /// Question set as `SORTID:HEADING`; repeatable.
    #[arg(long = "questionset", value_parser = parse_question_set)]
    question_sets: Vec<(i32, String)>,
  },
  /// Enrol a subject.
  AddSubject {
    #[arg(long)]
    surname:   String,
    #[arg(long)]
    givenname: String,
    #[arg(long)]
    email:     Option<String>,
    #[arg(long, default_value = "en")]
    language:  String,
    #[arg(long, default_value = "unset")]
    gender:    Gender,
    /// First run date, `YYYY-MM-DD`.
    #[arg(long)]
    nextrun:   Option<NaiveDate>,
    #[arg(long, default_value = "email")]
    formtype:  FormType,
    #[arg(long)]
    inactive:  bool,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("QUESTIONNAIRE").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::SendEmails { questionnaire } => {
      let reminders = build_reminders(store, &server_cfg)?;
      let report = reminders
        .send_emails(questionnaire.as_deref(), Utc::now())
        .await
        .context("reminder cycle failed")?;
      if !report.lines.is_empty() {
        println!("{report}");
      }
    }

    Command::Serve => {
      let reminders = build_reminders(store, &server_cfg)?;
      if server_cfg.reminders.email_code.is_none() {
        tracing::warn!("reminders.email_code is not set; /emails/ will answer 404");
      }
      let app = questionnaire_server::router(AppState::new(reminders));
      let address = format!("{}:{}", server_cfg.host, server_cfg.port);

      tracing::info!("Listening on http://{address}");
      let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

      axum::serve(listener, app).await.context("server error")?;
    }

    Command::AddQuestionnaire { name, question_sets } => {
      let questionnaire = store
        .add_questionnaire(&name)
        .await
        .with_context(|| format!("failed to add questionnaire {name:?}"))?;
      for (sortid, heading) in &question_sets {
        store
          .add_question_set(questionnaire.questionnaire_id, *sortid, heading)
          .await
          .with_context(|| format!("failed to add question set {heading:?}"))?;
      }
      println!("{}", questionnaire.questionnaire_id);
    }

    Command::AddSubject {
      surname,
      givenname,
      email,
      language,
      gender,
      nextrun,
      formtype,
      inactive,
    } => {
      let subject = store
        .add_subject(NewSubject {
          email,
          language,
          gender,
          nextrun,
          formtype,
          state: if inactive { SubjectState::Inactive } else { SubjectState::Active },
          ..NewSubject::new(surname, givenname)
        })
        .await
        .context("failed to add subject")?;
      println!("{}", subject.subject_id);
    }
  }

  Ok(())
}

fn build_reminders(
  store: SqliteStore,
  config: &ServerConfig,
) -> anyhow::Result<Reminders<SqliteStore, SmtpMailer>> {
  let settings = &config.reminders;
  let template_dir = expand_tilde(&settings.template_dir);
  let templates = ReminderTemplates::load(&template_dir, settings.email_template.clone())
    .with_context(|| format!("failed to load email templates from {template_dir:?}"))?;

  Ok(Reminders {
    store:     Arc::new(store),
    mailer:    Arc::new(SmtpMailer::new(settings.smtp.clone())),
    templates: Arc::new(templates),
    settings:  Arc::new(settings.clone()),
  })
}

/// Parse `SORTID:HEADING`.
fn parse_question_set(s: &str) -> Result<(i32, String), String> {
  let (sortid, heading) = s
    .split_once(':')
    .ok_or_else(|| format!("expected SORTID:HEADING, got {s:?}"))?;
  let sortid = sortid
    .trim()
    .parse()
    .map_err(|e| format!("invalid sort id {sortid:?}: {e}"))?;
  Ok((sortid, heading.trim().to_owned()))
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
