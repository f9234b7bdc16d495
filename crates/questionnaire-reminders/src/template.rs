//! Localised reminder templates, rendered with Tera.
//!
//! The first line of the rendered output is the email subject; everything
//! after the first line break is the body.

use std::path::Path;

use chrono::{DateTime, Utc};
use questionnaire_core::subject::Gender;
use serde::Serialize;
use tera::Tera;

use crate::{Error, Result};

/// Variables available to the reminder template.
#[derive(Debug, Serialize)]
pub struct EmailContext<'a> {
  pub surname:   &'a str,
  pub givenname: &'a str,
  pub gender:    Gender,
  pub email:     &'a str,
  pub random:    &'a str,
  pub runid:     &'a str,
  pub created:   DateTime<Utc>,
  pub site:      &'a str,
  pub language:  &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
  pub subject: String,
  pub body:    String,
}

/// The reminder template in every available language.
///
/// Localised variants live in a subdirectory named after the language tag,
/// e.g. `de/reminder.txt` next to the fallback `reminder.txt`.
pub struct ReminderTemplates {
  tera:     Tera,
  template: String,
}

impl ReminderTemplates {
  /// Load every template below `dir`.
  pub fn load(dir: &Path, template: impl Into<String>) -> Result<Self> {
    let glob = format!("{}/**/*", dir.display());
    Self::from_tera(Tera::new(&glob)?, template)
  }

  /// Wrap an already populated `Tera` instance.
  ///
  /// Fails if neither `template` nor any localised variant of it exists.
  pub fn from_tera(tera: Tera, template: impl Into<String>) -> Result<Self> {
    let template = template.into();
    let suffix = format!("/{template}");
    let found = tera
      .get_template_names()
      .any(|name| name == template || name.ends_with(&suffix));
    if !found {
      return Err(Error::TemplateNotFound(template));
    }
    Ok(Self { tera, template })
  }

  /// The template name used for `language`: `{lang}/{t}`, then
  /// `{primary subtag}/{t}`, then `{t}`.
  pub fn resolve(&self, language: &str) -> String {
    let lang = language.trim().to_lowercase().replace('_', "-");
    let primary = lang.split('-').next().unwrap_or_default();

    let mut candidates = Vec::with_capacity(3);
    if !lang.is_empty() {
      candidates.push(format!("{lang}/{}", self.template));
      if primary != lang {
        candidates.push(format!("{primary}/{}", self.template));
      }
    }

    candidates
      .into_iter()
      .find(|name| self.has(name))
      .unwrap_or_else(|| self.template.clone())
  }

  pub fn render(&self, context: &EmailContext<'_>) -> Result<RenderedEmail> {
    let name = self.resolve(context.language);
    if !self.has(&name) {
      return Err(Error::TemplateNotFound(name));
    }
    let ctx = tera::Context::from_serialize(context)?;
    split_subject(&self.tera.render(&name, &ctx)?)
  }

  fn has(&self, name: &str) -> bool { self.tera.get_template_names().any(|n| n == name) }
}

/// Split rendered output into subject (first line, trimmed) and body.
pub fn split_subject(rendered: &str) -> Result<RenderedEmail> {
  let (subject, body) = rendered.split_once('\n').ok_or(Error::MissingSubjectLine)?;
  Ok(RenderedEmail {
    subject: subject.trim().to_owned(),
    body:    body.to_owned(),
  })
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn templates() -> ReminderTemplates {
    let mut tera = Tera::default();
    tera
      .add_raw_templates(vec![
        ("reminder.txt", "Reminder for {{ givenname }}\nPlease answer: {{ site }}/{{ random }}\n"),
        ("de/reminder.txt", "Erinnerung für {{ givenname }}\nBitte antworten: {{ site }}/{{ random }}\n"),
      ])
      .unwrap();
    ReminderTemplates::from_tera(tera, "reminder.txt").unwrap()
  }

  fn context(language: &str) -> EmailContext<'_> {
    EmailContext {
      surname: "Muster",
      givenname: "Erika",
      gender: Gender::Female,
      email: "erika@example.org",
      random: "7zab12cd",
      runid: "2024",
      created: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
      site: "https://survey.example.org",
      language,
    }
  }

  #[test]
  fn resolves_exact_then_primary_then_fallback() {
    let t = templates();
    assert_eq!(t.resolve("de"), "de/reminder.txt");
    assert_eq!(t.resolve("de-CH"), "de/reminder.txt");
    assert_eq!(t.resolve("de_ch"), "de/reminder.txt");
    assert_eq!(t.resolve("fr"), "reminder.txt");
    assert_eq!(t.resolve(""), "reminder.txt");
  }

  #[test]
  fn first_line_is_the_subject() {
    let rendered = templates().render(&context("de")).unwrap();
    assert_eq!(rendered.subject, "Erinnerung für Erika");
    assert_eq!(rendered.body, "Bitte antworten: https://survey.example.org/7zab12cd\n");
  }

  #[test]
  fn subject_is_trimmed() {
    let rendered = split_subject("  Hello  \r\nbody").unwrap();
    assert_eq!(rendered.subject, "Hello");
    assert_eq!(rendered.body, "body");
  }

  #[test]
  fn single_line_output_is_an_error() {
    assert!(matches!(split_subject("only a subject"), Err(Error::MissingSubjectLine)));
  }

  #[test]
  fn missing_template_is_rejected_up_front() {
    let result = ReminderTemplates::from_tera(Tera::default(), "reminder.txt");
    assert!(matches!(result, Err(Error::TemplateNotFound(_))));
  }

  #[test]
  fn localised_only_template_without_fallback_fails_for_other_languages() {
    let mut tera = Tera::default();
    tera.add_raw_template("de/reminder.txt", "Betreff\nText").unwrap();
    let t = ReminderTemplates::from_tera(tera, "reminder.txt").unwrap();
    assert!(t.render(&context("de")).is_ok());
    assert!(matches!(t.render(&context("en")), Err(Error::TemplateNotFound(_))));
  }
}
