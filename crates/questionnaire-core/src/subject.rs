//! Subject — a person who answers the questionnaire once per run.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Error;

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  #[default]
  Unset,
  Male,
  Female,
}

/// Only active subjects enter new runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectState {
  #[default]
  Active,
  Inactive,
}

/// How a subject receives the questionnaire. Only `Email` subjects are sent
/// reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
  #[default]
  Email,
  Paperform,
}

macro_rules! string_enum {
  ($ty:ident, $field:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
    impl $ty {
      pub fn as_str(self) -> &'static str {
        match self {
          $(Self::$variant => $s,)+
        }
      }
    }

    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl FromStr for $ty {
      type Err = Error;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
          $($s => Ok(Self::$variant),)+
          other => Err(Error::UnknownVariant {
            field: $field,
            value: other.to_owned(),
          }),
        }
      }
    }
  };
}

string_enum!(Gender, "gender", {
  Unset => "unset",
  Male => "male",
  Female => "female",
});

string_enum!(SubjectState, "state", {
  Active => "active",
  Inactive => "inactive",
});

string_enum!(FormType, "formtype", {
  Email => "email",
  Paperform => "paperform",
});

// ─── Subject ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id: i64,
  pub surname:    String,
  pub givenname:  String,
  pub gender:     Gender,
  pub email:      Option<String>,
  /// Language tag used to pick the localised reminder template.
  pub language:   String,
  /// Date on which the subject enters its next run. `None` means never.
  pub nextrun:    Option<NaiveDate>,
  pub state:      SubjectState,
  pub formtype:   FormType,
}

/// Input to [`crate::store::ReminderStore::add_subject`].
#[derive(Debug, Clone)]
pub struct NewSubject {
  pub surname:   String,
  pub givenname: String,
  pub gender:    Gender,
  pub email:     Option<String>,
  pub language:  String,
  pub nextrun:   Option<NaiveDate>,
  pub state:     SubjectState,
  pub formtype:  FormType,
}

impl NewSubject {
  /// An active email subject with English as language and no next run.
  pub fn new(surname: impl Into<String>, givenname: impl Into<String>) -> Self {
    Self {
      surname:   surname.into(),
      givenname: givenname.into(),
      gender:    Gender::default(),
      email:     None,
      language:  "en".to_owned(),
      nextrun:   None,
      state:     SubjectState::default(),
      formtype:  FormType::default(),
    }
  }
}
