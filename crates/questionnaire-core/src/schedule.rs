//! Scheduling rules of the reminder cycle: yearly advance, run ids, access
//! tokens and resend eligibility.
//!
//! Everything here is pure; the reminder job supplies `now` and the random
//! nonce so the rules can be tested without a clock or an RNG.

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use sha2::{Digest, Sha256};

use crate::{Error, Result, run::RunInfoDetail};

/// Minimum number of seconds between two reminders for the same `RunInfo`.
pub const RESEND_INTERVAL_SECS: i64 = 7 * 24 * 60 * 60;

/// [`RESEND_INTERVAL_SECS`] as a duration.
pub fn resend_interval() -> TimeDelta { TimeDelta::seconds(RESEND_INTERVAL_SECS) }

/// Upper bound (inclusive) of the nonce mixed into access tokens.
pub const NONCE_MAX: u32 = 999_999;

/// Number of hex digits of the digest kept in an access token.
const TOKEN_HEX_LEN: usize = 6;

/// The same month and day one year after `date`.
///
/// February 29th maps to February 28th of the following year, never to
/// March 1st.
pub fn next_run_after(date: NaiveDate) -> Result<NaiveDate> {
  let year = date.year() + 1;
  let (month, day) = match (date.month(), date.day()) {
    (2, 29) => (2, 28),
    md => md,
  };
  NaiveDate::from_ymd_opt(year, month, day).ok_or(Error::DateOutOfRange(date))
}

/// The run identifier for a subject whose next run falls on `date`.
pub fn run_id_for(date: NaiveDate) -> String { date.year().to_string() }

/// Build a short access token of the form `{subject_id}z{hex}`.
///
/// The hex part is a truncated SHA-256 over the surname, the next-run date and
/// `nonce`; callers draw `nonce` uniformly from `1..=NONCE_MAX`.
pub fn access_token(
  subject_id: i64,
  surname: &str,
  nextrun: Option<NaiveDate>,
  nonce: u32,
) -> String {
  let nextrun = nextrun.map(|d| d.to_string()).unwrap_or_default();

  let mut hasher = Sha256::new();
  hasher.update(surname.as_bytes());
  hasher.update(nextrun.as_bytes());
  hasher.update(format!("{nonce:#x}").as_bytes());
  let digest = hex::encode(hasher.finalize());

  format!("{subject_id}z{}", &digest[..TOKEN_HEX_LEN])
}

// ─── Resend eligibility ──────────────────────────────────────────────────────

/// Outcome of [`email_due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailDecision {
  Send,
  /// The run is a test run.
  SkipTestRun,
  /// `emailcount` is -1.
  SkipSuppressed,
  /// The last reminder went out no more than [`RESEND_INTERVAL_SECS`] ago.
  SkipRecent,
}

impl EmailDecision {
  pub fn should_send(self) -> bool { matches!(self, Self::Send) }
}

/// Decide whether a reminder is due for `detail` at `now`.
pub fn email_due(detail: &RunInfoDetail, now: DateTime<Utc>) -> EmailDecision {
  let info = &detail.run_info;

  if detail.run.is_test() {
    return EmailDecision::SkipTestRun;
  }
  if info.is_suppressed() {
    return EmailDecision::SkipSuppressed;
  }
  if info.never_sent() {
    return EmailDecision::Send;
  }
  match info.emailsent {
    Some(sent) if sent >= now - resend_interval() => EmailDecision::SkipRecent,
    _ => EmailDecision::Send,
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::{
    run::{Run, RunInfo},
    subject::{FormType, Gender, Subject, SubjectState},
  };

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn detail(runid: &str, emailcount: i32, emailsent: Option<DateTime<Utc>>) -> RunInfoDetail {
    RunInfoDetail {
      run_info: RunInfo {
        runinfo_id:     1,
        subject_id:     7,
        run_pk:         1,
        random:         "7zabcdef".into(),
        created:        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        emailcount,
        emailsent,
        lastemailerror: None,
        questionset_id: Some(1),
      },
      subject:  Subject {
        subject_id: 7,
        surname:    "Muster".into(),
        givenname:  "Erika".into(),
        gender:     Gender::Female,
        email:      Some("erika@example.org".into()),
        language:   "de".into(),
        nextrun:    Some(date(2025, 3, 1)),
        state:      SubjectState::Active,
        formtype:   FormType::Email,
      },
      run:      Run { run_pk: 1, runid: runid.into() },
    }
  }

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap() }

  // ── next_run_after ────────────────────────────────────────────────────────

  #[test]
  fn leap_day_maps_to_feb_28() {
    assert_eq!(next_run_after(date(2024, 2, 29)).unwrap(), date(2025, 2, 28));
  }

  #[test]
  fn ordinary_dates_keep_month_and_day() {
    for (m, d) in [(1, 1), (2, 28), (3, 1), (12, 31), (6, 30)] {
      assert_eq!(next_run_after(date(2023, m, d)).unwrap(), date(2024, m, d));
    }
  }

  #[test]
  fn feb_28_before_a_leap_year_stays_feb_28() {
    assert_eq!(next_run_after(date(2023, 2, 28)).unwrap(), date(2024, 2, 28));
  }

  #[test]
  fn max_date_overflows() {
    assert!(matches!(
      next_run_after(NaiveDate::MAX),
      Err(Error::DateOutOfRange(_))
    ));
  }

  #[test]
  fn run_id_is_the_year() {
    assert_eq!(run_id_for(date(2024, 2, 29)), "2024");
  }

  // ── access_token ──────────────────────────────────────────────────────────

  #[test]
  fn token_has_subject_prefix_and_six_hex_digits() {
    let token = access_token(42, "Muster", Some(date(2024, 5, 1)), 1234);
    let (id, hash) = token.split_once('z').unwrap();
    assert_eq!(id, "42");
    assert_eq!(hash.len(), 6);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn token_depends_on_nonce() {
    let a = access_token(42, "Muster", Some(date(2024, 5, 1)), 1);
    let b = access_token(42, "Muster", Some(date(2024, 5, 1)), 2);
    assert_eq!(a, access_token(42, "Muster", Some(date(2024, 5, 1)), 1));
    assert_ne!(a, b);
  }

  // ── email_due ─────────────────────────────────────────────────────────────

  #[test]
  fn never_sent_is_due() {
    assert_eq!(email_due(&detail("2024", 0, None), now()), EmailDecision::Send);
  }

  #[test]
  fn suppressed_is_never_due() {
    let long_ago = now() - TimeDelta::days(400);
    assert_eq!(
      email_due(&detail("2024", -1, Some(long_ago)), now()),
      EmailDecision::SkipSuppressed
    );
    assert_eq!(email_due(&detail("2024", -1, None), now()), EmailDecision::SkipSuppressed);
  }

  #[test]
  fn six_days_is_too_recent_eight_days_is_due() {
    let six = now() - TimeDelta::days(6);
    let eight = now() - TimeDelta::days(8);
    assert_eq!(email_due(&detail("2024", 1, Some(six)), now()), EmailDecision::SkipRecent);
    assert_eq!(email_due(&detail("2024", 1, Some(eight)), now()), EmailDecision::Send);
  }

  #[test]
  fn exactly_seven_days_is_not_yet_due() {
    let seven = now() - resend_interval();
    assert_eq!(email_due(&detail("2024", 3, Some(seven)), now()), EmailDecision::SkipRecent);
    let just_over = seven - TimeDelta::seconds(1);
    assert_eq!(email_due(&detail("2024", 3, Some(just_over)), now()), EmailDecision::Send);
  }

  #[test]
  fn test_runs_are_skipped_even_when_never_sent() {
    assert_eq!(email_due(&detail("test:2024", 0, None), now()), EmailDecision::SkipTestRun);
  }

  #[test]
  fn sent_without_timestamp_is_due() {
    assert_eq!(email_due(&detail("2024", 2, None), now()), EmailDecision::Send);
  }
}
