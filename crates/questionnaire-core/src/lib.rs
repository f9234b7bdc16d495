//! Core types and trait definitions for the questionnaire reminder service.
//!
//! This crate is deliberately free of HTTP, SMTP and database dependencies.
//! The store backend and the reminder job depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod questionnaire;
pub mod run;
pub mod schedule;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
