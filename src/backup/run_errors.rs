//! Accumulator for the non-fatal failures of a backup run.
//!
//! Dump, selection, upload and prune failures must not stop the run. They are
//! turned into messages here and reported once the run is over.

use crate::backup::result_error::result::Result;
use itertools::Itertools;
use std::fmt::Display;

pub static UNKNOWN_ERROR: &str = "An unknown error occurred";

/// Ordered, append-only list of human readable error messages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunErrors {
    messages: Vec<String>,
}

impl RunErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` and records its error, if any. Control always returns to
    /// the caller; the value is `None` when `work` failed.
    pub fn rescue<T, F>(&mut self, work: F) -> Option<T>
    where
        F: FnOnce() -> Result<T>,
    {
        match work() {
            Ok(value) => Some(value),
            Err(e) => {
                self.record(e);
                None
            }
        }
    }

    pub fn record<E: Display>(&mut self, error: E) {
        let msg = error.to_string();
        let msg = if msg.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            msg
        };
        tracing::warn!("Recorded error: {msg}");
        self.messages.push(msg);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Messages joined with newlines, as sent in the run report.
    pub fn joined(&self) -> String {
        self.messages.iter().join("\n")
    }
}
