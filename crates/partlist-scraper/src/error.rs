// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types shared by the scraping pipeline.

use std::time::Duration;

/// Errors raised by sessions, navigation, extraction and the CSV sink.
///
/// None of these ever aborts a run on its own: the scheduler contains each
/// one at the smallest boundary (row, build, page, job) and records it.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {}s waiting for {what}", .after.as_secs())]
    Timeout { what: String, after: Duration },

    #[error("page script failed: {0}")]
    Script(String),

    #[error("missing element: {0}")]
    MissingElement(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ScrapeError {
    /// Whether this error is a bounded-wait expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub(crate) fn navigation(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
