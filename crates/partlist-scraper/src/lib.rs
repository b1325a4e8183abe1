// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Concurrent scraper for published PC build parts lists.
//!
//! A bounded pool of isolated Chromium sessions walks a range of listing
//! pages, reads every linked build's parts table, and the accepted builds
//! are flattened into a single CSV with a derived total price.

pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod model;
pub mod navigator;
pub mod price;
pub mod rate_limit;
pub mod scheduler;
pub mod session;
pub mod sink;

pub use config::ScrapeConfig;
pub use error::{Result, ScrapeError};
pub use model::{Build, Component, PageJob};
pub use scheduler::{RunReport, Scheduler};
