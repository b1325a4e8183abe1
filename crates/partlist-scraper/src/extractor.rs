// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Build-detail extraction.
//!
//! A parts table is a flat run of `<tr>` rows. Rows whose component cell
//! spans two columns are category headings; every other row is a part under
//! the most recent heading. Parsing is split in two steps:
//!
//! 1. [`classify_rows`] turns the HTML snapshot into typed [`PartRow`]s.
//! 2. [`walk_rows`] applies the category skip-set and the all-or-nothing
//!    acceptance rule.
//!
//! Both steps are synchronous and deterministic for a given snapshot.

use crate::error::{Result, ScrapeError};
use crate::model::{Build, Component};
use crate::session::BrowserSession;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

/// Container that marks a fully rendered parts list.
pub const PARTS_TABLE: &str = ".partlist";

/// Categories read but never emitted: peripherals, storage and other parts
/// that do not describe the compute core of a build.
pub const SKIP_CATEGORIES: &[&str] = &[
    "Case Fan",
    "Case",
    "Keyboard",
    "Storage",
    "Mouse",
    "Operating System",
    "Monitor",
    "Speakers",
    "Headphones",
    "Sound Card",
    "Wired Network Adapter",
    "Wireless Network Adapter",
];

pub fn is_skipped(category: &str) -> bool {
    SKIP_CATEGORIES.contains(&category)
}

/// One classified table row, tagged with the heading it sits under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartRow {
    /// A two-column category heading.
    Header(String),
    /// A part with both a name link and a price cell.
    Data {
        category: String,
        name: String,
        price: String,
    },
    /// A row missing its name link or price cell, or a heading without text.
    Malformed { category: String },
}

/// Why a build that loaded was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Row `row` (0-based) lacked a required cell outside the skip-set.
    MissingField { row: usize },
    /// Every row was skipped; nothing informative remained.
    Empty,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { row } => write!(f, "row {row} is missing its name or price"),
            Self::Empty => write!(f, "no components outside skipped categories"),
        }
    }
}

/// Result of extracting one build-detail page.
#[derive(Debug)]
pub enum BuildOutcome {
    Accepted(Build),
    /// Page loaded but the table failed the acceptance rule.
    Rejected(Rejection),
    /// Navigation, wait or snapshot failed. Not retried.
    Failed(ScrapeError),
}

/// Navigate to `url` and extract its parts list.
pub async fn extract_build(
    session: &mut dyn BrowserSession,
    url: &str,
    timeout: Duration,
) -> BuildOutcome {
    match load_table(session, url, timeout).await {
        Ok(html) => match classify_rows(&html) {
            Some(rows) => match walk_rows(&rows) {
                Ok(components) => BuildOutcome::Accepted(Build {
                    source: url.to_string(),
                    components,
                }),
                Err(rejection) => BuildOutcome::Rejected(rejection),
            },
            None => BuildOutcome::Failed(ScrapeError::MissingElement(format!(
                "parts table body on {url}"
            ))),
        },
        Err(e) => BuildOutcome::Failed(e),
    }
}

async fn load_table(session: &mut dyn BrowserSession, url: &str, timeout: Duration) -> Result<String> {
    session.goto(url).await?;
    session.wait_for_selector(PARTS_TABLE, timeout).await?;
    session.content().await
}

/// Classify every row of the first table body in `html`.
///
/// Returns `None` when the snapshot has no `<tbody>`.
pub fn classify_rows(html: &str) -> Option<Vec<PartRow>> {
    let document = Html::parse_document(html);
    let tbody_sel = Selector::parse("tbody").unwrap();
    let tr_sel = Selector::parse("tr").unwrap();
    let component_sel = Selector::parse("td.td__component").unwrap();
    let heading_sel = Selector::parse("h4").unwrap();
    let name_sel = Selector::parse("td.td__name a").unwrap();
    let price_sel = Selector::parse("td.td__price").unwrap();

    let tbody = document.select(&tbody_sel).next()?;
    let mut current = String::new();
    let mut rows = Vec::new();

    for tr in tbody.select(&tr_sel) {
        let heading_cell = tr
            .select(&component_sel)
            .next()
            .filter(|cell| cell.value().attr("colspan") == Some("2"));

        if let Some(cell) = heading_cell {
            match cell.select(&heading_sel).next().map(text_of) {
                Some(category) => {
                    current = category.clone();
                    rows.push(PartRow::Header(category));
                }
                None => rows.push(PartRow::Malformed {
                    category: current.clone(),
                }),
            }
            continue;
        }

        let name = tr.select(&name_sel).next().map(text_of);
        let price = tr.select(&price_sel).next().map(text_of);
        rows.push(match (name, price) {
            (Some(name), Some(price)) => PartRow::Data {
                category: current.clone(),
                name,
                price,
            },
            _ => PartRow::Malformed {
                category: current.clone(),
            },
        });
    }

    Some(rows)
}

/// Apply the skip-set and acceptance rule to classified rows.
///
/// Any malformed row outside a skipped category rejects the whole build.
pub fn walk_rows(rows: &[PartRow]) -> std::result::Result<Vec<Component>, Rejection> {
    let mut components = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        match row {
            PartRow::Header(_) => {}
            PartRow::Data { category, .. } | PartRow::Malformed { category }
                if is_skipped(category) => {}
            PartRow::Data {
                category,
                name,
                price,
            } => components.push(Component::new(category, name, price)),
            PartRow::Malformed { .. } => return Err(Rejection::MissingField { row: index }),
        }
    }

    if components.is_empty() {
        return Err(Rejection::Empty);
    }
    Ok(components)
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
