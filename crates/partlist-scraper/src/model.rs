// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core records produced by the scraper.

/// One row of a parts list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Category heading the row sits under (e.g. `"CPU"`). Empty when the
    /// row appeared before any heading.
    pub category: String,
    /// Text of the product link.
    pub name: String,
    /// Price cell text, unparsed.
    pub raw_price: String,
}

impl Component {
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        raw_price: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            raw_price: raw_price.into(),
        }
    }
}

/// An accepted parts list from a single build-detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    /// Detail page the build was read from.
    pub source: String,
    /// Components in table order. Never empty.
    pub components: Vec<Component>,
}

/// The unit of work handed to a worker: one listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageJob {
    pub page: u32,
    /// Screen tiling slot. Carries no ordering meaning.
    pub slot: usize,
}
