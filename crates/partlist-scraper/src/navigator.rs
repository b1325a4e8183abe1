// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Listing-page navigation: page number in, build-detail links out.

use crate::error::Result;
use crate::session::BrowserSession;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// One build card on a listing page.
pub const LISTING_CARD: &str = ".logGroup";
/// The anchor inside a card pointing at the build-detail page.
pub const CARD_LINK: &str = "a.logGroup__target";

/// Links read from one listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Absolute build-detail URLs in card order.
    pub links: Vec<String>,
    /// Cards with no usable anchor.
    pub skipped_cards: usize,
}

/// Load a listing page and return its build links.
///
/// A timeout (navigation or card wait) is retried exactly once with a full
/// reload. A second timeout, or any other navigation error, fails the page.
pub async fn list_build_links(
    session: &mut dyn BrowserSession,
    url: &str,
    timeout: Duration,
) -> Result<Listing> {
    load_listing(session, url, timeout).await?;
    let html = session.content().await?;
    let listing = parse_listing(&html, url);
    if listing.skipped_cards > 0 {
        warn!(url, skipped = listing.skipped_cards, "listing cards without a build link");
    }
    debug!(url, links = listing.links.len(), "listing parsed");
    Ok(listing)
}

async fn load_listing(session: &mut dyn BrowserSession, url: &str, timeout: Duration) -> Result<()> {
    let first = match session.goto(url).await {
        Ok(()) => session.wait_for_selector(LISTING_CARD, timeout).await,
        Err(e) => Err(e),
    };

    match first {
        Err(e) if e.is_timeout() => {
            warn!(url, "listing timed out ({e}), reloading");
            session.reload().await?;
            session.wait_for_selector(LISTING_CARD, timeout).await
        }
        other => other,
    }
}

/// Read every card's target link from a listing snapshot.
///
/// Relative links are resolved against `page_url`. A card without the
/// anchor (or with an empty `href`) is counted and skipped.
pub fn parse_listing(html: &str, page_url: &str) -> Listing {
    let document = Html::parse_document(html);
    let card_sel = Selector::parse(LISTING_CARD).unwrap();
    let link_sel = Selector::parse(CARD_LINK).unwrap();
    let base = Url::parse(page_url).ok();

    let mut listing = Listing::default();
    for card in document.select(&card_sel) {
        let href = card
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty());

        match href.and_then(|h| resolve(base.as_ref(), h)) {
            Some(link) => listing.links.push(link),
            None => listing.skipped_cards += 1,
        }
    }
    listing
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(abs) => Some(abs.to_string()),
        Err(_) => base.and_then(|b| b.join(href).ok()).map(|u| u.to_string()),
    }
}
