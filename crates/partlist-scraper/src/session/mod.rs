// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Browser session abstraction.
//!
//! `SessionLauncher` produces one isolated `BrowserSession` per page job
//! (currently Chromium via chromiumoxide). The navigator and extractor only
//! see the `BrowserSession` trait, so the whole pipeline can be driven by an
//! in-memory fake in tests.

pub mod chromium;
pub mod profile;

use crate::config::Monitor;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Number of distinct screen quadrants.
pub const QUADRANTS: usize = 4;

/// Starts browser sessions bound to a window slot.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Launch a fresh session with its own profile directory.
    async fn launch(&self, slot: usize) -> Result<Box<dyn BrowserSession>>;
}

/// A live browser session owned by exactly one worker.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to `url`.
    async fn goto(&mut self, url: &str) -> Result<()>;
    /// Reload the current page.
    async fn reload(&mut self) -> Result<()>;
    /// Wait until `selector` matches at least one element, up to `timeout`.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()>;
    /// Snapshot of the current document's HTML.
    async fn content(&mut self) -> Result<String>;
    /// Tear down the browser process and per-session files.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// On-screen placement of one session window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl WindowGeometry {
    /// Quadrant `slot % 4` of the monitor, in reading order.
    pub fn for_slot(monitor: Monitor, slot: usize) -> Self {
        let width = monitor.width / 2;
        let height = monitor.height / 2;
        let (x, y) = match slot % QUADRANTS {
            0 => (0, 0),
            1 => (width, 0),
            2 => (0, height),
            _ => (width, height),
        };
        Self {
            x,
            y,
            width,
            height,
        }
    }
}
