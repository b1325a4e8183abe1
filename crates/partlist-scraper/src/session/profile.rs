// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-session browser profile directories.
//!
//! Every session gets a fresh directory named `chrome_profile_{slot}_XXXX`
//! under the profile root. Concurrent Chromium instances sharing a profile
//! corrupt each other, so directories are never reused. A crash can leave
//! them behind; `clean_stale` removes those before a run starts.

use super::QUADRANTS;
use crate::error::Result;
use std::path::Path;
use tempfile::TempDir;
use tracing::{info, warn};

pub const PROFILE_PREFIX: &str = "chrome_profile_";

fn slot_prefix(slot: usize) -> String {
    format!("{PROFILE_PREFIX}{slot}_")
}

/// Create a new, empty profile directory for `slot`.
///
/// The directory is removed when the returned `TempDir` is closed or dropped.
pub fn create(root: &Path, slot: usize) -> Result<TempDir> {
    std::fs::create_dir_all(root)?;
    let dir = tempfile::Builder::new()
        .prefix(&slot_prefix(slot % QUADRANTS))
        .tempdir_in(root)?;
    Ok(dir)
}

/// Remove profile directories left by an earlier, aborted run.
///
/// Only names belonging to slots `0..4` are touched. Failures are logged and
/// skipped. Returns the number of directories removed.
pub fn clean_stale(root: &Path) -> usize {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            warn!(root = %root.display(), "cannot scan profile root: {e}");
            return 0;
        }
    };

    let prefixes: Vec<String> = (0..QUADRANTS).map(slot_prefix).collect();
    let mut removed = 0;

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            continue;
        }
        let path = entry.path();
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                info!(profile = %path.display(), "deleted stale profile");
                removed += 1;
            }
            Err(e) => warn!(profile = %path.display(), "could not delete stale profile: {e}"),
        }
    }

    removed
}
