// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Log setup: a live stderr stream plus a size-rotated log file.
//!
//! Rotated files are named `.1`, `.2`, ... with `.1` the most recent. The
//! previous run's log is rotated away at startup.

use crate::error::{Result, ScrapeError};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub file: PathBuf,
    /// Rotate once the file reaches this size. Zero disables size rotation.
    pub max_bytes: u64,
    /// Rotated files kept besides the live one.
    pub rotations: u32,
    /// Write the file sink as JSON lines.
    pub json: bool,
    pub verbose: bool,
}

/// Append-only file writer with size-based rotation.
pub struct RotatingFile {
    file: File,
    path: PathBuf,
    max_bytes: u64,
    rotations: u32,
    /// Length of the live file at open, plus every byte written since.
    current_size: u64,
}

impl RotatingFile {
    /// Open or create the log file, appending to existing content.
    pub fn open(path: &Path, max_bytes: u64, rotations: u32) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            file,
            path: path.to_path_buf(),
            max_bytes,
            rotations,
            current_size,
        })
    }

    /// Open the log file, first rotating away any non-empty previous log.
    pub fn open_fresh(path: &Path, max_bytes: u64, rotations: u32) -> io::Result<Self> {
        let mut log = Self::open(path, max_bytes, rotations)?;
        if log.current_size > 0 {
            log.rotate()?;
        }
        Ok(log)
    }

    /// Shift `log.1 → log.2`, ..., then `log → log.1`, and reopen `log`.
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.rotations == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.current_size = 0;
            return Ok(());
        }

        let oldest = rotation_path(&self.path, self.rotations);
        if oldest.exists() {
            let _ = std::fs::remove_file(&oldest);
        }
        for i in (1..self.rotations).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                let _ = std::fs::rename(&from, rotation_path(&self.path, i + 1));
            }
        }
        std::fs::rename(&self.path, rotation_path(&self.path, 1))?;

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.current_size = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.max_bytes > 0 && self.current_size >= self.max_bytes {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.current_size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// `scraper.log.1`, `scraper.log.2`, ...
fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("scraper.log")
    );
    base.with_file_name(name)
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init(settings: &LogSettings) -> Result<()> {
    let level = if settings.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,partlist_scraper={level}")));

    let file = Mutex::new(RotatingFile::open_fresh(
        &settings.file,
        settings.max_bytes,
        settings.rotations,
    )?);
    let file_layer: Box<dyn Layer<Registry> + Send + Sync> = if settings.json {
        Box::new(fmt::layer().json().with_writer(file))
    } else {
        Box::new(fmt::layer().with_ansi(false).with_writer(file))
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init()
        .map_err(|e| ScrapeError::Config(format!("logging already initialized: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotates_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraper.log");
        let mut log = RotatingFile::open(&path, 10, 3).unwrap();

        log.write_all(b"0123456789").unwrap();
        log.write_all(b"next").unwrap();
        log.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "next");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("scraper.log.1")).unwrap(),
            "0123456789"
        );
    }

    #[test]
    fn test_keeps_bounded_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraper.log");
        for run in 0..5 {
            let mut log = RotatingFile::open_fresh(&path, 0, 2).unwrap();
            write!(log, "run {run}").unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "run 4");
        assert_eq!(std::fs::read_to_string(dir.path().join("scraper.log.1")).unwrap(), "run 3");
        assert_eq!(std::fs::read_to_string(dir.path().join("scraper.log.2")).unwrap(), "run 2");
        assert!(!dir.path().join("scraper.log.3").exists());
    }

    #[test]
    fn test_fresh_open_of_empty_file_does_not_rotate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraper.log");
        RotatingFile::open_fresh(&path, 0, 2).unwrap();
        RotatingFile::open_fresh(&path, 0, 2).unwrap();
        assert!(!dir.path().join("scraper.log.1").exists());
    }
}
