// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Flattening accepted builds into the fixed CSV schema.
//!
//! Column names and order are consumed verbatim by the analysis and
//! training tooling downstream; do not reorder or rename them.

use crate::error::Result;
use crate::model::Build;
use crate::price;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Component columns, in output order.
pub const COMPONENT_COLUMNS: [&str; 7] = [
    "CPU",
    "CPU Cooler",
    "Motherboard",
    "Memory",
    "Video Card",
    "Case",
    "Power Supply",
];

pub const HEADER: [&str; 9] = [
    "build_id",
    "CPU",
    "CPU Cooler",
    "Motherboard",
    "Memory",
    "Video Card",
    "Case",
    "Power Supply",
    "Total Price",
];

/// One output line.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    /// 1-based position in the merged build list.
    pub build_id: usize,
    /// Names aligned with [`COMPONENT_COLUMNS`]; empty when absent.
    pub parts: [String; 7],
    /// Sum of every component's normalized price, in any category.
    pub total_price: f64,
}

impl OutputRow {
    pub fn from_build(build_id: usize, build: &Build) -> Self {
        let mut parts: [String; 7] = Default::default();
        let mut total_price = 0.0;

        for component in &build.components {
            total_price += price::normalize(&component.raw_price);
            if let Some(col) = COMPONENT_COLUMNS
                .iter()
                .position(|c| *c == component.category)
            {
                parts[col] = component.name.clone();
            }
        }

        Self {
            build_id,
            parts,
            total_price,
        }
    }

    /// Column values in [`HEADER`] order.
    pub fn record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(HEADER.len());
        record.push(self.build_id.to_string());
        record.extend(self.parts.iter().cloned());
        record.push(format!("{:.2}", self.total_price));
        record
    }
}

/// Assign sequential ids in list order.
pub fn to_rows(builds: &[Build]) -> Vec<OutputRow> {
    builds
        .iter()
        .enumerate()
        .map(|(i, build)| OutputRow::from_build(i + 1, build))
        .collect()
}

/// Write the header and one row per build. Returns the number of rows.
pub fn write_builds<W: Write>(writer: W, builds: &[Build]) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;
    let rows = to_rows(builds);
    for row in &rows {
        csv.write_record(row.record())?;
    }
    csv.flush()?;
    Ok(rows.len())
}

/// Create (or truncate) `path` and write every build to it.
pub fn write_csv(path: &Path, builds: &[Build]) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_builds(File::create(path)?, builds)
}
