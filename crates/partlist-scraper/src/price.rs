// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Currency-agnostic price parsing.

/// Substrings stripped before parsing. Tokens go first so `EUR` is removed
/// whole rather than leaving stray letters behind.
const CURRENCY_MARKS: &[&str] = &["AUD", "CAD", "EUR", "$", "£", "€", ","];

/// Parse a display price such as `"$1,299.99"` or `"€ 45.00 EUR"`.
///
/// Never fails: anything that does not reduce to a finite, non-negative
/// number normalizes to `0.0`.
pub fn normalize(raw: &str) -> f64 {
    let mut cleaned = raw.to_string();
    for mark in CURRENCY_MARKS {
        if cleaned.contains(mark) {
            cleaned = cleaned.replace(mark, "");
        }
    }

    match cleaned.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        _ => 0.0,
    }
}
