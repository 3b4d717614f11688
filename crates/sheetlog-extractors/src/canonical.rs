//! Canonical row serialization.
//!
//! Two rows carrying the same values must serialize to byte-identical JSON,
//! whatever whitespace or column order the upload used. Fields are kept in a
//! `BTreeMap` so serde_json emits them in sorted key order.

use std::collections::BTreeMap;

/// Trim a cell and collapse inner whitespace runs to a single space.
///
/// Returns `None` for blank cells.
pub fn normalize_cell(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Render a float the way a person would type it: no trailing `.0` on whole
/// numbers, shortest round-trip digits otherwise.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Parse an integer key, accepting whole-number float renderings such as `12.0`.
pub fn parse_integer_key(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => Some(f as i64),
        _ => None,
    }
}

/// A row's recognized fields in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalRow {
    fields: BTreeMap<String, Option<String>>,
}

impl CanonicalRow {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field from raw cell text; blank cells become `null`.
    pub fn set(&mut self, field: impl Into<String>, raw: &str) {
        self.fields.insert(field.into(), normalize_cell(raw));
    }

    /// Normalized value of a field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_deref())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialize to the canonical JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_else(|_| String::from("{}"))
    }

    /// Re-canonicalize previously stored JSON.
    ///
    /// Used to check that stored snapshots survive a round trip unchanged.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let fields: BTreeMap<String, Option<String>> = serde_json::from_str(json)?;
        let mut row = Self::new();
        for (field, value) in fields {
            row.set(field, value.as_deref().unwrap_or(""));
        }
        Ok(row)
    }
}
