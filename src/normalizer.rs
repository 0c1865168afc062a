//! Parameter canonicalization
//!
//! Maps spoken names to the values commands need ("chrome" -> "Google Chrome").
//! Unknown values pass through untouched: most slots (commit messages,
//! search queries) are never meant to be aliased.

use std::num::IntErrorKind;

use crate::config::{alias_key, ConfigStore, ValueRange};

/// Read-only view over the alias table of a [`ConfigStore`]
#[derive(Clone, Copy)]
pub struct ParameterNormalizer<'a> {
    config: &'a ConfigStore,
}

impl<'a> ParameterNormalizer<'a> {
    pub fn new(config: &'a ConfigStore) -> Self {
        Self { config }
    }

    /// Canonical form of `raw` for alias `kind`, or `raw` unchanged
    pub fn normalize(&self, kind: &str, raw: &str) -> String {
        match self.config.alias(kind, &alias_key(raw)) {
            Some(canonical) => canonical.to_string(),
            None => raw.to_string(),
        }
    }

    /// Normalize the value for placeholder `name` using its declaration:
    /// alias lookup by declared kind, then the declared integer range.
    pub fn normalize_parameter(&self, name: &str, raw: &str) -> String {
        let Some(spec) = self.config.parameter(name) else {
            return raw.to_string();
        };

        let value = match spec.kind.as_deref() {
            Some(kind) => self.normalize(kind, raw),
            None => raw.to_string(),
        };

        match spec.range {
            Some(range) => clamp_numeric(&value, range),
            None => value,
        }
    }
}

/// Clamp integer-looking values ("75", " 120% ") into `range`.
/// Digit strings too long for `i64` clamp to the nearer bound.
/// Anything else is returned unchanged.
fn clamp_numeric(value: &str, range: ValueRange) -> String {
    let digits = value.trim().trim_end_matches('%').trim();
    let n = match digits.parse::<i64>() {
        Ok(n) => n.clamp(range.min, range.max),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => range.max,
            IntErrorKind::NegOverflow => range.min,
            _ => return value.to_string(),
        },
    };
    n.to_string()
}
