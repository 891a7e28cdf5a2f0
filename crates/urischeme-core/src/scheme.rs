//! Scheme text normalization and validation.

use crate::config::SchemeConfig;
use crate::error::{Result, SchemeError};
use std::collections::BTreeSet;

/// Reduce protocol text to the bare scheme token.
///
/// Everything from the first `:` or `/` onwards is dropped, so `"myapp://"`,
/// `"myapp://host/path"` and `"myapp"` all normalize to `"myapp"`.
pub fn normalize(protocol: &str) -> &str {
    let trimmed = protocol.trim();
    match trimmed.find(SchemeConfig::SCHEME_TERMINATORS) {
        Some(end) => trimmed[..end].trim_end(),
        None => trimmed,
    }
}

/// Check a bare scheme token against the URI scheme grammar:
/// a letter followed by letters, digits, `+`, `-` or `.`.
pub fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Normalize and validate protocol text in one step.
pub fn parse_scheme(protocol: &str) -> Result<String> {
    let scheme = normalize(protocol);
    if !is_valid_scheme(scheme) {
        return Err(SchemeError::MalformedScheme {
            scheme: scheme.to_string(),
        });
    }
    Ok(scheme.to_string())
}

/// Schemes the process's URI subsystem already knows about.
///
/// A known scheme can never be registered, and `exists` reports it as present
/// without consulting the store. Comparison is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownSchemes {
    schemes: BTreeSet<String>,
}

impl KnownSchemes {
    /// The built-in scheme list.
    pub fn builtin() -> Self {
        Self {
            schemes: SchemeConfig::BUILTIN_SCHEMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// No known schemes at all.
    pub fn empty() -> Self {
        Self {
            schemes: BTreeSet::new(),
        }
    }

    /// Add a scheme to the set.
    pub fn with(mut self, scheme: impl AsRef<str>) -> Self {
        self.schemes.insert(scheme.as_ref().to_ascii_lowercase());
        self
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.schemes.contains(&scheme.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}

impl Default for KnownSchemes {
    fn default() -> Self {
        Self::builtin()
    }
}
