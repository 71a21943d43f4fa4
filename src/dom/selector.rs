//! CSS selectors.
//!
//! Parsing and matching use the full selector grammar via `scraper`:
//! compound selectors, combinators, selector lists and structural
//! pseudo-classes such as `:nth-child` all work. Generated selectors
//! escape identifiers with `cssparser` so that ids like `a:b` survive a
//! round trip.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ============================================================================
// Selector
// ============================================================================

/// A parsed selector list.
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    parsed: scraper::Selector,
}

impl Selector {
    /// Parses `input`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `input` is not a valid selector.
    pub fn parse(input: &str) -> Result<Self> {
        let parsed = scraper::Selector::parse(input)
            .map_err(|e| Error::invalid_argument(format!("invalid selector {input:?}: {e}")))?;
        Ok(Self {
            source: input.to_string(),
            parsed,
        })
    }

    /// The text the selector was parsed from.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// `#id` with the identifier escaped.
    #[must_use]
    pub fn for_id(id: &str) -> String {
        format!("#{}", escape_identifier(id))
    }

    /// `tag:nth-of-type(n)`, 1-based.
    #[must_use]
    pub fn for_position(tag_name: &str, nth_of_type: usize) -> String {
        format!("{}:nth-of-type({nth_of_type})", escape_identifier(tag_name))
    }

    #[inline]
    pub(crate) fn scraper(&self) -> &scraper::Selector {
        &self.parsed
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Selector {}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Escapes `value` for use as a CSS identifier.
#[must_use]
pub fn escape_identifier(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    // Writing into a String never fails.
    let _ = cssparser::serialize_identifier(value, &mut escaped);
    escaped
}

// ============================================================================
// Tests
// ============================================================================
