//! Regex inclusion filter applied before any timestamp handling.

use regex::Regex;

use crate::error::{ReplayError, Result};

/// Pattern that matches every line.
pub const MATCH_ALL: &str = ".*";

/// Compiled inclusion test for raw log lines.
#[derive(Debug, Clone)]
pub struct LineFilter {
    regex: Regex,
}

impl LineFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| ReplayError::InvalidFilterPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    #[inline]
    pub fn matches(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

impl Default for LineFilter {
    fn default() -> Self {
        Self {
            regex: Regex::new(MATCH_ALL).expect("match-all pattern is valid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_matches_everything() {
        let filter = LineFilter::default();
        assert!(filter.matches(""));
        assert!(filter.matches("2023-01-01 00:00:01.000 anything"));
    }

    #[test]
    fn filter_selects_matching_lines() {
        let filter = LineFilter::new(r"\b(ERROR|WARN)\b").unwrap();
        assert!(filter.matches("2023-01-01 00:00:01.000 ERROR disk full"));
        assert!(!filter.matches("2023-01-01 00:00:01.000 INFO all good"));
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = LineFilter::new("(unclosed").unwrap_err();
        assert!(err.is_config());
        assert!(matches!(err, ReplayError::InvalidFilterPattern { .. }));
    }
}
