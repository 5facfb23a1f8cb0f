use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern must not be empty")]
    Empty,
    #[error("pattern {0:?} may only carry `*` as its last character")]
    MisplacedWildcard(String),
}

/// An action or resource pattern: `*`, a `prefix*`, or an exact literal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Pattern {
    Any,
    Prefix(String),
    Exact(String),
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }
        if raw == "*" {
            return Ok(Self::Any);
        }
        let (body, pattern) = match raw.strip_suffix('*') {
            Some(prefix) => (prefix, Self::Prefix(prefix.to_owned())),
            None => (raw, Self::Exact(raw.to_owned())),
        };
        if body.contains('*') {
            return Err(PatternError::MisplacedWildcard(raw.to_owned()));
        }
        Ok(pattern)
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Prefix(prefix) => value.starts_with(prefix.as_str()),
            Self::Exact(literal) => literal == value,
        }
    }
}

pub fn any_matches(patterns: &[Pattern], value: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(value))
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Exact(literal) => f.write_str(literal),
        }
    }
}

impl TryFrom<String> for Pattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pattern> for String {
    fn from(value: Pattern) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> Pattern {
        Pattern::parse(raw).unwrap()
    }

    #[test]
    fn star_matches_everything() {
        assert!(p("*").matches("post:create"));
        assert!(p("*").matches(""));
    }

    #[test]
    fn prefix_patterns_match_literal_prefixes() {
        assert!(p("post:*").matches("post:create"));
        assert!(p("post:*").matches("post:"));
        assert!(!p("post:*").matches("posts:create"));
        assert!(!p("post:*").matches("Post:create"));
        assert!(!p("post:*").matches("event:create"));
    }

    #[test]
    fn exact_patterns_require_equality() {
        assert!(p("post:create").matches("post:create"));
        assert!(!p("post:create").matches("post:create2"));
        assert!(!p("post:create").matches("post"));
    }

    #[test]
    fn parse_rejects_malformed_patterns() {
        assert_eq!(Pattern::parse(" "), Err(PatternError::Empty));
        assert!(matches!(
            Pattern::parse("po*st"),
            Err(PatternError::MisplacedWildcard(_))
        ));
        assert!(matches!(
            Pattern::parse("**"),
            Err(PatternError::MisplacedWildcard(_))
        ));
    }

    #[test]
    fn display_restores_stored_form() {
        for raw in ["*", "post:*", "post:create"] {
            assert_eq!(p(raw).to_string(), raw);
        }
    }

    #[test]
    fn any_matches_checks_every_entry() {
        let patterns = vec![p("event:create"), p("post:*")];
        assert!(any_matches(&patterns, "post:moderate"));
        assert!(any_matches(&patterns, "event:create"));
        assert!(!any_matches(&patterns, "event:delete"));
        assert!(!any_matches(&[], "event:create"));
    }
}
