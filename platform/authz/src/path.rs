//! Locations in the organization tree.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("org path must not be empty")]
    Empty,
}

/// A `/`-delimited node address such as `/faculty/cs/lab1`.
///
/// Stored as a segment list, so containment checks never confuse sibling nodes that
/// share a string prefix (`/faculty/cs` vs `/faculty/csx`). The empty segment list is
/// the root `/`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HierarchyPath {
    segments: Vec<String>,
}

impl HierarchyPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a path, tolerating missing leading and extra `/` separators.
    ///
    /// `"/"` is the root; the empty string is rejected so that a missing query
    /// parameter never silently turns into a root lookup.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        let segments = trimmed
            .split('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(Self { segments })
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The path itself followed by every ancestor, ending with the root.
    pub fn ancestor_chain(&self) -> Vec<HierarchyPath> {
        (0..=self.segments.len())
            .rev()
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }

    /// True when `other` is this node or one of its descendants.
    pub fn is_prefix_of(&self, other: &HierarchyPath) -> bool {
        other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for HierarchyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for HierarchyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HierarchyPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HierarchyPath> for String {
    fn from(value: HierarchyPath) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> HierarchyPath {
        HierarchyPath::parse(raw).unwrap()
    }

    #[test]
    fn canonical_form_is_absolute() {
        assert_eq!(path("/faculty/cs/lab1").to_string(), "/faculty/cs/lab1");
        assert_eq!(path("faculty/cs").to_string(), "/faculty/cs");
        assert_eq!(path("/faculty/").to_string(), "/faculty");
        assert_eq!(path("//faculty//cs/").to_string(), "/faculty/cs");
        assert_eq!(path("/").to_string(), "/");
        assert!(path("/").is_root());
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(HierarchyPath::parse(""), Err(PathError::Empty));
        assert_eq!(HierarchyPath::parse("   "), Err(PathError::Empty));
    }

    #[test]
    fn ancestor_chain_walks_to_root() {
        let chain: Vec<String> = path("/faculty/cs/lab1")
            .ancestor_chain()
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(chain, vec!["/faculty/cs/lab1", "/faculty/cs", "/faculty", "/"]);
    }

    #[test]
    fn ancestor_chain_length_tracks_depth() {
        for raw in ["/", "/a", "/a/b", "/a/b/c/d/e"] {
            let p = path(raw);
            let chain = p.ancestor_chain();
            assert_eq!(chain.len(), p.depth() + 1, "{raw}");
            assert_eq!(chain.first(), Some(&p));
            assert_eq!(chain.last(), Some(&HierarchyPath::root()));
        }
    }

    #[test]
    fn prefix_test_is_segment_aware() {
        assert!(path("/faculty/cs").is_prefix_of(&path("/faculty/cs")));
        assert!(path("/faculty/cs").is_prefix_of(&path("/faculty/cs/lab1")));
        assert!(path("/").is_prefix_of(&path("/faculty")));
        assert!(!path("/faculty/cs").is_prefix_of(&path("/faculty/csx")));
        assert!(!path("/faculty/cs/lab1").is_prefix_of(&path("/faculty/cs")));
    }

    #[test]
    fn parent_stops_at_root() {
        assert_eq!(path("/a/b").parent(), Some(path("/a")));
        assert_eq!(path("/a").parent(), Some(HierarchyPath::root()));
        assert_eq!(HierarchyPath::root().parent(), None);
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&path("/faculty/cs")).unwrap();
        assert_eq!(json, "\"/faculty/cs\"");
        let back: HierarchyPath = serde_json::from_str("\"faculty/cs/\"").unwrap();
        assert_eq!(back, path("/faculty/cs"));
        assert!(serde_json::from_str::<HierarchyPath>("\"\"").is_err());
    }
}
