//! Membership and policy records as the engine sees them.
//!
//! Records are owned by the administration side; evaluation only reads snapshots of
//! them. [`PolicyDraft`] is the single write-time entry point and is where malformed
//! effects and patterns are rejected.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    path::{HierarchyPath, PathError},
    pattern::{Pattern, PatternError},
};

/// An already-authenticated principal identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Returns `None` for blank identifiers.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        (!raw.is_empty()).then(|| Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A principal holding a position at one node of the hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub principal: PrincipalId,
    pub org_path: HierarchyPath,
    pub position_key: String,
    pub active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

impl FromStr for Effect {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "allow" => Ok(Effect::Allow),
            "deny" => Ok(Effect::Deny),
            other => Err(PolicyError::UnknownEffect(other.to_owned())),
        }
    }
}

/// How far a membership-anchored grant reaches from the membership node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spread {
    #[default]
    Exact,
    Subtree,
}

impl Spread {
    pub fn as_str(self) -> &'static str {
        match self {
            Spread::Exact => "exact",
            Spread::Subtree => "subtree",
        }
    }

    /// Lenient decoding for stored rows: anything unrecognized narrows to `Exact`.
    pub fn from_stored(raw: &str) -> Self {
        match raw.trim() {
            "subtree" => Spread::Subtree,
            _ => Spread::Exact,
        }
    }
}

impl FromStr for Spread {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "exact" => Ok(Spread::Exact),
            "subtree" => Ok(Spread::Subtree),
            other => Err(PolicyError::UnknownSpread(other.to_owned())),
        }
    }
}

/// A grant or denial of action/resource patterns anchored at `scope`.
///
/// Decision checks treat `scope` as the level the policy lives at (gated by
/// `inherit` for descendants). Ability projections treat it as the org prefix a
/// membership must sit under, with `spread` bounding the reach from that
/// membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub scope: HierarchyPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_key: Option<String>,
    pub effect: Effect,
    pub actions: Vec<Pattern>,
    pub resources: Vec<Pattern>,
    pub inherit: bool,
    pub spread: Spread,
    pub enabled: bool,
}

impl Policy {
    pub fn applies_to_position(&self, position: &str) -> bool {
        self.position_key.as_deref().is_none_or(|key| key == position)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy scope is required")]
    MissingScope,
    #[error("policy needs at least one action")]
    MissingActions,
    #[error("unknown policy effect {0:?} (expected allow or deny)")]
    UnknownEffect(String),
    #[error("unknown policy spread {0:?} (expected exact or subtree)")]
    UnknownSpread(String),
    #[error("invalid scope: {0}")]
    Scope(#[from] PathError),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternError),
}

/// Untrusted policy input as submitted by an administrator.
///
/// `org_prefix` and `scope` are accepted as aliases for the same anchor field.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PolicyDraft {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(alias = "org_prefix")]
    pub scope: String,
    #[serde(default)]
    pub position_key: Option<String>,
    #[serde(default)]
    pub effect: Option<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub inherit: bool,
    #[serde(default)]
    pub spread: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl PolicyDraft {
    /// Normalizes the draft into a policy with a fresh id.
    ///
    /// Missing effect, spread and enabled default to `allow`, `exact` and `true`.
    /// An empty resource list means every resource.
    pub fn validate(self) -> Result<Policy, PolicyError> {
        if self.scope.trim().is_empty() {
            return Err(PolicyError::MissingScope);
        }
        let scope = HierarchyPath::parse(&self.scope)?;
        let actions = parse_patterns(&self.actions)?;
        if actions.is_empty() {
            return Err(PolicyError::MissingActions);
        }
        let mut resources = parse_patterns(&self.resources)?;
        if resources.is_empty() {
            resources.push(Pattern::Any);
        }
        let effect = match self.effect.as_deref() {
            None => Effect::Allow,
            Some(raw) if raw.trim().is_empty() => Effect::Allow,
            Some(raw) => raw.parse()?,
        };
        let spread = match self.spread.as_deref() {
            None => Spread::Exact,
            Some(raw) => raw.parse()?,
        };
        Ok(Policy {
            id: Uuid::new_v4(),
            key: non_blank(self.key),
            scope,
            position_key: non_blank(self.position_key),
            effect,
            actions,
            resources,
            inherit: self.inherit,
            spread,
            enabled: self.enabled.unwrap_or(true),
        })
    }
}

fn parse_patterns(raw: &[String]) -> Result<Vec<Pattern>, PatternError> {
    raw.iter()
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| Pattern::parse(entry))
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
