use async_graphql::SimpleObject;
use platform_authz::{ABILITIES_VERSION, Abilities, HierarchyPath};
use serde::Serialize;

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct AbilityEntry {
    pub action: String,
    pub allowed: bool,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct AbilitiesPayload {
    pub org_path: String,
    pub abilities: Vec<AbilityEntry>,
    pub version: String,
}

impl From<Abilities> for AbilitiesPayload {
    fn from(value: Abilities) -> Self {
        Self {
            org_path: value.org_path.to_string(),
            abilities: value
                .abilities
                .into_iter()
                .map(|(action, allowed)| AbilityEntry { action, allowed })
                .collect(),
            version: ABILITIES_VERSION.to_string(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct WherePayload {
    pub action: String,
    pub org_paths: Vec<String>,
    pub version: String,
}

impl WherePayload {
    pub fn new(action: String, orgs: Vec<HierarchyPath>) -> Self {
        Self {
            action,
            org_paths: orgs.iter().map(ToString::to_string).collect(),
            version: ABILITIES_VERSION.to_string(),
        }
    }
}
