//! Authorization over an organization hierarchy.
//!
//! Principals hold positions at nodes of a tree (`/faculty/cs`). Policies attached to
//! nodes grant or deny action/resource patterns. [`PolicyEngine`] answers two kinds of
//! questions against a [`PolicyStore`]:
//!
//! - decisions (`can`): walk the target's ancestor chain, nearest decisive policy wins,
//!   default deny;
//! - projections (`abilities`, `where_can_act`): membership-anchored grants used to
//!   drive UI affordances.
//!
//! The engine never writes and keeps no state between calls.

mod abilities;
mod engine;
mod error;
mod memory;
mod model;
mod path;
mod pattern;
mod store;

pub use abilities::{
    ABILITIES_VERSION, Abilities, AbilityMap, DEFAULT_ABILITY_ACTIONS, parse_action_list,
    project_abilities, project_where,
};
pub use engine::{DEFAULT_STORE_TIMEOUT, PolicyContext, PolicyEngine, decide};
pub use error::{AuthzError, AuthzResult};
pub use memory::MemoryStore;
pub use model::{Effect, Membership, Policy, PolicyDraft, PolicyError, PrincipalId, Spread};
pub use path::{HierarchyPath, PathError};
pub use pattern::{Pattern, PatternError, any_matches};
pub use store::{PolicyFilter, PolicyStore, StoreError};
