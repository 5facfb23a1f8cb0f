//! sea-orm models for the records the policy engine reads.

pub mod memberships;
pub mod policies;
