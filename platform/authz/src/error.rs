use std::time::Duration;

use thiserror::Error;

use crate::{path::PathError, store::StoreError};

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("action {action} denied for resource {resource} at {org_path}")]
    Denied {
        action: String,
        resource: String,
        org_path: String,
    },
    #[error("policy store did not answer within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PathError> for AuthzError {
    fn from(value: PathError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;
