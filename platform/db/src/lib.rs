//! Database primitives: pool settings, the sea-orm backed [`SeaOrmStore`] and the
//! administrative write paths for policies and memberships.

mod admin;
mod decode;
mod store;

use std::time::Duration;

use platform_authz::{PathError, PolicyError, StoreError};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub use admin::{
    create_policy, deactivate_membership, delete_policies, list_policies, upsert_membership,
    upsert_policy,
};
pub use store::SeaOrmStore;

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing (set {0})")]
    MissingUrl(String),
    #[error("database error: {0}")]
    Query(#[from] DbErr),
    #[error("invalid policy: {0}")]
    InvalidPolicy(#[from] PolicyError),
    #[error("invalid org path: {0}")]
    InvalidPath(#[from] PathError),
    #[error(transparent)]
    Record(#[from] StoreError),
}

impl DbError {
    /// True for errors caused by the submitted data rather than the database.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DbError::InvalidPolicy(_) | DbError::InvalidPath(_))
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
    #[serde(default = "default_max_connections")]
    max_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    connect_timeout_secs: u64,
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self::new(default_url_key())
    }
}

impl DatabaseSettings {
    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    /// Reads `DATABASE_URL` plus optional `DATABASE_MAX_CONNECTIONS`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(max) = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|raw| raw.parse().ok())
        {
            settings.max_connections = max;
        }
        settings
    }

    pub fn database_url(&self) -> DbResult<String> {
        std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl(self.env_key.clone()))
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url()?;
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(settings.max_connections)
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .sqlx_logging(false);
    let pool = Database::connect(options).await?;
    info!(max_connections = settings.max_connections, "database pool ready");
    Ok(pool)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_url_names_the_variable() {
        let settings = DatabaseSettings::new("POLICY_DB_URL_THAT_IS_NEVER_SET");
        let err = settings.database_url().unwrap_err();
        assert_eq!(
            err.to_string(),
            "database url missing (set POLICY_DB_URL_THAT_IS_NEVER_SET)"
        );
    }

    #[test]
    fn validation_errors_are_client_errors() {
        assert!(DbError::InvalidPolicy(PolicyError::MissingActions).is_client_error());
        assert!(!DbError::Query(DbErr::Custom("boom".into())).is_client_error());
    }
}
