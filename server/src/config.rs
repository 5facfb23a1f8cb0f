use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use axum::http::HeaderName;
use platform_authz::DEFAULT_STORE_TIMEOUT;

pub const DEFAULT_PRINCIPAL_HEADER: &str = "x-principal-id";

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Header carrying the identity asserted by the upstream gateway.
    pub principal_header: HeaderName,
    pub store_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            principal_header: HeaderName::from_static(DEFAULT_PRINCIPAL_HEADER),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let principal_header = match lookup("PRINCIPAL_HEADER") {
            Some(raw) if !raw.trim().is_empty() => HeaderName::try_from(raw.trim())
                .with_context(|| format!("invalid PRINCIPAL_HEADER {raw:?}"))?,
            _ => HeaderName::from_static(DEFAULT_PRINCIPAL_HEADER),
        };

        let store_timeout = match lookup("STORE_TIMEOUT_MS") {
            Some(raw) => {
                let millis: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid STORE_TIMEOUT_MS {raw:?}"))?;
                if millis == 0 {
                    return Err(anyhow!("STORE_TIMEOUT_MS must be positive"));
                }
                Duration::from_millis(millis)
            }
            None => DEFAULT_STORE_TIMEOUT,
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        Ok(Self {
            principal_header,
            store_timeout,
            cors_allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.principal_header.as_str(), DEFAULT_PRINCIPAL_HEADER);
        assert_eq!(config.store_timeout, DEFAULT_STORE_TIMEOUT);
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("PRINCIPAL_HEADER", "X-Forwarded-User"),
            ("STORE_TIMEOUT_MS", "250"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
        ])
        .unwrap();
        assert_eq!(config.principal_header.as_str(), "x-forwarded-user");
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.cors_allowed_origins.len(), 2);
    }

    #[test]
    fn bad_timeouts_are_rejected() {
        assert!(load(&[("STORE_TIMEOUT_MS", "soon")]).is_err());
        assert!(load(&[("STORE_TIMEOUT_MS", "0")]).is_err());
    }
}
