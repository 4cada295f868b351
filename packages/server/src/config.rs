use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-site session overrides fed into remote parse requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteSession {
    /// Playwright `storage_state` file as seen from this process.
    pub storage_state_path: Option<String>,
    pub referer: Option<String>,
}

impl SiteSession {
    fn from_env(storage_var: &str, default_storage: &str, referer_var: &str) -> Self {
        Self {
            storage_state_path: Some(
                env::var(storage_var).unwrap_or_else(|_| default_storage.to_string()),
            )
            .filter(|p| !p.trim().is_empty()),
            referer: env::var(referer_var).ok().filter(|r| !r.trim().is_empty()),
        }
    }

    /// Storage-state path as mounted inside the parse service container (`/data/<file>`).
    pub fn service_storage_state_path(&self) -> Option<String> {
        self.storage_state_path
            .as_deref()
            .and_then(|p| Path::new(p).file_name())
            .map(|name| format!("/data/{}", name.to_string_lossy()))
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub uploads_dir: PathBuf,
    pub parser_service_url: String,
    pub import_run_timeout: Duration,
    pub fanqie: SiteSession,
    pub kks101: SiteSession,
    pub shuba69: SiteSession,
    pub tadu: SiteSession,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
            uploads_dir: env::var("UPLOADS_DIR")
                .unwrap_or_else(|_| "./uploads".to_string())
                .into(),
            parser_service_url: env::var("PARSER_SERVICE_URL")
                .unwrap_or_else(|_| parser_client::DEFAULT_BASE_URL.to_string()),
            import_run_timeout: Duration::from_secs(
                env::var("IMPORT_RUN_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "21600".to_string())
                    .parse()
                    .context("IMPORT_RUN_TIMEOUT_SECS must be a valid number")?,
            ),
            // fanqie is fetched directly; its state file is optional
            fanqie: SiteSession {
                storage_state_path: env::var("FANQIE_STORAGE_STATE")
                    .ok()
                    .filter(|p| !p.trim().is_empty()),
                referer: None,
            },
            kks101: SiteSession::from_env(
                "KKS101_STORAGE_STATE",
                "/app/cookies/101kks_storage.json",
                "KKS101_REFERER",
            ),
            shuba69: SiteSession::from_env(
                "SHUBA_STORAGE_STATE",
                "/app/cookies/69shuba_storage.json",
                "SHUBA_REFERER",
            ),
            tadu: SiteSession::from_env(
                "TADU_STORAGE_STATE",
                "/app/cookies/tadu_storage.json",
                "TADU_REFERER",
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_storage_state_path_maps_to_data_mount() {
        let session = SiteSession {
            storage_state_path: Some("/app/cookies/101kks_storage.json".into()),
            referer: None,
        };
        assert_eq!(
            session.service_storage_state_path().as_deref(),
            Some("/data/101kks_storage.json")
        );
    }

    #[test]
    fn test_service_storage_state_path_absent() {
        assert_eq!(SiteSession::default().service_storage_state_path(), None);
    }
}
