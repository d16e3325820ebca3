use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::warn;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

const DEFAULT_ADMIN_PASSWORD: &str = "admin";

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub admin_username: String,
    pub admin_password: String,
}

impl Config {
    /// Read configuration from the process environment (after `.env`, if any).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = var("BOXOFFICE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BOXOFFICE_JWT_SECRET is unset or still a placeholder");
        }

        let port = match var("BOXOFFICE_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("BOXOFFICE_PORT '{}' is not a valid port", raw))?,
            None => 3000,
        };

        let admin_password =
            var("BOXOFFICE_ADMIN_PASSWORD").unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.into());
        if admin_password == DEFAULT_ADMIN_PASSWORD {
            warn!("BOXOFFICE_ADMIN_PASSWORD is unset; the seeded admin uses the default password");
        }

        Ok(Self {
            jwt_secret,
            db_path: var("BOXOFFICE_DB_PATH")
                .unwrap_or_else(|| "boxoffice.db".into())
                .into(),
            host: var("BOXOFFICE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            admin_username: var("BOXOFFICE_ADMIN_USERNAME").unwrap_or_else(|| "admin".into()),
            admin_password,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}
