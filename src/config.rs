//! Process configuration, read once at startup and handed to the services.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub page_size: u32,
    pub nats_url: Option<String>,
    pub catalog_fixture: Option<PathBuf>,
}

impl Config {
    pub const DEFAULT_PAGE_SIZE: u32 = 10;
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let page_size = parse_or(&lookup, "PAGE_SIZE", Self::DEFAULT_PAGE_SIZE)?;
        if page_size == 0 || page_size > Self::MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid { name: "PAGE_SIZE", value: page_size.to_string() });
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 8083)?,
            database_url,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            page_size,
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
            catalog_fixture: lookup("CATALOG_FIXTURE").filter(|v| !v.is_empty()).map(PathBuf::from),
        })
    }

    pub fn listen_addr(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
