//! Client config loader (strict parsing).

pub mod schema;

use std::fs;

use hasslink_core::{HassLinkError, Result};

pub use schema::{ClientConfig, ReconnectSection};

pub fn load_from_file(path: &str) -> Result<ClientConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| HassLinkError::Config(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ClientConfig> {
    let cfg: ClientConfig = serde_yaml::from_str(s)
        .map_err(|e| HassLinkError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Build a config from `HASSLINK_HOST` / `HASSLINK_TOKEN`.
pub fn from_env() -> Result<ClientConfig> {
    let host = std::env::var("HASSLINK_HOST")
        .map_err(|_| HassLinkError::Config("HASSLINK_HOST is not set".into()))?;
    let token = std::env::var("HASSLINK_TOKEN")
        .map_err(|_| HassLinkError::Config("HASSLINK_TOKEN is not set".into()))?;
    let cfg = ClientConfig::new(host, token);
    cfg.validate()?;
    Ok(cfg)
}
