use serde::Deserialize;
use url::Url;

use hasslink_core::{HassLinkError, Result};

/// Well-known socket path on the server.
const WS_PATH: &str = "/api/websocket";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base address, `http://host:port` or `https://host:port`.
    pub host: String,

    /// Long-lived access token, shared by the socket handshake and the REST
    /// boundary.
    pub token: String,

    #[serde(default)]
    pub reconnect: ReconnectSection,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            reconnect: ReconnectSection::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HassLinkError::Config(format!(
                "host scheme must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.token.is_empty() {
            return Err(HassLinkError::Config("token must not be empty".into()));
        }
        self.reconnect.validate()?;
        Ok(())
    }

    /// Socket endpoint: scheme mapped `http -> ws` / `https -> wss`, path
    /// replaced by the well-known suffix.
    pub fn ws_endpoint(&self) -> Result<Url> {
        let mut url = self.base_url()?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| HassLinkError::InvalidEndpoint(self.host.clone()))?;
        url.set_path(WS_PATH);
        url.set_query(None);
        Ok(url)
    }

    /// REST endpoint for a server path like `/api/states`.
    pub fn rest_endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url()?;
        url.set_path(path);
        Ok(url)
    }

    fn base_url(&self) -> Result<Url> {
        Url::parse(&self.host)
            .map_err(|e| HassLinkError::InvalidEndpoint(format!("{}: {e}", self.host)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectSection {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ReconnectSection {
    pub fn validate(&self) -> Result<()> {
        if !(10..=60_000).contains(&self.initial_delay_ms) {
            return Err(HassLinkError::Config(
                "reconnect.initial_delay_ms must be between 10 and 60000".into(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(HassLinkError::Config(
                "reconnect.max_delay_ms must be >= initial_delay_ms".into(),
            ));
        }
        if self.max_delay_ms > 300_000 {
            return Err(HassLinkError::Config(
                "reconnect.max_delay_ms must be at most 300000".into(),
            ));
        }
        Ok(())
    }
}

fn default_initial_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    30_000
}
