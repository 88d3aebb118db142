//! HTTP boundary.
//!
//! Short-lived request/response calls sharing the socket session's
//! credential: bearer-token authorization, JSON bodies, raw
//! `serde_json::Value` in and out. Typed record schemas live above this
//! layer.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use hasslink_core::{HassLinkError, Result};

use crate::config::ClientConfig;

pub struct RestClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl RestClient {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| HassLinkError::Config("token contains invalid header bytes".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(rest_err)?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// GET a server path like `/api/states`, returning the JSON body.
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.config.rest_endpoint(path)?;
        let resp = self.http.get(url).send().await.map_err(rest_err)?;
        resp.error_for_status()
            .map_err(rest_err)?
            .json()
            .await
            .map_err(rest_err)
    }

    /// POST a JSON body to a server path, returning the JSON response.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.config.rest_endpoint(path)?;
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(rest_err)?;
        resp.error_for_status()
            .map_err(rest_err)?
            .json()
            .await
            .map_err(rest_err)
    }
}

fn rest_err(e: reqwest::Error) -> HassLinkError {
    HassLinkError::Rest(e.to_string())
}
