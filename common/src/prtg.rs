// PRTG HTTP API client
// Every call is a GET with credentials passed as query parameters.

use crate::config::PrtgConfig;
use crate::errors::PrtgError;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info, instrument};

const SENSOR_TABLE_PATH: &str = "/api/table.xml";
const SET_PROPERTY_PATH: &str = "/api/setobjectproperty.htm";

/// Credential sent with every request. A passhash wins over a password.
#[derive(Clone)]
enum Credential {
    Password(String),
    Passhash(String),
}

impl Credential {
    fn from_config(config: &PrtgConfig) -> Self {
        if config.passhash.is_empty() {
            Credential::Password(config.password.clone())
        } else {
            Credential::Passhash(config.passhash.clone())
        }
    }

    fn query_pair(&self) -> (&'static str, &str) {
        match self {
            Credential::Password(p) => ("password", p.as_str()),
            Credential::Passhash(h) => ("passhash", h.as_str()),
        }
    }
}

/// Client for the subset of the PRTG API used by the interval editor
///
/// One underlying connection pool serves the sensor fetch and every edit.
#[derive(Clone)]
pub struct PrtgClient {
    client: Client,
    base_url: String,
    username: String,
    credential: Credential,
    sensor_count: u32,
    columns: String,
}

impl PrtgClient {
    pub fn new(config: &PrtgConfig) -> Result<Self, PrtgError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| PrtgError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.server_url.trim().trim_end_matches('/').to_string(),
            username: config.username.clone(),
            credential: Credential::from_config(config),
            sensor_count: config.sensor_count,
            columns: config.columns.clone(),
        })
    }

    /// Build an API URL with the given parameters followed by the credentials
    fn api_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, PrtgError> {
        let (auth_key, auth_value) = self.credential.query_pair();
        Url::parse_with_params(
            &format!("{}{}", self.base_url, path),
            params
                .iter()
                .copied()
                .chain([("username", self.username.as_str()), (auth_key, auth_value)]),
        )
        .map_err(|e| PrtgError::InvalidResponse(format!("Invalid API URL: {}", e)))
    }

    /// URL of the interval edit for a sensor, with credentials masked
    pub fn redacted_set_interval_url(&self, sensor_id: &str, seconds: u32) -> String {
        match self.set_interval_url(sensor_id, seconds) {
            Ok(url) => redact_url(&url),
            Err(_) => format!("{}{}?id={}", self.base_url, SET_PROPERTY_PATH, sensor_id),
        }
    }

    fn set_interval_url(&self, sensor_id: &str, seconds: u32) -> Result<Url, PrtgError> {
        let value = seconds.to_string();
        self.api_url(
            SET_PROPERTY_PATH,
            &[("id", sensor_id), ("name", "interval"), ("value", value.as_str())],
        )
    }

    /// Download the sensor table as CSV text
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn fetch_sensor_table(&self) -> Result<String, PrtgError> {
        let count = self.sensor_count.to_string();
        let url = self.api_url(
            SENSOR_TABLE_PATH,
            &[
                ("content", "sensors"),
                ("output", "csvtable"),
                ("columns", self.columns.as_str()),
                ("count", count.as_str()),
            ],
        )?;
        debug!(url = %redact_url(&url), "Requesting sensor table");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PrtgError::Http(strip_url(e).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PrtgError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| PrtgError::InvalidResponse(strip_url(e).to_string()))?;
        info!(bytes = body.len(), "Sensor table received");
        Ok(body)
    }

    /// Set a sensor's polling interval
    ///
    /// Any HTTP response is returned as its status code; only transport
    /// failures are errors.
    #[instrument(skip(self))]
    pub async fn set_interval(
        &self,
        sensor_id: &str,
        seconds: u32,
    ) -> Result<StatusCode, PrtgError> {
        let url = self.set_interval_url(sensor_id, seconds)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PrtgError::Http(strip_url(e).to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Interval edit response");
        Ok(status)
    }
}

// reqwest errors embed the request URL, which carries credentials
fn strip_url(err: reqwest::Error) -> reqwest::Error {
    err.without_url()
}

/// Render a URL with password and passhash values masked
pub fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "password" || k == "passhash" {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
