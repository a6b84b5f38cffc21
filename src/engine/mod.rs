//! REST client for the remote geoprocessing engine (actinia).
//!
//! Only two things are needed from the engine: a location/mapset to work in,
//! and somewhere to submit process chains. Requests are synchronous and are
//! not retried.

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::chain::ProcessChain;
use crate::config::EngineSettings;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct LocationListing {
    #[serde(default)]
    projects: Vec<String>,
    #[serde(default)]
    locations: Vec<String>,
}

impl LocationListing {
    fn names(self) -> Vec<String> {
        if self.projects.is_empty() { self.locations } else { self.projects }
    }
}

#[derive(Debug, Deserialize)]
struct ProcessLogEntry {
    #[serde(default)]
    stdout: String,
}

#[derive(Debug, Deserialize)]
struct MapsetListing {
    #[serde(default)]
    process_results: Option<Vec<String>>,
    #[serde(default)]
    process_log: Vec<ProcessLogEntry>,
}

impl MapsetListing {
    fn names(self) -> Vec<String> {
        if let Some(names) = self.process_results {
            return names;
        }
        self.process_log
            .first()
            .map(|entry| entry.stdout.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// What the engine returns after accepting a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

pub struct EngineClient {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl EngineClient {
    pub fn new(settings: &EngineSettings) -> Result<Self, AppError> {
        let (user, password) = settings.credentials()?;
        Ok(Self {
            client: Client::new(),
            base_url: settings.url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    pub fn locations_url(&self) -> String {
        format!("{}/locations", self.base_url)
    }

    pub fn location_url(&self, location: &str) -> String {
        format!("{}/locations/{location}", self.base_url)
    }

    pub fn mapsets_url(&self, location: &str) -> String {
        format!("{}/locations/{location}/mapsets", self.base_url)
    }

    pub fn mapset_url(&self, location: &str, mapset: &str) -> String {
        format!("{}/locations/{location}/mapsets/{mapset}", self.base_url)
    }

    pub fn processing_url(&self, location: &str, mapset: &str) -> String {
        format!("{}/processing_async", self.mapset_url(location, mapset))
    }

    /// Create `location` (in `epsg`) and `mapset` unless they already exist.
    pub fn ensure_location_and_mapset(&self, location: &str, mapset: &str, epsg: u32) -> Result<(), AppError> {
        let locations: LocationListing = self.send_json(self.client.get(self.locations_url()), "list locations")?;
        if !locations.names().iter().any(|l| l == location) {
            tracing::info!(location, epsg, "Creating engine location");
            let body = serde_json::json!({ "epsg": epsg.to_string() });
            self.send(self.client.post(self.location_url(location)).json(&body), "create location")?;
        }

        let mapsets: MapsetListing = self.send_json(self.client.get(self.mapsets_url(location)), "list mapsets")?;
        if !mapsets.names().iter().any(|m| m == mapset) {
            tracing::info!(location, mapset, "Creating engine mapset");
            self.send(self.client.post(self.mapset_url(location, mapset)), "create mapset")?;
        }
        Ok(())
    }

    /// Submit a chain for asynchronous execution in `location`/`mapset`.
    pub fn submit_chain(&self, location: &str, mapset: &str, chain: &ProcessChain) -> Result<SubmissionReceipt, AppError> {
        tracing::info!(location, mapset, steps = chain.list.len(), "Submitting process chain");
        let receipt: SubmissionReceipt = self.send_json(
            self.client.post(self.processing_url(location, mapset)).json(chain),
            "submit process chain",
        )?;
        tracing::info!(resource_id = ?receipt.resource_id, status = ?receipt.status, "Process chain accepted");
        Ok(receipt)
    }

    fn send(&self, req: RequestBuilder, what: &str) -> Result<Response, AppError> {
        let resp = req
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .map_err(|e| AppError::engine(format!("Failed to {what}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(AppError::engine(format!("Failed to {what}: HTTP {status}: {body}")));
        }
        Ok(resp)
    }

    fn send_json<T: for<'de> Deserialize<'de>>(&self, req: RequestBuilder, what: &str) -> Result<T, AppError> {
        self.send(req, what)?
            .json::<T>()
            .map_err(|e| AppError::engine(format!("Failed to {what}: invalid response: {e}")))
    }
}
