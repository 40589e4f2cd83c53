//! Client for the game platform's REST API.
//!
//! Endpoints are not hard-coded: the platform hands out a resource index per
//! user and every other URL is looked up in it.

use async_trait::async_trait;
use botscope_engine::{BackendError, SimulationBackend};
use botscope_protocol::{
    resources, CreateSandboxRequest, ResourceIndex, Snapshot, StepRequest, WorldConfig,
};
use reqwest::header::ACCEPT;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    sandboxes: String,
}

impl PlatformClient {
    /// Fetches the resource index for `user` from the platform at `base`.
    pub async fn login(base: &str, user: &str) -> Result<Self, BackendError> {
        let http = reqwest::Client::new();
        let base = base.trim_end_matches('/');
        let index: ResourceIndex = send(http.get(format!("{base}/api/users/{user}"))).await?;
        let sandboxes = index
            .url(resources::SANDBOXES)
            .ok_or_else(|| BackendError::MissingResource(resources::SANDBOXES.to_string()))?;
        let sandboxes = absolute_url(base, sandboxes);
        tracing::info!(user, %sandboxes, "logged in to platform");
        Ok(Self { http, sandboxes })
    }

    pub fn sandboxes_url(&self) -> &str {
        &self.sandboxes
    }
}

#[async_trait]
impl SimulationBackend for PlatformClient {
    async fn create_sandbox(&self, world: &WorldConfig) -> Result<Snapshot, BackendError> {
        let body = CreateSandboxRequest {
            config: world.clone(),
        };
        send(self.http.post(&self.sandboxes).json(&body)).await
    }

    async fn advance(&self, steps: u32) -> Result<Snapshot, BackendError> {
        send(self.http.put(&self.sandboxes).json(&StepRequest { steps })).await
    }

    async fn destroy_sandboxes(&self) -> Result<(), BackendError> {
        send::<serde_json::Value>(self.http.delete(&self.sandboxes)).await?;
        Ok(())
    }
}

async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, BackendError> {
    let resp = req
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(transport)?;
    let status = resp.status();
    let body = resp.text().await.map_err(transport)?;
    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
            body,
        });
    }
    decode_body(&body)
}

/// An empty body is an empty object; anything else must be valid JSON.
pub fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    let body = if body.trim().is_empty() {
        tracing::debug!("empty response body");
        "{}"
    } else {
        body
    };
    serde_json::from_str(body).map_err(BackendError::Decode)
}

fn absolute_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    match url.strip_prefix('/') {
        Some(path) => format!("{base}/{path}"),
        None => format!("{base}/{url}"),
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(Box::new(err))
}
