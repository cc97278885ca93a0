//! HTTP client of the gateway.

use evm_lab::{CallRequest, CreateRequest, OperationResponse};
use serde::Serialize;
use tracing::debug;

use crate::{
    server::{ErrorBody, CALL_CONTRACT_ENDPOINT, CREATE_CONTRACT_ENDPOINT},
    Error, Result,
};

/// Sends operations to a running gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    /// Creates a client for the gateway at `base_url`, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }

    /// Creates a client for the gateway listening on `port` of this host.
    pub fn local(port: u16) -> Self {
        Self::new(format!("http://localhost:{port}"))
    }

    /// Deploys a contract.
    pub async fn deploy(&self, request: &CreateRequest) -> Result<OperationResponse> {
        self.post(CREATE_CONTRACT_ENDPOINT, request).await
    }

    /// Calls a contract.
    pub async fn call(&self, request: &CallRequest) -> Result<OperationResponse> {
        self.post(CALL_CONTRACT_ENDPOINT, request).await
    }

    async fn post<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<OperationResponse> {
        let url = format!("{}{endpoint}", self.base_url.trim_end_matches('/'));
        debug!(%url, "Sending request");
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let text = response.text().await?;
        let message = serde_json::from_str::<ErrorBody>(&text).map_or(text, |body| body.message);
        Err(Error::Server { status: status.as_u16(), message })
    }
}
