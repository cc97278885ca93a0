//! HTTP routes of the gateway.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use evm_lab::{CallRequest, CreateRequest, Gateway, GatewayError, OperationRequest, OperationResponse};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::task::JoinError;
use tracing::{debug, error};

/// Deploy endpoint
pub const DEPLOY_ENDPOINT: &str = "/deploy";
/// Historical spelling of the deploy endpoint
pub const CREATE_CONTRACT_ENDPOINT: &str = "/create_contract";
/// Call endpoint
pub const CALL_ENDPOINT: &str = "/call";
/// Historical spelling of the call endpoint
pub const CALL_CONTRACT_ENDPOINT: &str = "/call_contract";

/// Builds the router serving `gateway`.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route(DEPLOY_ENDPOINT, post(create))
        .route(CREATE_CONTRACT_ENDPOINT, post(create))
        .route(CALL_ENDPOINT, post(call))
        .route(CALL_CONTRACT_ENDPOINT, post(call))
        .with_state(gateway)
}

/// Body of every non-200 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// What went wrong
    pub message: String,
}

/// Request-level failure of a route.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed body, invalid field, or gateway busy
    BadRequest(String),
    /// The worker running the operation died
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        error!(error = %err, "Operation worker failed");
        Self::Internal(err.to_string())
    }
}

async fn create(
    State(gateway): State<Arc<Gateway>>,
    body: Bytes,
) -> Result<Json<OperationResponse>, ApiError> {
    execute::<CreateRequest>(gateway, body).await
}

async fn call(
    State(gateway): State<Arc<Gateway>>,
    body: Bytes,
) -> Result<Json<OperationResponse>, ApiError> {
    execute::<CallRequest>(gateway, body).await
}

/// Runs the operation on a blocking worker.
///
/// A busy gateway is answered right here, before a worker is taken or the body is parsed. The
/// worker still goes through admission itself and parses the body only once admitted.
async fn execute<T>(gateway: Arc<Gateway>, body: Bytes) -> Result<Json<OperationResponse>, ApiError>
where
    T: DeserializeOwned + Into<OperationRequest> + 'static,
{
    if gateway.is_busy() {
        debug!("Gateway busy, request turned away");
        return Err(GatewayError::Rejected.into());
    }
    debug!(len = body.len(), "Request received");
    let response = tokio::task::spawn_blocking(move || {
        gateway.execute_with(|| {
            let Json(request) = Json::<T>::from_bytes(&body)?;
            Ok::<_, ApiError>(request.into())
        })
    })
    .await??;
    Ok(Json(response))
}
