//! HTTP surface of the `snapbots-gateway` binary.
//!
//! | Route | Middleware |
//! |---|---|
//! | `GET /health` | none |
//! | `POST /jobs` | authorization + transaction confirmation |
//! | `GET /jobs/{job_id}?consumer_id=` | authorization |
//! | `PUT /jobs/{request_id}` | authorization |

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use snapbots_nats::Bus;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::jobs::JobGateway;
use crate::messages::Job;
use crate::response::ApiResponse;
use crate::signal::shutdown_signal;

#[derive(Clone)]
pub struct AppState<N> {
    jobs: JobGateway<N>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    pub consumer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ConsumerQuery {
    pub consumer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobBody {
    pub consumer_id: String,
    pub status: String,
    #[serde(default)]
    pub payload: Value,
}

pub fn router<N: Bus>(gateway: &Gateway<N>) -> Router {
    let state = AppState {
        jobs: gateway.jobs().clone(),
    };

    let metered = gateway.with_metering(Router::new().route("/jobs", post(create_job::<N>)));
    let authorized = gateway.with_authorization(
        Router::new().route("/jobs/{id}", get(get_job::<N>).put(update_job::<N>)),
    );

    Router::new()
        .route("/health", get(health))
        .merge(metered)
        .merge(authorized)
        .with_state(state)
}

/// Serves until SIGINT/SIGTERM, then flushes the bus connection.
pub async fn serve<N: Bus>(gateway: Gateway<N>, port: u16) -> std::io::Result<()> {
    let app = router(&gateway);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, bot_id = %gateway.bot_id(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = gateway.shutdown().await {
        warn!(error = %e, "Failed to flush bus connection on shutdown");
    }
    Ok(())
}

async fn health() -> ApiResponse<()> {
    ApiResponse::empty(StatusCode::OK, "ok")
}

async fn create_job<N: Bus>(
    State(state): State<AppState<N>>,
    context: RequestContext,
    body: Result<Json<CreateJobBody>, JsonRejection>,
) -> Result<ApiResponse<Job>, GatewayError> {
    let Json(body) = body.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    let job = state
        .jobs
        .create_job(
            context.bot_id().as_str(),
            &body.consumer_id,
            &context.request_id().to_string(),
        )
        .await?;
    Ok(ApiResponse::success(StatusCode::CREATED, "Job created", job))
}

async fn get_job<N: Bus>(
    State(state): State<AppState<N>>,
    context: RequestContext,
    Path(job_id): Path<String>,
    query: Result<Query<ConsumerQuery>, QueryRejection>,
) -> Result<ApiResponse<Job>, GatewayError> {
    let Query(query) = query.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    let job = state
        .jobs
        .get_job(context.bot_id().as_str(), &query.consumer_id, &job_id)
        .await?;
    Ok(ApiResponse::success(StatusCode::OK, "Job found", job))
}

async fn update_job<N: Bus>(
    State(state): State<AppState<N>>,
    Path(request_id): Path<String>,
    body: Result<Json<UpdateJobBody>, JsonRejection>,
) -> Result<ApiResponse<()>, GatewayError> {
    let Json(body) = body.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    state
        .jobs
        .update_job(&body.consumer_id, &request_id, &body.status, body.payload)
        .await?;
    Ok(ApiResponse::accepted("Job update accepted"))
}
