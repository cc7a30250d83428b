use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::gate::format::Format;
use crate::gate::middleware::{ValidationOutcome, validate_request};
use crate::gate::{MiddlewareConfig, ValidationGate};

/// Build the router: the configuration endpoint behind the validation gate, plus health
pub fn router(gate: ValidationGate, config_path: &str) -> Router {
    Router::new()
        .route(
            config_path,
            post(accept_config)
                .route_layer(middleware::from_fn_with_state(gate.clone(), validate_request)),
        )
        .route("/health", get(health))
        .with_state(gate)
}

/// Serve until Ctrl+C
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let gate = ValidationGate::new(MiddlewareConfig::resolve(
        &config.validator,
        config.server.max_body_bytes,
    ));
    let app = router(gate, &config.server.config_path);

    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    info!(
        "Listening on {}, accepting configuration at {}",
        listener.local_addr()?,
        config.server.config_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            warn!("Received Ctrl+C, shutting down...");
        })
        .await?;

    Ok(())
}

/// Acknowledge an admitted configuration update. Persisting it is left to the embedding server.
async fn accept_config(State(gate): State<ValidationGate>, request: Request) -> Response {
    let outcome = request.extensions().get::<ValidationOutcome>().cloned();
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, gate.config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "message": format!("Failed to read request body: {}", e) })),
            )
                .into_response();
        }
    };
    let format = outcome
        .as_ref()
        .map(|o| o.format)
        .unwrap_or_else(|| Format::resolve(&parts.uri, &parts.headers, &bytes));

    info!(bytes = bytes.len(), %format, "Accepted configuration update");
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "bytes": bytes.len(),
            "format": format,
            "validation": outcome,
        })),
    )
        .into_response()
}

async fn health(State(gate): State<ValidationGate>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "validator": gate.is_available() }))
}
