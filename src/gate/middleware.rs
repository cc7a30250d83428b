//! Validation middleware for configuration updates
//!
//! Intercepts write requests, hands the body to the validator and either
//! forwards the request untouched or answers 422 with the validator's findings.
//! Validator failures never reject a request.

use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ValidationGate;
use super::format::{Format, query_param};
use super::types::{Issue, Mode, Verdict};

/// Query parameter marking an exploratory request
pub const DRY_RUN_PARAM: &str = "dry_run";

pub const STATUS_HEADER: &str = "x-validation-status";
pub const MODE_HEADER: &str = "x-validation-mode";
pub const WARNINGS_HEADER: &str = "x-validation-warnings";
pub const DURATION_HEADER: &str = "x-validation-duration-ms";

/// What happened to a request that was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// The validator accepted the document
    Passed,
    /// The request did not need validation
    Skipped,
    /// The validator could not produce a verdict
    Unavailable,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Passed => "passed",
            ValidationStatus::Skipped => "skipped",
            ValidationStatus::Unavailable => "unavailable",
        }
    }
}

/// Validation summary attached to forwarded requests, read-only for handlers
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub status: ValidationStatus,
    pub mode: Mode,
    pub format: Format,
    pub warnings: usize,
    pub duration_ms: u64,
}

/// Body of a 422 response
#[derive(Serialize)]
struct Rejection<'a> {
    status: &'static str,
    message: &'a str,
    valid: bool,
    should_block: bool,
    mode: Mode,
    errors: &'a [Issue],
    warnings: &'a [Issue],
    info: &'a [Issue],
    duration_ms: u64,
}

/// Body of a 400 response
#[derive(Serialize)]
struct ReadError {
    status: &'static str,
    message: String,
}

impl ValidationGate {
    /// Decide whether a request has to go through the validator
    pub fn should_validate(&self, request: &Request) -> bool {
        if self.validator.is_none() {
            return false;
        }

        if request.method() != Method::POST {
            return false;
        }

        if self.config.skip_dry_run && is_dry_run(request) {
            debug!("Skipping validation for dry run request");
            return false;
        }

        true
    }
}

/// Whether the `dry_run` query parameter holds a truthy token
pub fn is_dry_run(request: &Request) -> bool {
    query_param(request.uri(), DRY_RUN_PARAM)
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}

/// Axum middleware validating configuration updates before they reach the handler
///
/// Install with `axum::middleware::from_fn_with_state(gate, validate_request)`.
pub async fn validate_request(
    State(gate): State<ValidationGate>,
    request: Request,
    next: Next,
) -> Response {
    let validator = match &gate.validator {
        Some(validator) if gate.should_validate(&request) => validator.clone(),
        _ => {
            let mut response = next.run(request).await;
            set_header(&mut response, STATUS_HEADER, ValidationStatus::Skipped.as_str());
            return response;
        }
    };

    let (mut parts, body) = request.into_parts();
    let bytes = match to_bytes(body, gate.config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return read_error(format!("Failed to read request body: {}", e));
        }
    };

    let format = Format::resolve(&parts.uri, &parts.headers, &bytes);
    let mode = gate.config.mode;
    let cancel = parts
        .extensions
        .get::<CancellationToken>()
        .cloned()
        .unwrap_or_default();
    debug!(%format, %mode, bytes = bytes.len(), "Validating configuration update");

    let start = Instant::now();
    let result = validator.validate(&bytes, format, &cancel).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let verdict = match result {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(error = %e, duration_ms = elapsed_ms, "Validation unavailable, forwarding unvalidated");
            let request = Request::from_parts(parts, Body::from(bytes));
            let mut response = next.run(request).await;
            set_header(&mut response, STATUS_HEADER, ValidationStatus::Unavailable.as_str());
            return response;
        }
    };

    for problem in verdict.inconsistencies() {
        warn!(%mode, "Inconsistent verdict: {}", problem);
    }

    if verdict.blocks() {
        info!(
            %mode,
            errors = verdict.errors.len(),
            warnings = verdict.warning_count(),
            duration_ms = verdict.duration_ms,
            "Configuration update rejected"
        );
        return reject(&verdict, mode);
    }

    let outcome = ValidationOutcome {
        status: ValidationStatus::Passed,
        mode,
        format,
        warnings: verdict.warning_count(),
        duration_ms: verdict.duration_ms,
    };
    info!(
        %mode,
        valid = verdict.valid,
        warnings = outcome.warnings,
        duration_ms = outcome.duration_ms,
        "Configuration update passed validation"
    );

    parts.extensions.insert(outcome.clone());
    let request = Request::from_parts(parts, Body::from(bytes));
    let mut response = next.run(request).await;
    set_header(&mut response, STATUS_HEADER, outcome.status.as_str());
    set_header(&mut response, MODE_HEADER, mode.as_str());
    set_header(&mut response, WARNINGS_HEADER, &outcome.warnings.to_string());
    set_header(&mut response, DURATION_HEADER, &outcome.duration_ms.to_string());
    response
}

fn reject(verdict: &Verdict, mode: Mode) -> Response {
    let body = Rejection {
        status: "validation_failed",
        message: &verdict.message,
        valid: verdict.valid,
        should_block: verdict.should_block,
        mode,
        errors: &verdict.errors,
        warnings: &verdict.warnings,
        info: &verdict.info,
        duration_ms: verdict.duration_ms,
    };
    (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
}

fn read_error(message: String) -> Response {
    let body = ReadError {
        status: "error",
        message,
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn set_header(response: &mut Response, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers_mut().insert(name, value);
    }
}
