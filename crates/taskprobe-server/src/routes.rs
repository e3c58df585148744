//! Route table and handlers.
//!
//! Handlers only translate: form values and headers in, [`Probe`] call,
//! status and body out.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use taskprobe_core::app::{EtaOutcome, Probe, WhichService, paths};
use taskprobe_core::domain::{Outcome, TaskHandle};
use taskprobe_core::observability::task_span;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::error::ApiError;
use crate::extract::{Attempt, FormValues};

pub type AppState = Arc<Probe>;

type HandleResult = Result<Json<TaskHandle>, ApiError>;

pub fn router(probe: Arc<Probe>) -> Router {
    Router::new()
        .route(paths::HEALTH, get(health))
        .route(paths::TRIGGER_SLEEP, get(trigger_sleep).post(trigger_sleep))
        .route(paths::SLEEP, post(sleep))
        .route(
            paths::TRIGGER_SLEEP_VIA_DELAY,
            get(trigger_sleep_via_delay).post(trigger_sleep_via_delay),
        )
        .route(paths::DELAYED_CALL, post(delayed_call))
        .route(
            paths::TRIGGER_UNSTABLE,
            get(trigger_unstable).post(trigger_unstable),
        )
        .route(paths::UNSTABLE, post(unstable))
        .route(
            paths::TRIGGER_PROTECTED,
            get(trigger_protected).post(trigger_protected),
        )
        .route(paths::PROTECTED, post(protected))
        .route(paths::TRIGGER_PARAMS, get(trigger_params).post(trigger_params))
        .route(paths::PARAMS, post(params))
        .route(paths::WHICH_SERVICE, get(which_service).post(which_service))
        .route(paths::TASK_WITH_ETA, get(task_with_eta).post(task_with_eta))
        .layer(TraceLayer::new_for_http())
        .with_state(probe)
}

/// SUCCESS → empty 200, FAILURE → 500 with the reason.
fn outcome_response(outcome: Outcome) -> Response {
    if outcome.is_success() {
        return StatusCode::OK.into_response();
    }
    let reason = outcome.reason.unwrap_or_default();
    (StatusCode::INTERNAL_SERVER_ERROR, reason).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn trigger_sleep(State(probe): State<AppState>, FormValues(form): FormValues) -> HandleResult {
    Ok(Json(probe.trigger_sleep(&form).await?))
}

async fn sleep(
    State(probe): State<AppState>,
    Attempt(attempt): Attempt,
    FormValues(form): FormValues,
) -> Result<StatusCode, ApiError> {
    probe
        .sleep(&form, &attempt)
        .instrument(task_span("sleep", &attempt))
        .await?;
    Ok(StatusCode::OK)
}

async fn trigger_sleep_via_delay(
    State(probe): State<AppState>,
    FormValues(form): FormValues,
) -> HandleResult {
    Ok(Json(probe.trigger_sleep_via_delay(&form).await?))
}

async fn delayed_call(
    State(probe): State<AppState>,
    Attempt(attempt): Attempt,
    FormValues(form): FormValues,
) -> Result<Response, ApiError> {
    let outcome = probe
        .invoke_delayed(&form, &attempt)
        .instrument(task_span("delayed-call", &attempt))
        .await?;
    Ok(outcome_response(outcome))
}

async fn trigger_unstable(
    State(probe): State<AppState>,
    FormValues(form): FormValues,
) -> HandleResult {
    Ok(Json(probe.trigger_unstable(&form).await?))
}

async fn unstable(
    State(probe): State<AppState>,
    Attempt(attempt): Attempt,
    FormValues(form): FormValues,
) -> Response {
    let outcome = task_span("unstable", &attempt).in_scope(|| probe.unstable(&form, &attempt));
    outcome_response(outcome)
}

async fn trigger_protected(State(probe): State<AppState>) -> HandleResult {
    Ok(Json(probe.trigger_protected().await?))
}

async fn protected(
    State(probe): State<AppState>,
    Attempt(attempt): Attempt,
) -> Result<StatusCode, ApiError> {
    probe
        .protected(&attempt)
        .instrument(task_span("protected", &attempt))
        .await?;
    Ok(StatusCode::OK)
}

async fn trigger_params(State(probe): State<AppState>) -> HandleResult {
    Ok(Json(probe.trigger_params().await?))
}

async fn params(
    State(probe): State<AppState>,
    Attempt(attempt): Attempt,
    FormValues(form): FormValues,
) -> StatusCode {
    task_span("params", &attempt).in_scope(|| probe.params(&form, &attempt));
    StatusCode::OK
}

async fn which_service(
    State(probe): State<AppState>,
    Attempt(attempt): Attempt,
    FormValues(form): FormValues,
) -> Result<Response, ApiError> {
    let result = probe
        .which_service(&form, &attempt)
        .instrument(task_span("which-service", &attempt))
        .await?;
    Ok(match result {
        WhichService::Enqueued(_) => StatusCode::OK.into_response(),
        WhichService::Report(report) => Json(report).into_response(),
    })
}

async fn task_with_eta(
    State(probe): State<AppState>,
    Attempt(attempt): Attempt,
    FormValues(form): FormValues,
) -> Result<Response, ApiError> {
    let result = probe
        .task_with_eta(&form, &attempt)
        .instrument(task_span("task-with-eta", &attempt))
        .await?;
    Ok(match result {
        EtaOutcome::Scheduled(handle) => Json(handle).into_response(),
        EtaOutcome::Fired(report) => Json(report).into_response(),
    })
}
