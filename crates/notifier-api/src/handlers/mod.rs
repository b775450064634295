//! HTTP handlers for the notifier.
//!
//! Error responses are JSON objects of the shape
//! `{"message": string, "error"?: string}`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};
use uuid::Uuid;

use notifier_core::Error;

use crate::services::{CoalescerHandle, ConceptNotifier, HealthService, NotificationRequest};

/// Layout accepted for `lastChangeDate` query parameters.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Upper limit on how far in the past updates can be reingested.
pub const LAST_CHANGE_LIMIT_HOURS: i64 = 168;

/// Shared state of the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub notifier: Arc<dyn ConceptNotifier>,
    pub coalescer: CoalescerHandle,
    pub health: Arc<HealthService>,
}

/// Build the full router, admin endpoints included.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/notify", get(handle_notify))
        .route("/force-notify", post(handle_force_notify))
        .route("/concept/:uuid", get(handle_get_concept))
        .route("/concepts", get(handle_get_concepts))
        .route("/__health", get(handle_health))
        .route("/__gtg", get(handle_gtg))
        .route("/__build-info", get(handle_build_info))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[derive(Serialize)]
struct ResponseData {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn json_message(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ResponseData {
            message: message.into(),
            error: None,
        }),
    )
        .into_response()
}

fn json_message_with_error(status: StatusCode, message: impl Into<String>, error: &Error) -> Response {
    (
        status,
        Json(ResponseData {
            message: message.into(),
            error: Some(error.to_string()),
        }),
    )
        .into_response()
}

/// Inbound transaction id, for logs and the coalescer only; published
/// messages always carry freshly minted ids.
fn transaction_id(headers: &HeaderMap) -> String {
    headers
        .get(notifier_core::TRANSACTION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("tid_{}", Uuid::new_v4().simple()))
}

fn validate_last_change_date(value: &str) -> Result<DateTime<Utc>, String> {
    let parsed = NaiveDateTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|_| "Date is not in the format YYYY-MM-DDThh:mm:ssZ".to_string())?
        .and_utc();
    debug!(time = %parsed, "Parsing notification time");

    // Absorb clock wobble between Smartlogic and this service.
    let adjusted = parsed - chrono::Duration::milliseconds(10);

    if Utc::now() - adjusted > chrono::Duration::hours(LAST_CHANGE_LIMIT_HOURS) {
        return Err(format!(
            "Last change date should be time point in the last {} hours",
            LAST_CHANGE_LIMIT_HOURS
        ));
    }
    Ok(adjusted)
}

/// `GET /notify` — accept a change ping and buffer it for the next
/// dispatch tick. 200 means "accepted", not "processed".
async fn handle_notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut not_set = Vec::new();
    for name in ["modifiedGraphId", "affectedGraphId", "lastChangeDate"] {
        if params.get(name).map_or(true, |v| v.is_empty()) {
            not_set.push(name);
        }
    }
    if !not_set.is_empty() {
        return json_message(
            StatusCode::BAD_REQUEST,
            format!("Query parameters were not set: {}", not_set.join(", ")),
        );
    }

    let last_change = match validate_last_change_date(&params["lastChangeDate"]) {
        Ok(t) => t,
        Err(msg) => return json_message(StatusCode::BAD_REQUEST, msg),
    };

    let transaction_id = transaction_id(&headers);
    info!(
        transaction_id = %transaction_id,
        since = %last_change,
        "Accepted concept change notification"
    );
    state.coalescer.enqueue(NotificationRequest {
        notify_since: last_change,
        transaction_id,
    });

    json_message(StatusCode::OK, "Concepts successfully ingested")
}

/// `GET /concepts?lastChangeDate=...` — synchronously list changed concept
/// UUIDs.
async fn handle_get_concepts(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let value = match params.get("lastChangeDate").filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => {
            return json_message(
                StatusCode::BAD_REQUEST,
                "Query parameter lastChangeDate was not set.",
            )
        }
    };

    let last_change = match validate_last_change_date(value) {
        Ok(t) => t,
        Err(msg) => return json_message(StatusCode::BAD_REQUEST, msg),
    };

    match state.notifier.get_changed_concept_list(last_change).await {
        Ok(uuids) => (StatusCode::OK, Json(uuids)).into_response(),
        Err(e) => json_message_with_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "There was an error getting the changes",
            &e,
        ),
    }
}

/// `GET /concept/:uuid` — fetch one concept verbatim.
async fn handle_get_concept(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Response {
    match state.notifier.get_concept(&uuid).await {
        Ok(concept) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/ld+json")],
            concept,
        )
            .into_response(),
        Err(e) => {
            let status = match e {
                Error::ConceptNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            json_message_with_error(status, "There was an error retrieving the concept", &e)
        }
    }
}

#[derive(Deserialize)]
struct ForceNotifyPayload {
    #[serde(default)]
    uuids: Option<Vec<String>>,
}

/// `POST /force-notify` — publish the given concepts without consulting the
/// change log.
async fn handle_force_notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload: ForceNotifyPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            return json_message_with_error(
                StatusCode::BAD_REQUEST,
                "There was an error decoding the payload",
                &Error::Serialization(e.to_string()),
            )
        }
    };

    let Some(uuids) = payload.uuids else {
        return json_message(StatusCode::BAD_REQUEST, "No 'uuids' parameter provided");
    };

    match state
        .notifier
        .force_notify(&uuids, &transaction_id(&headers))
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            "Concept notification completed",
        )
            .into_response(),
        Err(_) => json_message(
            StatusCode::INTERNAL_SERVER_ERROR,
            "There was an error completing the force notify",
        ),
    }
}

/// `GET /__health` — always 200, per-check status in the body.
async fn handle_health(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(state.health.health_report().await)).into_response()
}

/// `GET /__gtg` — 200 only when every check passes.
async fn handle_gtg(State(state): State<AppState>) -> Response {
    match state.health.gtg().await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg).into_response(),
    }
}

/// `GET /__build-info` — static build metadata.
async fn handle_build_info() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "repository": "smartlogic-notifier",
            "revision": option_env!("BUILD_REVISION").unwrap_or("unknown"),
            "dateTime": option_env!("BUILD_DATETIME").unwrap_or("unknown"),
        })),
    )
        .into_response()
}
