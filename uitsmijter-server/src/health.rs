//! `/health`, `/health/ready`, and `/metrics` (§4.J).

use axum::{
	extract::State,
	http::{header, HeaderMap, StatusCode},
	response::IntoResponse,
};

use crate::AppState;

/// Liveness probe: `204` when the session-store backend answers, `500` otherwise.
pub async fn health(State(state): State<AppState>) -> StatusCode {
	if state.is_healthy().await {
		StatusCode::NO_CONTENT
	} else {
		StatusCode::INTERNAL_SERVER_ERROR
	}
}

/// Readiness probe: `204` once at least one tenant is loaded, `417` until then.
pub async fn ready(State(state): State<AppState>) -> StatusCode {
	if state.store.tenant_count() > 0 {
		StatusCode::NO_CONTENT
	} else {
		StatusCode::EXPECTATION_FAILED
	}
}

/// OpenMetrics/Prometheus export, gated on `Accept: application/openmetrics-text`.
pub async fn metrics(headers: HeaderMap, State(state): State<AppState>) -> impl IntoResponse {
	let accepts = headers
		.get(header::ACCEPT)
		.and_then(|v| v.to_str().ok())
		.is_some_and(|accept| accept.contains("application/openmetrics-text"));

	if !accepts {
		return (StatusCode::NOT_ACCEPTABLE, String::new());
	}

	uitsmijter_core::obs::set_tenants_count(state.store.tenant_count());
	uitsmijter_core::obs::set_clients_count(state.store.client_count());

	(StatusCode::OK, state.metrics_handle.render())
}
