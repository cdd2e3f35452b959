//! `GET /.well-known/openid-configuration` and `GET /.well-known/jwks.json`.

use axum::{
	extract::{Host, State},
	http::{header, HeaderMap, HeaderValue, StatusCode},
	response::IntoResponse,
	Json,
};
use serde::Serialize;
use uitsmijter_core::discovery;

use crate::{controller::common_signals, error_page::ErrorPage, AppState};

fn cache_headers() -> [(header::HeaderName, HeaderValue); 2] {
	[
		(header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600")),
		(header::HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff")),
	]
}

/// Serves the tenant's discovery document for the requesting host.
pub async fn discovery_document(
	State(state): State<AppState>,
	Host(host): Host,
	headers: HeaderMap,
) -> impl IntoResponse {
	let signals = common_signals(&headers);
	let host = signals.forwarded_host.unwrap_or(host);

	let Some(tenant) = state.store.find_tenant_for_host(&host) else {
		return ErrorPage::new(
			uitsmijter_core::error::Error::NotFound(uitsmijter_core::error::NotFoundError::UnknownHost),
			&headers,
		)
		.into_response();
	};

	let scheme = signals.forwarded_proto.as_deref().unwrap_or("https");
	let issuer = format!("{scheme}://{host}");
	let clients = state.store.clients_for_tenant(&tenant.name);
	let document = discovery::build(&issuer, &tenant, &clients);

	(cache_headers(), Json(document)).into_response()
}

#[derive(Debug, Serialize)]
struct JwksDocument {
	keys: Vec<uitsmijter_core::token::Jwk>,
}

/// Serves the signing key's JWKS entry.
pub async fn jwks(State(state): State<AppState>) -> impl IntoResponse {
	let document = JwksDocument { keys: vec![state.tokens.jwk()] };

	(StatusCode::OK, cache_headers(), Json(document))
}
