//! `GET /token/info` (§4.H): the non-sensitive subset of a verified payload.

use axum::{
	extract::State,
	http::HeaderMap,
	response::{IntoResponse, Response},
};
use serde::Serialize;
use uitsmijter_core::{
	domain::ProfileValue,
	error::{AuthError, Error},
};

use crate::{controller::bearer_token, error_page::ErrorPage, AppState};

#[derive(Debug, Serialize)]
struct TokenInfo {
	user: String,
	role: Option<String>,
	profile: Option<ProfileValue>,
	tenant: String,
}

/// Handles `GET /token/info`.
pub async fn token_info(State(state): State<AppState>, headers: HeaderMap) -> Response {
	let Some(token) = bearer_token(&headers) else {
		return ErrorPage::new(Error::Auth(AuthError::InvalidToken), &headers).into_response();
	};

	let payload = match state.tokens.verify(&token) {
		Ok(payload) => payload,
		Err(_) => return ErrorPage::new(Error::Auth(AuthError::InvalidToken), &headers).into_response(),
	};

	if payload.is_expired(time::OffsetDateTime::now_utc()) {
		return ErrorPage::new(Error::Auth(AuthError::InvalidToken), &headers).into_response();
	}

	let info = TokenInfo { user: payload.user, role: payload.role, profile: payload.profile, tenant: payload.tenant };

	axum::Json(info).into_response()
}
