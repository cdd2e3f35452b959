//! `GET /interceptor` (§4.H): the reverse-proxy auth-check endpoint.

use axum::{
	extract::State,
	http::{header, HeaderMap, StatusCode, Uri},
	response::{IntoResponse, Redirect, Response},
};
use uitsmijter_core::{
	error::{AuthorizationError, Error, ValidationError},
	obs::{interceptor_failure, interceptor_success},
};

use crate::{controller::base_resolver_input, cookie, error_page::ErrorPage, AppState};

/// Threshold past which an authenticated interceptor hit refreshes the cookie.
const REFRESH_THRESHOLD_SECONDS: i64 = 60 * 30;

/// Handles `GET /interceptor`.
pub async fn interceptor(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
	let mut input = base_resolver_input(&headers, uri.to_string());
	input.is_interceptor_route = true;

	let client_info = match state.resolver.resolve(&input) {
		Ok(client_info) => client_info,
		Err(error) => {
			interceptor_failure();
			return ErrorPage::new(error, &headers).into_response();
		},
	};

	let Some(tenant) = client_info.tenant.clone() else {
		interceptor_failure();
		return ErrorPage::new(Error::Validation(ValidationError::NotATenantHost), &headers).into_response();
	};

	if !tenant.interceptor.as_ref().map(|settings| settings.enabled).unwrap_or(true) {
		interceptor_failure();
		return ErrorPage::new(Error::Authorization(AuthorizationError::InterceptorDisabled), &headers)
			.with_tenant(&state.views_dir, &tenant)
			.into_response();
	}

	let Some(payload) = client_info.valid_payload.clone() else {
		interceptor_failure();
		let target = client_info.requested.as_absolute_url();
		return Redirect::temporary(&format!("/login?for={}", urlencoding_escape(&target))).into_response();
	};

	let mut response = StatusCode::OK.into_response();

	let age = time::OffsetDateTime::now_utc().unix_timestamp() - payload.iat;
	if age >= REFRESH_THRESHOLD_SECONDS {
		if let Ok(refreshed) = state.tokens.build(
			&client_info,
			&payload.sub,
			&payload.user,
			payload.role.clone(),
			payload.profile.clone(),
			state.config.token_expiration,
			Some(payload.auth_time),
		) {
			response.headers_mut().insert(
				header::SET_COOKIE,
				cookie::build(
					&refreshed,
					&tenant,
					&client_info.responsible_domain,
					state.config.secure,
					state.config.cookie_expiration,
				),
			);
		}
	}

	interceptor_success();

	response
}

fn urlencoding_escape(value: &str) -> String {
	url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
