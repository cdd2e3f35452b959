//! `GET /authorize` (§4.H): the authorization-code (+ optional PKCE) entry point.

use axum::{
	extract::{Query, State},
	http::{HeaderMap, Uri},
	response::{IntoResponse, Response},
};
use serde::Deserialize;
use uitsmijter_core::{
	domain::client::GrantType,
	error::{AuthorizationError, Error, NotFoundError, NotImplementedError, ValidationError},
	obs::{oauth_failure, oauth_success, observe_authorize_attempts},
};

use crate::{
	controller::{base_resolver_input, issue_authorization_code, render_login_form, CodeRequest},
	error_page::ErrorPage,
	AppState,
};

/// Query string accepted by `GET /authorize`.
#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
	/// Always `code` for the flows this server implements.
	pub response_type: Option<String>,
	/// The requesting client's identifier.
	pub client_id: Option<String>,
	/// Where to send the user once authorized.
	pub redirect_uri: Option<String>,
	/// Opaque value echoed back unmodified.
	pub state: Option<String>,
	/// Space-separated requested scopes.
	pub scope: Option<String>,
	/// PKCE code challenge.
	pub code_challenge: Option<String>,
	/// PKCE code challenge method: `S256` or `plain`.
	pub code_challenge_method: Option<String>,
}

/// Handles `GET /authorize`.
pub async fn authorize(
	State(state): State<AppState>,
	Query(query): Query<AuthorizeQuery>,
	uri: Uri,
	headers: HeaderMap,
) -> Response {
	if let Some(method) = &query.code_challenge_method {
		if method != "S256" && method != "plain" {
			return ErrorPage::new(Error::NotImplemented(NotImplementedError::CodeChallengeMethod), &headers)
				.into_response();
		}
	}

	let mut input = base_resolver_input(&headers, uri.to_string());
	input.client_id_query = query.client_id.clone();

	let client_info = match state.resolver.resolve(&input) {
		Ok(client_info) => client_info,
		Err(error) => return ErrorPage::new(error, &headers).into_response(),
	};

	let Some(client) = client_info.client.clone() else {
		return ErrorPage::new(Error::NotFound(NotFoundError::NoClient), &headers).into_response();
	};
	let Some(tenant) = client_info.tenant.clone() else {
		return ErrorPage::new(Error::NotFound(NotFoundError::NoTenant), &headers).into_response();
	};

	if !client.allows_grant(GrantType::AuthorizationCode) {
		oauth_failure();
		return ErrorPage::new(
			Error::Authorization(AuthorizationError::GrantNotAllowed { grant: "authorization_code" }),
			&headers,
		)
		.with_tenant(&state.views_dir, &tenant)
		.into_response();
	}

	let Some(redirect_uri) = query.redirect_uri.clone() else {
		return ErrorPage::new(Error::Validation(ValidationError::MissingField { field: "redirect_uri" }), &headers)
			.with_tenant(&state.views_dir, &tenant)
			.into_response();
	};
	if !client.allows_redirect(&redirect_uri) {
		oauth_failure();
		return ErrorPage::new(Error::Authorization(AuthorizationError::RedirectMismatch), &headers)
			.with_tenant(&state.views_dir, &tenant)
			.into_response();
	}

	if client.is_pkce_only && query.code_challenge.is_none() {
		oauth_failure();
		return ErrorPage::new(
			Error::Authorization(AuthorizationError::GrantNotAllowed { grant: "code_challenge" }),
			&headers,
		)
		.with_tenant(&state.views_dir, &tenant)
		.into_response();
	}

	if let Some(referer) = &client_info.referer {
		if !client.allows_referer(referer) {
			oauth_failure();
			return ErrorPage::new(Error::Authorization(AuthorizationError::WrongReferer), &headers)
				.with_tenant(&state.views_dir, &tenant)
				.into_response();
		}
	}

	let granted_scopes: Vec<String> = query
		.scope
		.as_deref()
		.unwrap_or_default()
		.split_whitespace()
		.filter(|s| client.allows_scope(s))
		.map(str::to_owned)
		.collect();
	observe_authorize_attempts(granted_scopes.len());

	let authenticated_for_client = client_info
		.valid_payload
		.as_ref()
		.map(|payload| tenant.silent_login || payload.audience_contains(&client.name))
		.unwrap_or(false);

	if authenticated_for_client {
		let payload = client_info.valid_payload.clone().expect("authenticated_for_client implies a payload");
		let request = CodeRequest {
			redirect_uri: &redirect_uri,
			oauth_state: query.state.clone(),
			scopes: granted_scopes,
			code_challenge: query.code_challenge.clone(),
			code_challenge_method: query.code_challenge_method.clone(),
		};
		let response = issue_authorization_code(&state, &client_info, &tenant, &payload, request, &headers).await;
		oauth_success();
		response
	} else {
		let location = client_info.requested.as_absolute_url();
		render_login_form(&state, &tenant, &location, "", &headers).await
	}
}
