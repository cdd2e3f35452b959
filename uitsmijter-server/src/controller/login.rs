//! `GET /login` and `POST /login` (§4.F/§4.H): renders the login form behind
//! both the OAuth and interceptor flows, and exchanges submitted credentials
//! for a session. On success, `POST /login` issues an authorization code
//! directly against the client's `redirect_uri` when `location` carries OAuth
//! query parameters, or mints a cookie and redirects back to `location`
//! verbatim when it doesn't (the interceptor flow).

use axum::{
	extract::{Form, Query, State},
	http::{header, HeaderMap, StatusCode},
	response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use time::OffsetDateTime;
use url::Url;
use uitsmijter_core::{
	domain::{client::GrantType, ClientInfo, Payload, Tenant},
	error::{AuthError, AuthorizationError, Error, NotFoundError, ValidationError},
	obs::{login_failure, login_success},
	sandbox::{try_login, LoginOutcome},
};

use crate::{
	controller::{base_resolver_input, issue_authorization_code, render_login_form, CodeRequest},
	cookie,
	error_page::ErrorPage,
	session_error,
	AppState,
};

/// Query string accepted by `GET /login`, forwarded by the interceptor's
/// `/login?for=<location>` redirect.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
	#[serde(rename = "for")]
	pub r#for: Option<String>,
}

/// Handles `GET /login`: renders the login form for the location the caller
/// is responsible for, binding a fresh login session to it.
pub async fn show(State(state): State<AppState>, Query(query): Query<LoginQuery>, headers: HeaderMap) -> Response {
	let Some(location) = query.r#for.clone().filter(|l| !l.is_empty()) else {
		return ErrorPage::new(Error::Validation(ValidationError::MissingLocation), &headers).into_response();
	};

	let Ok(parsed_location) = Url::parse(&location) else {
		return ErrorPage::new(Error::Validation(ValidationError::FormNotParseable), &headers).into_response();
	};

	let mut input = base_resolver_input(&headers, parsed_location.path().to_owned());
	input.query_for = parsed_location.host_str().map(str::to_owned);

	let client_info = match state.resolver.resolve(&input) {
		Ok(client_info) => client_info,
		Err(error) => return ErrorPage::new(error, &headers).into_response(),
	};

	let Some(tenant) = client_info.tenant.clone() else {
		return ErrorPage::new(Error::NotFound(NotFoundError::NoTenant), &headers).into_response();
	};

	render_login_form(&state, &tenant, &location, "", &headers).await
}

/// Body posted by the rendered login form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
	/// Hidden field binding this submission to the form that was rendered.
	pub login_uuid: Option<String>,
	/// Hidden field carrying this request's own absolute URL: the
	/// `/authorize` URL for an OAuth-flow login, the protected resource for
	/// an interceptor-flow login.
	pub location: Option<String>,
	pub username: String,
	pub password: String,
}

/// Handles `POST /login`: validates credentials against the tenant's
/// providers, then either issues an authorization code directly against the
/// client's `redirect_uri` (when `location` carries one) or mints a cookie
/// and redirects to `location` verbatim (the interceptor flow).
pub async fn login(State(state): State<AppState>, headers: HeaderMap, Form(form): Form<LoginForm>) -> Response {
	let Some(location) = form.location.clone().filter(|l| !l.is_empty()) else {
		return ErrorPage::new(Error::Validation(ValidationError::MissingLocation), &headers).into_response();
	};

	let Some(login_uuid) = form.login_uuid.clone() else {
		return ErrorPage::new(Error::Validation(ValidationError::FormNotParseable), &headers).into_response();
	};
	match state.sessions.pull(login_uuid).await {
		Ok(true) => {},
		Ok(false) => {
			return ErrorPage::new(Error::Validation(ValidationError::FormNotParseable), &headers).into_response()
		},
		Err(error) => return ErrorPage::new(session_error(error), &headers).into_response(),
	}

	let Ok(parsed_location) = Url::parse(&location) else {
		return ErrorPage::new(Error::Validation(ValidationError::FormNotParseable), &headers).into_response();
	};
	let query = |key: &str| parsed_location.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned());

	let mut input = base_resolver_input(&headers, parsed_location.path().to_owned());
	input.query_for = parsed_location.host_str().map(str::to_owned);
	input.form_client_id = query("client_id");

	let client_info = match state.resolver.resolve(&input) {
		Ok(client_info) => client_info,
		Err(error) => return ErrorPage::new(error, &headers).into_response(),
	};

	let Some(tenant) = client_info.tenant.clone() else {
		return ErrorPage::new(Error::NotFound(NotFoundError::NoTenant), &headers).into_response();
	};

	let outcome = match try_login(&tenant, &form.username, &form.password, state.config.allow_missing_providers).await {
		Ok(outcome) => outcome,
		Err(error) => {
			return ErrorPage::new(Error::Internal(uitsmijter_core::error::InternalError::Sandbox(error)), &headers)
				.with_tenant(&state.views_dir, &tenant)
				.into_response()
		},
	};

	if !outcome.ok {
		login_failure();
		return render_login_form(&state, &tenant, &location, &Error::Auth(AuthError::WrongCredentials).to_string(), &headers)
			.await;
	}

	let Some(redirect_uri) = query("redirect_uri") else {
		return interceptor_success_response(&state, &tenant, &client_info, &form.username, outcome, &location, &headers).await;
	};

	let Some(client) = client_info.client.clone() else {
		return ErrorPage::new(Error::NotFound(NotFoundError::NoClient), &headers).with_tenant(&state.views_dir, &tenant).into_response();
	};

	if !client.allows_grant(GrantType::AuthorizationCode) {
		login_failure();
		return ErrorPage::new(
			Error::Authorization(AuthorizationError::GrantNotAllowed { grant: "authorization_code" }),
			&headers,
		)
		.with_tenant(&state.views_dir, &tenant)
		.into_response();
	}
	if !client.allows_redirect(&redirect_uri) {
		login_failure();
		return ErrorPage::new(Error::Authorization(AuthorizationError::RedirectMismatch), &headers)
			.with_tenant(&state.views_dir, &tenant)
			.into_response();
	}

	let code_challenge = query("code_challenge");
	if client.is_pkce_only && code_challenge.is_none() {
		login_failure();
		return ErrorPage::new(Error::Authorization(AuthorizationError::GrantNotAllowed { grant: "code_challenge" }), &headers)
			.with_tenant(&state.views_dir, &tenant)
			.into_response();
	}

	let granted_scopes: Vec<String> =
		query("scope").unwrap_or_default().split_whitespace().filter(|s| client.allows_scope(s)).map(str::to_owned).collect();

	let now = OffsetDateTime::now_utc();
	let payload = Payload {
		iss: client_info.service_url.clone(),
		sub: form.username.clone(),
		aud: vec![client.name.clone()],
		exp: (now + state.config.token_expiration).unix_timestamp(),
		iat: now.unix_timestamp(),
		auth_time: now.unix_timestamp(),
		tenant: tenant.name.clone(),
		responsibility: None,
		role: outcome.role,
		user: form.username.clone(),
		profile: outcome.profile,
	};

	let request = CodeRequest {
		redirect_uri: &redirect_uri,
		oauth_state: query("state"),
		scopes: granted_scopes,
		code_challenge,
		code_challenge_method: query("code_challenge_method"),
	};

	login_success();
	issue_authorization_code(&state, &client_info, &tenant, &payload, request, &headers).await
}

/// Mints a session cookie and redirects to `location` verbatim — the
/// interceptor flow, which has no client `redirect_uri` to issue a code
/// against.
async fn interceptor_success_response(
	state: &AppState,
	tenant: &Tenant,
	client_info: &ClientInfo,
	username: &str,
	outcome: LoginOutcome,
	location: &str,
	headers: &HeaderMap,
) -> Response {
	let access_token =
		state.tokens.build(client_info, username, username, outcome.role, outcome.profile, state.config.token_expiration, None);

	let access_token = match access_token {
		Ok(token) => token,
		Err(error) => {
			return ErrorPage::new(Error::Internal(uitsmijter_core::error::InternalError::Token(error)), headers)
				.with_tenant(&state.views_dir, tenant)
				.into_response()
		},
	};

	let mut response = Redirect::to(location).into_response();
	*response.status_mut() = StatusCode::SEE_OTHER;

	if let Ok(value) = axum::http::HeaderValue::from_str(&format!("Bearer {access_token}")) {
		response.headers_mut().insert(header::AUTHORIZATION, value);
	}
	response.headers_mut().insert(
		header::SET_COOKIE,
		cookie::build(&access_token, tenant, &client_info.responsible_domain, state.config.secure, state.config.cookie_expiration),
	);

	login_success();

	response
}
