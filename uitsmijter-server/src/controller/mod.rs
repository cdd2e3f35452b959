//! OAuth/OIDC Controller (§4.H): `/authorize`, `/login`, `/token`,
//! `/token/info`, `/interceptor`, `/logout`, and `/logout/finalize`.

pub mod authorize;
pub mod discovery;
pub mod interceptor;
pub mod login;
pub mod logout;
pub mod token;
pub mod token_info;

use axum::{
	http::{header, HeaderMap, StatusCode},
	response::{IntoResponse, Redirect, Response},
};
use uitsmijter_core::{
	domain::{ClientInfo, Payload, Tenant},
	obs::observe_token_stored,
	resolver::ResolverInput,
	token::generate_code,
};
use uitsmijter_core::domain::session::{AuthSession, LoginSession, SessionKind};

use crate::{
	cookie,
	error_page::ErrorPage,
	session_error,
	templates::{self, Page},
	AppState,
};

/// Extracts the bearer token from `Authorization: Bearer <token>`, falling
/// back to the session cookie.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
	if let Some(value) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
		if let Some(token) = value.strip_prefix("Bearer ") {
			return Some(token.to_owned());
		}
	}

	headers.get(axum::http::header::COOKIE).and_then(|v| v.to_str().ok()).and_then(cookie::extract_token)
}

/// Common request signals shared by every handler, independent of route.
pub(crate) struct CommonSignals {
	pub forwarded_proto: Option<String>,
	pub forwarded_host: Option<String>,
	pub referer: Option<String>,
	pub bearer_token: Option<String>,
}

pub(crate) fn common_signals(headers: &HeaderMap) -> CommonSignals {
	let header_str = |name: axum::http::HeaderName| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);

	CommonSignals {
		forwarded_proto: header_str(axum::http::HeaderName::from_static("x-forwarded-proto")),
		forwarded_host: header_str(axum::http::HeaderName::from_static("x-forwarded-host")),
		referer: header_str(axum::http::header::REFERER),
		bearer_token: bearer_token(headers),
	}
}

/// `AUTHCODE.TTL`, per §4.H.
const AUTHORIZATION_CODE_TTL_SECONDS: i64 = 600;

/// Parameters distinguishing one authorization-code issuance from another;
/// shared by `/authorize` (silent login) and `/login` (form submission).
pub(crate) struct CodeRequest<'a> {
	pub redirect_uri: &'a str,
	pub oauth_state: Option<String>,
	pub scopes: Vec<String>,
	pub code_challenge: Option<String>,
	pub code_challenge_method: Option<String>,
}

/// Records a code session, builds the redirect, and sets the access-token
/// cookie/header — the tail end of both `/authorize` (silent login) and the
/// successful branch of `POST /login`.
pub(crate) async fn issue_authorization_code(
	state: &AppState,
	client_info: &ClientInfo,
	tenant: &Tenant,
	payload: &Payload,
	request: CodeRequest<'_>,
	headers: &HeaderMap,
) -> Response {
	let code = generate_code();

	let session = AuthSession {
		kind: SessionKind::Code,
		state: request.oauth_state.clone(),
		code_value: code.clone(),
		scopes: request.scopes,
		payload: Some(payload.clone()),
		redirect_uri: request.redirect_uri.to_owned(),
		ttl_seconds: AUTHORIZATION_CODE_TTL_SECONDS,
		generated_at: time::OffsetDateTime::now_utc(),
		code_challenge: request.code_challenge,
		code_challenge_method: request.code_challenge_method,
	};

	if let Err(error) = state.sessions.set(session).await {
		return ErrorPage::new(session_error(error), headers).into_response();
	}
	observe_token_stored(state.sessions.count().await.unwrap_or(0));

	let Ok(mut redirect_url) = url::Url::parse(request.redirect_uri) else {
		return ErrorPage::new(
			uitsmijter_core::error::Error::Authorization(uitsmijter_core::error::AuthorizationError::RedirectMismatch),
			headers,
		)
		.into_response();
	};
	{
		let mut pairs = redirect_url.query_pairs_mut();
		pairs.append_pair("code", &code);
		if let Some(oauth_state) = &request.oauth_state {
			pairs.append_pair("state", oauth_state);
		}
	}

	let access_token = state.tokens.build(
		client_info,
		&payload.sub,
		&payload.user,
		payload.role.clone(),
		payload.profile.clone(),
		state.config.token_expiration,
		Some(payload.auth_time),
	);

	let mut response = Redirect::to(redirect_url.as_str()).into_response();
	*response.status_mut() = StatusCode::SEE_OTHER;

	if let Ok(token) = access_token {
		if let Ok(value) = axum::http::HeaderValue::from_str(&format!("Bearer {token}")) {
			response.headers_mut().insert(header::AUTHORIZATION, value);
		}

		response.headers_mut().insert(
			header::SET_COOKIE,
			cookie::build(&token, tenant, &client_info.responsible_domain, state.config.secure, state.config.cookie_expiration),
		);
	}

	response
}

/// Pushes a fresh login session bound to `location` and renders the login
/// form, optionally carrying an error message from a prior failed attempt.
/// Shared by `GET /authorize`'s silent-login fallthrough and `GET /login`.
pub(crate) async fn render_login_form(
	state: &AppState,
	tenant: &Tenant,
	location: &str,
	error: &str,
	headers: &HeaderMap,
) -> Response {
	let login_uuid = uuid::Uuid::new_v4().to_string();

	let login_session =
		LoginSession { login_uuid: login_uuid.clone(), location: location.to_owned(), generated_at: time::OffsetDateTime::now_utc() };
	if let Err(error) = state.sessions.push(login_session).await {
		return ErrorPage::new(session_error(error), headers).into_response();
	}

	let body = templates::render(
		&state.views_dir,
		tenant,
		Page::Login,
		&[("action", "/login"), ("login_uuid", &login_uuid), ("location", location), ("error", error)],
	);

	axum::response::Html(body).into_response()
}

/// Builds a base [`ResolverInput`] from the request signals common to every
/// route; callers fill in the route-specific fields.
pub(crate) fn base_resolver_input(headers: &HeaderMap, request_uri: String) -> ResolverInput {
	let signals = common_signals(headers);
	let mode_header =
		headers.get(axum::http::HeaderName::from_static("x-uitsmijter-mode")).and_then(|v| v.to_str().ok()).map(str::to_owned);
	let is_localhost = signals
		.forwarded_host
		.as_deref()
		.map(|host| host.starts_with("localhost") || host.starts_with("127.0.0.1"))
		.unwrap_or(false);

	ResolverInput {
		mode_header,
		forwarded_proto: signals.forwarded_proto,
		forwarded_host: signals.forwarded_host,
		referer: signals.referer,
		bearer_token: signals.bearer_token,
		request_uri,
		is_localhost,
		..Default::default()
	}
}
