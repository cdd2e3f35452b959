//! `POST /token` (§4.H): the `authorization_code`, `refresh_token`, and
//! `password` grants.

use axum::{
	extract::{Json, State},
	http::HeaderMap,
	response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uitsmijter_core::{
	domain::{
		client::{Client, GrantType},
		client_info::{ClientInfo, Mode, RequestTuple},
		session::{AuthSession, SessionKind},
		Payload, Tenant,
	},
	error::{AuthError, AuthorizationError, Error, NotFoundError},
	obs::{oauth_failure, oauth_success, observe_token_stored},
	sandbox::try_login,
	token::{generate_code, verify_pkce_challenge, TokenError},
};

use crate::{error_page::ErrorPage, session_error, AppState};

/// JSON body accepted by `POST /token`, keyed by `grant_type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
pub enum TokenRequest {
	AuthorizationCode {
		client_id: String,
		code: String,
		#[serde(default)]
		scope: Option<String>,
		#[serde(default)]
		client_secret: Option<String>,
		#[serde(default)]
		code_verifier: Option<String>,
	},
	RefreshToken {
		client_id: String,
		refresh_token: String,
	},
	Password {
		client_id: String,
		username: String,
		password: String,
		#[serde(default)]
		client_secret: Option<String>,
		#[serde(default)]
		scope: Option<String>,
	},
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
	pub access_token: String,
	pub token_type: &'static str,
	pub expires_in: i64,
	pub refresh_token: String,
	pub scope: String,
}

/// Handles `POST /token`.
pub async fn token(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<TokenRequest>) -> Response {
	let result = match body {
		TokenRequest::AuthorizationCode { client_id, code, scope, client_secret, code_verifier } => {
			authorization_code_grant(&state, &client_id, &code, scope, client_secret, code_verifier).await
		},
		TokenRequest::RefreshToken { client_id, refresh_token } => {
			refresh_token_grant(&state, &client_id, &refresh_token).await
		},
		TokenRequest::Password { client_id, username, password, client_secret, scope } => {
			password_grant(&state, &client_id, &username, &password, client_secret, scope).await
		},
	};

	match result {
		Ok(response) => {
			oauth_success();
			axum::Json(response).into_response()
		},
		Err(error) => {
			oauth_failure();
			ErrorPage::new(error, &headers).into_response()
		},
	}
}

fn find_client(state: &AppState, client_id: &str) -> Result<Client, Error> {
	let ident = uuid::Uuid::parse_str(client_id).map_err(|_| Error::NotFound(NotFoundError::NoClient))?;

	state.store.find_client_by_ident(ident).ok_or(Error::NotFound(NotFoundError::NoClient))
}

fn find_tenant(state: &AppState, client: &Client) -> Result<Tenant, Error> {
	state.store.find_tenant_by_name(&client.tenantname).ok_or(Error::NotFound(NotFoundError::NoTenant))
}

fn check_client_secret(client: &Client, supplied: Option<&str>) -> Result<(), Error> {
	match &client.secret {
		Some(expected) if Some(expected.as_str()) != supplied => {
			Err(Error::Auth(AuthError::InvalidClientSecret))
		},
		_ => Ok(()),
	}
}

/// Builds a synthetic [`ClientInfo`] for the token endpoint, which has no
/// host-based request to resolve one from.
fn synthetic_client_info(tenant: &Tenant, client: &Client) -> ClientInfo {
	let host = tenant.hosts.first().map(ToString::to_string).unwrap_or_default();

	ClientInfo {
		mode: Mode::Oauth,
		requested: RequestTuple { scheme: "https".into(), host: host.clone(), uri: String::new() },
		referer: None,
		responsible_domain: host.clone(),
		service_url: format!("https://{host}"),
		tenant: Some(tenant.clone()),
		client: Some(client.clone()),
		expired: false,
		subject: None,
		valid_payload: None,
	}
}

fn mint_refresh_session(payload: &Payload, scopes: Vec<String>, refresh_ttl: time::Duration) -> AuthSession {
	AuthSession {
		kind: SessionKind::Refresh,
		state: None,
		code_value: generate_code(),
		scopes,
		payload: Some(payload.clone()),
		redirect_uri: String::new(),
		ttl_seconds: refresh_ttl.whole_seconds(),
		generated_at: OffsetDateTime::now_utc(),
		code_challenge: None,
		code_challenge_method: None,
	}
}

async fn authorization_code_grant(
	state: &AppState,
	client_id: &str,
	code: &str,
	scope: Option<String>,
	client_secret: Option<String>,
	code_verifier: Option<String>,
) -> Result<TokenResponse, Error> {
	let client = find_client(state, client_id)?;
	check_client_secret(&client, client_secret.as_deref())?;

	if !client.allows_grant(GrantType::AuthorizationCode) {
		return Err(Error::Authorization(AuthorizationError::GrantNotAllowed { grant: "authorization_code" }));
	}

	let session = state
		.sessions
		.get(SessionKind::Code, code.to_owned(), true)
		.await
		.map_err(session_error)?
		.ok_or(Error::Auth(AuthError::InvalidToken))?;

	if let Some(challenge) = &session.code_challenge {
		let method = session.code_challenge_method.as_deref().unwrap_or("plain");
		let Some(verifier) = &code_verifier else { return Err(Error::Auth(AuthError::InvalidToken)) };
		if !verify_pkce_challenge(method, verifier, challenge) {
			return Err(Error::Auth(AuthError::InvalidToken));
		}
	}

	let Some(payload) = &session.payload else { return Err(Error::Auth(AuthError::InvalidToken)) };
	if !payload.audience_contains(&client.name) {
		return Err(Error::Authorization(AuthorizationError::TenantMismatch));
	}

	let tenant = find_tenant(state, &client)?;
	let client_info = synthetic_client_info(&tenant, &client);

	let access_token = state
		.tokens
		.build(
			&client_info,
			&payload.sub,
			&payload.user,
			payload.role.clone(),
			payload.profile.clone(),
			state.config.token_expiration,
			Some(payload.auth_time),
		)
		.map_err(token_error)?;

	let scopes = scope
		.map(|s| s.split_whitespace().map(str::to_owned).collect())
		.unwrap_or_else(|| session.scopes.clone());
	let refresh_session = mint_refresh_session(payload, scopes.clone(), state.config.token_refresh_expiration);
	let refresh_value = refresh_session.code_value.clone();
	state.sessions.set(refresh_session).await.map_err(session_error)?;
	observe_token_stored(state.sessions.count().await.unwrap_or(0));

	Ok(TokenResponse {
		access_token,
		token_type: "Bearer",
		expires_in: state.config.token_expiration.whole_seconds(),
		refresh_token: refresh_value,
		scope: scopes.join(" "),
	})
}

async fn refresh_token_grant(state: &AppState, client_id: &str, refresh_token: &str) -> Result<TokenResponse, Error> {
	let client = find_client(state, client_id)?;

	if !client.allows_grant(GrantType::RefreshToken) {
		return Err(Error::Authorization(AuthorizationError::GrantNotAllowed { grant: "refresh_token" }));
	}

	let session = state
		.sessions
		.get(SessionKind::Refresh, refresh_token.to_owned(), true)
		.await
		.map_err(session_error)?
		.ok_or(Error::Auth(AuthError::InvalidToken))?;

	let tenant = find_tenant(state, &client)?;
	let client_info = synthetic_client_info(&tenant, &client);

	let (access_token, new_refresh) = state
		.tokens
		.refresh(&session, &client, &client_info, state.config.token_expiration, state.config.token_refresh_expiration)
		.map_err(token_error)?;

	let scope = session.scopes.join(" ");
	let new_refresh_value = new_refresh.code_value.clone();
	state.sessions.set(new_refresh).await.map_err(session_error)?;
	observe_token_stored(state.sessions.count().await.unwrap_or(0));

	Ok(TokenResponse {
		access_token,
		token_type: "Bearer",
		expires_in: state.config.token_expiration.whole_seconds(),
		refresh_token: new_refresh_value,
		scope,
	})
}

async fn password_grant(
	state: &AppState,
	client_id: &str,
	username: &str,
	password: &str,
	client_secret: Option<String>,
	scope: Option<String>,
) -> Result<TokenResponse, Error> {
	let client = find_client(state, client_id)?;
	check_client_secret(&client, client_secret.as_deref())?;

	if !client.allows_grant(GrantType::Password) {
		return Err(Error::Authorization(AuthorizationError::GrantNotAllowed { grant: "password" }));
	}

	let tenant = find_tenant(state, &client)?;

	let outcome = try_login(&tenant, username, password, state.config.allow_missing_providers)
		.await
		.map_err(|e| Error::Internal(uitsmijter_core::error::InternalError::Sandbox(e)))?;
	if !outcome.ok {
		return Err(Error::Auth(AuthError::WrongCredentials));
	}

	let client_info = synthetic_client_info(&tenant, &client);
	let now = OffsetDateTime::now_utc();
	let payload = Payload {
		iss: client_info.service_url.clone(),
		sub: username.to_owned(),
		aud: vec![client.name.clone()],
		exp: (now + state.config.token_expiration).unix_timestamp(),
		iat: now.unix_timestamp(),
		auth_time: now.unix_timestamp(),
		tenant: tenant.name.clone(),
		responsibility: None,
		role: outcome.role,
		user: username.to_owned(),
		profile: outcome.profile,
	};

	let access_token = state
		.tokens
		.build(
			&client_info,
			&payload.sub,
			&payload.user,
			payload.role.clone(),
			payload.profile.clone(),
			state.config.token_expiration,
			Some(payload.auth_time),
		)
		.map_err(token_error)?;

	let scopes: Vec<String> =
		scope.as_deref().unwrap_or_default().split_whitespace().filter(|s| client.allows_scope(s)).map(str::to_owned).collect();
	let refresh_session = mint_refresh_session(&payload, scopes.clone(), state.config.token_refresh_expiration);
	let refresh_value = refresh_session.code_value.clone();
	state.sessions.set(refresh_session).await.map_err(session_error)?;
	observe_token_stored(state.sessions.count().await.unwrap_or(0));

	Ok(TokenResponse {
		access_token,
		token_type: "Bearer",
		expires_in: state.config.token_expiration.whole_seconds(),
		refresh_token: refresh_value,
		scope: scopes.join(" "),
	})
}

fn token_error(error: TokenError) -> Error {
	match error {
		TokenError::TenantMismatch => Error::Authorization(AuthorizationError::TenantMismatch),
		TokenError::UnknownSession => Error::Auth(AuthError::InvalidToken),
		TokenError::ClientMismatch => Error::Authorization(AuthorizationError::TenantMismatch),
		TokenError::Sign(_) | TokenError::InvalidSignature => {
			Error::Internal(uitsmijter_core::error::InternalError::Token(error))
		},
	}
}
