//! `GET /logout` and `GET /logout/finalize` (§4.H).

use axum::{
	extract::{Query, State},
	http::{header, HeaderMap, StatusCode, Uri},
	response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use uitsmijter_core::{error::Error, obs::logout as record_logout};

use crate::{
	controller::base_resolver_input,
	cookie,
	error_page::ErrorPage,
	templates::{self, Page},
	AppState,
};

#[derive(Debug, Deserialize)]
pub struct LogoutQuery {
	pub post_logout_redirect_uri: Option<String>,
}

/// Handles `GET /logout`: renders a page that auto-navigates to `/logout/finalize`.
pub async fn logout(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
	let mut input = base_resolver_input(&headers, uri.to_string());
	input.is_logout_route = true;

	let client_info = match state.resolver.resolve(&input) {
		Ok(client_info) => client_info,
		Err(error) => return ErrorPage::new(error, &headers).into_response(),
	};

	let Some(tenant) = client_info.tenant.clone() else {
		return ErrorPage::new(Error::NotFound(uitsmijter_core::error::NotFoundError::NoTenant), &headers).into_response();
	};

	let finalize_url = format!("/logout/finalize{}", uri.query().map(|q| format!("?{q}")).unwrap_or_default());
	let body = templates::render(&state.views_dir, &tenant, Page::Logout, &[("finalize_url", &finalize_url)]);

	Html(body).into_response()
}

/// Handles `GET /logout/finalize`: clears the cookie, wipes the subject's
/// sessions, and redirects to a validated `post_logout_redirect_uri` or the
/// tenant's first host.
pub async fn finalize(
	State(state): State<AppState>,
	Query(query): Query<LogoutQuery>,
	uri: Uri,
	headers: HeaderMap,
) -> Response {
	let mut input = base_resolver_input(&headers, uri.to_string());
	input.is_logout_route = true;

	let client_info = match state.resolver.resolve(&input) {
		Ok(client_info) => client_info,
		Err(error) => return ErrorPage::new(error, &headers).into_response(),
	};

	let Some(tenant) = client_info.tenant.clone() else {
		return ErrorPage::new(Error::NotFound(uitsmijter_core::error::NotFoundError::NoTenant), &headers).into_response();
	};

	if let Some(subject) = &client_info.subject {
		if let Err(error) = state.sessions.wipe(tenant.name.clone(), subject.clone()).await {
			return ErrorPage::new(crate::session_error(error), &headers).with_tenant(&state.views_dir, &tenant).into_response();
		}
	}

	record_logout();

	let redirect_target = query
		.post_logout_redirect_uri
		.filter(|target| matches_tenant_host(target, &tenant))
		.unwrap_or_else(|| format!("https://{}", client_info.responsible_domain));

	let mut response = Redirect::to(&redirect_target).into_response();
	*response.status_mut() = StatusCode::SEE_OTHER;
	response.headers_mut().insert(
		header::SET_COOKIE,
		cookie::clear(&tenant, &client_info.responsible_domain, state.config.secure),
	);

	response
}

fn matches_tenant_host(target: &str, tenant: &uitsmijter_core::domain::Tenant) -> bool {
	url::Url::parse(target)
		.ok()
		.and_then(|url| url.host_str().map(str::to_owned))
		.map(|host| tenant.hosts.iter().any(|pattern| pattern.matches(&host)))
		.unwrap_or(false)
}
