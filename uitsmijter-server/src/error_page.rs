//! Maps [`uitsmijter_core::error::Error`] onto an HTTP response: JSON for API
//! clients, a rendered HTML error page for browsers, chosen by `Accept`.

use std::path::{Path, PathBuf};

use axum::{
	http::{header, HeaderMap, StatusCode},
	response::{Html, IntoResponse, Response},
	Json,
};
use serde::Serialize;
use uitsmijter_core::{
	domain::tenant::Tenant,
	error::{AuthError, AuthorizationError, Error, NotFoundError, NotImplementedError, ValidationError},
};

use crate::templates::{self, Page};

/// Body of the JSON error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
	error: &'static str,
	error_description: String,
}

/// Wraps a core [`Error`] together with the request's `Accept` header so it
/// can be turned into a [`Response`] via [`IntoResponse`]. Carries the
/// resolved tenant, when one is known at the call site, so the HTML branch
/// can render that tenant's `error` template instead of the built-in default.
pub struct ErrorPage {
	error: Error,
	accept: Option<String>,
	tenant_template: Option<(PathBuf, Tenant)>,
}

impl ErrorPage {
	/// Pairs a core error with the request headers it should be rendered for.
	pub fn new(error: Error, headers: &HeaderMap) -> Self {
		let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()).map(str::to_owned);

		Self { error, accept, tenant_template: None }
	}

	/// Attaches the tenant whose `error` template should back the HTML
	/// branch, for call sites where the resolver already determined one.
	pub fn with_tenant(mut self, views_dir: &Path, tenant: &Tenant) -> Self {
		self.tenant_template = Some((views_dir.to_owned(), tenant.clone()));

		self
	}

	fn wants_html(&self) -> bool {
		self.accept.as_deref().is_some_and(|accept| accept.contains("text/html"))
	}
}

/// Maps a core error onto the HTTP status code it should be reported under.
pub fn status_code(error: &Error) -> StatusCode {
	match error {
		Error::Validation(ValidationError::MissingLocation) => StatusCode::PRECONDITION_FAILED,
		Error::Validation(_) => StatusCode::BAD_REQUEST,
		Error::Auth(AuthError::WrongCredentials) => StatusCode::FORBIDDEN,
		Error::Auth(_) => StatusCode::UNAUTHORIZED,
		Error::Authorization(_) => StatusCode::FORBIDDEN,
		Error::NotFound(_) => StatusCode::NOT_FOUND,
		Error::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
		Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
		Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

impl IntoResponse for ErrorPage {
	fn into_response(self) -> Response {
		let status = status_code(&self.error);
		let code = self.error.code();

		if status == StatusCode::INTERNAL_SERVER_ERROR {
			tracing::error!(error = %self.error, code, "internal error");
		} else {
			tracing::warn!(error = %self.error, code, %status, "request rejected");
		}

		if self.wants_html() {
			let body = match &self.tenant_template {
				Some((views_dir, tenant)) => templates::render(
					views_dir,
					tenant,
					Page::Error,
					&[("status", status.as_str()), ("code", code), ("error", &self.error.to_string())],
				),
				None => render_html(status, code, &self.error),
			};
			(status, Html(body)).into_response()
		} else {
			let body = ErrorBody { error: code, error_description: self.error.to_string() };
			(status, Json(body)).into_response()
		}
	}
}

fn render_html(status: StatusCode, code: &str, error: &Error) -> String {
	format!(
		"<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{status}</title></head>\n<body>\n\
		 <h1>{status}</h1>\n<p>{code}</p>\n<p>{error}</p>\n</body>\n</html>\n",
		status = status,
		code = code,
		error = error,
	)
}

/// Convenience constructors used by the controller handlers.
pub fn validation(error: ValidationError, headers: &HeaderMap) -> ErrorPage {
	ErrorPage::new(Error::Validation(error), headers)
}

/// Convenience constructor for authentication failures.
pub fn auth(error: AuthError, headers: &HeaderMap) -> ErrorPage {
	ErrorPage::new(Error::Auth(error), headers)
}

/// Convenience constructor for authorization failures.
pub fn authorization(error: AuthorizationError, headers: &HeaderMap) -> ErrorPage {
	ErrorPage::new(Error::Authorization(error), headers)
}

/// Convenience constructor for not-found failures.
pub fn not_found(error: NotFoundError, headers: &HeaderMap) -> ErrorPage {
	ErrorPage::new(Error::NotFound(error), headers)
}

/// Convenience constructor for not-implemented failures.
pub fn not_implemented(error: NotImplementedError, headers: &HeaderMap) -> ErrorPage {
	ErrorPage::new(Error::NotImplemented(error), headers)
}
