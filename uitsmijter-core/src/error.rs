//! Layered error types shared across the entity store, loaders, sandbox,
//! session store, and token service.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs, grouped by the kinds from the
/// error handling design: validation, authentication, authorization, not
/// found, not implemented, timeout, internal.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Malformed input or missing required fields.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Missing or invalid credentials or secret.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Tenant/client mismatch, grant not allowed, redirect/referrer not allowed.
	#[error(transparent)]
	Authorization(#[from] AuthorizationError),
	/// Unknown client or tenant.
	#[error("{0}")]
	NotFound(NotFoundError),
	/// Unsupported code-challenge method.
	#[error("{0}")]
	NotImplemented(NotImplementedError),
	/// Script or store timeout.
	#[error("{0}")]
	Timeout(TimeoutError),
	/// Unexpected fault in the entity store, loaders, sandbox, or session store.
	#[error(transparent)]
	Internal(#[from] InternalError),
}

impl Error {
	/// Short enum code surfaced to callers (`ERRORS.*` family), independent of
	/// the human-readable [`Display`] message.
	pub fn code(&self) -> &'static str {
		match self {
			Error::Validation(e) => e.code(),
			Error::Auth(e) => e.code(),
			Error::Authorization(e) => e.code(),
			Error::NotFound(e) => e.code(),
			Error::NotImplemented(e) => e.code(),
			Error::Timeout(_) => "SERVICE_TIMEOUT",
			Error::Internal(_) => "ERRORS.INTERNAL",
		}
	}
}

/// Validation failures (→ 400).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// The submitted login/token form could not be parsed.
	#[error("Form could not be parsed.")]
	FormNotParseable,
	/// The `location` hidden field was absent from a login POST.
	#[error("Location is missing.")]
	MissingLocation,
	/// A required field was absent from a request.
	#[error("Missing required field `{field}`.")]
	MissingField {
		/// Name of the absent field.
		field: &'static str,
	},
	/// The interceptor's resolved host does not belong to any known tenant.
	/// Distinct from [`NotFoundError::UnknownHost`] (→ 404, used by the
	/// OAuth/discovery surface): §4.H requires 400 for this case on
	/// `/interceptor` specifically.
	#[error("Host is not a tenant host.")]
	NotATenantHost,
}
impl ValidationError {
	fn code(&self) -> &'static str {
		match self {
			ValidationError::FormNotParseable => "FORM_NOT_PARSEABLE",
			ValidationError::MissingLocation => "MISSING_LOCATION",
			ValidationError::MissingField { .. } => "ERRORS.VALIDATION",
			ValidationError::NotATenantHost => "ERRORS.NOT_A_TENANT_HOST",
		}
	}
}

/// Authentication failures (→ 401/403).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthError {
	/// Provider scripts rejected the supplied credentials.
	#[error("Credentials were rejected by the configured providers.")]
	WrongCredentials,
	/// A client secret was required but missing or incorrect.
	#[error("Client secret is missing or incorrect.")]
	InvalidClientSecret,
	/// A bearer token failed signature or expiry verification.
	#[error("Token is invalid or expired.")]
	InvalidToken,
}
impl AuthError {
	fn code(&self) -> &'static str {
		match self {
			AuthError::WrongCredentials => "LOGIN.ERRORS.WRONG_CREDENTIALS",
			AuthError::InvalidClientSecret => "ERRORS.INVALID_CLIENT_SECRET",
			AuthError::InvalidToken => "ERRORS.INVALID_TOKEN",
		}
	}
}

/// Authorization failures (→ 403).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthorizationError {
	/// The resolved tenant did not match the expected tenant.
	#[error("Tenant mismatch.")]
	TenantMismatch,
	/// `redirect_uri` did not match any of the client's allow-listed patterns.
	#[error("Redirect URI does not match any allow-listed pattern.")]
	RedirectMismatch,
	/// `Referer` did not match any of the client's allow-listed patterns.
	#[error("Referer does not match any allow-listed pattern.")]
	WrongReferer,
	/// The client does not enable the requested grant type.
	#[error("Grant `{grant}` is not enabled for this client.")]
	GrantNotAllowed {
		/// Requested grant type label.
		grant: &'static str,
	},
	/// The tenant has interceptor mode disabled.
	#[error("Interceptor mode is disabled for this tenant.")]
	InterceptorDisabled,
}
impl AuthorizationError {
	fn code(&self) -> &'static str {
		match self {
			AuthorizationError::TenantMismatch => "TENANT_MISMATCH",
			AuthorizationError::RedirectMismatch => "REDIRECT_MISMATCH",
			AuthorizationError::WrongReferer => "WRONG_REFERER",
			AuthorizationError::GrantNotAllowed { .. } => "ERRORS.GRANT_NOT_ALLOWED",
			AuthorizationError::InterceptorDisabled => "ERRORS.INTERCEPTOR_DISABLED",
		}
	}
}

/// Not-found failures (→ 404).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum NotFoundError {
	/// No client matches the supplied `client_id`.
	#[error("No such client.")]
	NoClient,
	/// No tenant could be resolved for the request.
	#[error("No such tenant.")]
	NoTenant,
	/// The host in the request does not belong to any known tenant.
	#[error("Host is not a tenant host.")]
	UnknownHost,
}
impl NotFoundError {
	fn code(&self) -> &'static str {
		match self {
			NotFoundError::NoClient => "NO_CLIENT",
			NotFoundError::NoTenant => "NO_TENANT",
			NotFoundError::UnknownHost => "ERRORS.UNKNOWN_HOST",
		}
	}
}

/// Not-implemented failures (→ 501).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum NotImplementedError {
	/// `code_challenge_method` was not one of `plain`, `S256`, or absent.
	#[error("Code challenge method is not implemented.")]
	CodeChallengeMethod,
}
impl NotImplementedError {
	fn code(&self) -> &'static str {
		match self {
			NotImplementedError::CodeChallengeMethod => "CODE_CHALLENGE_METHOD_NOT_IMPLEMENTED",
		}
	}
}

/// Timeout failures (→ 504), rendered as `SERVICE_TIMEOUT`.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TimeoutError {
	/// A provider script exceeded its wall-clock budget.
	#[error("Provider script timed out.")]
	Sandbox,
	/// A session-store operation exceeded its request-scoped timeout.
	#[error("Session store operation timed out.")]
	Store,
}

/// Unexpected internal faults (→ 500); the generic message is shown in
/// release builds, the full description otherwise (see `uitsmijter-server`).
#[derive(Debug, ThisError)]
pub enum InternalError {
	/// Entity-store mutation or lookup failed unexpectedly.
	#[error("Entity store error: {0}")]
	Store(String),
	/// Session-store backend error (in-process or external).
	#[error(transparent)]
	Session(#[from] crate::store::session::SessionStoreError),
	/// Sandbox execution error unrelated to timeout (script error, crash).
	#[error(transparent)]
	Sandbox(#[from] crate::sandbox::SandboxError),
	/// Token build/verify failure unrelated to expiry.
	#[error(transparent)]
	Token(#[from] crate::token::TokenError),
	/// Malformed tenant/client resource could not be deserialized.
	#[error("Malformed resource at `{path}`: {source}")]
	MalformedResource {
		/// Source path or resource identifier.
		path: String,
		/// Structured parse failure with a field path, from `serde_path_to_error`.
		#[source]
		source: BoxError,
	},
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;
