//! Request-scoped `ClientInfo`, derived by the Request Resolver (§4.F).

// self
use crate::{
	_prelude::*,
	domain::{client::Client, payload::Payload, tenant::Tenant},
};

/// Which flow family a request belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	/// Standard OAuth/OIDC endpoints (`/authorize`, `/token`, ...).
	Oauth,
	/// Reverse-proxy interceptor mode (`/interceptor`).
	Interceptor,
}

/// The request's `(scheme, host, uri)` tuple, resolved per §4.F step 2.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestTuple {
	/// `https` or `http`, from `X-Forwarded-Proto`.
	pub scheme: String,
	/// Resolved host.
	pub host: String,
	/// Resolved request URI (path + query), when known.
	pub uri: String,
}

impl RequestTuple {
	/// The `<scheme>://<host><uri>` form used to build the interceptor's
	/// `/login?for=` redirect.
	pub fn as_absolute_url(&self) -> String {
		format!("{}://{}{}", self.scheme, self.host, self.uri)
	}
}

/// Request-scoped, derived authorization context: the single output of the
/// Request Resolver, consulted by every controller handler.
#[derive(Clone, Debug)]
pub struct ClientInfo {
	/// `oauth` or `interceptor`.
	pub mode: Mode,
	/// The resolved `(scheme, host, uri)` tuple.
	pub requested: RequestTuple,
	/// `Referer` header, when present.
	pub referer: Option<String>,
	/// Hash of the domain this request is responsible for.
	pub responsible_domain: String,
	/// The externally visible base URL the controller should build
	/// redirects/discovery documents against.
	pub service_url: String,
	/// Resolved tenant, when one could be determined.
	pub tenant: Option<Tenant>,
	/// Resolved client, when `client_id` was supplied and resolved.
	pub client: Option<Client>,
	/// Whether a bearer/cookie token was present but failed verification.
	pub expired: bool,
	/// Subject of a successfully verified token, if any.
	pub subject: Option<String>,
	/// The verified payload, if any; downgraded to `None` on a responsibility
	/// mismatch without rejecting the request (§4.F step 8).
	pub valid_payload: Option<Payload>,
}

impl ClientInfo {
	/// Returns whether this request carries a currently valid payload.
	pub fn is_authenticated(&self) -> bool {
		self.valid_payload.is_some()
	}
}
