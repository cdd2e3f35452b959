//! Session types stored by the Code/Session Store: authorization codes,
//! refresh sessions, and ephemeral login sessions.

// self
use crate::{_prelude::*, domain::payload::Payload};

/// Discriminates the two kinds of `AuthSession`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
	/// A single-use authorization code.
	Code,
	/// A long-lived refresh session.
	Refresh,
}
impl SessionKind {
	/// Stable label used to build store keys (`"<type>~<code>"`).
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Code => "code",
			Self::Refresh => "refresh",
		}
	}
}
impl Display for SessionKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// A short-lived authorization code or a long-lived refresh session. Keyed
/// by `(kind, code_value)`; single-use when fetched with `remove = true`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthSession {
	/// Whether this is an authorization code or a refresh session.
	pub kind: SessionKind,
	/// Opaque authorization-flow `state` parameter, echoed back on redirect.
	#[serde(default)]
	pub state: Option<String>,
	/// The code or refresh-token value; the store key component.
	pub code_value: String,
	/// Scopes bound to this session.
	pub scopes: Vec<String>,
	/// The payload to mint a fresh access token from at exchange time.
	#[serde(default)]
	pub payload: Option<Payload>,
	/// Redirect URI the eventual token response is bound to.
	pub redirect_uri: String,
	/// Time-to-live in seconds from `generated_at`.
	pub ttl_seconds: i64,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub generated_at: OffsetDateTime,
	/// PKCE code challenge, when the authorizing request supplied one.
	#[serde(default)]
	pub code_challenge: Option<String>,
	/// PKCE code challenge method, when applicable.
	#[serde(default)]
	pub code_challenge_method: Option<String>,
}

impl AuthSession {
	/// Absolute expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.generated_at + Duration::seconds(self.ttl_seconds)
	}

	/// Returns whether this session has expired as of `now`.
	pub fn is_expired(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at()
	}

	/// The store key `(kind, code_value)`.
	pub fn key(&self) -> (SessionKind, &str) {
		(self.kind, &self.code_value)
	}
}

/// Ephemeral state binding a just-displayed login form to the subsequent
/// POST; TTL fixed at 2 hours.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginSession {
	/// Unique id embedded as a hidden field in the rendered login form.
	pub login_uuid: String,
	/// The full authorize URL the form should resume once credentials are validated.
	pub location: String,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub generated_at: OffsetDateTime,
}

/// Fixed TTL for login sessions, per §3.
pub const LOGIN_SESSION_TTL: Duration = Duration::hours(2);

impl LoginSession {
	/// Absolute expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.generated_at + LOGIN_SESSION_TTL
	}

	/// Returns whether this session has expired as of `now`.
	pub fn is_expired(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn sample_session(ttl_seconds: i64) -> AuthSession {
		AuthSession {
			kind: SessionKind::Code,
			state: Some("123".into()),
			code_value: "abcdEFGH12345678".into(),
			scopes: vec!["access".into()],
			payload: None,
			redirect_uri: "https://api.example.com/".into(),
			ttl_seconds,
			generated_at: OffsetDateTime::from_unix_timestamp(1_700_000_000)
				.expect("valid fixture timestamp"),
			code_challenge: None,
			code_challenge_method: None,
		}
	}

	#[test]
	fn expiry_is_half_open_on_the_ttl_boundary() {
		let session = sample_session(600);
		let t0 = session.generated_at;

		assert!(!session.is_expired(t0));
		assert!(!session.is_expired(t0 + Duration::seconds(599)));
		assert!(session.is_expired(t0 + Duration::seconds(600)));
	}

	#[test]
	fn key_matches_kind_and_code() {
		let session = sample_session(600);

		assert_eq!(session.key(), (SessionKind::Code, "abcdEFGH12345678"));
	}
}
