//! Code/Session Store contract (§4.D): single-use codes, refresh sessions,
//! and ephemeral login sessions, with two interchangeable backends.

pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

// self
use crate::{
	_prelude::*,
	domain::session::{AuthSession, LoginSession, SessionKind},
};

/// Future type returned by every [`SessionStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SessionStoreError>> + 'a + Send>>;

/// Persistence contract for authorization codes, refresh sessions, and login
/// sessions. All operations are asynchronous (§5: suspension at the I/O
/// boundary), implemented by either an in-process actor or an external
/// key-value store.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Stores a session. Fails with [`SessionStoreError::CodeTaken`] if
	/// `(kind, code_value)` already exists.
	fn set(&self, session: AuthSession) -> StoreFuture<'_, ()>;

	/// Fetches the session for `(kind, code)`. If `remove` is `true`, the
	/// fetch and deletion are atomic (single-use).
	fn get(&self, kind: SessionKind, code: String, remove: bool) -> StoreFuture<'_, Option<AuthSession>>;

	/// Stores a login session, binding a login form to a subsequent POST.
	fn push(&self, login: LoginSession) -> StoreFuture<'_, ()>;

	/// Consumes a login session by `login_uuid`. Returns `true` if one existed.
	fn pull(&self, login_uuid: String) -> StoreFuture<'_, bool>;

	/// Deletes a session by `(kind, code)`. No-op if absent.
	fn delete(&self, kind: SessionKind, code: String) -> StoreFuture<'_, ()>;

	/// Deletes every session belonging to `(tenant, subject)`.
	fn wipe(&self, tenant: String, subject: String) -> StoreFuture<'_, ()>;

	/// Total number of live sessions.
    fn count(&self) -> StoreFuture<'_, usize>;

	/// Number of live sessions of `kind` for `tenant`.
	fn count_for_tenant(&self, tenant: String, kind: SessionKind) -> StoreFuture<'_, usize>;

	/// Number of live refresh sessions whose `payload.aud` contains `client_name`.
	fn count_for_client(&self, client_name: String, kind: SessionKind) -> StoreFuture<'_, usize>;

	/// Returns whether the backend is reachable and operational.
	fn is_healthy(&self) -> StoreFuture<'_, bool>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SessionStoreError {
	/// `set` was called for a `(kind, code_value)` that already exists.
	#[error("A session already exists for this code.")]
	CodeTaken,
	/// Serialization failure surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure (connection, protocol, etc).
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// The operation exceeded its request-scoped timeout.
	#[error("Session store operation timed out.")]
	Timeout,
}

/// Builds the external backend's key for a code/refresh session:
/// `"<kind>~<code>"`.
pub fn session_key(kind: SessionKind, code: &str) -> String {
	format!("{}~{}", kind.as_str(), code)
}

/// Builds the external backend's key for a login session: `"loginid~<uuid>"`.
pub fn login_key(login_uuid: &str) -> String {
	format!("loginid~{login_uuid}")
}
