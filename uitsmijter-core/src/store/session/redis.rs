//! External Code/Session Store backend, backed by Redis.
//!
//! Keys follow §4.D/§6: `"<kind>~<code>"` for codes/refresh sessions and
//! `"loginid~<uuid>"` for login sessions; values are JSON-serialized
//! sessions with a key-level TTL matching the session TTL. `wipe` and the
//! `count(tenant, ...)` family use a full key scan, since Redis has no
//! secondary index on the JSON payload.

use redis::{AsyncCommands, aio::ConnectionManager};

// self
use crate::{
	_prelude::*,
	domain::session::{AuthSession, LoginSession, SessionKind},
	store::session::{SessionStore, SessionStoreError, StoreFuture, login_key, session_key},
};

/// Redis-backed implementation of [`SessionStore`].
#[derive(Clone)]
pub struct RedisStore {
	conn: ConnectionManager,
}

impl RedisStore {
	/// Connects to `redis://host[:port]`, optionally authenticating with `password`.
	pub async fn connect(host: &str, password: Option<&str>) -> Result<Self, SessionStoreError> {
		let url = match password {
			Some(password) => format!("redis://:{password}@{host}"),
			None => format!("redis://{host}"),
		};
		let client = redis::Client::open(url)
			.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;
		let conn = client
			.get_connection_manager()
			.await
			.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;

		Ok(Self { conn })
	}

	fn serialize(session: &AuthSession) -> Result<String, SessionStoreError> {
		serde_json::to_string(session).map_err(|e| SessionStoreError::Serialization { message: e.to_string() })
	}

	fn deserialize(raw: &str) -> Option<AuthSession> {
		serde_json::from_str(raw).ok()
	}
}

impl SessionStore for RedisStore {
	fn set(&self, session: AuthSession) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let key = session_key(session.kind, &session.code_value);
			let mut conn = self.conn.clone();
			let exists: bool = conn
				.exists(&key)
				.await
				.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;

			if exists {
				return Err(SessionStoreError::CodeTaken);
			}

			let ttl = session.ttl_seconds.max(1) as u64;
			let value = Self::serialize(&session)?;

			conn.set_ex::<_, _, ()>(&key, value, ttl)
				.await
				.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;

			Ok(())
		})
	}

	fn get(&self, kind: SessionKind, code: String, remove: bool) -> StoreFuture<'_, Option<AuthSession>> {
		Box::pin(async move {
			let key = session_key(kind, &code);
			let mut conn = self.conn.clone();
			let raw: Option<String> = conn
				.get(&key)
				.await
				.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;

			let session = raw.as_deref().and_then(Self::deserialize);

			if remove && session.is_some() {
				let _: () = conn
					.del(&key)
					.await
					.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;
			}

			Ok(session)
		})
	}

	fn push(&self, login: LoginSession) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let key = login_key(&login.login_uuid);
			let ttl = (login.expires_at() - login.generated_at).whole_seconds().max(1) as u64;
			let value = serde_json::to_string(&login)
				.map_err(|e| SessionStoreError::Serialization { message: e.to_string() })?;
			let mut conn = self.conn.clone();

			conn.set_ex::<_, _, ()>(&key, value, ttl)
				.await
				.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;

			Ok(())
		})
	}

	fn pull(&self, login_uuid: String) -> StoreFuture<'_, bool> {
		Box::pin(async move {
			let key = login_key(&login_uuid);
			let mut conn = self.conn.clone();
			let removed: i64 = conn
				.del(&key)
				.await
				.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;

			Ok(removed > 0)
		})
	}

	fn delete(&self, kind: SessionKind, code: String) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let key = session_key(kind, &code);
			let mut conn = self.conn.clone();

			conn.del::<_, ()>(&key).await.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;

			Ok(())
		})
	}

	fn wipe(&self, tenant: String, subject: String) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			for kind in [SessionKind::Code, SessionKind::Refresh] {
				let pattern = format!("{}~*", kind.as_str());
				let keys = scan_keys(&self.conn, &pattern).await?;
				let mut conn = self.conn.clone();

				for key in keys {
					let raw: Option<String> =
						conn.get(&key).await.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;
					let Some(session) = raw.as_deref().and_then(Self::deserialize) else { continue };
					let Some(payload) = &session.payload else { continue };

					if payload.tenant == tenant && payload.sub == subject {
						let _: () = conn
							.del(&key)
							.await
							.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;
					}
				}
			}

			Ok(())
		})
	}

	fn count(&self) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			let codes = scan_keys(&self.conn, "code~*").await?;
			let refresh = scan_keys(&self.conn, "refresh~*").await?;

			Ok(codes.len() + refresh.len())
		})
	}

	fn count_for_tenant(&self, tenant: String, kind: SessionKind) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			let pattern = format!("{}~*", kind.as_str());
			let keys = scan_keys(&self.conn, &pattern).await?;
			let mut conn = self.conn.clone();
			let mut count = 0;

			for key in keys {
				let raw: Option<String> =
					conn.get(&key).await.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;

				if let Some(session) = raw.as_deref().and_then(Self::deserialize) {
					if session.payload.as_ref().is_some_and(|p| p.tenant == tenant) {
						count += 1;
					}
				}
			}

			Ok(count)
		})
	}

	fn count_for_client(&self, client_name: String, kind: SessionKind) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			let pattern = format!("{}~*", kind.as_str());
			let keys = scan_keys(&self.conn, &pattern).await?;
			let mut conn = self.conn.clone();
			let mut count = 0;

			for key in keys {
				let raw: Option<String> =
					conn.get(&key).await.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;

				if let Some(session) = raw.as_deref().and_then(Self::deserialize) {
					if session.payload.as_ref().is_some_and(|p| p.audience_contains(&client_name)) {
						count += 1;
					}
				}
			}

			Ok(count)
		})
	}

	fn is_healthy(&self) -> StoreFuture<'_, bool> {
		Box::pin(async move {
			let mut conn = self.conn.clone();
			let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;

			Ok(pong.is_ok())
		})
	}
}

async fn scan_keys(conn: &ConnectionManager, pattern: &str) -> Result<Vec<String>, SessionStoreError> {
	let mut conn = conn.clone();
	let keys: Vec<String> =
		conn.keys(pattern).await.map_err(|e| SessionStoreError::Backend { message: e.to_string() })?;

	Ok(keys)
}
