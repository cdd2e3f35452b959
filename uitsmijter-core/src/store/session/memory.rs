//! In-process Code/Session Store backend: a single-writer actor task with
//! TTL eviction driven by one timer rescheduled to the nearest expiry.
//!
//! Design Note (a) flags the "schedule to the maximum generated+ttl"
//! reading as likely inverted from intent; this implementation schedules the
//! eviction timer to the *nearest* upcoming expiry instead, which is the only
//! reading consistent with testable property 1 (every entry expires exactly
//! at its own TTL boundary, independent of what else is stored). See
//! DESIGN.md for the recorded decision.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tokio::sync::{mpsc, oneshot};

// self
use crate::{
	_prelude::*,
	domain::session::{AuthSession, LoginSession, SessionKind},
	store::session::{SessionStore, SessionStoreError, StoreFuture},
};

type SessionKey = (SessionKind, String);

enum Cmd {
	Set { session: AuthSession, reply: oneshot::Sender<Result<(), SessionStoreError>> },
	Get { kind: SessionKind, code: String, remove: bool, reply: oneshot::Sender<Option<AuthSession>> },
	Push { login: LoginSession, reply: oneshot::Sender<()> },
	Pull { login_uuid: String, reply: oneshot::Sender<bool> },
	Delete { kind: SessionKind, code: String, reply: oneshot::Sender<()> },
	Wipe { tenant: String, subject: String, reply: oneshot::Sender<()> },
	Count { reply: oneshot::Sender<usize> },
	CountForTenant { tenant: String, kind: SessionKind, reply: oneshot::Sender<usize> },
	CountForClient { client_name: String, kind: SessionKind, reply: oneshot::Sender<usize> },
}

#[derive(Eq, PartialEq)]
enum EvictKey {
	Session(SessionKind, String),
	Login(String),
}

struct Actor {
	sessions: HashMap<SessionKey, AuthSession>,
	logins: HashMap<String, LoginSession>,
	// Min-heap on expiry instant; entries may be stale (superseded or
	// already removed) and are checked against the live map on pop.
	heap: BinaryHeap<Reverse<(i64, u64)>>,
	heap_keys: HashMap<u64, EvictKey>,
	next_heap_id: u64,
}

impl Actor {
	fn new() -> Self {
		Self {
			sessions: HashMap::new(),
			logins: HashMap::new(),
			heap: BinaryHeap::new(),
			heap_keys: HashMap::new(),
			next_heap_id: 0,
		}
	}

	fn schedule(&mut self, expires_at: OffsetDateTime, key: EvictKey) {
		let id = self.next_heap_id;

		self.next_heap_id += 1;
		self.heap_keys.insert(id, key);
		self.heap.push(Reverse((expires_at.unix_timestamp(), id)));
	}

	fn evict_expired(&mut self, now: OffsetDateTime) {
		while let Some(&Reverse((ts, id))) = self.heap.peek() {
			if ts > now.unix_timestamp() {
				break;
			}

			self.heap.pop();

			let Some(key) = self.heap_keys.remove(&id) else { continue };

			match key {
				EvictKey::Session(kind, code) => {
					if let Some(session) = self.sessions.get(&(kind, code.clone())) {
						if session.is_expired(now) {
							self.sessions.remove(&(kind, code));
						}
					}
				},
				EvictKey::Login(uuid) => {
					if let Some(login) = self.logins.get(&uuid) {
						if login.is_expired(now) {
							self.logins.remove(&uuid);
						}
					}
				},
			}
		}
	}

	fn next_deadline(&self) -> Option<OffsetDateTime> {
		self.heap.peek().and_then(|Reverse((ts, _))| OffsetDateTime::from_unix_timestamp(*ts).ok())
	}

	fn handle(&mut self, cmd: Cmd) {
		let now = OffsetDateTime::now_utc();

		match cmd {
			Cmd::Set { session, reply } => {
				let key = session.key();
				let key = (key.0, key.1.to_owned());

				if self.sessions.contains_key(&key) {
					let _ = reply.send(Err(SessionStoreError::CodeTaken));
					return;
				}

				let expires_at = session.expires_at();

				self.schedule(expires_at, EvictKey::Session(key.0, key.1.clone()));
				self.sessions.insert(key, session);
				let _ = reply.send(Ok(()));
			},
			Cmd::Get { kind, code, remove, reply } => {
				let key = (kind, code);
				let found = self.sessions.get(&key).cloned();
				let live = found.filter(|s| !s.is_expired(now));

				if remove && live.is_some() {
					self.sessions.remove(&key);
				}

				let _ = reply.send(live);
			},
			Cmd::Push { login, reply } => {
				let expires_at = login.expires_at();

				self.schedule(expires_at, EvictKey::Login(login.login_uuid.clone()));
				self.logins.insert(login.login_uuid.clone(), login);
				let _ = reply.send(());
			},
			Cmd::Pull { login_uuid, reply } => {
				let existed = match self.logins.remove(&login_uuid) {
					Some(login) => !login.is_expired(now),
					None => false,
				};

				let _ = reply.send(existed);
			},
			Cmd::Delete { kind, code, reply } => {
				self.sessions.remove(&(kind, code));
				let _ = reply.send(());
			},
			Cmd::Wipe { tenant, subject, reply } => {
				self.sessions.retain(|_, session| {
					let Some(payload) = &session.payload else { return true };

					!(payload.tenant == tenant && payload.sub == subject)
				});
				let _ = reply.send(());
			},
			Cmd::Count { reply } => {
				let _ = reply.send(self.sessions.values().filter(|s| !s.is_expired(now)).count());
			},
			Cmd::CountForTenant { tenant, kind, reply } => {
				let count = self
					.sessions
					.values()
					.filter(|s| !s.is_expired(now) && s.kind == kind)
					.filter(|s| s.payload.as_ref().is_some_and(|p| p.tenant == tenant))
					.count();

				let _ = reply.send(count);
			},
			Cmd::CountForClient { client_name, kind, reply } => {
				let count = self
					.sessions
					.values()
					.filter(|s| !s.is_expired(now) && s.kind == kind)
					.filter(|s| s.payload.as_ref().is_some_and(|p| p.audience_contains(&client_name)))
					.count();

				let _ = reply.send(count);
			},
		}
	}
}

/// Actor-backed, in-process implementation of [`SessionStore`].
#[derive(Clone)]
pub struct MemoryStore {
	tx: mpsc::UnboundedSender<Cmd>,
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryStore {
	/// Spawns the owning task and returns a handle to it.
	pub fn new() -> Self {
		let (tx, mut rx) = mpsc::unbounded_channel::<Cmd>();

		tokio::spawn(async move {
			let mut actor = Actor::new();

			loop {
				match actor.next_deadline() {
					Some(deadline) => {
						let now = OffsetDateTime::now_utc();
						let sleep_for =
							(deadline - now).max(Duration::ZERO).unsigned_abs().min(std::time::Duration::from_secs(3600));

						tokio::select! {
							_ = tokio::time::sleep(sleep_for) => {
								actor.evict_expired(OffsetDateTime::now_utc());
							},
							cmd = rx.recv() => {
								match cmd {
									Some(cmd) => actor.handle(cmd),
									None => break,
								}
							},
						}
					},
					None => match rx.recv().await {
						Some(cmd) => actor.handle(cmd),
						None => break,
					},
				}
			}
		});

		Self { tx }
	}

	async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Cmd) -> Result<T, SessionStoreError> {
		let (reply, rx) = oneshot::channel();

		self.tx
			.send(build(reply))
			.map_err(|_| SessionStoreError::Backend { message: "session actor has shut down".into() })?;
		rx.await.map_err(|_| SessionStoreError::Backend { message: "session actor dropped the reply".into() })
	}
}

impl SessionStore for MemoryStore {
	fn set(&self, session: AuthSession) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.call(|reply| Cmd::Set { session, reply }).await? })
	}

	fn get(&self, kind: SessionKind, code: String, remove: bool) -> StoreFuture<'_, Option<AuthSession>> {
		Box::pin(async move { self.call(|reply| Cmd::Get { kind, code, remove, reply }).await })
	}

	fn push(&self, login: LoginSession) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.call(|reply| Cmd::Push { login, reply }).await })
	}

	fn pull(&self, login_uuid: String) -> StoreFuture<'_, bool> {
		Box::pin(async move { self.call(|reply| Cmd::Pull { login_uuid, reply }).await })
	}

	fn delete(&self, kind: SessionKind, code: String) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.call(|reply| Cmd::Delete { kind, code, reply }).await })
	}

	fn wipe(&self, tenant: String, subject: String) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.call(|reply| Cmd::Wipe { tenant, subject, reply }).await })
	}

	fn count(&self) -> StoreFuture<'_, usize> {
		Box::pin(async move { self.call(|reply| Cmd::Count { reply }).await })
	}

	fn count_for_tenant(&self, tenant: String, kind: SessionKind) -> StoreFuture<'_, usize> {
		Box::pin(async move { self.call(|reply| Cmd::CountForTenant { tenant, kind, reply }).await })
	}

	fn count_for_client(&self, client_name: String, kind: SessionKind) -> StoreFuture<'_, usize> {
		Box::pin(async move { self.call(|reply| Cmd::CountForClient { client_name, kind, reply }).await })
	}

	fn is_healthy(&self) -> StoreFuture<'_, bool> {
		Box::pin(async move { Ok(!self.tx.is_closed()) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn sample_session(code: &str, ttl_seconds: i64) -> AuthSession {
		AuthSession {
			kind: SessionKind::Code,
			state: Some("123".into()),
			code_value: code.into(),
			scopes: vec!["access".into()],
			payload: None,
			redirect_uri: "https://api.example.com/".into(),
			ttl_seconds,
			generated_at: OffsetDateTime::now_utc(),
			code_challenge: None,
			code_challenge_method: None,
		}
	}

	#[tokio::test]
	async fn set_then_get_remove_is_single_use() {
		let store = MemoryStore::new();

		store.set(sample_session("abc", 600)).await.expect("set should succeed");

		let first = store.get(SessionKind::Code, "abc".into(), true).await.expect("get should succeed");
		assert!(first.is_some());

		let second = store.get(SessionKind::Code, "abc".into(), true).await.expect("get should succeed");
		assert!(second.is_none(), "a single-use code must not be returned twice");
	}

	#[tokio::test]
	async fn set_rejects_duplicate_code() {
		let store = MemoryStore::new();

		store.set(sample_session("dup", 600)).await.expect("first set should succeed");

		let err = store.set(sample_session("dup", 600)).await.unwrap_err();
		assert_eq!(err, SessionStoreError::CodeTaken);
	}

	#[tokio::test]
	async fn expired_session_is_not_returned() {
		let store = MemoryStore::new();

		store.set(sample_session("short", 0)).await.expect("set should succeed");
		tokio::time::sleep(std::time::Duration::from_millis(50)).await;

		let result = store.get(SessionKind::Code, "short".into(), false).await.expect("get should succeed");
		assert!(result.is_none());
	}

	#[tokio::test]
	async fn login_session_pull_is_single_use() {
		let store = MemoryStore::new();
		let login = LoginSession {
			login_uuid: "11111111-1111-1111-1111-111111111111".into(),
			location: "https://id.example.com/authorize?...".into(),
			generated_at: OffsetDateTime::now_utc(),
		};

		store.push(login.clone()).await.expect("push should succeed");
		assert!(store.pull(login.login_uuid.clone()).await.expect("pull should succeed"));
		assert!(!store.pull(login.login_uuid).await.expect("second pull should succeed"));
	}

	#[tokio::test]
	async fn is_healthy_reports_true_while_actor_runs() {
		let store = MemoryStore::new();

		assert!(store.is_healthy().await.expect("health check should succeed"));
	}
}
