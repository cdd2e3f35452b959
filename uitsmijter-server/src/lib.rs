//! HTTP surface for the authorization engine in `uitsmijter-core`: the
//! OAuth/OIDC controller, interceptor mode, discovery/JWKS, and health/metrics.

pub mod config;
pub mod controller;
pub mod cookie;
pub mod error_page;
pub mod health;
pub mod router;
pub mod templates;

use std::{path::PathBuf, sync::Arc};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use uitsmijter_core::{
	resolver::Resolver,
	store::{entity::EntityStore, session::SessionStore, SessionStoreError},
	token::{TokenKeys, TokenService},
};

pub use config::Config;

/// Shared application state, cloned into every request.
#[derive(Clone)]
pub struct AppState {
	/// Loaded configuration.
	pub config: Arc<Config>,
	/// The Entity Store (tenants/clients).
	pub store: EntityStore,
	/// The Code/Session Store backend (in-process or Redis).
	pub sessions: Arc<dyn SessionStore>,
	/// Token signing/verification service.
	pub tokens: Arc<TokenService>,
	/// Request Resolver built against `store`/`tokens`.
	pub resolver: Arc<Resolver>,
	/// Root directory tenant UI templates are fetched into.
	pub views_dir: PathBuf,
	/// Prometheus recorder handle, rendered by `GET /metrics`.
	pub metrics_handle: PrometheusHandle,
}

impl AppState {
	/// Builds application state around a freshly generated signing key and an
	/// in-process session store backend; callers that need Redis should build
	/// an `Arc<dyn SessionStore>` themselves and use [`AppState::with_sessions`].
	pub fn new(config: Config) -> Result<Self, uitsmijter_core::token::TokenError> {
		let store = EntityStore::new();
		let keys = Arc::new(TokenKeys::generate("uitsmijter-0")?);
		let tokens = Arc::new(TokenService::new(keys));
		let sessions: Arc<dyn SessionStore> =
			Arc::new(uitsmijter_core::store::session::MemoryStore::new());
		let resolver = Arc::new(Resolver::new(store.clone(), tokens.clone(), config.public_domain.clone()));
		let views_dir = PathBuf::from(&config.directory).join("Views");
		let metrics_handle = PrometheusBuilder::new().install_recorder().unwrap_or_else(|_| {
			// A recorder may already be installed (e.g. re-entrant test setup);
			// `PrometheusHandle::render` still works against the global recorder.
			PrometheusBuilder::new().build_recorder().handle()
		});

		Ok(Self { config: Arc::new(config), store, sessions, tokens, resolver, views_dir, metrics_handle })
	}

	/// Rebuilds state with a caller-supplied session store backend (e.g. Redis).
	pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
		self.sessions = sessions;

		self
	}

	/// Reports whether the session-store backend is currently reachable.
	pub async fn is_healthy(&self) -> bool {
		self.sessions.is_healthy().await.unwrap_or(false)
	}
}

/// Maps a session-store failure onto the shared error hierarchy; kept here
/// (rather than as a `From` impl) since both types live in `uitsmijter-core`.
pub fn session_error(error: SessionStoreError) -> uitsmijter_core::error::Error {
	match error {
		SessionStoreError::Timeout => {
			uitsmijter_core::error::Error::Timeout(uitsmijter_core::error::TimeoutError::Store)
		},
		other => uitsmijter_core::error::Error::Internal(other.into()),
	}
}
