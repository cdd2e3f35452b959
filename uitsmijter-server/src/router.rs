//! Wires every endpoint from §6 onto an [`axum::Router`] over [`AppState`].

use axum::{
	routing::{get, post},
	Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{controller, health, AppState};

/// Builds the complete HTTP surface: OAuth/OIDC controller, interceptor,
/// discovery/JWKS, and health/metrics.
pub fn build(state: AppState) -> Router {
	Router::new()
		.route("/authorize", get(controller::authorize::authorize))
		.route("/login", get(controller::login::show).post(controller::login::login))
		.route("/token", post(controller::token::token))
		.route("/token/info", get(controller::token_info::token_info))
		.route("/interceptor", get(controller::interceptor::interceptor))
		.route("/logout", get(controller::logout::logout))
		.route("/logout/finalize", get(controller::logout::finalize))
		.route("/.well-known/openid-configuration", get(controller::discovery::discovery_document))
		.route("/.well-known/jwks.json", get(controller::discovery::jwks))
		.route("/health", get(health::health))
		.route("/health/ready", get(health::ready))
		.route("/metrics", get(health::metrics))
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
		.with_state(state)
}
