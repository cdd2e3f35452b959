//! Binary entrypoint: loads configuration, assembles [`AppState`], starts the
//! configured Entity Loaders, and serves the router built in [`router`].

use std::sync::Arc;

use anyhow::Context;
use uitsmijter_core::{
	loaders::{EntityLoader, FileLoader, KubernetesLoader, crd::NamespaceScope},
	store::session::RedisStore,
};
use uitsmijter_server::{AppState, Config, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let config = Config::from_env();

	tracing_subscriber::fmt().with_env_filter(config.log_level.clone()).init();

	let mut state = AppState::new(config.clone()).context("failed to initialize signing keys")?;

	if let Some(host) = &state.config.redis_host {
		let redis = RedisStore::connect(host, state.config.redis_password.as_deref())
			.await
			.context("failed to connect to the configured Redis session-store backend")?;
		state = state.with_sessions(Arc::new(redis));
	}

	let file_loader = FileLoader::new(&config.directory, state.store.clone());
	file_loader.start().await.context("failed to start the filesystem entity loader")?;

	let kube_loader = if config.support_kubernetes_crd {
		let client = kube::Client::try_default().await.context("failed to build a Kubernetes client")?;
		let scope = match config.scoped_kubernetes_crd.as_str() {
			"*" => NamespaceScope::All,
			namespace => NamespaceScope::Namespace(namespace.to_owned()),
		};
		let loader = KubernetesLoader::new(client, scope, state.store.clone());
		loader.start().await.context("failed to start the Kubernetes CRD entity loader")?;
		Some(loader)
	} else {
		None
	};

	let app = router::build(state);

	let addr = "0.0.0.0:8080";
	tracing::info!(%addr, "uitsmijter-server listening");

	let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind the HTTP listener")?;
	axum::serve(listener, app).await.context("HTTP server exited")?;

	if let Some(loader) = kube_loader {
		loader.shutdown().await.context("failed to shut down the Kubernetes CRD entity loader")?;
	}
	file_loader.shutdown().await.context("failed to shut down the filesystem entity loader")?;

	Ok(())
}
