//! Kubernetes CRD Entity Loader: lists then watches `Tenant`/`Client` custom
//! resources, with exponential backoff on API readiness failures.

use futures::StreamExt;
use kube::{
	Api, Client as KubeClient, CustomResource,
	api::ListParams,
	runtime::{WatchStreamExt, watcher},
};
use schemars::JsonSchema;

// self
use crate::{
	_prelude::*,
	domain::{client::GrantType, host::HostPattern, tenant::EntityRef},
	error::{Error, InternalError},
	loaders::{EntityLoader, LoadedEntity, LoaderEvent, StoreFuture, reconcile},
	store::entity::EntityStore,
};

/// Either every namespace, or a single configured namespace (`SCOPED_KUBERNETES_CRD`).
#[derive(Clone, Debug)]
pub enum NamespaceScope {
	/// Watch custom resources across every namespace.
	All,
	/// Watch custom resources in a single namespace only.
	Namespace(String),
}

/// Initial backoff, per §4.B: `1s → 30s cap, ≤10 attempts`.
const BACKOFF_INITIAL: std::time::Duration = std::time::Duration::from_secs(1);
/// Backoff cap, per §4.B.
const BACKOFF_CAP: std::time::Duration = std::time::Duration::from_secs(30);
/// Maximum listing retry attempts before the loader gives up and reports a
/// fatal error (readiness becomes false).
const MAX_LIST_ATTEMPTS: u32 = 10;

/// Tenant custom resource, mirroring [`crate::domain::tenant::Tenant`] minus
/// source provenance (supplied by the loader as `namespace/name` + `resourceVersion`).
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, CustomResource)]
#[kube(group = "uitsmijter.io", version = "v1", kind = "TenantCrd", namespaced)]
pub struct TenantSpec {
	/// Hosts this tenant is responsible for.
	pub hosts: Vec<String>,
	/// Whether a valid cookie from another client of this tenant skips login.
	#[serde(default = "default_true")]
	pub silent_login: bool,
}
fn default_true() -> bool {
	true
}

/// Client custom resource, mirroring [`crate::domain::client::Client`].
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, CustomResource)]
#[kube(group = "uitsmijter.io", version = "v1", kind = "ClientCrd", namespaced)]
pub struct ClientSpec {
	/// Client identifier exported as `client_id`.
	pub ident: uuid::Uuid,
	/// Name of the tenant this client belongs to.
	pub tenantname: String,
	/// Allow-listed redirect URI regexes.
	#[serde(default)]
	pub redirect_urls: Vec<String>,
	/// Grant types this client may use.
	pub grant_types: Vec<GrantType>,
	/// Whether this client is PKCE-only.
	#[serde(default)]
	pub is_pkce_only: bool,
}

/// Loader backed by a Kubernetes CRD watch.
pub struct KubernetesLoader {
	client: KubeClient,
	scope: NamespaceScope,
	store: EntityStore,
	tasks: RwLock<Vec<tokio::task::JoinHandle<()>>>,
}

impl KubernetesLoader {
	/// Creates a loader against `client`, scoped per `SCOPED_KUBERNETES_CRD`.
	pub fn new(client: KubeClient, scope: NamespaceScope, store: EntityStore) -> Self {
		Self { client, scope, store, tasks: RwLock::new(Vec::new()) }
	}

	fn tenants_api(&self) -> Api<TenantCrd> {
		match &self.scope {
			NamespaceScope::All => Api::all(self.client.clone()),
			NamespaceScope::Namespace(ns) => Api::namespaced(self.client.clone(), ns),
		}
	}

	fn clients_api(&self) -> Api<ClientCrd> {
		match &self.scope {
			NamespaceScope::All => Api::all(self.client.clone()),
			NamespaceScope::Namespace(ns) => Api::namespaced(self.client.clone(), ns),
		}
	}

	/// Lists the current tenants with exponential backoff on readiness
	/// failures (HTTP 429), per §4.B.
	async fn list_tenants_with_backoff(&self) -> Result<Vec<TenantCrd>, Error> {
		list_with_backoff(|| {
			let api = self.tenants_api();

			async move { api.list(&ListParams::default()).await }
		})
		.await
	}

	async fn list_clients_with_backoff(&self) -> Result<Vec<ClientCrd>, Error> {
		list_with_backoff(|| {
			let api = self.clients_api();

			async move { api.list(&ListParams::default()).await }
		})
		.await
	}
}

async fn list_with_backoff<T, F, Fut>(make_call: F) -> Result<Vec<T>, Error>
where
	F: Fn() -> Fut,
	Fut: Future<Output = Result<kube::core::ObjectList<T>, kube::Error>>,
	T: Clone,
{
	let mut delay = BACKOFF_INITIAL;

	for attempt in 1..=MAX_LIST_ATTEMPTS {
		match make_call().await {
			Ok(list) => return Ok(list.items),
			Err(kube::Error::Api(err)) if err.code == 429 && attempt < MAX_LIST_ATTEMPTS => {
				tokio::time::sleep(delay).await;
				delay = (delay * 2).min(BACKOFF_CAP);
			},
			Err(err) => return Err(Error::Internal(InternalError::Store(err.to_string()))),
		}
	}

	Err(Error::Internal(InternalError::Store("Kubernetes API did not become ready in time".into())))
}

fn tenant_from_crd(crd: TenantCrd) -> Option<LoadedEntity> {
	let uid = namespaced_name(&crd)?;
	let revision = crd.meta().resource_version.clone().unwrap_or_default();
	let mut hosts = Vec::new();

	for raw in &crd.spec.hosts {
		match HostPattern::parse(raw) {
			Ok(pattern) => hosts.push(pattern),
			Err(_) => continue,
		}
	}

	Some(LoadedEntity::Tenant(crate::domain::tenant::Tenant {
		name: uid.clone(),
		hosts,
		informations: None,
		interceptor: None,
		templates: None,
		providers: Vec::new(),
		silent_login: crd.spec.silent_login,
		r#ref: EntityRef::Kubernetes { uid, revision },
	}))
}

fn client_from_crd(crd: ClientCrd) -> Option<LoadedEntity> {
	let uid = namespaced_name(&crd)?;
	let revision = crd.meta().resource_version.clone().unwrap_or_default();

	Some(LoadedEntity::Client(crate::domain::client::Client {
		name: uid.clone(),
		config: crate::domain::client::ClientConfig { ident: crd.spec.ident },
		tenantname: crd.spec.tenantname.clone(),
		redirect_urls: crd.spec.redirect_urls.clone(),
		grant_types: crd.spec.grant_types.clone(),
		scopes: None,
		referrers: None,
		secret: None,
		is_pkce_only: crd.spec.is_pkce_only,
		r#ref: EntityRef::Kubernetes { uid, revision },
	}))
}

fn namespaced_name(obj: &impl kube::Resource<DynamicType = ()>) -> Option<String> {
	let name = obj.meta().name.clone()?;
	let namespace = obj.meta().namespace.clone().unwrap_or_default();

	Some(format!("{namespace}/{name}"))
}

impl EntityLoader for KubernetesLoader {
	fn start(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			for tenant in self.list_tenants_with_backoff().await? {
				if let Some(entity) = tenant_from_crd(tenant) {
					reconcile(&self.store, LoaderEvent::Added(entity));
				}
			}
			for client in self.list_clients_with_backoff().await? {
				if let Some(entity) = client_from_crd(client) {
					reconcile(&self.store, LoaderEvent::Added(entity));
				}
			}

			let store_t = self.store.clone();
			let tenants_api = self.tenants_api();
			let tenant_task = tokio::spawn(async move {
				let mut stream = Box::pin(watcher(tenants_api, watcher::Config::default()).touched_objects());

				while let Some(event) = stream.next().await {
					match event {
						Ok(crd) => {
							if let Some(entity) = tenant_from_crd(crd) {
								reconcile(&store_t, LoaderEvent::Modified(entity));
							}
						},
						Err(_) => break, // watch stream lost: fatal, readiness becomes false
					}
				}
			});

			let store_c = self.store.clone();
			let clients_api = self.clients_api();
			let client_task = tokio::spawn(async move {
				let mut stream = Box::pin(watcher(clients_api, watcher::Config::default()).touched_objects());

				while let Some(event) = stream.next().await {
					match event {
						Ok(crd) => {
							if let Some(entity) = client_from_crd(crd) {
								reconcile(&store_c, LoaderEvent::Modified(entity));
							}
						},
						Err(_) => break,
					}
				}
			});

			*self.tasks.write() = vec![tenant_task, client_task];

			Ok(())
		})
	}

	fn shutdown(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			for task in self.tasks.write().drain(..) {
				task.abort();
			}

			Ok(())
		})
	}
}
