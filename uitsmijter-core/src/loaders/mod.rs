//! Entity Loaders (§4.B): two independent sources of tenant/client events,
//! reconciled into the Entity Store under one shared rule.

pub mod crd;
pub mod file;

pub use crd::KubernetesLoader;
pub use file::FileLoader;

// self
use crate::{
	_prelude::*,
	domain::{client::Client, tenant::{EntityRef, Tenant}},
	store::entity::EntityStore,
};

/// An entity carried by a loader event.
#[derive(Clone, Debug)]
pub enum LoadedEntity {
	/// A tenant resource.
	Tenant(Tenant),
	/// A client resource.
	Client(Client),
}
impl LoadedEntity {
	fn r#ref(&self) -> &EntityRef {
		match self {
			Self::Tenant(t) => &t.r#ref,
			Self::Client(c) => &c.r#ref,
		}
	}
}

/// One change observed by a loader.
#[derive(Clone, Debug)]
pub enum LoaderEvent {
	/// A new resource was observed.
	Added(LoadedEntity),
	/// An existing resource changed.
	Modified(LoadedEntity),
	/// A resource was removed; carries just enough to find it again.
	Deleted(EntityRef),
}

/// Shared interface implemented by both the filesystem and Kubernetes CRD
/// loaders.
pub trait EntityLoader: Send + Sync {
	/// Starts watching for changes; must not block the caller past the
	/// initial listing.
	fn start(&self) -> StoreFuture<'_, ()>;

	/// Stops watching; releases any held resources (watch handles, tasks).
	fn shutdown(&self) -> StoreFuture<'_, ()>;
}

/// Future type returned by [`EntityLoader`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Applies one loader event to the Entity Store, following the shared
/// reconciliation rule from §4.B:
///
/// - `added`: identical `(resource-id, revision)` already present → ignore;
///   different revision present → remove then add; otherwise add.
/// - `modified`: remove old by resource-id, then add new.
/// - `deleted`: remove by resource-id.
pub fn reconcile(store: &EntityStore, event: LoaderEvent) {
	match event {
		LoaderEvent::Added(entity) => reconcile_added(store, entity),
		LoaderEvent::Modified(entity) => reconcile_modified(store, entity),
		LoaderEvent::Deleted(r#ref) => reconcile_deleted(store, &r#ref),
	}
}

fn reconcile_added(store: &EntityStore, entity: LoadedEntity) {
	let resource_id = entity.r#ref().resource_id();

	match entity {
		LoadedEntity::Tenant(tenant) => {
			match store.tenant_ref_for_resource(&resource_id) {
				Some(existing) if existing.revision() == tenant.r#ref.revision() => {
					// Identical revision already loaded; no-op per §4.B.
				},
				Some(existing) => {
					store.remove_tenant(&existing);
					store.insert_tenant(tenant);
				},
				None => {
					store.insert_tenant(tenant);
				},
			}
		},
		LoadedEntity::Client(client) => {
			match store.client_ref_for_resource(&resource_id) {
				Some(existing) if existing.revision() == client.r#ref.revision() => {},
				Some(existing) => {
					store.remove_client(&existing);
					store.insert_client(client);
				},
				None => {
					store.insert_client(client);
				},
			}
		},
	}
}

fn reconcile_modified(store: &EntityStore, entity: LoadedEntity) {
	let resource_id = entity.r#ref().resource_id();

	match entity {
		LoadedEntity::Tenant(tenant) => {
			if let Some(existing) = store.tenant_ref_for_resource(&resource_id) {
				store.remove_tenant(&existing);
			}
			store.insert_tenant(tenant);
		},
		LoadedEntity::Client(client) => {
			if let Some(existing) = store.client_ref_for_resource(&resource_id) {
				store.remove_client(&existing);
			}
			store.insert_client(client);
		},
	}
}

fn reconcile_deleted(store: &EntityStore, r#ref: &EntityRef) {
	let resource_id = r#ref.resource_id();

	if let Some(existing) = store.tenant_ref_for_resource(&resource_id) {
		store.remove_tenant(&existing);
	}
	if let Some(existing) = store.client_ref_for_resource(&resource_id) {
		store.remove_client(&existing);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::domain::host::HostPattern;

	fn tenant_at_revision(name: &str, uid: &str, revision: &str) -> Tenant {
		Tenant {
			name: name.to_owned(),
			hosts: vec![HostPattern::parse("id.example.com").expect("valid host")],
			informations: None,
			interceptor: None,
			templates: None,
			providers: Vec::new(),
			silent_login: true,
			r#ref: EntityRef::Kubernetes { uid: uid.to_owned(), revision: revision.to_owned() },
		}
	}

	#[test]
	fn added_with_identical_revision_is_ignored() {
		let store = EntityStore::new();

		reconcile(&store, LoaderEvent::Added(LoadedEntity::Tenant(tenant_at_revision("a", "ns/a", "1"))));
		reconcile(&store, LoaderEvent::Added(LoadedEntity::Tenant(tenant_at_revision("a", "ns/a", "1"))));

		assert_eq!(store.tenant_count(), 1);
	}

	#[test]
	fn added_with_newer_revision_replaces() {
		let store = EntityStore::new();

		reconcile(&store, LoaderEvent::Added(LoadedEntity::Tenant(tenant_at_revision("a", "ns/a", "1"))));
		reconcile(&store, LoaderEvent::Added(LoadedEntity::Tenant(tenant_at_revision("a", "ns/a", "2"))));

		assert_eq!(store.tenant_count(), 1);
		let tenant = store.find_tenant_by_name("a").expect("tenant should exist");
		assert_eq!(tenant.r#ref.revision(), Some("2"));
	}

	#[test]
	fn deleted_removes_by_resource_id() {
		let store = EntityStore::new();

		reconcile(&store, LoaderEvent::Added(LoadedEntity::Tenant(tenant_at_revision("a", "ns/a", "1"))));
		reconcile(&store, LoaderEvent::Deleted(EntityRef::Kubernetes { uid: "ns/a".into(), revision: "1".into() }));

		assert_eq!(store.tenant_count(), 0);
	}

	#[test]
	fn replayed_duplicate_events_converge_to_the_same_set() {
		let store_a = EntityStore::new();
		let store_b = EntityStore::new();
		let events = vec![
			LoaderEvent::Added(LoadedEntity::Tenant(tenant_at_revision("a", "ns/a", "1"))),
			LoaderEvent::Added(LoadedEntity::Tenant(tenant_at_revision("a", "ns/a", "1"))),
			LoaderEvent::Added(LoadedEntity::Tenant(tenant_at_revision("a", "ns/a", "2"))),
		];

		for event in events.clone() {
			reconcile(&store_a, event);
		}
		// Re-applying the full sequence again must not change the final state.
		for event in events {
			reconcile(&store_b, event);
		}

		assert_eq!(store_a.tenant_count(), store_b.tenant_count());
		assert_eq!(
			store_a.find_tenant_by_name("a").map(|t| t.r#ref.revision().map(str::to_owned)),
			store_b.find_tenant_by_name("a").map(|t| t.r#ref.revision().map(str::to_owned)),
		);
	}
}
