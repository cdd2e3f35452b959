//! Thread-safe in-memory index of tenants and clients (§4.A).
//!
//! All mutators and accessors serialize on a single `RwLock`, giving every
//! reader a consistent, never-torn view; the store is otherwise read-only to
//! everything except the Entity Loaders (§4.B).

// self
use crate::{
	_prelude::*,
	domain::{client::Client, tenant::{EntityRef, Tenant}},
};

type ChangeHook = Arc<dyn Fn() + Send + Sync>;

struct Inner {
	tenants: HashMap<String, Tenant>,
	/// Insertion order of tenant names; `find_tenant_for_host` scans this
	/// order so that, per the host-overlap invariant, the first tenant ever
	/// inserted for a given host remains authoritative.
	tenant_order: Vec<String>,
	tenant_ref_index: HashMap<EntityRef, String>,
	clients: HashMap<uuid::Uuid, Client>,
	client_ref_index: HashMap<EntityRef, uuid::Uuid>,
}

/// Thread-safe authoritative index of tenants and clients.
#[derive(Clone)]
pub struct EntityStore {
	inner: Arc<RwLock<Inner>>,
	on_change: Arc<RwLock<Option<ChangeHook>>>,
}

impl Default for EntityStore {
	fn default() -> Self {
		Self {
			inner: Arc::new(RwLock::new(Inner {
				tenants: HashMap::new(),
				tenant_order: Vec::new(),
				tenant_ref_index: HashMap::new(),
				clients: HashMap::new(),
				client_ref_index: HashMap::new(),
			})),
			on_change: Arc::new(RwLock::new(None)),
		}
	}
}

impl EntityStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a hook invoked after every committed mutation; intended for
	/// test synchronization with the loaders.
	pub fn set_on_change(&self, hook: impl Fn() + Send + Sync + 'static) {
		*self.on_change.write() = Some(Arc::new(hook));
	}

	fn notify(&self) {
		if let Some(hook) = self.on_change.read().as_ref() {
			hook();
		}
	}

	/// Inserts a tenant. Returns `false` (no-op) if a tenant with the same
	/// name already exists.
	pub fn insert_tenant(&self, tenant: Tenant) -> bool {
		let inserted = {
			let mut guard = self.inner.write();

			if guard.tenants.contains_key(&tenant.name) {
				false
			} else {
				guard.tenant_ref_index.insert(tenant.r#ref.clone(), tenant.name.clone());
				guard.tenant_order.push(tenant.name.clone());
				guard.tenants.insert(tenant.name.clone(), tenant);

				true
			}
		};

		if inserted {
			self.notify();
		}

		inserted
	}

	/// Removes the tenant referenced by `r#ref`. No-op if not found.
	pub fn remove_tenant(&self, r#ref: &EntityRef) {
		let removed = {
			let mut guard = self.inner.write();

			match guard.tenant_ref_index.remove(r#ref) {
				Some(name) => {
					guard.tenants.remove(&name);
					guard.tenant_order.retain(|n| n != &name);

					true
				},
				None => false,
			}
		};

		if removed {
			self.notify();
		}
	}

	/// Inserts a client. Returns `false` (no-op) if a client with the same
	/// `ident` already exists.
	pub fn insert_client(&self, client: Client) -> bool {
		let inserted = {
			let mut guard = self.inner.write();

			if guard.clients.contains_key(&client.config.ident) {
				false
			} else {
				guard.client_ref_index.insert(client.r#ref.clone(), client.config.ident);
				guard.clients.insert(client.config.ident, client);

				true
			}
		};

		if inserted {
			self.notify();
		}

		inserted
	}

	/// Removes the client referenced by `r#ref`. No-op if not found.
	pub fn remove_client(&self, r#ref: &EntityRef) {
		let removed = {
			let mut guard = self.inner.write();

			match guard.client_ref_index.remove(r#ref) {
				Some(ident) => {
					guard.clients.remove(&ident);

					true
				},
				None => false,
			}
		};

		if removed {
			self.notify();
		}
	}

	/// Looks up a tenant by name.
	pub fn find_tenant_by_name(&self, name: &str) -> Option<Tenant> {
		self.inner.read().tenants.get(name).cloned()
	}

	/// Looks up the tenant responsible for `host`: tries an exact match
	/// first, then single-label wildcards, in tenant insertion order.
	pub fn find_tenant_for_host(&self, host: &str) -> Option<Tenant> {
		let guard = self.inner.read();

		for name in &guard.tenant_order {
			let Some(tenant) = guard.tenants.get(name) else { continue };

			if tenant.hosts.iter().any(|h| matches!(h, crate::domain::host::HostPattern::Exact(_)) && h.matches(host)) {
				return Some(tenant.clone());
			}
		}
		for name in &guard.tenant_order {
			let Some(tenant) = guard.tenants.get(name) else { continue };

			if tenant.hosts.iter().any(|h| h.matches(host)) {
				return Some(tenant.clone());
			}
		}

		None
	}

	/// Looks up a client by its `ident`.
	pub fn find_client_by_ident(&self, ident: uuid::Uuid) -> Option<Client> {
		self.inner.read().clients.get(&ident).cloned()
	}

	/// Looks up a client by its source reference.
	pub fn find_client_by_ref(&self, r#ref: &EntityRef) -> Option<Client> {
		let guard = self.inner.read();
		let ident = guard.client_ref_index.get(r#ref)?;

		guard.clients.get(ident).cloned()
	}

	/// Looks up a tenant by its source reference.
	pub fn find_tenant_by_ref(&self, r#ref: &EntityRef) -> Option<Tenant> {
		let guard = self.inner.read();
		let name = guard.tenant_ref_index.get(r#ref)?;

		guard.tenants.get(name).cloned()
	}

	/// Finds the currently stored reference for a tenant's resource-id,
	/// regardless of revision; used by the loader reconciler to detect a
	/// revision change vs. an identical re-announcement.
	pub fn tenant_ref_for_resource(&self, resource_id: &str) -> Option<EntityRef> {
		let guard = self.inner.read();

		guard.tenant_ref_index.keys().find(|r| r.resource_id() == resource_id).cloned()
	}

	/// Finds the currently stored reference for a client's resource-id,
	/// regardless of revision.
	pub fn client_ref_for_resource(&self, resource_id: &str) -> Option<EntityRef> {
		let guard = self.inner.read();

		guard.client_ref_index.keys().find(|r| r.resource_id() == resource_id).cloned()
	}

	/// All tenants, as value copies, in insertion order.
	pub fn tenants(&self) -> Vec<Tenant> {
		let guard = self.inner.read();

		guard.tenant_order.iter().filter_map(|n| guard.tenants.get(n).cloned()).collect()
	}

	/// All clients, as value copies.
	pub fn clients(&self) -> Vec<Client> {
		self.inner.read().clients.values().cloned().collect()
	}

	/// All clients belonging to `tenantname`, as value copies.
	pub fn clients_for_tenant(&self, tenantname: &str) -> Vec<Client> {
		self.inner.read().clients.values().filter(|c| c.tenantname == tenantname).cloned().collect()
	}

	/// Total tenant count.
	pub fn tenant_count(&self) -> usize {
		self.inner.read().tenants.len()
	}

	/// Total client count.
	pub fn client_count(&self) -> usize {
		self.inner.read().clients.len()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::domain::host::HostPattern;

	fn tenant(name: &str, host: &str) -> Tenant {
		Tenant {
			name: name.to_owned(),
			hosts: vec![HostPattern::parse(host).expect("valid fixture host")],
			informations: None,
			interceptor: None,
			templates: None,
			providers: Vec::new(),
			silent_login: true,
			r#ref: EntityRef::File { path: format!("/tenants/{name}.yaml").into() },
		}
	}

	#[test]
	fn duplicate_tenant_name_insert_is_a_no_op() {
		let store = EntityStore::new();

		assert!(store.insert_tenant(tenant("cheese/cheese", "id.example.com")));
		assert!(!store.insert_tenant(tenant("cheese/cheese", "other.example.com")));
		assert_eq!(store.tenant_count(), 1);
		// The first insert's host set wins; "other.example.com" was never attached.
		assert!(store.find_tenant_for_host("other.example.com").is_none());
	}

	#[test]
	fn first_insert_wins_on_overlapping_hosts() {
		let store = EntityStore::new();

		store.insert_tenant(tenant("first", "id.example.com"));
		store.insert_tenant(tenant("second", "id.example.com"));

		let resolved = store.find_tenant_for_host("id.example.com").expect("host should resolve");

		assert_eq!(resolved.name, "first");
	}

	#[test]
	fn remove_by_ref_is_a_no_op_when_missing() {
		let store = EntityStore::new();
		let r#ref = EntityRef::File { path: "/tenants/missing.yaml".into() };

		store.remove_tenant(&r#ref);
		assert_eq!(store.tenant_count(), 0);
	}

	#[test]
	fn change_hook_fires_on_committed_mutation() {
		let store = EntityStore::new();
		let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
		let counter = fired.clone();

		store.set_on_change(move || {
			counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
		});

		store.insert_tenant(tenant("cheese/cheese", "id.example.com"));
		assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 1);

		// Duplicate insert is a no-op: no additional notification.
		store.insert_tenant(tenant("cheese/cheese", "id.example.com"));
		assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 1);
	}
}
