//! Filesystem Entity Loader: watches `Tenants/` and `Clients/` for YAML
//! resources and reconciles them into the Entity Store.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

// self
use crate::{
	_prelude::*,
	domain::{client::Client, tenant::{EntityRef, Tenant}},
	error::{Error, InternalError},
	loaders::{EntityLoader, LoadedEntity, LoaderEvent, StoreFuture, reconcile},
	store::entity::EntityStore,
};

/// Watches `<directory>/Tenants/` and `<directory>/Clients/` for YAML
/// resources, using `file(path)` as the reconciliation reference.
pub struct FileLoader {
	tenants_dir: PathBuf,
	clients_dir: PathBuf,
	store: EntityStore,
	watcher: RwLock<Option<RecommendedWatcher>>,
	task: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl FileLoader {
	/// Creates a loader rooted at `directory` (expects `Tenants/` and `Clients/`
	/// subdirectories).
	pub fn new(directory: impl AsRef<Path>, store: EntityStore) -> Self {
		let root = directory.as_ref();

		Self {
			tenants_dir: root.join("Tenants"),
			clients_dir: root.join("Clients"),
			store,
			watcher: RwLock::new(None),
			task: RwLock::new(None),
		}
	}

	fn initial_scan(&self) {
		scan_dir(&self.tenants_dir, &self.store, parse_tenant_file);
		scan_dir(&self.clients_dir, &self.store, parse_client_file);
	}
}

fn scan_dir(dir: &Path, store: &EntityStore, parse: impl Fn(&Path) -> Option<LoadedEntity>) {
	let Ok(entries) = std::fs::read_dir(dir) else { return };

	for entry in entries.flatten() {
		let path = entry.path();

		if !is_yaml(&path) {
			continue;
		}
		if let Some(entity) = parse(&path) {
			reconcile(store, LoaderEvent::Added(entity));
		}
	}
}

fn is_yaml(path: &Path) -> bool {
	matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml" | "json"))
}

fn parse_tenant_file(path: &Path) -> Option<LoadedEntity> {
	let raw = std::fs::read_to_string(path).ok()?;

	match parse_yaml::<Tenant>(&raw) {
		Ok(mut tenant) => {
			tenant.r#ref = EntityRef::File { path: path.to_owned() };

			Some(LoadedEntity::Tenant(tenant))
		},
		Err(err) => {
			log_malformed(path, err);

			None
		},
	}
}

fn parse_client_file(path: &Path) -> Option<LoadedEntity> {
	let raw = std::fs::read_to_string(path).ok()?;

	match parse_yaml::<Client>(&raw) {
		Ok(mut client) => {
			client.r#ref = EntityRef::File { path: path.to_owned() };

			Some(LoadedEntity::Client(client))
		},
		Err(err) => {
			log_malformed(path, err);

			None
		},
	}
}

fn parse_yaml<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, Error> {
	let deserializer = serde_yaml::Deserializer::from_str(raw);

	serde_path_to_error::deserialize(deserializer).map_err(|e| {
		Error::Internal(InternalError::MalformedResource {
			path: "<in-memory>".into(),
			source: Box::new(e),
		})
	})
}

fn log_malformed(path: &Path, err: Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(path = %path.display(), error = %err, "skipping malformed resource");
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (path, err);
	}
}

impl EntityLoader for FileLoader {
	fn start(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.initial_scan();

			let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
			let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
				if let Ok(event) = res {
					let _ = tx.send(event);
				}
			})
			.map_err(|e| Error::Internal(InternalError::Store(e.to_string())))?;

			for dir in [&self.tenants_dir, &self.clients_dir] {
				let _ = watcher.watch(dir, RecursiveMode::NonRecursive);
			}

			*self.watcher.write() = Some(watcher);

			let store = self.store.clone();
			let tenants_dir = self.tenants_dir.clone();
			let clients_dir = self.clients_dir.clone();

			let handle = tokio::spawn(async move {
				while let Some(event) = rx.recv().await {
					handle_fs_event(&store, &tenants_dir, &clients_dir, event);
				}
			});

			*self.task.write() = Some(handle);

			Ok(())
		})
	}

	fn shutdown(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.watcher.write().take();

			if let Some(handle) = self.task.write().take() {
				handle.abort();
			}

			Ok(())
		})
	}
}

fn handle_fs_event(store: &EntityStore, tenants_dir: &Path, clients_dir: &Path, event: Event) {
	for path in &event.paths {
		if !is_yaml(path) {
			continue;
		}

		let is_tenant = path.starts_with(tenants_dir);
		let is_client = path.starts_with(clients_dir);

		if !is_tenant && !is_client {
			continue;
		}

		match event.kind {
			EventKind::Remove(_) => {
				reconcile(store, LoaderEvent::Deleted(EntityRef::File { path: path.clone() }));
			},
			EventKind::Create(_) => {
				let entity = if is_tenant { parse_tenant_file(path) } else { parse_client_file(path) };

				if let Some(entity) = entity {
					reconcile(store, LoaderEvent::Added(entity));
				}
			},
			EventKind::Modify(_) => {
				let entity = if is_tenant { parse_tenant_file(path) } else { parse_client_file(path) };

				if let Some(entity) = entity {
					reconcile(store, LoaderEvent::Modified(entity));
				}
			},
			_ => {},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn non_yaml_files_are_ignored() {
		assert!(!is_yaml(Path::new("/tmp/readme.md")));
		assert!(is_yaml(Path::new("/tmp/cheese.yaml")));
		assert!(is_yaml(Path::new("/tmp/cheese.json")));
	}

	#[tokio::test]
	async fn initial_scan_loads_existing_tenant_files() {
		let dir = tempdir();
		std::fs::create_dir_all(dir.join("Tenants")).expect("create Tenants dir");
		std::fs::write(
			dir.join("Tenants/cheese.yaml"),
			"name: cheese/cheese\nhosts:\n  - id.example.com\n",
		)
		.expect("write tenant fixture");

		let store = EntityStore::new();
		let loader = FileLoader::new(&dir, store.clone());

		loader.initial_scan();

		assert_eq!(store.tenant_count(), 1);
		assert!(store.find_tenant_by_name("cheese/cheese").is_some());

		std::fs::remove_dir_all(&dir).ok();
	}

	fn tempdir() -> PathBuf {
		let dir = std::env::temp_dir().join(format!("uitsmijter-file-loader-test-{}", uuid::Uuid::new_v4()));

		std::fs::create_dir_all(&dir).expect("create tempdir");

		dir
	}
}
