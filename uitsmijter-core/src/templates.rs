//! Template Loader (§4.C): fetches a tenant's UI templates from object
//! storage into a local directory on tenant add/remove.

use std::path::{Path, PathBuf};

use object_store::{ObjectStore, aws::AmazonS3Builder, path::Path as ObjectPath};

// self
use crate::{_prelude::*, domain::tenant::{Tenant, TemplatesSource}};

/// The fixed set of template files fetched for every tenant.
pub const TEMPLATE_FILES: [&str; 4] = ["index", "login", "logout", "error"];

/// One operation in the template-loader stream.
#[derive(Clone, Debug)]
pub enum TemplateOp {
	/// Fetch a tenant's templates into `<views>/<tenant-slug>/`.
	Create(Tenant),
	/// Delete `<views>/<tenant-slug>/`.
	Remove(Tenant),
}

/// Processes template operations one at a time (serialized per instance, per
/// §4.C: "exactly-one processing per (tenant, operation)").
pub struct TemplateLoader {
	views_dir: PathBuf,
	lock: async_lock::Mutex<()>,
}

impl TemplateLoader {
	/// Creates a loader writing fetched templates under `views_dir`.
	pub fn new(views_dir: impl Into<PathBuf>) -> Self {
		Self { views_dir: views_dir.into(), lock: async_lock::Mutex::new(()) }
	}

	/// Processes a single operation to completion.
	pub async fn process(&self, op: TemplateOp) {
		let _guard = self.lock.lock().await;

		match op {
			TemplateOp::Create(tenant) => self.create(&tenant).await,
			TemplateOp::Remove(tenant) => self.remove(&tenant),
		}
	}

	async fn create(&self, tenant: &Tenant) {
		let Some(source) = &tenant.templates else { return };
		let dir = self.tenant_dir(tenant);

		if let Err(err) = std::fs::create_dir_all(&dir) {
			log_template_error(tenant, &err.to_string());
			return;
		}

		let Some(store) = build_store(source) else {
			log_template_error(tenant, "could not build object-store client");

			return;
		};

		for file in TEMPLATE_FILES {
			let object_path = match ObjectPath::parse(format!("{}/{file}", source.path.trim_matches('/'))) {
				Ok(p) => p,
				Err(err) => {
					log_template_error(tenant, &err.to_string());

					continue;
				},
			};

			match store.get(&object_path).await {
				Ok(result) => match result.bytes().await {
					Ok(bytes) => {
						if let Err(err) = std::fs::write(dir.join(file), &bytes) {
							log_template_error(tenant, &err.to_string());
						}
					},
					Err(err) => log_template_error(tenant, &err.to_string()),
				},
				Err(object_store::Error::NotFound { .. }) => {
					// Missing objects log and skip, per §4.C.
					log_template_missing(tenant, file);
				},
				Err(err) => log_template_error(tenant, &err.to_string()),
			}
		}
	}

	fn remove(&self, tenant: &Tenant) {
		let _ = std::fs::remove_dir_all(self.tenant_dir(tenant));
	}

	fn tenant_dir(&self, tenant: &Tenant) -> PathBuf {
		self.views_dir.join(slug(&tenant.name))
	}
}

fn build_store(source: &TemplatesSource) -> Option<Box<dyn ObjectStore>> {
	let mut builder = AmazonS3Builder::new()
		.with_endpoint(&source.endpoint)
		.with_bucket_name(&source.bucket)
		.with_access_key_id(&source.key)
		.with_secret_access_key(&source.secret)
		.with_allow_http(true);

	if let Some(region) = &source.region {
		builder = builder.with_region(region);
	}

	builder.build().ok().map(|s| Box::new(s) as Box<dyn ObjectStore>)
}

fn slug(tenant_name: &str) -> String {
	tenant_name.replace('/', "-")
}

fn log_template_error(tenant: &Tenant, message: &str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(tenant = %tenant.name, error = message, "template fetch failed");
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (tenant, message);
	}
}

fn log_template_missing(tenant: &Tenant, file: &str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(tenant = %tenant.name, file, "template object missing, skipping");
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (tenant, file);
	}
}

/// Returns the on-disk directory a tenant's templates would be fetched into.
pub fn tenant_template_dir(views_dir: &Path, tenant_name: &str) -> PathBuf {
	views_dir.join(slug(tenant_name))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn slug_replaces_namespace_separator() {
		assert_eq!(slug("cheese/cheese"), "cheese-cheese");
	}

	#[tokio::test]
	async fn remove_is_a_no_op_when_directory_is_absent() {
		let dir = std::env::temp_dir().join(format!("uitsmijter-templates-test-{}", uuid::Uuid::new_v4()));
		let loader = TemplateLoader::new(&dir);
		let tenant = crate::_preludet::fixture_tenant("cheese/cheese", "id.example.com");

		loader.process(TemplateOp::Remove(tenant)).await;
		// No panic, and the directory still does not exist.
		assert!(!dir.join("cheese-cheese").exists());
	}
}
