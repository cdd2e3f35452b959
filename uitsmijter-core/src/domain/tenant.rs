//! Tenant entity: hosts, informations, interceptor settings, templates
//! source, providers, and source provenance.

use std::path::PathBuf;

// self
use crate::{_prelude::*, domain::host::HostPattern};

/// Top-level isolation unit: owns hosts, clients, provider scripts, and
/// templates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tenant {
	/// Unique name; namespaced `namespace/name` when loaded from a CRD.
	pub name: String,
	/// Hosts this tenant is responsible for (plain or single-label wildcard).
	pub hosts: Vec<HostPattern>,
	/// Optional informational links shown on the login/error pages.
	#[serde(default)]
	pub informations: Option<Informations>,
	/// Optional reverse-proxy interceptor settings.
	#[serde(default)]
	pub interceptor: Option<InterceptorSettings>,
	/// Optional object-store coordinates for this tenant's UI templates.
	#[serde(default)]
	pub templates: Option<TemplatesSource>,
	/// Ordered list of provider script sources, tried in order at login.
	#[serde(default)]
	pub providers: Vec<ProviderSource>,
	/// Whether a valid cookie from another client of this tenant skips the
	/// login form (default `true`).
	#[serde(default = "default_true")]
	pub silent_login: bool,
	/// Source provenance, used as the reconciliation key.
	#[serde(skip)]
	pub r#ref: EntityRef,
}

fn default_true() -> bool {
	true
}

/// Optional links surfaced on the login/error pages.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Informations {
	/// Legal imprint URL.
	#[serde(default)]
	pub imprint_url: Option<String>,
	/// Privacy policy URL.
	#[serde(default)]
	pub privacy_url: Option<String>,
	/// Business register URL.
	#[serde(default)]
	pub register_url: Option<String>,
}

/// Reverse-proxy interceptor behavior for a tenant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InterceptorSettings {
	/// Whether `/interceptor` is enabled for this tenant.
	#[serde(default = "default_true")]
	pub enabled: bool,
	/// The public domain the interceptor protects.
	pub domain: String,
	/// Cookie domain override; falls back to the responsible domain when absent.
	#[serde(default)]
	pub cookie_domain: Option<String>,
}

/// Object-store coordinates for a tenant's UI templates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplatesSource {
	/// Object-store endpoint URL.
	pub endpoint: String,
	/// Bucket name.
	pub bucket: String,
	/// Key prefix ("path") within the bucket.
	pub path: String,
	/// Access key.
	pub key: String,
	/// Secret key.
	pub secret: String,
	/// Region, when required by the backend.
	#[serde(default)]
	pub region: Option<String>,
}

/// A single provider script source, tried in declared order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderSource {
	/// Operator-facing name of the provider (for logs).
	pub name: String,
	/// The JavaScript class source implementing the provider contract.
	pub script: String,
}

/// Source provenance of an entity, used as the reconciliation key by the
/// Entity Store (§4.A/§4.B): `(resource-id, revision)` for CRD-sourced
/// entities, or the filesystem path for file-sourced ones.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityRef {
	/// Loaded from a file on disk.
	File {
		/// Absolute path of the source file.
		path: PathBuf,
	},
	/// Loaded from a Kubernetes custom resource.
	Kubernetes {
		/// `namespace/name` of the resource.
		uid: String,
		/// `resourceVersion` at load time.
		revision: String,
	},
}

impl Default for EntityRef {
	fn default() -> Self {
		Self::File { path: PathBuf::new() }
	}
}

impl EntityRef {
	/// The resource-id component used for revision comparisons (ignores
	/// revision for Kubernetes refs, the whole path for file refs).
	pub fn resource_id(&self) -> String {
		match self {
			Self::File { path } => path.display().to_string(),
			Self::Kubernetes { uid, .. } => uid.clone(),
		}
	}

	/// The revision component, when applicable (CRD-sourced only).
	pub fn revision(&self) -> Option<&str> {
		match self {
			Self::File { .. } => None,
			Self::Kubernetes { revision, .. } => Some(revision),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn entity_ref_resource_id_distinguishes_sources() {
		let file = EntityRef::File { path: "/tenants/a.yaml".into() };
		let crd = EntityRef::Kubernetes { uid: "ns/a".into(), revision: "1".into() };

		assert_eq!(file.resource_id(), "/tenants/a.yaml");
		assert_eq!(crd.resource_id(), "ns/a");
		assert_eq!(file.revision(), None);
		assert_eq!(crd.revision(), Some("1"));
	}
}
