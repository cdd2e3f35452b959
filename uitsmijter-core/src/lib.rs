//! Core authorization engine for uitsmijter: a multi-tenant OAuth 2.0 / OIDC
//! server — entity store, live reconcilers, sandboxed provider runtime,
//! session store, token service, and discovery document builder.
//!
//! This crate deliberately has no HTTP server dependency; `uitsmijter-server`
//! wires it to axum.

#![deny(clippy::all, unused_crate_dependencies)]

pub mod discovery;
pub mod domain;
pub mod error;
pub mod loaders;
pub mod obs;
pub mod resolver;
pub mod sandbox;
pub mod store;
pub mod templates;
pub mod token;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

#[cfg(all(any(test, feature = "test")))]
pub mod _preludet {
	//! Convenience re-exports and fixture helpers for integration tests.

	pub use crate::_prelude::*;
	use crate::domain::{
		client::{Client, ClientConfig, GrantType},
		host::HostPattern,
		tenant::{EntityRef, Tenant},
	};

	/// Builds a minimal tenant fixture with a single host, for store/resolver tests.
	pub fn fixture_tenant(name: &str, host: &str) -> Tenant {
		Tenant {
			name: name.to_owned(),
			hosts: vec![HostPattern::parse(host).expect("fixture host should be valid")],
			informations: None,
			interceptor: None,
			templates: None,
			providers: Vec::new(),
			silent_login: true,
			r#ref: EntityRef::File { path: format!("/fixtures/{name}.yaml").into() },
		}
	}

	/// Builds a minimal client fixture bound to `tenantname`.
	pub fn fixture_client(name: &str, tenantname: &str, ident: uuid::Uuid) -> Client {
		Client {
			name: name.to_owned(),
			config: ClientConfig { ident },
			tenantname: tenantname.to_owned(),
			redirect_urls: Vec::new(),
			grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
			scopes: None,
			referrers: None,
			secret: None,
			is_pkce_only: false,
			r#ref: EntityRef::File { path: format!("/fixtures/{name}.yaml").into() },
		}
	}
}
