//! Discovery Builder (§4.I): deterministic per-tenant OIDC discovery document.
//!
//! Returns a plain, serializable document; `uitsmijter-server` is responsible
//! for the `Cache-Control`/`X-Content-Type-Options` response headers.

// self
use crate::{_prelude::*, domain::{client::Client, tenant::Tenant}};

/// OIDC discovery document for a single tenant, per §4.I.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiscoveryDocument {
	/// `<scheme>://<host>`, no query, no fragment, no trailing slash.
	pub issuer: String,
	pub authorization_endpoint: String,
	pub token_endpoint: String,
	pub jwks_uri: String,
	pub userinfo_endpoint: String,
	pub end_session_endpoint: String,
	pub response_types_supported: Vec<&'static str>,
	pub subject_types_supported: Vec<&'static str>,
	pub id_token_signing_alg_values_supported: Vec<&'static str>,
	pub scopes_supported: Vec<String>,
	pub grant_types_supported: Vec<String>,
	pub code_challenge_methods_supported: Vec<&'static str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub op_policy_uri: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub service_documentation: Option<String>,
}

/// Builds the discovery document for `tenant` at `issuer`, given the tenant's
/// clients.
pub fn build(issuer_scheme_and_host: &str, tenant: &Tenant, clients: &[Client]) -> DiscoveryDocument {
	let issuer = issuer_scheme_and_host.trim_end_matches('/').to_owned();

	let mut scopes: Vec<String> = vec!["openid".into(), "profile".into(), "email".into()];
	for client in clients {
		if let Some(client_scopes) = &client.scopes {
			scopes.extend(client_scopes.iter().cloned());
		}
	}
	scopes.sort();
	scopes.dedup();

	let mut grant_types: Vec<String> = vec!["authorization_code".into(), "refresh_token".into()];
	for client in clients {
		grant_types.extend(client.grant_types.iter().map(|g| g.as_str().to_owned()));
	}
	grant_types.sort();
	grant_types.dedup();

	let code_challenge_methods_supported =
		if clients.iter().any(|c| c.is_pkce_only) { vec!["S256"] } else { vec!["S256", "plain"] };

	DiscoveryDocument {
		authorization_endpoint: format!("{issuer}/authorize"),
		token_endpoint: format!("{issuer}/token"),
		jwks_uri: format!("{issuer}/.well-known/jwks.json"),
		userinfo_endpoint: format!("{issuer}/token/info"),
		end_session_endpoint: format!("{issuer}/logout"),
		issuer,
		response_types_supported: vec!["code"],
		subject_types_supported: vec!["public"],
		id_token_signing_alg_values_supported: vec!["RS256"],
		scopes_supported: scopes,
		grant_types_supported: grant_types,
		code_challenge_methods_supported,
		op_policy_uri: tenant.informations.as_ref().and_then(|i| i.privacy_url.clone()),
		service_documentation: tenant.informations.as_ref().and_then(|i| i.imprint_url.clone()),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::domain::client::{ClientConfig, GrantType};

	fn client(scopes: Option<Vec<&str>>, is_pkce_only: bool) -> Client {
		Client {
			name: "web".into(),
			config: ClientConfig { ident: uuid::Uuid::new_v4() },
			tenantname: "cheese/cheese".into(),
			redirect_urls: Vec::new(),
			grant_types: vec![GrantType::AuthorizationCode, GrantType::Password],
			scopes: scopes.map(|s| s.into_iter().map(str::to_owned).collect()),
			referrers: None,
			secret: None,
			is_pkce_only,
			r#ref: Default::default(),
		}
	}

	#[test]
	fn scopes_and_grants_are_unioned_deduplicated_and_sorted() {
		let tenant = crate::_preludet::fixture_tenant("cheese/cheese", "id.example.com");
		let clients = vec![client(Some(vec!["openid", "custom.read"]), false)];

		let doc = build("https://id.example.com", &tenant, &clients);

		assert_eq!(doc.scopes_supported, vec!["custom.read", "email", "openid", "profile"]);
		assert_eq!(doc.grant_types_supported, vec!["authorization_code", "password", "refresh_token"]);
	}

	#[test]
	fn pkce_only_client_narrows_challenge_methods() {
		let tenant = crate::_preludet::fixture_tenant("cheese/cheese", "id.example.com");
		let clients = vec![client(None, true)];

		let doc = build("https://id.example.com", &tenant, &clients);

		assert_eq!(doc.code_challenge_methods_supported, vec!["S256"]);
	}

	#[test]
	fn issuer_strips_trailing_slash() {
		let tenant = crate::_preludet::fixture_tenant("cheese/cheese", "id.example.com");
		let doc = build("https://id.example.com/", &tenant, &[]);

		assert_eq!(doc.issuer, "https://id.example.com");
		assert_eq!(doc.authorization_endpoint, "https://id.example.com/authorize");
	}
}
