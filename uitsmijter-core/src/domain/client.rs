//! Client entity: an OAuth relying party belonging to a single tenant.

// self
use crate::{_prelude::*, domain::tenant::EntityRef};

/// OAuth relying party belonging to a single tenant. Identity is [`ClientConfig::ident`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Client {
	/// Unique operator-facing name.
	pub name: String,
	/// Configuration carrying the client identity.
	pub config: ClientConfig,
	/// Name of the tenant this client belongs to. Modeled as a lookup key
	/// into the Entity Store rather than an owning pointer, per the
	/// cyclic/weak-reference design note.
	pub tenantname: String,
	/// Allow-listed redirect URI regexes.
	#[serde(default)]
	pub redirect_urls: Vec<String>,
	/// Grant types this client may use.
	pub grant_types: Vec<GrantType>,
	/// Allow-listed scope patterns (`foo`, `foo.*`); `None` means unrestricted.
	#[serde(default)]
	pub scopes: Option<Vec<String>>,
	/// Allow-listed `Referer` regexes; empty/`None` means unrestricted.
	#[serde(default)]
	pub referrers: Option<Vec<String>>,
	/// Optional client secret, required for the `authorization_code` and
	/// `password` grants when present.
	#[serde(default)]
	pub secret: Option<String>,
	/// Whether this client may only use PKCE (no bare authorization code).
	#[serde(default)]
	pub is_pkce_only: bool,
	/// Source provenance, used as the reconciliation key.
	#[serde(skip)]
	pub r#ref: EntityRef,
}

/// Configuration carrying the client's stable identity.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Client identifier, exported to OAuth requests as `client_id`.
	pub ident: uuid::Uuid,
}

/// OAuth/OIDC grant types a client may be enabled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization code grant (optionally with PKCE).
	AuthorizationCode,
	/// Refresh token grant.
	RefreshToken,
	/// Resource owner password credentials grant.
	Password,
	/// Reverse-proxy interceptor mode.
	Interceptor,
}

impl GrantType {
	/// Stable label used in discovery documents and error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AuthorizationCode => "authorization_code",
			Self::RefreshToken => "refresh_token",
			Self::Password => "password",
			Self::Interceptor => "interceptor",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

impl Client {
	/// Returns whether this client enables the given grant type.
	pub fn allows_grant(&self, grant: GrantType) -> bool {
		self.grant_types.contains(&grant)
	}

	/// Returns whether `redirect_uri` matches one of this client's
	/// allow-listed patterns. An empty allow-list matches nothing.
	pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
		self.redirect_urls.iter().any(|pattern| pattern_matches(pattern, redirect_uri))
	}

	/// Returns whether `referer` matches one of this client's allow-listed
	/// patterns. `None`/empty means unrestricted.
	pub fn allows_referer(&self, referer: &str) -> bool {
		match &self.referrers {
			None => true,
			Some(patterns) if patterns.is_empty() => true,
			Some(patterns) => patterns.iter().any(|pattern| pattern_matches(pattern, referer)),
		}
	}

	/// Returns whether `scope` matches one of this client's allow-listed
	/// scope patterns. `None` means unrestricted.
	pub fn allows_scope(&self, scope: &str) -> bool {
		match &self.scopes {
			None => true,
			Some(patterns) => patterns.iter().any(|pattern| pattern_matches(pattern, scope)),
		}
	}
}

/// Matches `value` against `pattern`, treated as a regex anchored at both
/// ends; an unparseable pattern never matches.
fn pattern_matches(pattern: &str, value: &str) -> bool {
	let anchored = format!("^(?:{pattern})$");

	regex::Regex::new(&anchored).is_ok_and(|re| re.is_match(value))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn grant_type_label_round_trips() {
		assert_eq!(GrantType::AuthorizationCode.as_str(), "authorization_code");
		assert_eq!(GrantType::RefreshToken.to_string(), "refresh_token");
	}

	fn client_with(redirect_urls: Vec<&str>, referrers: Option<Vec<&str>>, scopes: Option<Vec<&str>>) -> Client {
		Client {
			name: "web".into(),
			config: ClientConfig { ident: uuid::Uuid::new_v4() },
			tenantname: "cheese/cheese".into(),
			redirect_urls: redirect_urls.into_iter().map(str::to_owned).collect(),
			grant_types: vec![GrantType::AuthorizationCode],
			scopes: scopes.map(|s| s.into_iter().map(str::to_owned).collect()),
			referrers: referrers.map(|r| r.into_iter().map(str::to_owned).collect()),
			secret: None,
			is_pkce_only: false,
			r#ref: EntityRef::default(),
		}
	}

	#[test]
	fn redirect_pattern_is_anchored() {
		let client = client_with(vec!["https://app\\.example\\.com/.*"], None, None);

		assert!(client.allows_redirect("https://app.example.com/callback"));
		assert!(!client.allows_redirect("https://evil.example.com/https://app.example.com/callback"));
	}

	#[test]
	fn empty_referrer_list_is_unrestricted() {
		let client = client_with(vec![], None, None);

		assert!(client.allows_referer("https://anything.example.com"));
	}

	#[test]
	fn scope_allow_list_rejects_unlisted_scopes() {
		let client = client_with(vec![], None, Some(vec!["profile", "email\\..*"]));

		assert!(client.allows_scope("profile"));
		assert!(client.allows_scope("email.read"));
		assert!(!client.allows_scope("admin"));
	}
}
