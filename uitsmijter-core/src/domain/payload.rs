//! JWT claims payload and the recursive dynamic `profile` value.

// self
use crate::_prelude::*;

/// JWT claims carried by access tokens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payload {
	/// Issuer, `<scheme>://<host>` of the tenant that issued the token.
	pub iss: String,
	/// Subject: the authenticated principal.
	pub sub: String,
	/// Audience: the client name(s) this token was issued to.
	pub aud: Vec<String>,
	/// Expiry, Unix seconds.
	pub exp: i64,
	/// Issued-at, Unix seconds.
	pub iat: i64,
	/// Authentication time, Unix seconds; unchanged across refreshes.
	pub auth_time: i64,
	/// Tenant name this token is scoped to.
	pub tenant: String,
	/// Hash of the responsible domain bound at issue time.
	#[serde(default)]
	pub responsibility: Option<String>,
	/// Role assigned by the provider, if any.
	#[serde(default)]
	pub role: Option<String>,
	/// Display name / username of the authenticated principal.
	pub user: String,
	/// Dynamic profile data returned by the provider.
	#[serde(default)]
	pub profile: Option<ProfileValue>,
}

impl Payload {
	/// Returns whether `exp` has passed relative to `now`.
	pub fn is_expired(&self, now: OffsetDateTime) -> bool {
		self.exp <= now.unix_timestamp()
	}

	/// Returns whether `aud` contains the given client name.
	pub fn audience_contains(&self, client_name: &str) -> bool {
		self.aud.iter().any(|a| a == client_name)
	}
}

/// A tagged variant over the dynamic JSON shapes a provider's `userProfile`
/// getter may return: number, string, bool, null, array of self, or a
/// string-keyed map of self. Typed accessors avoid forcing callers to match
/// on the variant for the common cases.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
	/// JSON `null`.
	Null,
	/// JSON boolean.
	Bool(bool),
	/// JSON number (integral or floating point).
	Number(serde_json::Number),
	/// JSON string.
	String(String),
	/// JSON array of recursive values.
	Array(Vec<ProfileValue>),
	/// JSON object of recursive values, keys sorted for deterministic output.
	Map(BTreeMap<String, ProfileValue>),
}

impl ProfileValue {
	/// Returns the string view, if this value is a string.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	/// Returns the bool view, if this value is a bool.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	/// Returns the f64 view, if this value is a number.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Number(n) => n.as_f64(),
			_ => None,
		}
	}

	/// Looks up a key, if this value is a map.
	pub fn get(&self, key: &str) -> Option<&ProfileValue> {
		match self {
			Self::Map(m) => m.get(key),
			_ => None,
		}
	}
}

impl From<serde_json::Value> for ProfileValue {
	fn from(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => Self::Null,
			serde_json::Value::Bool(b) => Self::Bool(b),
			serde_json::Value::Number(n) => Self::Number(n),
			serde_json::Value::String(s) => Self::String(s),
			serde_json::Value::Array(a) => Self::Array(a.into_iter().map(Self::from).collect()),
			serde_json::Value::Object(o) => {
				Self::Map(o.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn profile_value_converts_from_json_and_accessors_work() {
		let json = serde_json::json!({ "name": "Cee", "age": 30, "tags": ["a", "b"] });
		let profile = ProfileValue::from(json);

		assert_eq!(profile.get("name").and_then(ProfileValue::as_str), Some("Cee"));
		assert_eq!(profile.get("age").and_then(ProfileValue::as_f64), Some(30.0));
		assert!(matches!(profile.get("tags"), Some(ProfileValue::Array(_))));
	}

	#[test]
	fn payload_expiry_and_audience_checks() {
		let payload = Payload {
			iss: "https://id.example.com".into(),
			sub: "user-1".into(),
			aud: vec!["web".into()],
			exp: 1_000,
			iat: 900,
			auth_time: 900,
			tenant: "cheese/cheese".into(),
			responsibility: None,
			role: None,
			user: "cee8esh5@example.com".into(),
			profile: None,
		};

		assert!(payload.is_expired(OffsetDateTime::from_unix_timestamp(1_001).expect("valid ts")));
		assert!(!payload.is_expired(OffsetDateTime::from_unix_timestamp(999).expect("valid ts")));
		assert!(payload.audience_contains("web"));
		assert!(!payload.audience_contains("mobile"));
	}
}
