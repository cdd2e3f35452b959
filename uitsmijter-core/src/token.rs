//! Token Service (§4.G): builds, signs, verifies, and refreshes access
//! tokens, and publishes the RSA public key as a JWKS.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rsa::{RsaPrivateKey, RsaPublicKey, pkcs8::EncodePrivateKey, traits::PublicKeyParts};
use sha2::{Digest, Sha256};

// self
use crate::{
	_prelude::*,
	domain::{client::Client, client_info::ClientInfo, payload::{Payload, ProfileValue}, session::AuthSession},
};

/// Default access-token TTL, per §4.G (`2h`).
pub const DEFAULT_ACCESS_TTL: Duration = Duration::hours(2);
/// Default refresh-session TTL, per §4.G (`720h`).
pub const DEFAULT_REFRESH_TTL: Duration = Duration::hours(720);

/// Errors produced by the token service, distinct from "valid signature, but
/// expired" which [`Payload::is_expired`] callers check separately.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenError {
	/// Signing failed (key or serialization fault).
	#[error("Failed to sign token: {0}")]
	Sign(String),
	/// Signature verification failed, or the token is structurally invalid.
	#[error("Token signature is invalid.")]
	InvalidSignature,
	/// A refresh session was supplied that does not exist (already consumed,
	/// or never issued).
	#[error("Refresh session is unknown.")]
	UnknownSession,
	/// The refresh session's tenant does not match the requesting tenant.
	#[error("Refresh session belongs to a different tenant.")]
	TenantMismatch,
	/// The refresh session's audience does not include the requesting client.
	#[error("Refresh session does not belong to this client.")]
	ClientMismatch,
}

/// RSA key pair used to sign access tokens and publish a JWKS document.
pub struct TokenKeys {
	encoding_key: EncodingKey,
	decoding_key: DecodingKey,
	n: String,
	e: String,
	kid: String,
}

impl TokenKeys {
	/// Generates a fresh RSA-2048 key pair with the given key ID.
	pub fn generate(kid: impl Into<String>) -> Result<Self, TokenError> {
		let private_key = RsaPrivateKey::new(&mut rand::rng(), 2048).map_err(|e| TokenError::Sign(e.to_string()))?;
		let public_key = RsaPublicKey::from(&private_key);

		let pkcs8_pem = private_key
			.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
			.map_err(|e| TokenError::Sign(e.to_string()))?;
		let encoding_key =
			EncodingKey::from_rsa_pem(pkcs8_pem.as_bytes()).map_err(|e| TokenError::Sign(e.to_string()))?;

		let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
		let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
		let decoding_key = DecodingKey::from_rsa_components(&n, &e).map_err(|e| TokenError::Sign(e.to_string()))?;

		Ok(Self { encoding_key, decoding_key, n, e, kid: kid.into() })
	}

	/// Returns this key's JWKS entry.
	pub fn jwk(&self) -> Jwk {
		Jwk { kty: "RSA", alg: "RS256", r#use: "sig", kid: self.kid.clone(), n: self.n.clone(), e: self.e.clone() }
	}
}

impl Debug for TokenKeys {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenKeys").field("kid", &self.kid).field("n", &"<redacted>").finish()
	}
}

/// A single JWK entry, as published under `/.well-known/jwks.json`.
#[derive(Clone, Debug, Serialize)]
pub struct Jwk {
	/// Key type, always `"RSA"`.
	pub kty: &'static str,
	/// Signing algorithm, always `"RS256"`.
	pub alg: &'static str,
	#[serde(rename = "use")]
	/// Key usage, always `"sig"`.
	pub r#use: &'static str,
	/// Key ID matching the `kid` header on issued tokens.
	pub kid: String,
	/// Base64url-encoded RSA modulus.
	pub n: String,
	/// Base64url-encoded RSA public exponent.
	pub e: String,
}

/// Builds, signs, and verifies access tokens for one tenant's key pair.
pub struct TokenService {
	keys: Arc<TokenKeys>,
}

impl TokenService {
	/// Creates a service around a generated or loaded key pair.
	pub fn new(keys: Arc<TokenKeys>) -> Self {
		Self { keys }
	}

	/// Returns this service's signing key as a JWKS entry.
	pub fn jwk(&self) -> Jwk {
		self.keys.jwk()
	}

	/// Builds and signs an access token for `client_info`, per §4.G: claims
	/// populated from `ClientInfo`, tenant name, role, user, profile, and a
	/// responsibility hash of the responsible domain. `auth_time` is carried
	/// through unchanged from `previous_auth_time` on refresh, else `now`.
	pub fn build(
		&self,
		client_info: &ClientInfo,
		subject: &str,
		user: &str,
		role: Option<String>,
		profile: Option<ProfileValue>,
		ttl: Duration,
		previous_auth_time: Option<i64>,
	) -> Result<String, TokenError> {
		let tenant_name = client_info.tenant.as_ref().map(|t| t.name.clone()).unwrap_or_default();
		let audience = client_info.client.as_ref().map(|c| vec![c.name.clone()]).unwrap_or_default();
		let now = OffsetDateTime::now_utc();

		let payload = Payload {
			iss: client_info.service_url.clone(),
			sub: subject.to_owned(),
			aud: audience,
			exp: (now + ttl).unix_timestamp(),
			iat: now.unix_timestamp(),
			auth_time: previous_auth_time.unwrap_or_else(|| now.unix_timestamp()),
			tenant: tenant_name,
			responsibility: Some(responsibility_hash(&client_info.responsible_domain)),
			role,
			user: user.to_owned(),
			profile,
		};

		self.sign(&payload)
	}

	/// Signs an already-constructed payload (used when rebuilding an access
	/// token from a stored refresh session's payload).
	pub fn sign(&self, payload: &Payload) -> Result<String, TokenError> {
		let mut header = Header::new(Algorithm::RS256);
		header.kid = Some(self.keys.kid.clone());

		encode(&header, payload, &self.keys.encoding_key).map_err(|e| TokenError::Sign(e.to_string()))
	}

	/// Verifies `token`'s signature and returns its claims. Expiry is the
	/// caller's concern via [`Payload::is_expired`] (distinguishing an
	/// expired-but-authentic token from a forged one).
	pub fn verify(&self, token: &str) -> Result<Payload, TokenError> {
		let mut validation = Validation::new(Algorithm::RS256);
		validation.validate_exp = false;

		decode::<Payload>(token, &self.keys.decoding_key, &validation)
			.map(|data| data.claims)
			.map_err(|_| TokenError::InvalidSignature)
	}

	/// Refreshes a consumed `refresh` [`AuthSession`] into a fresh access
	/// token and a fresh refresh session, per §4.G. The caller is responsible
	/// for the session store's single-use `get(remove=true)` semantics;
	/// refusal modes map to `TENANT_MISMATCH` (403), `UnknownSession` (401),
	/// and `ClientMismatch` (403).
	pub fn refresh(
		&self,
		session: &AuthSession,
		client: &Client,
		client_info: &ClientInfo,
		access_ttl: Duration,
		refresh_ttl: Duration,
	) -> Result<(String, AuthSession), TokenError> {
		let Some(payload) = &session.payload else { return Err(TokenError::UnknownSession) };

		if payload.tenant != client_info.tenant.as_ref().map(|t| t.name.clone()).unwrap_or_default() {
			return Err(TokenError::TenantMismatch);
		}
		if !payload.audience_contains(&client.name) {
			return Err(TokenError::ClientMismatch);
		}

		let mut access_payload = payload.clone();
		let now = OffsetDateTime::now_utc();
		access_payload.iat = now.unix_timestamp();
		access_payload.exp = (now + access_ttl).unix_timestamp();

		let access_token = self.sign(&access_payload)?;

		let new_refresh = AuthSession {
			kind: session.kind,
			state: session.state.clone(),
			code_value: generate_code(),
			scopes: session.scopes.clone(),
			payload: Some(access_payload),
			redirect_uri: session.redirect_uri.clone(),
			ttl_seconds: refresh_ttl.whole_seconds(),
			generated_at: now,
			code_challenge: None,
			code_challenge_method: None,
		};

		Ok((access_token, new_refresh))
	}
}

/// Computes the stable hash bound into `Payload::responsibility` at issue
/// time, used to downgrade re-auth when the responsible domain is unchanged.
pub fn responsibility_hash(domain: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(domain.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verifies a PKCE `code_verifier` against the `code_challenge` stored at
/// authorization-code issuance time, per the method declared then (`S256` or
/// `plain`). An unrecognized method never verifies.
pub fn verify_pkce_challenge(method: &str, verifier: &str, challenge: &str) -> bool {
	match method {
		"S256" => {
			let mut hasher = Sha256::new();
			hasher.update(verifier.as_bytes());
			URL_SAFE_NO_PAD.encode(hasher.finalize()) == challenge
		},
		"plain" => verifier == challenge,
		_ => false,
	}
}

/// Generates a fresh 16-character `[A-Za-z0-9]` authorization code, per §4.H.
pub fn generate_code() -> String {
	use rand::{Rng, distr::Alphanumeric};

	rand::rng().sample_iter(&Alphanumeric).take(16).map(char::from).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::domain::session::SessionKind;

	fn test_client_info() -> ClientInfo {
		let tenant = crate::_preludet::fixture_tenant("cheese/cheese", "id.example.com");
		let client = crate::_preludet::fixture_client("web", "cheese/cheese", uuid::Uuid::new_v4());

		ClientInfo {
			mode: crate::domain::client_info::Mode::Oauth,
			requested: crate::domain::client_info::RequestTuple {
				scheme: "https".into(),
				host: "id.example.com".into(),
				uri: "/authorize".into(),
			},
			referer: None,
			responsible_domain: "id.example.com".into(),
			service_url: "https://id.example.com".into(),
			tenant: Some(tenant),
			client: Some(client),
			expired: false,
			subject: None,
			valid_payload: None,
		}
	}

	#[test]
	fn build_then_verify_round_trips_claims() {
		let keys = Arc::new(TokenKeys::generate("test-kid").expect("keys should generate"));
		let service = TokenService::new(keys);
		let client_info = test_client_info();

		let token = service
			.build(&client_info, "user-1", "cee8esh5@example.com", None, None, Duration::hours(2), None)
			.expect("token should sign");

		let payload = service.verify(&token).expect("token should verify");

		assert_eq!(payload.sub, "user-1");
		assert_eq!(payload.tenant, "cheese/cheese");
		assert!(payload.responsibility.is_some());
	}

	#[test]
	fn verify_rejects_token_signed_by_a_different_key() {
		let keys_a = Arc::new(TokenKeys::generate("a").expect("keys should generate"));
		let keys_b = Arc::new(TokenKeys::generate("b").expect("keys should generate"));
		let client_info = test_client_info();

		let token = TokenService::new(keys_a)
			.build(&client_info, "user-1", "cee8esh5@example.com", None, None, Duration::hours(2), None)
			.expect("token should sign");

		let result = TokenService::new(keys_b).verify(&token);

		assert_eq!(result, Err(TokenError::InvalidSignature));
	}

	#[test]
	fn refresh_rejects_mismatched_client_audience() {
		let keys = Arc::new(TokenKeys::generate("test-kid").expect("keys should generate"));
		let service = TokenService::new(keys);
		let client_info = test_client_info();
		let other_client = crate::_preludet::fixture_client("mobile", "cheese/cheese", uuid::Uuid::new_v4());

		let payload = Payload {
			iss: "https://id.example.com".into(),
			sub: "user-1".into(),
			aud: vec!["web".into()],
			exp: 0,
			iat: 0,
			auth_time: 0,
			tenant: "cheese/cheese".into(),
			responsibility: None,
			role: None,
			user: "cee8esh5@example.com".into(),
			profile: None,
		};
		let session = AuthSession {
			kind: SessionKind::Refresh,
			state: None,
			code_value: "abc".into(),
			scopes: Vec::new(),
			payload: Some(payload),
			redirect_uri: "https://api.example.com/".into(),
			ttl_seconds: Duration::hours(720).whole_seconds(),
			generated_at: OffsetDateTime::now_utc(),
			code_challenge: None,
			code_challenge_method: None,
		};

		let result =
			service.refresh(&session, &other_client, &client_info, Duration::hours(2), Duration::hours(720));

		assert!(matches!(result, Err(TokenError::ClientMismatch)));
	}

	#[test]
	fn verify_pkce_challenge_checks_s256_digest() {
		let verifier = "a-verifier-value-thats-long-enough";
		let mut hasher = Sha256::new();
		hasher.update(verifier.as_bytes());
		let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

		assert!(verify_pkce_challenge("S256", verifier, &challenge));
		assert!(!verify_pkce_challenge("S256", "wrong-verifier", &challenge));
	}

	#[test]
	fn verify_pkce_challenge_rejects_unknown_method() {
		assert!(!verify_pkce_challenge("none", "x", "x"));
	}
}
