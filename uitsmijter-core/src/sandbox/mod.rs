//! Script Sandbox (§4.E): bounded execution of operator-supplied provider
//! scripts behind a `commit(ok, extras?)` contract.

pub mod engine;

pub use engine::ScriptEngine;

// self
use crate::{_prelude::*, domain::{payload::ProfileValue, tenant::Tenant}};

/// Default wall-clock budget for a provider script, per §4.E.
pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);

/// Getters a provider class is expected to expose; read off the constructed
/// instance after the script runs to completion.
pub const PROVIDER_GETTERS: [&str; 4] = ["canLogin", "isValid", "userProfile", "role"];

/// Outcome of running one provider script.
#[derive(Clone, Debug)]
pub struct SandboxOutput {
	/// Whether the constructor called `commit(...)` at all.
	pub committed: bool,
	/// The `ok` argument passed to `commit`.
	pub ok: bool,
	/// The optional `extras` object passed to `commit`.
	pub extras: Option<ProfileValue>,
	/// Values read off the constructed instance's getters.
	pub getters: HashMap<String, ProfileValue>,
}

impl SandboxOutput {
	/// A provider "passes" validation when it committed with `ok = true`.
	pub fn passed(&self) -> bool {
		self.committed && self.ok
	}
}

/// Error produced by the sandbox, distinct from [`SandboxOutput`] so that
/// timeouts and crashes never masquerade as a committed rejection.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SandboxError {
	/// The script exceeded its wall-clock budget.
	#[error("Provider script exceeded its timeout.")]
	Timeout,
	/// The script raised an uncaught exception or failed to parse.
	#[error("Provider script error: {message}.")]
	ScriptError {
		/// Engine-reported error message.
		message: String,
	},
}

/// Outcome of trying a tenant's providers, in order, for one credential pair.
#[derive(Clone, Debug)]
pub struct LoginOutcome {
	/// Whether any provider committed with `ok = true`.
	pub ok: bool,
	/// Role reported by the first provider that accepted the credentials.
	pub role: Option<String>,
	/// Profile reported by the first provider that accepted the credentials.
	pub profile: Option<ProfileValue>,
}

/// Tries `tenant`'s providers in declared order, stopping at the first that
/// accepts `(username, password)`.
///
/// A tenant with no configured providers always rejects, unless
/// `allow_missing_providers` is set, in which case every credential is
/// accepted (logged loudly by the caller; this is unsafe outside local
/// development).
pub async fn try_login(
	tenant: &Tenant,
	username: &str,
	password: &str,
	allow_missing_providers: bool,
) -> std::result::Result<LoginOutcome, SandboxError> {
	if tenant.providers.is_empty() {
		crate::obs::observe_login_attempts(0);
		return Ok(LoginOutcome { ok: allow_missing_providers, role: None, profile: None });
	}

	let input = serde_json::json!({ "username": username, "password": password });

	for (attempt, provider) in tenant.providers.iter().enumerate() {
		let engine = ScriptEngine::new()?;
		let output = engine.execute(input.clone(), provider.script.clone(), DEFAULT_TIMEOUT).await?;

		if output.passed() {
			let role = output.getters.get("role").and_then(ProfileValue::as_str).map(str::to_owned);
			let profile = output.getters.get("userProfile").cloned();

			crate::obs::observe_login_attempts(attempt + 1);
			return Ok(LoginOutcome { ok: true, role, profile });
		}
	}

	crate::obs::observe_login_attempts(tenant.providers.len());
	Ok(LoginOutcome { ok: false, role: None, profile: None })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn passed_requires_committed_and_ok() {
		let base = SandboxOutput {
			committed: true,
			ok: true,
			extras: None,
			getters: HashMap::new(),
		};

		assert!(base.passed());

		let mut uncommitted = base.clone();
		uncommitted.committed = false;
		assert!(!uncommitted.passed());

		let mut rejected = base.clone();
		rejected.ok = false;
		assert!(!rejected.passed());
	}

	fn tenant_with_provider(script: &str) -> Tenant {
		use crate::domain::tenant::ProviderSource;

		let mut tenant = crate::_preludet::fixture_tenant("cheese/cheese", "id.example.com");
		tenant.providers = vec![ProviderSource { name: "fixture".into(), script: script.to_owned() }];

		tenant
	}

	#[tokio::test]
	async fn try_login_stops_at_the_first_accepting_provider() {
		let tenant = tenant_with_provider(
			r#"
				class Provider {
					constructor(input) {
						this.role = "member";
						commit(input.username === "cee8esh5" && input.password === "hunter2");
					}
				}
				globalThis.__instance = new Provider(input);
			"#,
		);

		let outcome = try_login(&tenant, "cee8esh5", "hunter2", false).await.expect("provider should run");

		assert!(outcome.ok);
		assert_eq!(outcome.role, Some("member".to_owned()));
	}

	#[tokio::test]
	async fn try_login_rejects_when_no_provider_accepts() {
		let tenant = tenant_with_provider(
			r#"
				class Provider {
					constructor(input) { commit(false); }
				}
				globalThis.__instance = new Provider(input);
			"#,
		);

		let outcome = try_login(&tenant, "cee8esh5", "wrong", false).await.expect("provider should run");

		assert!(!outcome.ok);
	}

	#[tokio::test]
	async fn try_login_with_no_providers_respects_allow_missing_flag() {
		let tenant = crate::_preludet::fixture_tenant("cheese/cheese", "id.example.com");

		let rejected = try_login(&tenant, "any", "any", false).await.expect("should not error");
		assert!(!rejected.ok);

		let accepted = try_login(&tenant, "any", "any", true).await.expect("should not error");
		assert!(accepted.ok);
	}
}
