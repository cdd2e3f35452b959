//! Typed configuration loaded from the §6 environment variables.

use std::env;

use time::Duration;

/// Server-wide configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
	/// Public domain used when no host can otherwise be resolved.
	pub public_domain: String,
	/// Whether cookies are marked `Secure` (production).
	pub secure: bool,
	/// Session cookie lifetime.
	pub cookie_expiration: Duration,
	/// Access token TTL.
	pub token_expiration: Duration,
	/// Refresh session TTL.
	pub token_refresh_expiration: Duration,
	/// Whether the Kubernetes CRD loader is enabled.
	pub support_kubernetes_crd: bool,
	/// `"*"` or a single namespace name for the CRD loader.
	pub scoped_kubernetes_crd: String,
	/// Namespace the server itself runs in (used by in-cluster clients).
	pub uitsmijter_namespace: Option<String>,
	/// Version string surfaced on the login/error pages.
	pub display_version: String,
	/// Whether a tenant with zero providers is treated as always-valid.
	///
	/// Defaults to `true` outside of release builds, per Design Note (b);
	/// a startup warning is always logged when this is `true`.
	pub allow_missing_providers: bool,
	/// External session-store Redis host, `host:port`; `None` selects the
	/// in-process backend.
	pub redis_host: Option<String>,
	/// Redis password, if required.
	pub redis_password: Option<String>,
	/// Root directory watched by the filesystem loader.
	pub directory: String,
	/// `tracing-subscriber` env-filter directive.
	pub log_level: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			public_domain: "localhost".into(),
			secure: false,
			cookie_expiration: Duration::days(7),
			token_expiration: Duration::hours(2),
			token_refresh_expiration: Duration::hours(720),
			support_kubernetes_crd: false,
			scoped_kubernetes_crd: "*".into(),
			uitsmijter_namespace: None,
			display_version: "dev".into(),
			allow_missing_providers: cfg!(debug_assertions),
			redis_host: None,
			redis_password: None,
			directory: "/config".into(),
			log_level: "info".into(),
		}
	}
}

impl Config {
	/// Loads configuration from the process environment, falling back to
	/// [`Config::default`] for anything absent.
	pub fn from_env() -> Self {
		let defaults = Self::default();

		let config = Self {
			public_domain: env_or(&defaults.public_domain, "PUBLIC_DOMAIN"),
			secure: env_bool("SECURE", defaults.secure),
			cookie_expiration: Duration::days(env_i64("COOKIE_EXPIRATION_IN_DAYS", 7)),
			token_expiration: Duration::hours(env_i64("TOKEN_EXPIRATION_IN_HOURS", 2)),
			token_refresh_expiration: Duration::hours(env_i64("TOKEN_REFRESH_EXPIRATION_IN_HOURS", 720)),
			support_kubernetes_crd: env_bool("SUPPORT_KUBERNETES_CRD", defaults.support_kubernetes_crd),
			scoped_kubernetes_crd: env_or(&defaults.scoped_kubernetes_crd, "SCOPED_KUBERNETES_CRD"),
			uitsmijter_namespace: env::var("UITSMIJTER_NAMESPACE").ok(),
			display_version: env_or(&defaults.display_version, "DISPLAY_VERSION"),
			allow_missing_providers: env_bool("ALLOW_MISSING_PROVIDERS", defaults.allow_missing_providers),
			redis_host: env::var("REDIS_HOST").ok(),
			redis_password: env::var("REDIS_PASSWORD").ok(),
			directory: env_or(&defaults.directory, "DIRECTORY"),
			log_level: env_or(&defaults.log_level, "LOG_LEVEL"),
		};

		if config.allow_missing_providers {
			tracing::warn!(
				"ALLOW_MISSING_PROVIDERS is enabled: tenants with no configured providers will treat every \
				 credential as valid. This is unsafe outside local development."
			);
		}

		config
	}
}

fn env_or(default: &str, key: &str) -> String {
	env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_bool(key: &str, default: bool) -> bool {
	env::var(key).ok().map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
	env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_are_sane() {
		let config = Config::default();

		assert_eq!(config.public_domain, "localhost");
		assert_eq!(config.cookie_expiration, Duration::days(7));
		assert_eq!(config.token_expiration, Duration::hours(2));
		assert_eq!(config.token_refresh_expiration, Duration::hours(720));
	}

	#[test]
	fn env_bool_parses_common_truthy_values() {
		assert!(env_bool("UITSMIJTER_TEST_NONEXISTENT_VAR_TRUE_FALLBACK", true));
		assert!(!env_bool("UITSMIJTER_TEST_NONEXISTENT_VAR_FALSE_FALLBACK", false));
	}
}
