//! Session cookie construction (§6): `<app>-sso`, `HttpOnly`, `SameSite=Strict`,
//! `Secure` in production, scoped to the tenant's interceptor cookie domain or
//! the request's responsible domain.

use axum::http::HeaderValue;
use time::Duration;
use uitsmijter_core::domain::tenant::Tenant;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "uitsmijter-sso";

/// Builds the `Set-Cookie` header value carrying `token` for `tenant`,
/// scoped to `responsible_domain` unless the tenant overrides the cookie
/// domain via its interceptor settings.
pub fn build(token: &str, tenant: &Tenant, responsible_domain: &str, secure: bool, expiration: Duration) -> HeaderValue {
	let domain = tenant
		.interceptor
		.as_ref()
		.and_then(|interceptor| interceptor.cookie_domain.as_deref())
		.unwrap_or(responsible_domain);

	let mut value = format!(
		"{COOKIE_NAME}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age}; Domain={domain}",
		max_age = expiration.whole_seconds(),
	);

	if secure {
		value.push_str("; Secure");
	}

	HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Builds the `Set-Cookie` header value that immediately expires the
/// session cookie, used by `/logout/finalize`.
pub fn clear(tenant: &Tenant, responsible_domain: &str, secure: bool) -> HeaderValue {
	let domain = tenant
		.interceptor
		.as_ref()
		.and_then(|interceptor| interceptor.cookie_domain.as_deref())
		.unwrap_or(responsible_domain);

	let mut value = format!("{COOKIE_NAME}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0; Domain={domain}");

	if secure {
		value.push_str("; Secure");
	}

	HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Extracts the session cookie's token value from a `Cookie` request header.
pub fn extract_token(cookie_header: &str) -> Option<String> {
	cookie_header.split(';').map(str::trim).find_map(|pair| {
		let (name, value) = pair.split_once('=')?;
		(name == COOKIE_NAME).then(|| value.to_owned())
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use uitsmijter_core::_preludet::fixture_tenant;

	#[test]
	fn build_scopes_to_responsible_domain_without_override() {
		let tenant = fixture_tenant("acme", "login.acme.test");
		let value = build("tok123", &tenant, "login.acme.test", true, Duration::days(7));
		let value = value.to_str().expect("ascii header");

		assert!(value.contains("uitsmijter-sso=tok123"));
		assert!(value.contains("Domain=login.acme.test"));
		assert!(value.contains("Secure"));
		assert!(value.contains("Max-Age=604800"));
	}

	#[test]
	fn extract_token_finds_the_cookie_among_others() {
		let header = "foo=bar; uitsmijter-sso=the-token; baz=qux";

		assert_eq!(extract_token(header), Some("the-token".to_owned()));
	}

	#[test]
	fn extract_token_is_none_when_absent() {
		assert_eq!(extract_token("foo=bar"), None);
	}
}
