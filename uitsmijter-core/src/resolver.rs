//! Request Resolver (§4.F): derives a request-scoped [`ClientInfo`] from raw
//! request signals in a single pass. Framework-agnostic: `uitsmijter-server`
//! extracts [`ResolverInput`] from an `axum` request and hands it here.

// self
use crate::{
	_prelude::*,
	domain::client_info::{ClientInfo, Mode, RequestTuple},
	error::{AuthorizationError, Error, NotFoundError},
	store::entity::EntityStore,
	token::{TokenService, responsibility_hash},
};

/// Raw signals the resolver needs, already extracted from headers, query
/// string, route, and (for `/login`) form body — kept free of any HTTP
/// framework type so this crate stays server-agnostic.
#[derive(Clone, Debug, Default)]
pub struct ResolverInput {
	/// `X-Uitsmijter-Mode` header value, if present.
	pub mode_header: Option<String>,
	/// `mode` query parameter, if present.
	pub mode_query: Option<String>,
	/// Whether the route being served is `/interceptor`.
	pub is_interceptor_route: bool,
	/// Whether the route being served is `/logout`.
	pub is_logout_route: bool,
	/// `X-Forwarded-Proto` header value.
	pub forwarded_proto: Option<String>,
	/// `X-Forwarded-Host` header value.
	pub forwarded_host: Option<String>,
	/// The host this request is responsible for, when the caller already
	/// knows it (the interceptor's `for` target, or a `/login` submission's
	/// `location` host) rather than `forwarded_host`.
	pub query_for: Option<String>,
	/// `Referer` header value.
	pub referer: Option<String>,
	/// Bearer token from `Authorization` header or session cookie.
	pub bearer_token: Option<String>,
	/// `client_id` from a header.
	pub client_id_header: Option<String>,
	/// `client_id` query parameter.
	pub client_id_query: Option<String>,
	/// `client_id` recovered from a parsed `location` form field, if any.
	pub form_client_id: Option<String>,
	/// The request URI (path + query) for building `requested`.
	pub request_uri: String,
	/// Whether the resolved host is a localhost/loopback address, exempting
	/// it from the tenant cross-check in step 7.
	pub is_localhost: bool,
}

/// Derives `ClientInfo` for each request, consulting the Entity Store and
/// Token Service.
pub struct Resolver {
	store: EntityStore,
	tokens: Arc<TokenService>,
	public_domain: String,
}

impl Resolver {
	/// Creates a resolver against `store`/`tokens`, falling back to
	/// `public_domain` when no host can otherwise be determined.
	pub fn new(store: EntityStore, tokens: Arc<TokenService>, public_domain: impl Into<String>) -> Self {
		Self { store, tokens, public_domain: public_domain.into() }
	}

	/// Runs the full 8-step algorithm from §4.F.
	pub fn resolve(&self, input: &ResolverInput) -> Result<ClientInfo, Error> {
		let mode = self.resolve_mode(input);
		let requested = self.resolve_request_tuple(input);
		let responsible_domain = self.resolve_responsible_domain(mode, input, &requested);

		let (expired, mut valid_payload) = match &input.bearer_token {
			Some(token) => match self.tokens.verify(token) {
				Ok(payload) => (false, Some(payload)),
				Err(_) => (true, None),
			},
			None => (false, None),
		};

		let client_id = input.client_id_header.clone().or_else(|| input.client_id_query.clone()).or_else(|| {
			input.form_client_id.clone()
		});

		let client = match &client_id {
			Some(raw) => {
				let ident =
					uuid::Uuid::parse_str(raw).map_err(|_| Error::NotFound(NotFoundError::NoClient))?;

				Some(self.store.find_client_by_ident(ident).ok_or(Error::NotFound(NotFoundError::NoClient))?)
			},
			None => None,
		};

		let tenant = client
			.as_ref()
			.and_then(|c| self.store.find_tenant_by_name(&c.tenantname))
			.or_else(|| {
				valid_payload.as_ref().and_then(|p| self.store.find_tenant_by_name(&p.tenant))
			})
			.or_else(|| self.store.find_tenant_for_host(&responsible_domain));

		if let (Some(client), Some(tenant)) = (&client, &tenant) {
			if client.tenantname != tenant.name {
				return Err(Error::Authorization(AuthorizationError::TenantMismatch));
			}
		}

		if !input.is_logout_route && !input.is_localhost {
			if let Some(payload) = &valid_payload {
				match &tenant {
					Some(tenant) if payload.tenant != tenant.name => {
						return Err(Error::Authorization(AuthorizationError::TenantMismatch));
					},
					None => return Err(Error::NotFound(NotFoundError::NoTenant)),
					_ => {},
				}
			}
		}

		let responsibility = responsibility_hash(&responsible_domain);
		if let Some(payload) = &valid_payload {
			if let Some(existing) = &payload.responsibility {
				if *existing != responsibility {
					valid_payload = None;
				}
			}
		}

		let subject = valid_payload.as_ref().map(|p| p.sub.clone());

		Ok(ClientInfo {
			mode,
			requested,
			referer: input.referer.clone(),
			responsible_domain,
			service_url: format!(
				"{}://{}",
				input.forwarded_proto.as_deref().unwrap_or("https"),
				tenant.as_ref().and_then(|t| t.hosts.first()).map(|h| h.to_string()).unwrap_or_else(|| self.public_domain.clone())
			),
			tenant,
			client,
			expired,
			subject,
			valid_payload,
		})
	}

	fn resolve_mode(&self, input: &ResolverInput) -> Mode {
		match input.mode_header.as_deref().or(input.mode_query.as_deref()) {
			Some("interceptor") => Mode::Interceptor,
			Some("oauth") => Mode::Oauth,
			_ if input.is_interceptor_route => Mode::Interceptor,
			_ => Mode::Oauth,
		}
	}

	/// Builds the tuple describing *this* request's own absolute URL: the
	/// authorize URL embedded in the login form's `location` field, or the
	/// protected resource behind the interceptor. `query_for` overrides the
	/// host when the caller already knows which domain this request is
	/// responsible for (`POST /login` resolving the host a fresh login
	/// session is bound to).
	fn resolve_request_tuple(&self, input: &ResolverInput) -> RequestTuple {
		let scheme = input.forwarded_proto.clone().unwrap_or_else(|| "https".to_owned());
		let host = input
			.query_for
			.clone()
			.or_else(|| input.forwarded_host.clone())
			.unwrap_or_else(|| self.public_domain.clone());

		RequestTuple { scheme, host, uri: input.request_uri.clone() }
	}

	fn resolve_responsible_domain(&self, mode: Mode, input: &ResolverInput, requested: &RequestTuple) -> String {
		if mode == Mode::Oauth {
			return requested.host.clone();
		}

		if input.is_logout_route {
			if let Some(referer) = &input.referer {
				if let Ok(url) = url::Url::parse(referer) {
					if let Some(host) = url.host_str() {
						return host.to_owned();
					}
				}
			}
		}

		requested.host.clone()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::token::TokenKeys;

	fn resolver_with_tenant() -> (Resolver, EntityStore) {
		let store = EntityStore::new();
		store.insert_tenant(crate::_preludet::fixture_tenant("cheese/cheese", "id.example.com"));

		let keys = Arc::new(TokenKeys::generate("test-kid").expect("keys should generate"));
		let tokens = Arc::new(TokenService::new(keys));
		let resolver = Resolver::new(store.clone(), tokens, "id.example.com");

		(resolver, store)
	}

	#[test]
	fn oauth_mode_resolves_tenant_by_host() {
		let (resolver, _store) = resolver_with_tenant();
		let input = ResolverInput {
			forwarded_host: Some("id.example.com".into()),
			request_uri: "/authorize".into(),
			..Default::default()
		};

		let client_info = resolver.resolve(&input).expect("resolve should succeed");

		assert_eq!(client_info.mode, Mode::Oauth);
		assert_eq!(client_info.tenant.map(|t| t.name), Some("cheese/cheese".to_owned()));
	}

	#[test]
	fn interceptor_route_without_mode_header_resolves_interceptor_mode() {
		let (resolver, _store) = resolver_with_tenant();
		let input = ResolverInput {
			is_interceptor_route: true,
			forwarded_host: Some("id.example.com".into()),
			request_uri: "/interceptor".into(),
			..Default::default()
		};

		let client_info = resolver.resolve(&input).expect("resolve should succeed");

		assert_eq!(client_info.mode, Mode::Interceptor);
	}

	#[test]
	fn unknown_client_id_is_rejected() {
		let (resolver, _store) = resolver_with_tenant();
		let input = ResolverInput {
			forwarded_host: Some("id.example.com".into()),
			client_id_query: Some(uuid::Uuid::new_v4().to_string()),
			request_uri: "/authorize".into(),
			..Default::default()
		};

		let result = resolver.resolve(&input);

		assert!(matches!(result, Err(Error::NotFound(NotFoundError::NoClient))));
	}
}
