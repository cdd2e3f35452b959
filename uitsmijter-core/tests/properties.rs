//! Property-based sweeps over the store/session/discovery invariants,
//! complementing the narrower example-based unit tests kept alongside each
//! module.

use proptest::prelude::*;
use time::{Duration, OffsetDateTime};
use uitsmijter_core::{
	_preludet::{fixture_client, fixture_tenant},
	discovery,
	domain::{host::HostPattern, session::{AuthSession, SessionKind}},
	store::{
		entity::EntityStore,
		session::{MemoryStore, SessionStore},
	},
};

fn fixture_session(ttl_seconds: i64, generated_at: OffsetDateTime) -> AuthSession {
	AuthSession {
		kind: SessionKind::Code,
		state: None,
		code_value: "the-only-code".into(),
		scopes: vec!["openid".into()],
		payload: None,
		redirect_uri: "https://api.example.com/callback".into(),
		ttl_seconds,
		generated_at,
		code_challenge: None,
		code_challenge_method: None,
	}
}

proptest! {
	/// Invariant 1: `get(type, code)` sees the session for every instant up
	/// to but excluding its own TTL boundary, and never after.
	#[test]
	fn ttl_expiry_is_half_open_for_any_ttl_and_offset(
		ttl_seconds in 1i64..=1_000_000,
		offset_seconds in 0i64..=2_000_000,
	) {
		let t0 = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
		let session = fixture_session(ttl_seconds, t0);
		let t_prime = t0 + Duration::seconds(offset_seconds);

		let expired = session.is_expired(t_prime);
		prop_assert_eq!(expired, offset_seconds >= ttl_seconds);
	}

	/// Invariant 3: `find_tenant_for_host` resolves an exact host match
	/// regardless of which other tenant, with whatever name, was inserted
	/// first — exact matches always win over wildcards, and among tenants
	/// that both claim the same host, the first inserted wins.
	#[test]
	fn exact_host_match_wins_over_a_wildcard_inserted_first(
		wildcard_suffix in "[a-z]{3,8}\\.com",
		label in "[a-z]{3,8}",
		first_name in "[a-z]{3,10}",
		second_name in "[a-z]{3,10}",
	) {
		prop_assume!(first_name != second_name);

		let store = EntityStore::new();
		let host = format!("{label}.{wildcard_suffix}");

		let mut wildcard_tenant = fixture_tenant(&first_name, &host);
		wildcard_tenant.hosts = vec![HostPattern::parse(format!("*.{wildcard_suffix}")).unwrap()];
		store.insert_tenant(wildcard_tenant);

		let exact_tenant = fixture_tenant(&second_name, &host);
		store.insert_tenant(exact_tenant);

		let resolved = store.find_tenant_for_host(&host).expect("a tenant should resolve");
		prop_assert_eq!(resolved.name, second_name);
	}

	/// Invariant 3 (first-insert-wins): among tenants that claim the exact
	/// same host exactly, the earliest inserted is always returned.
	#[test]
	fn first_insert_wins_among_tenants_claiming_the_same_exact_host(
		host in "[a-z]{3,10}\\.example\\.com",
		first_name in "[a-z]{3,10}",
		second_name in "[a-z]{3,10}",
	) {
		prop_assume!(first_name != second_name);

		let store = EntityStore::new();
		store.insert_tenant(fixture_tenant(&first_name, &host));
		store.insert_tenant(fixture_tenant(&second_name, &host));

		let resolved = store.find_tenant_for_host(&host).expect("a tenant should resolve");
		prop_assert_eq!(resolved.name, first_name);
	}

	/// Invariant 4: replaying the same tenant/client insertion any number of
	/// times beyond the first is a no-op — the store ends up identical to
	/// having inserted it exactly once.
	#[test]
	fn repeated_identical_inserts_are_idempotent(
		name in "[a-z]{3,10}",
		host in "[a-z]{3,10}\\.example\\.com",
		replay_count in 0usize..10,
	) {
		let store = EntityStore::new();

		prop_assert!(store.insert_tenant(fixture_tenant(&name, &host)));
		for _ in 0..replay_count {
			prop_assert!(!store.insert_tenant(fixture_tenant(&name, &host)));
		}

		prop_assert_eq!(store.tenant_count(), 1);
		prop_assert_eq!(store.tenants().len(), 1);
	}

	/// Invariant 6: the discovery document is a pure function of its inputs
	/// — building it twice from the same tenant/clients yields byte-identical
	/// JSON, regardless of how many unrelated clients/scopes are thrown in.
	#[test]
	fn discovery_document_is_deterministic_for_the_same_inputs(
		tenant_name in "[a-z]{3,10}",
		host in "[a-z]{3,10}\\.example\\.com",
		extra_scopes in prop::collection::vec("[a-z]{3,8}", 0..5),
	) {
		let tenant = fixture_tenant(&tenant_name, &host);

		let mut client = fixture_client("web", &tenant_name, uuid::Uuid::new_v4());
		client.scopes = if extra_scopes.is_empty() { None } else { Some(extra_scopes) };
		let clients = vec![client];

		let issuer = format!("https://{host}");
		let first = discovery::build(&issuer, &tenant, &clients);
		let second = discovery::build(&issuer, &tenant, &clients);

		prop_assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
	}
}

/// Invariant 2: under concurrent single-use fetches for the same code,
/// exactly one caller ever observes `Some` — the other always sees `None`,
/// never a duplicate or a lost session.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_single_use_get_has_exactly_one_winner() {
	for _ in 0..50 {
		let store = MemoryStore::new();
		let session = fixture_session(3600, OffsetDateTime::now_utc());
		store.set(session).await.expect("set should succeed");

		let a = {
			let store = store.clone();
			tokio::spawn(async move { store.get(SessionKind::Code, "the-only-code".into(), true).await.unwrap() })
		};
		let b = {
			let store = store.clone();
			tokio::spawn(async move { store.get(SessionKind::Code, "the-only-code".into(), true).await.unwrap() })
		};

		let (a, b) = (a.await.unwrap(), b.await.unwrap());
		let winners = [a.is_some(), b.is_some()].into_iter().filter(|&won| won).count();

		assert_eq!(winners, 1, "exactly one concurrent fetch should observe the session");
	}
}
