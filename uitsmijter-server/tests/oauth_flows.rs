//! End-to-end exercises of the authorization-code, refresh, and interceptor
//! flows against the assembled router.

use axum::{
	body::{to_bytes, Body},
	http::{Request, StatusCode},
};
use tower::ServiceExt;
use uitsmijter_core::_preludet::{fixture_client, fixture_tenant};
use uitsmijter_server::{config::Config, router, AppState};
use url::Url;

const TENANT_HOST: &str = "id.example.com";
const TENANT_NAME: &str = "cheese/cheese";
const CLIENT_IDENT: &str = "143a3135-5de2-46d4-828f-ddcf20c72060";

fn test_state() -> AppState {
	let config =
		Config { public_domain: TENANT_HOST.to_owned(), allow_missing_providers: true, secure: false, ..Config::default() };
	let state = AppState::new(config).expect("state should initialize");

	let tenant = fixture_tenant(TENANT_NAME, TENANT_HOST);
	state.store.insert_tenant(tenant);

	let mut client = fixture_client("web", TENANT_NAME, uuid::Uuid::parse_str(CLIENT_IDENT).unwrap());
	client.redirect_urls = vec![r"https?://api\.example\.com(:8080)?/?(.+)?".to_owned()];
	state.store.insert_client(client);

	state
}

async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
	let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
	serde_json::from_slice(&bytes).unwrap()
}

/// Pulls the `value="..."` attribute of a named hidden input out of a
/// rendered login form body.
fn scrape_hidden_field(body: &str, name: &str) -> String {
	let needle = format!("name=\"{name}\" value=\"");
	let start = body.find(&needle).unwrap_or_else(|| panic!("field {name} not found in login form")) + needle.len();
	let end = body[start..].find('"').unwrap();
	body[start..start + end].to_owned()
}

#[tokio::test]
async fn authorization_code_round_trip_issues_access_and_refresh_tokens() {
	let state = test_state();
	let app = router::build(state);

	let authorize_uri = format!(
		"/authorize?response_type=code&client_id={CLIENT_IDENT}&redirect_uri=https://api.example.com/callback&scope=openid"
	);
	let request = Request::get(&authorize_uri).body(Body::empty()).unwrap();
	let response = app.clone().oneshot(request).await.unwrap();

	// No session cookie yet: the user is shown the login form.
	assert_eq!(response.status(), StatusCode::OK);
	let body = String::from_utf8(to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
	let login_uuid = scrape_hidden_field(&body, "login_uuid");
	let location = scrape_hidden_field(&body, "location");
	assert_eq!(location, format!("https://{TENANT_HOST}{authorize_uri}"));

	let form = format!(
		"login_uuid={login_uuid}&location={}&username=alice&password=hunter2",
		url::form_urlencoded::byte_serialize(location.as_bytes()).collect::<String>()
	);
	let request = Request::post("/login")
		.header("Content-Type", "application/x-www-form-urlencoded")
		.body(Body::from(form))
		.unwrap();
	let response = app.clone().oneshot(request).await.unwrap();

	// The location carried a `redirect_uri`, so the code is issued directly
	// against it — no second `/authorize` round-trip.
	assert_eq!(response.status(), StatusCode::SEE_OTHER);
	assert!(response.headers().get("authorization").is_some());
	let redirect = response.headers().get("location").unwrap().to_str().unwrap().to_owned();
	let redirect_url = Url::parse(&redirect).unwrap();
	assert_eq!(redirect_url.host_str(), Some("api.example.com"));
	let code = redirect_url.query_pairs().find(|(k, _)| k == "code").map(|(_, v)| v.into_owned()).unwrap();

	let body = serde_json::json!({
		"grant_type": "authorization_code",
		"client_id": CLIENT_IDENT,
		"code": code,
	});
	let request = Request::post("/token")
		.header("Content-Type", "application/json")
		.body(Body::from(body.to_string()))
		.unwrap();
	let response = app.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert!(json["access_token"].as_str().unwrap().len() > 0);
	assert!(json["refresh_token"].as_str().unwrap().len() > 0);
	assert_eq!(json["token_type"], "Bearer");
}

#[tokio::test]
async fn unknown_code_challenge_method_is_rejected_as_not_implemented() {
	let state = test_state();
	let app = router::build(state);

	let uri = format!(
		"/authorize?response_type=code&client_id={CLIENT_IDENT}&redirect_uri=https://api.example.com/callback&code_challenge=abc&code_challenge_method=bogus"
	);
	let request = Request::get(&uri).header("Host", TENANT_HOST).body(Body::empty()).unwrap();
	let response = app.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
	let json = body_json(response).await;
	assert_eq!(json["error"], "CODE_CHALLENGE_METHOD_NOT_IMPLEMENTED");
}

#[tokio::test]
async fn unknown_client_id_on_token_endpoint_is_not_found() {
	let state = test_state();
	let app = router::build(state);

	let body = serde_json::json!({
		"grant_type": "authorization_code",
		"client_id": uuid::Uuid::new_v4().to_string(),
		"code": "nonexistent",
	});
	let request = Request::post("/token")
		.header("Content-Type", "application/json")
		.body(Body::from(body.to_string()))
		.unwrap();
	let response = app.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	let json = body_json(response).await;
	assert_eq!(json["error"], "NO_CLIENT");
}

#[tokio::test]
async fn refresh_token_grant_rejects_unknown_refresh_token() {
	let state = test_state();
	let app = router::build(state);

	let body = serde_json::json!({
		"grant_type": "refresh_token",
		"client_id": CLIENT_IDENT,
		"refresh_token": "does-not-exist",
	});
	let request = Request::post("/token")
		.header("Content-Type", "application/json")
		.body(Body::from(body.to_string()))
		.unwrap();
	let response = app.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	let json = body_json(response).await;
	assert_eq!(json["error"], "ERRORS.INVALID_TOKEN");
}

#[tokio::test]
async fn discovery_document_reports_the_resolved_tenant_issuer() {
	let state = test_state();
	let app = router::build(state);

	let request =
		Request::get("/.well-known/openid-configuration").header("Host", TENANT_HOST).body(Body::empty()).unwrap();
	let response = app.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		response.headers().get("cache-control").unwrap().to_str().unwrap(),
		"public, max-age=3600"
	);

	let json = body_json(response).await;
	assert_eq!(json["issuer"], format!("https://{TENANT_HOST}"));
	assert_eq!(json["response_types_supported"], serde_json::json!(["code"]));

	let scopes = json["scopes_supported"].as_array().unwrap();
	let scopes: Vec<&str> = scopes.iter().map(|v| v.as_str().unwrap()).collect();
	assert_eq!(scopes, vec!["email", "openid", "profile"]);
}

#[tokio::test]
async fn discovery_document_is_not_found_for_an_unknown_host() {
	let state = test_state();
	let app = router::build(state);

	let request =
		Request::get("/.well-known/openid-configuration").header("Host", "nobody.example.com").body(Body::empty()).unwrap();
	let response = app.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn interceptor_without_a_session_redirects_to_login() {
	let state = test_state();
	let app = router::build(state);

	let request = Request::get("/interceptor")
		.header("Host", TENANT_HOST)
		.header("X-Forwarded-Proto", "https")
		.header("X-Forwarded-Host", TENANT_HOST)
		.body(Body::empty())
		.unwrap();
	let response = app.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
	let location = response.headers().get("location").unwrap().to_str().unwrap();
	assert!(location.starts_with("/login?for="));
}

#[tokio::test]
async fn interceptor_on_an_unknown_host_is_a_bad_request() {
	let state = test_state();
	let app = router::build(state);

	let request = Request::get("/interceptor")
		.header("Host", "nobody.example.com")
		.header("X-Forwarded-Proto", "https")
		.header("X-Forwarded-Host", "nobody.example.com")
		.body(Body::empty())
		.unwrap();
	let response = app.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_endpoint_reports_ready_once_a_tenant_is_loaded() {
	let state = test_state();
	let app = router::build(state);

	let request = Request::get("/health/ready").body(Body::empty()).unwrap();
	let response = app.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn jwks_endpoint_exposes_the_signing_key() {
	let state = test_state();
	let app = router::build(state);

	let request = Request::get("/.well-known/jwks.json").body(Body::empty()).unwrap();
	let response = app.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert_eq!(json["keys"].as_array().unwrap().len(), 1);
	assert_eq!(json["keys"][0]["kty"], "RSA");
}
