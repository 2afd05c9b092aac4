#![cfg(feature = "reqwest")]

// crates.io
use httpmock::{Mock, prelude::*};
// self
use login_broker::{
	_preludet::*,
	auth::{
		AuthorizationState, IdentityLinkage, IdentitySalt, LinkageUpdate, ProviderId,
		PseudonymousId,
	},
	error::ErrorCategory,
	exchange::ReqwestTransportErrorMapper,
	login::ReqwestLoginOrchestrator,
	provider::ProviderDescriptor,
	store::{LinkageBackend, MemoryStore, SaltBackend, StateBackend, StoreError, StoreFuture},
	tenant::TenantResolution,
};

const ISSUER: &str = "https://access.line.me";

fn descriptor(server: &MockServer) -> ProviderDescriptor {
	let url = |path: &str| Url::parse(&server.url(path)).expect("Mock endpoint should parse.");

	ProviderDescriptor::builder(
		ProviderId::new("mock-line").expect("Provider identifier should be valid."),
	)
	.authorization_endpoint(url("/authorize"))
	.token_endpoint(url("/token"))
	.verify_endpoint(url("/verify"))
	.profile_endpoint(url("/profile"))
	.issuer(ISSUER)
	.build()
	.expect("Provider descriptor should build successfully.")
}

/// Memory-backed store whose linkage writes always fail.
#[derive(Clone, Default)]
struct UnwritableLinkages {
	inner: MemoryStore,
}
impl StateBackend for UnwritableLinkages {
	fn insert(&self, state: AuthorizationState) -> StoreFuture<'_, ()> {
		self.inner.insert(state)
	}

	fn take<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<AuthorizationState>> {
		self.inner.take(token)
	}

	fn purge_created_before(&self, cutoff: OffsetDateTime) -> StoreFuture<'_, usize> {
		self.inner.purge_created_before(cutoff)
	}
}
impl SaltBackend for UnwritableLinkages {
	fn get_or_insert<'a>(
		&'a self,
		lookup_key: &'a str,
		candidate: IdentitySalt,
	) -> StoreFuture<'a, IdentitySalt> {
		self.inner.get_or_insert(lookup_key, candidate)
	}
}
impl LinkageBackend for UnwritableLinkages {
	fn merge(&self, _: LinkageUpdate) -> StoreFuture<'_, IdentityLinkage> {
		Box::pin(async { Err(StoreError::Backend { message: "disk full".into() }) })
	}

	fn fetch<'a>(&'a self, id: &'a PseudonymousId) -> StoreFuture<'a, Option<IdentityLinkage>> {
		self.inner.fetch(id)
	}
}

fn setup(server: &MockServer) -> (ReqwestLoginOrchestrator, Arc<MemoryStore>) {
	build_reqwest_test_orchestrator(&test_config(descriptor(server)))
}

fn claims(aud: &str, sub: &str, exp: OffsetDateTime) -> String {
	format!(
		"{{\"iss\":\"{ISSUER}\",\"sub\":\"{sub}\",\"aud\":\"{aud}\",\"exp\":{},\"name\":\"Alice\"}}",
		exp.unix_timestamp()
	)
}

fn in_an_hour() -> OffsetDateTime {
	OffsetDateTime::now_utc() + Duration::hours(1)
}

async fn mock_token<'a>(
	server: &'a MockServer,
	client: &str,
	status: u16,
	body: &str,
) -> Mock<'a> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.body_includes("grant_type=authorization_code")
				.body_includes(format!("client_id=client-{client}"));
			then.status(status).header("content-type", "application/json").body(body);
		})
		.await
}

async fn mock_token_ok<'a>(server: &'a MockServer, client: &str) -> Mock<'a> {
	mock_token(
		server,
		client,
		200,
		concat!(
			"{\"access_token\":\"access-1\",\"id_token\":\"id-token-1\",",
			"\"token_type\":\"Bearer\",\"expires_in\":3600}",
		),
	)
	.await
}

async fn mock_verify<'a>(
	server: &'a MockServer,
	client: &str,
	status: u16,
	body: String,
) -> Mock<'a> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/verify")
				.body_includes("id_token=id-token-1")
				.body_includes(format!("client_id=client-{client}"));
			then.status(status).header("content-type", "application/json").body(body);
		})
		.await
}

async fn mock_profile<'a>(server: &'a MockServer, status: u16, body: &str) -> Mock<'a> {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/profile").header("authorization", "Bearer access-1");
			then.status(status).header("content-type", "application/json").body(body);
		})
		.await
}

#[tokio::test]
async fn begin_login_builds_authorize_url_for_origin_tenant() {
	let server = MockServer::start_async().await;
	let (orchestrator, store) = setup(&server);
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "")
		.await
		.expect("Begin login should succeed for an allow-listed origin.");

	assert_eq!(begin.state.len(), 32);
	assert!(begin.state.chars().all(|c| c.is_ascii_hexdigit()));
	assert_eq!(begin.tenant.as_ref(), "tenant-a");
	assert_eq!(begin.resolution, TenantResolution::Origin);
	assert_eq!(begin.login_url.path(), "/authorize");

	let pairs: HashMap<_, _> = begin.login_url.query_pairs().into_owned().collect();

	assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
	assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-a"));
	assert_eq!(
		pairs.get("redirect_uri").map(String::as_str),
		Some("https://auth.example/callback/a")
	);
	assert_eq!(pairs.get("state"), Some(&begin.state));
	assert_eq!(pairs.get("scope").map(String::as_str), Some("openid profile"));
	assert!(!pairs.contains_key("client_secret"));
	assert_eq!(store.pending_states(), 1);
}

#[tokio::test]
async fn begin_login_rejects_unlisted_origins_and_open_redirects() {
	let server = MockServer::start_async().await;
	let (orchestrator, store) = setup(&server);
	let err = orchestrator
		.begin_login("https://evil.example", "tenant-a", "/")
		.await
		.expect_err("Unlisted origins must be rejected.");

	assert_eq!(err.category(), ErrorCategory::InvalidOrigin);

	let err = orchestrator
		.begin_login("https://tenant-a.example", "", "https://evil.example/phish")
		.await
		.expect_err("Absolute return paths must be rejected.");

	assert_eq!(err.category(), ErrorCategory::InvalidOrigin);

	let err = orchestrator
		.begin_login("", "", "/")
		.await
		.expect_err("A missing origin must be rejected.");

	assert!(matches!(err, Error::MissingParameter { name: "origin" }));
	assert_eq!(store.pending_states(), 0);
	assert_eq!(orchestrator.metrics().failures(), 3);
}

#[tokio::test]
async fn hint_and_default_resolution_pick_the_expected_tenant() {
	let server = MockServer::start_async().await;
	let (orchestrator, _store) = setup(&server);
	let hinted = orchestrator
		.begin_login("https://tenant-a.example", "tenant-b", "/")
		.await
		.expect("Hinted login should succeed.");

	assert_eq!(hinted.tenant.as_ref(), "tenant-b");
	assert_eq!(hinted.resolution, TenantResolution::Hint);

	let fallback = orchestrator
		.begin_login("https://shared.example", "tenant-unknown", "/")
		.await
		.expect("Shared origin should fall back to the default tenant.");

	assert_eq!(fallback.tenant.as_ref(), "tenant-a");
	assert_eq!(fallback.resolution, TenantResolution::Default);
}

#[tokio::test]
async fn complete_login_issues_session_and_links_identity() {
	let server = MockServer::start_async().await;
	let (orchestrator, store) = setup(&server);
	let token = mock_token_ok(&server, "a").await;
	let verify = mock_verify(&server, "a", 200, claims("client-a", "U1234", in_an_hour())).await;
	let profile = mock_profile(
		&server,
		200,
		"{\"userId\":\"U1234\",\"displayName\":\"Alice\",\"pictureUrl\":\"https://cdn.example/a.png\"}",
	)
	.await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/welcome")
		.await
		.expect("Begin login should succeed.");
	let completed = orchestrator
		.complete_login("code-1", &begin.state, "https://auth.example/callback/a")
		.await
		.expect("Complete login should succeed.");

	token.assert_async().await;
	verify.assert_async().await;
	profile.assert_async().await;

	assert_eq!(completed.return_path, "/welcome");
	assert_eq!(completed.requested_origin, "https://tenant-a.example");
	assert_eq!(completed.tenant.as_ref(), "tenant-a");
	assert_eq!(completed.profile.display_name.as_deref(), Some("Alice"));
	assert_eq!(completed.pseudonymous_id.len(), 64);
	assert_ne!(completed.pseudonymous_id.as_ref(), "U1234");

	let claims = orchestrator
		.token_issuer()
		.decode(completed.session.token.expose())
		.expect("Issued session should decode.");

	assert_eq!(claims.sub, completed.pseudonymous_id.as_ref());
	assert_eq!(claims.tenant, "tenant-a");

	let linkage = orchestrator
		.linkages()
		.fetch(&completed.pseudonymous_id)
		.await
		.expect("Linkage fetch should succeed.")
		.expect("Linkage should exist after login.");

	assert_eq!(linkage.raw_subject, "U1234");
	assert!(linkage.tenant_flags.contains("tenant-a"));
	assert_eq!(store.pending_states(), 0);
	assert_eq!(store.salt_count(), 1);
	assert_eq!(orchestrator.metrics().attempts(), 2);
	assert_eq!(orchestrator.metrics().successes(), 2);
}

#[tokio::test]
async fn unknown_state_performs_no_provider_calls() {
	let server = MockServer::start_async().await;
	let (orchestrator, _store) = setup(&server);
	let token = mock_token_ok(&server, "a").await;
	let verify = mock_verify(&server, "a", 200, claims("client-a", "U1234", in_an_hour())).await;
	let err = orchestrator
		.complete_login("x", "doesnotexist", "https://auth.example/callback/a")
		.await
		.expect_err("Unknown state must be rejected.");

	assert!(matches!(err, Error::InvalidState { .. }));
	assert_eq!(err.to_response().error, ErrorCategory::InvalidState);
	assert_eq!(orchestrator.metrics().replays_rejected(), 1);

	token.assert_calls_async(0).await;
	verify.assert_calls_async(0).await;
}

#[tokio::test]
async fn missing_callback_parameters_are_rejected_before_consuming_state() {
	let server = MockServer::start_async().await;
	let (orchestrator, store) = setup(&server);
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let err = orchestrator
		.complete_login("", &begin.state, "")
		.await
		.expect_err("Missing code must be rejected.");

	assert!(matches!(err, Error::MissingParameter { name: "code" }));
	assert_eq!(store.pending_states(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_callbacks_with_same_state_issue_once() {
	let server = MockServer::start_async().await;
	let (orchestrator, _store) = setup(&server);
	let token = mock_token_ok(&server, "a").await;
	let _verify = mock_verify(&server, "a", 200, claims("client-a", "U1234", in_an_hour())).await;
	let _profile = mock_profile(&server, 200, "{\"displayName\":\"Alice\"}").await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let (first, second) = tokio::join!(
		orchestrator.complete_login("code-1", &begin.state, ""),
		orchestrator.complete_login("code-1", &begin.state, ""),
	);
	let outcomes = [first, second];
	let issued = outcomes.iter().filter(|result| result.is_ok()).count();
	let replayed = outcomes
		.iter()
		.filter(|result| matches!(result, Err(Error::InvalidState { .. })))
		.count();

	assert_eq!(issued, 1);
	assert_eq!(replayed, 1);

	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn profile_failure_still_issues_session() {
	let server = MockServer::start_async().await;
	let (orchestrator, _store) = setup(&server);
	let _token = mock_token_ok(&server, "a").await;
	let _verify = mock_verify(&server, "a", 200, claims("client-a", "U1234", in_an_hour())).await;
	let profile = mock_profile(&server, 500, "{\"message\":\"boom\"}").await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let completed = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect("Profile failures must not abort the login.");

	profile.assert_async().await;

	assert!(completed.profile.is_empty());
	assert!(!completed.session.token.is_empty());
}

#[tokio::test]
async fn token_response_without_id_token_fails_and_burns_state() {
	let server = MockServer::start_async().await;
	let (orchestrator, _store) = setup(&server);
	let token = mock_token(
		&server,
		"a",
		200,
		"{\"access_token\":\"access-1\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
	)
	.await;
	let verify = mock_verify(&server, "a", 200, claims("client-a", "U1234", in_an_hour())).await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let err = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect_err("A missing id token must fail the exchange.");

	assert!(matches!(err, Error::TokenExchangeFailed { .. }));

	let retry = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect_err("A failed callback must not be retryable with the same state.");

	assert!(matches!(retry, Error::InvalidState { .. }));

	token.assert_calls_async(1).await;
	verify.assert_calls_async(0).await;
}

#[tokio::test]
async fn oauth_errors_and_outages_map_to_distinct_categories() {
	let server = MockServer::start_async().await;
	let (orchestrator, _store) = setup(&server);
	let mut rejected = mock_token(&server, "a", 400, "{\"error\":\"invalid_grant\"}").await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let err = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect_err("OAuth errors must fail the exchange.");

	assert_eq!(err.category(), ErrorCategory::TokenExchangeFailed);

	rejected.delete_async().await;

	let _outage = mock_token(&server, "a", 503, "{\"error\":\"temporarily_unavailable\"}").await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let err = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect_err("Provider outages must fail the login.");

	assert_eq!(err.category(), ErrorCategory::UpstreamUnavailable);
}

#[tokio::test]
async fn expired_id_tokens_are_rejected() {
	let server = MockServer::start_async().await;
	let (orchestrator, store) = setup(&server);
	let _token = mock_token_ok(&server, "a").await;
	let expired = OffsetDateTime::now_utc() - Duration::minutes(1);
	let _verify = mock_verify(&server, "a", 200, claims("client-a", "U1234", expired)).await;
	let profile = mock_profile(&server, 200, "{}").await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let err = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect_err("Expired id tokens must be rejected.");

	assert!(matches!(err, Error::InvalidIdToken { .. }));
	assert_eq!(store.salt_count(), 0);

	profile.assert_calls_async(0).await;
}

#[tokio::test]
async fn audience_mismatch_and_provider_rejection_are_invalid_id_tokens() {
	let server = MockServer::start_async().await;
	let (orchestrator, _store) = setup(&server);
	let _token = mock_token_ok(&server, "a").await;
	let mut foreign =
		mock_verify(&server, "a", 200, claims("client-b", "U1234", in_an_hour())).await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let err = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect_err("Foreign audiences must be rejected.");

	assert!(matches!(err, Error::InvalidIdToken { .. }));

	foreign.delete_async().await;

	let _rejected = mock_verify(
		&server,
		"a",
		400,
		"{\"error\":\"invalid_request\",\"error_description\":\"Invalid IdToken.\"}".into(),
	)
	.await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let err = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect_err("Provider rejections must be surfaced.");

	assert_eq!(err.category(), ErrorCategory::InvalidIdToken);
}

#[tokio::test]
async fn redirect_mismatch_is_rejected_after_consuming_state() {
	let server = MockServer::start_async().await;
	let (orchestrator, store) = setup(&server);
	let token = mock_token_ok(&server, "a").await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let err = orchestrator
		.complete_login("code-1", &begin.state, "https://evil.example/callback")
		.await
		.expect_err("Mismatched redirect URIs must be rejected.");

	assert!(matches!(err, Error::InvalidState { .. }));
	assert_eq!(store.pending_states(), 0);

	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn logins_through_two_tenants_share_one_identity() {
	let server = MockServer::start_async().await;
	let (orchestrator, store) = setup(&server);
	let _token_a = mock_token_ok(&server, "a").await;
	let _token_b = mock_token_ok(&server, "b").await;
	let _verify_a =
		mock_verify(&server, "a", 200, claims("client-a", "U1234", in_an_hour())).await;
	let _verify_b =
		mock_verify(&server, "b", 200, claims("client-b", "U1234", in_an_hour())).await;
	let _profile = mock_profile(&server, 200, "{}").await;
	let via_a = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login via tenant A should succeed.");
	let first = orchestrator
		.complete_login("code-a", &via_a.state, "")
		.await
		.expect("Login via tenant A should succeed.");
	let via_b = orchestrator
		.begin_login("https://tenant-b.example", "", "/")
		.await
		.expect("Begin login via tenant B should succeed.");
	let second = orchestrator
		.complete_login("code-b", &via_b.state, "")
		.await
		.expect("Login via tenant B should succeed.");

	assert_eq!(first.pseudonymous_id, second.pseudonymous_id);
	assert_eq!(store.salt_count(), 1);

	let linkage = orchestrator
		.linkages()
		.fetch(&first.pseudonymous_id)
		.await
		.expect("Linkage fetch should succeed.")
		.expect("Linkage should exist.");

	assert!(linkage.tenant_flags.contains("tenant-a"));
	assert!(linkage.tenant_flags.contains("tenant-b"));
	assert_eq!(linkage.raw_subject, "U1234");
}

#[tokio::test]
async fn verify_outage_is_upstream_unavailable() {
	let server = MockServer::start_async().await;
	let (orchestrator, store) = setup(&server);
	let _token = mock_token_ok(&server, "a").await;
	let verify = mock_verify(&server, "a", 503, "{\"message\":\"maintenance\"}".into()).await;
	let profile = mock_profile(&server, 200, "{}").await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let err = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect_err("Verify outages must fail the login.");

	assert_eq!(err.category(), ErrorCategory::UpstreamUnavailable);
	assert_eq!(store.salt_count(), 0);

	verify.assert_calls_async(1).await;
	profile.assert_calls_async(0).await;
}

#[tokio::test]
async fn persistence_failure_issues_no_session_and_burns_state() {
	let server = MockServer::start_async().await;
	let store = UnwritableLinkages::default();
	let orchestrator = ReqwestLoginOrchestrator::from_config(
		&test_config(descriptor(&server)),
		Arc::new(store.clone()),
		test_reqwest_http_client(),
		ReqwestTransportErrorMapper,
	)
	.expect("Orchestrator should build.");
	let token = mock_token_ok(&server, "a").await;
	let verify = mock_verify(&server, "a", 200, claims("client-a", "U1234", in_an_hour())).await;
	let _profile = mock_profile(&server, 200, "{}").await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let err = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect_err("A failed linkage write must fail the login.");

	assert!(matches!(err, Error::PersistenceFailure(StoreError::Backend { .. })));
	assert_eq!(err.to_response().error, ErrorCategory::PersistenceFailure);
	assert_eq!(store.inner.pending_states(), 0);
	assert_eq!(orchestrator.metrics().successes(), 1);
	assert_eq!(orchestrator.metrics().failures(), 1);

	token.assert_calls_async(1).await;
	verify.assert_calls_async(1).await;

	let retry = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect_err("The consumed state must not be reusable.");

	assert!(matches!(retry, Error::InvalidState { .. }));
}

#[tokio::test]
async fn malformed_profile_body_degrades_to_empty_profile() {
	let server = MockServer::start_async().await;
	let (orchestrator, _store) = setup(&server);
	let _token = mock_token_ok(&server, "a").await;
	let _verify = mock_verify(&server, "a", 200, claims("client-a", "U1234", in_an_hour())).await;
	let profile = mock_profile(&server, 200, "<html>not json</html>").await;
	let begin = orchestrator
		.begin_login("https://tenant-a.example", "", "/")
		.await
		.expect("Begin login should succeed.");
	let completed = orchestrator
		.complete_login("code-1", &begin.state, "")
		.await
		.expect("A malformed profile must not abort the login.");

	profile.assert_async().await;

	assert!(completed.profile.is_empty());
}

#[tokio::test]
async fn registered_alternate_redirect_is_used_end_to_end() {
	let server = MockServer::start_async().await;
	let mut config = test_config(descriptor(&server));
	let alternate = "https://auth.example/callback/a2";

	config.tenants[0].redirect_uris.push(Url::parse(alternate).expect("Redirect should parse."));

	let (orchestrator, store) = build_reqwest_test_orchestrator(&config);
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("redirect_uri=https%3A%2F%2Fauth.example%2Fcallback%2Fa2");
			then.status(200).header("content-type", "application/json").body(concat!(
				"{\"access_token\":\"access-1\",\"id_token\":\"id-token-1\",",
				"\"token_type\":\"Bearer\",\"expires_in\":3600}",
			));
		})
		.await;
	let _verify = mock_verify(&server, "a", 200, claims("client-a", "U1234", in_an_hour())).await;
	let _profile = mock_profile(&server, 200, "{}").await;
	let err = orchestrator
		.begin_login_with_redirect("https://tenant-a.example", "", "/", "https://evil.example/cb")
		.await
		.expect_err("Unregistered redirects must be rejected.");

	assert_eq!(err.category(), ErrorCategory::InvalidOrigin);
	assert_eq!(store.pending_states(), 0);

	let begin = orchestrator
		.begin_login_with_redirect("https://tenant-a.example", "", "/", alternate)
		.await
		.expect("Registered redirects should be accepted.");
	let pairs: HashMap<_, _> = begin.login_url.query_pairs().into_owned().collect();

	assert_eq!(pairs.get("redirect_uri").map(String::as_str), Some(alternate));

	orchestrator
		.complete_login("code-1", &begin.state, alternate)
		.await
		.expect("Completing with the bound redirect should succeed.");

	token.assert_async().await;
}
