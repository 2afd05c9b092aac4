//! Replay-safe OAuth 2.0 / OpenID login broker: tenant-aware code exchange, pseudonymous
//! identity derivation, accretive identity linkage, and signed session credentials in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod exchange;
pub mod http;
pub mod identity;
pub mod linkage;
pub mod login;
pub mod obs;
pub mod provider;
pub mod session;
pub mod state;
pub mod store;
pub mod tenant;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Secret, TenantId},
		config::{BrokerConfig, IdentitySettings},
		http::ReqwestHttpClient,
		identity::HashParams,
		login::ReqwestLoginOrchestrator,
		provider::ProviderDescriptor,
		session::SessionSettings,
		store::MemoryStore,
		tenant::TenantCredential,
	};

	/// Argon2 parameters small enough for tests.
	pub const TEST_HASH_PARAMS: HashParams =
		HashParams { memory_kib: 8, iterations: 1, parallelism: 1 };

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Tenant fixture `tenant-<name>` owning `https://tenant-<name>.example` and redirecting to
	/// `https://auth.example/callback/<name>`.
	pub fn test_tenant(name: &str) -> TenantCredential {
		TenantCredential {
			id: TenantId::new(format!("tenant-{name}"))
				.expect("Failed to build tenant identifier for tests."),
			client_id: format!("client-{name}"),
			client_secret: Secret::new(format!("secret-{name}")),
			origins: vec![format!("https://tenant-{name}.example")],
			redirect_uris: vec![
				Url::parse(&format!("https://auth.example/callback/{name}"))
					.expect("Failed to parse redirect fixture for tests."),
			],
		}
	}

	/// Configuration with tenants `tenant-a` (default) and `tenant-b`, one shared origin, and
	/// cheap hash parameters.
	pub fn test_config(provider: ProviderDescriptor) -> BrokerConfig {
		BrokerConfig {
			provider,
			tenants: vec![test_tenant("a"), test_tenant("b")],
			default_tenant: TenantId::new("tenant-a")
				.expect("Failed to build default tenant identifier for tests."),
			allowed_origins: vec!["https://shared.example".into()],
			state_ttl_secs: 600,
			http_timeout_secs: 10,
			identity: IdentitySettings {
				lookup_secret: Secret::new("lookup-secret"),
				pepper: Secret::new("pepper"),
				argon2: TEST_HASH_PARAMS,
			},
			session: SessionSettings {
				signing_key: Secret::new("signing-key"),
				issuer: "login-broker".into(),
				audience: "tenant-apps".into(),
				ttl_secs: 3_600,
			},
		}
	}

	/// Constructs a [`ReqwestLoginOrchestrator`] backed by an in-memory store and the reqwest
	/// transport used across integration tests.
	pub fn build_reqwest_test_orchestrator(
		config: &BrokerConfig,
	) -> (ReqwestLoginOrchestrator, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());
		let orchestrator = ReqwestLoginOrchestrator::from_config(
			config,
			store.clone(),
			test_reqwest_http_client(),
			crate::exchange::ReqwestTransportErrorMapper,
		)
		.expect("Failed to build login orchestrator for tests.");

		(orchestrator, store)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
