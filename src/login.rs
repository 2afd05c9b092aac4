//! Login orchestration: begin-login and complete-login over the broker components.
//!
//! [`LoginOrchestrator`] owns every collaborator a login needs and drives the state machine
//! `Initiated → Consumed → Exchanged → Verified → Linked → Issued` described by
//! [`LoginStage`]. Each public operation runs inside a `login_broker.flow` span, reports its
//! outcome to the optional metrics recorder, and updates the in-process [`LoginMetrics`]
//! counters. No step is retried; the first failure aborts the attempt.

mod begin;
mod complete;
mod metrics;
mod stage;

pub use begin::*;
pub use complete::*;
pub use metrics::LoginMetrics;
pub use stage::LoginStage;

// self
use crate::{
	_prelude::*,
	config::BrokerConfig,
	error::ConfigError,
	exchange::{TokenExchangeClient, TransportErrorMapper},
	http::ProviderHttpClient,
	identity::{HashRunner, IdentityHasher},
	linkage::LinkageRepository,
	session::AuthTokenIssuer,
	state::StateStore,
	store::{LinkageBackend, SaltBackend, StateBackend},
	tenant::CredentialSelector,
};
#[cfg(feature = "reqwest")]
use crate::{exchange::ReqwestTransportErrorMapper, http::ReqwestHttpClient};

/// Orchestrator specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestLoginOrchestrator =
	LoginOrchestrator<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Coordinates begin-login and complete-login for every configured tenant.
///
/// All cross-request state lives in the storage backends, so any number of orchestrators (in
/// one process or many) may serve the same deployment.
pub struct LoginOrchestrator<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	selector: Arc<CredentialSelector>,
	exchange: TokenExchangeClient<C, M>,
	states: StateStore,
	hasher: IdentityHasher,
	linkages: LinkageRepository,
	issuer: AuthTokenIssuer,
	metrics: Arc<LoginMetrics>,
}
impl<C, M> LoginOrchestrator<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Assembles an orchestrator from prebuilt components.
	pub fn new(
		selector: CredentialSelector,
		exchange: TokenExchangeClient<C, M>,
		states: StateStore,
		hasher: IdentityHasher,
		linkages: LinkageRepository,
		issuer: AuthTokenIssuer,
	) -> Self {
		Self {
			selector: Arc::new(selector),
			exchange,
			states,
			hasher,
			linkages,
			issuer,
			metrics: Default::default(),
		}
	}

	/// Builds every component from `config`, persisting through `store`.
	///
	/// `http_client` is used as given; `config.http_timeout_secs` is not applied to it. Build the
	/// client with [`BrokerConfig::http_timeout`] (or use
	/// [`ReqwestLoginOrchestrator::from_config_with_reqwest`]) to honor the configured timeout.
	pub fn from_config<S>(
		config: &BrokerConfig,
		store: Arc<S>,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError>
	where
		S: 'static + StateBackend + SaltBackend + LinkageBackend,
	{
		config.validate()?;

		let states = StateStore::new(store.clone()).with_ttl(config.state_ttl());
		let hasher = config.identity_hasher(store.clone())?;
		let linkages = LinkageRepository::new(store);
		let exchange =
			TokenExchangeClient::new(config.provider.clone(), http_client, error_mapper);

		Ok(Self::new(
			config.credential_selector()?,
			exchange,
			states,
			hasher,
			linkages,
			config.token_issuer()?,
		))
	}

	/// Runs pseudonymous-id derivations through `runner` instead of the calling task.
	pub fn with_hash_runner(mut self, runner: Arc<dyn HashRunner>) -> Self {
		self.hasher = self.hasher.with_runner(runner);

		self
	}

	/// In-process counters for attempts, outcomes, and rejected replays.
	pub fn metrics(&self) -> &LoginMetrics {
		&self.metrics
	}

	/// State store, exposed for housekeeping such as [`StateStore::purge_expired`].
	pub fn states(&self) -> &StateStore {
		&self.states
	}

	/// Linkage repository.
	pub fn linkages(&self) -> &LinkageRepository {
		&self.linkages
	}

	/// Session issuer, exposed so downstream checks can decode issued credentials.
	pub fn token_issuer(&self) -> &AuthTokenIssuer {
		&self.issuer
	}
}
#[cfg(feature = "reqwest")]
impl ReqwestLoginOrchestrator {
	/// Builds an orchestrator over a reqwest client whose timeout is `config.http_timeout_secs`.
	pub fn from_config_with_reqwest<S>(
		config: &BrokerConfig,
		store: Arc<S>,
	) -> Result<Self, ConfigError>
	where
		S: 'static + StateBackend + SaltBackend + LinkageBackend,
	{
		Self::from_config(
			config,
			store,
			ReqwestHttpClient::with_timeout(config.http_timeout())?,
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> Clone for LoginOrchestrator<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			selector: self.selector.clone(),
			exchange: self.exchange.clone(),
			states: self.states.clone(),
			hasher: self.hasher.clone(),
			linkages: self.linkages.clone(),
			issuer: self.issuer.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
impl<C, M> Debug for LoginOrchestrator<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginOrchestrator")
			.field("exchange", &self.exchange)
			.field("states", &self.states)
			.field("default_tenant", self.selector.default_tenant())
			.field("metrics", &self.metrics)
			.finish()
	}
}
