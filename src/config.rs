//! Static broker configuration loaded once at startup.
//!
//! [`BrokerConfig`] is a plain serde document. Loading it from the environment or a secret
//! manager is left to the embedding process; [`BrokerConfig::from_json_slice`] and
//! [`BrokerConfig::from_path`] cover the common file-based case and report the failing field
//! path on malformed input.

// std
use std::{fs, path::Path};
// self
use crate::{
	_prelude::*,
	auth::{Secret, TenantId},
	error::ConfigError,
	identity::{HashParams, IdentityHasher},
	provider::ProviderDescriptor,
	session::{AuthTokenIssuer, SessionSettings},
	state::DEFAULT_STATE_TTL,
	store::SaltBackend,
	tenant::{CredentialSelector, TenantCredential},
};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Secrets and cost parameters for pseudonymous-id derivation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySettings {
	/// Keys the salt lookup hash.
	pub lookup_secret: Secret,
	/// Global pepper mixed into every derivation.
	pub pepper: Secret,
	/// Argon2id cost parameters.
	#[serde(default)]
	pub argon2: HashParams,
}

/// Complete broker configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
	/// Identity provider endpoints, issuers, and scope.
	pub provider: ProviderDescriptor,
	/// Tenant credential table.
	pub tenants: Vec<TenantCredential>,
	/// Tenant used when neither hint nor origin selects one.
	pub default_tenant: TenantId,
	/// Origins allowed without selecting a tenant.
	#[serde(default)]
	pub allowed_origins: Vec<String>,
	/// Lifetime of an unconsumed authorization state, in seconds.
	#[serde(default = "default_state_ttl_secs")]
	pub state_ttl_secs: i64,
	/// Timeout applied to every provider call, in seconds.
	#[serde(default = "default_http_timeout_secs")]
	pub http_timeout_secs: u64,
	/// Identity derivation settings.
	pub identity: IdentitySettings,
	/// Session credential settings.
	pub session: SessionSettings,
}
impl BrokerConfig {
	/// Parses and validates a JSON document.
	pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_slice(bytes);
		let config: Self = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ConfigError::Parse { source })?;

		config.validate()?;

		Ok(config)
	}

	/// Reads, parses, and validates a JSON document at `path`.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let bytes = fs::read(path)
			.map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;

		Self::from_json_slice(&bytes)
	}

	/// Checks every semantic rule the individual components would otherwise reject lazily.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.provider.validate()?;

		if self.tenants.is_empty() {
			return Err(ConfigError::invalid("at least one tenant must be configured"));
		}
		if self.state_ttl_secs <= 0 {
			return Err(ConfigError::invalid("state TTL must be positive"));
		}
		if self.http_timeout_secs == 0 {
			return Err(ConfigError::invalid("HTTP timeout must be positive"));
		}
		if self.identity.lookup_secret.is_empty() || self.identity.pepper.is_empty() {
			return Err(ConfigError::invalid("identity lookup secret and pepper must be set"));
		}

		self.credential_selector()?;
		self.token_issuer()?;

		Ok(())
	}

	/// Tenant resolution table.
	pub fn credential_selector(&self) -> Result<CredentialSelector, ConfigError> {
		CredentialSelector::new(
			self.tenants.iter().cloned(),
			self.default_tenant.clone(),
			self.allowed_origins.iter().cloned(),
		)
	}

	/// Session issuer.
	pub fn token_issuer(&self) -> Result<AuthTokenIssuer, ConfigError> {
		AuthTokenIssuer::new(&self.session)
	}

	/// Identity hasher over `salts`.
	pub fn identity_hasher(
		&self,
		salts: Arc<dyn SaltBackend>,
	) -> Result<IdentityHasher, ConfigError> {
		IdentityHasher::new(
			salts,
			self.identity.lookup_secret.clone(),
			self.identity.pepper.clone(),
			self.identity.argon2,
		)
	}

	/// State lifetime.
	pub fn state_ttl(&self) -> Duration {
		Duration::seconds(self.state_ttl_secs)
	}

	/// Provider call timeout.
	pub fn http_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.http_timeout_secs)
	}
}

fn default_state_ttl_secs() -> i64 {
	DEFAULT_STATE_TTL.whole_seconds()
}

fn default_http_timeout_secs() -> u64 {
	DEFAULT_HTTP_TIMEOUT_SECS
}
