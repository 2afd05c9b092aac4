// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, ProviderId},
	provider::{DEFAULT_SCOPE, ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Descriptor identifier is invalid.
	#[error(transparent)]
	InvalidId(#[from] IdentifierError),
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Verification endpoint is required.
	#[error("Missing verify endpoint.")]
	MissingVerifyEndpoint,
	/// Profile endpoint is required.
	#[error("Missing profile endpoint.")]
	MissingProfileEndpoint,
	/// At least one issuer must be accepted.
	#[error("Descriptor must accept at least one issuer.")]
	MissingIssuers,
	/// Scope cannot be blank.
	#[error("Descriptor scope cannot be empty.")]
	EmptyScope,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A built-in endpoint failed to parse.
	#[error("Endpoint {url} is not a valid URL: {reason}.")]
	InvalidUrl {
		/// Offending URL.
		url: String,
		/// Parser message.
		reason: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ProviderId,
	/// Authorization endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint.
	pub token_endpoint: Option<Url>,
	/// Verification endpoint.
	pub verify_endpoint: Option<Url>,
	/// Profile endpoint.
	pub profile_endpoint: Option<Url>,
	/// Accepted issuers.
	pub issuers: Vec<String>,
	/// Requested scope.
	pub scope: String,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			authorization_endpoint: None,
			token_endpoint: None,
			verify_endpoint: None,
			profile_endpoint: None,
			issuers: Vec::new(),
			scope: DEFAULT_SCOPE.into(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the verification endpoint.
	pub fn verify_endpoint(mut self, url: Url) -> Self {
		self.verify_endpoint = Some(url);

		self
	}

	/// Sets the profile endpoint.
	pub fn profile_endpoint(mut self, url: Url) -> Self {
		self.profile_endpoint = Some(url);

		self
	}

	/// Adds an accepted issuer.
	pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuers.push(issuer.into());

		self
	}

	/// Overrides the requested scope.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = scope.into();

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let verify = self.verify_endpoint.ok_or(ProviderDescriptorError::MissingVerifyEndpoint)?;
		let profile =
			self.profile_endpoint.ok_or(ProviderDescriptorError::MissingProfileEndpoint)?;
		let descriptor = ProviderDescriptor {
			id: self.id,
			endpoints: ProviderEndpoints { authorization, token, verify, profile },
			issuers: self.issuers,
			scope: self.scope,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	pub(crate) fn validate(&self) -> Result<(), ProviderDescriptorError> {
		if self.issuers.iter().all(|issuer| issuer.trim().is_empty()) {
			return Err(ProviderDescriptorError::MissingIssuers);
		}
		if self.scope.trim().is_empty() {
			return Err(ProviderDescriptorError::EmptyScope);
		}

		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("verify", &self.endpoints.verify)?;
		validate_endpoint("profile", &self.endpoints.profile)?;

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() != "https" {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}
