//! Provider descriptor data structures shared by every login.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// Scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "openid profile";

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint the user agent is sent to.
	pub authorization: Url,
	/// Token endpoint used for the code exchange.
	pub token: Url,
	/// Endpoint verifying id tokens and returning their claims.
	pub verify: Url,
	/// Endpoint returning display attributes for a bearer access token.
	pub profile: Url,
}

/// Immutable provider descriptor loaded once at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Issuer strings accepted in verified claims.
	pub issuers: Vec<String>,
	/// Space-delimited scope placed in authorize URLs.
	#[serde(default = "default_scope")]
	pub scope: String,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Descriptor for LINE Login v2.1.
	pub fn line() -> Result<Self, ProviderDescriptorError> {
		Self::builder(ProviderId::new("line")?)
			.authorization_endpoint(parse("https://access.line.me/oauth2/v2.1/authorize")?)
			.token_endpoint(parse("https://api.line.me/oauth2/v2.1/token")?)
			.verify_endpoint(parse("https://api.line.me/oauth2/v2.1/verify")?)
			.profile_endpoint(parse("https://api.line.me/v2/profile")?)
			.issuer("https://access.line.me")
			.build()
	}

	/// Returns `true` when `issuer` is on the allow-list.
	pub fn accepts_issuer(&self, issuer: &str) -> bool {
		self.issuers.iter().any(|allowed| allowed == issuer)
	}
}

fn default_scope() -> String {
	DEFAULT_SCOPE.into()
}

fn parse(value: &str) -> Result<Url, ProviderDescriptorError> {
	Url::parse(value)
		.map_err(|e| ProviderDescriptorError::InvalidUrl { url: value.into(), reason: e.to_string() })
}
