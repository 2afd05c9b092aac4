//! Ephemeral values produced by the provider calls: token pair, verified claim, and profile.

// self
use crate::{_prelude::*, auth::Secret};

/// Tokens returned by the provider's token endpoint.
#[derive(Clone, Debug)]
pub struct ProviderTokens {
	/// Bearer token for the profile endpoint.
	pub access_token: Secret,
	/// Identity token submitted to the verification endpoint.
	pub id_token: Secret,
}

/// Identity claim that passed audience, issuer, and expiry checks. Never persisted as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifiedIdentityClaim {
	/// Provider-scoped opaque subject.
	pub subject: String,
	/// Audience the token was issued for (the tenant client id).
	pub audience: String,
	/// Issuer that minted the token.
	pub issuer: String,
	/// Expiry instant reported by the provider.
	pub expires_at: OffsetDateTime,
}
impl Debug for VerifiedIdentityClaim {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VerifiedIdentityClaim")
			.field("subject", &"<redacted>")
			.field("audience", &self.audience)
			.field("issuer", &self.issuer)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Display attributes fetched on a best-effort basis; every field may be absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
	/// Provider user id as echoed by the profile endpoint.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	/// Display name.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
	/// Avatar URL.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub picture_url: Option<String>,
	/// Free-form status line.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status_message: Option<String>,
}
impl Profile {
	/// Returns `true` when no attribute is present.
	pub fn is_empty(&self) -> bool {
		self == &Self::default()
	}
}
