//! Session credentials bound to a pseudonymous identity.

// crates.io
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
// self
use crate::{
	_prelude::*,
	auth::{PseudonymousId, Secret, TenantId},
	error::ConfigError,
};

/// Session lifetime when none is configured.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3_600;

/// Signing settings for [`AuthTokenIssuer`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
	/// HS256 signing key.
	pub signing_key: Secret,
	/// `iss` claim written into every credential.
	pub issuer: String,
	/// `aud` claim written into every credential.
	pub audience: String,
	/// Lifetime in seconds.
	#[serde(default = "default_ttl_secs")]
	pub ttl_secs: i64,
}

/// Claims carried by a session credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
	/// Pseudonymous id; never the raw provider subject.
	pub sub: String,
	/// Tenant the login went through.
	pub tenant: String,
	/// Issuer.
	pub iss: String,
	/// Audience.
	pub aud: String,
	/// Issued-at, seconds since the epoch.
	pub iat: i64,
	/// Expiry, seconds since the epoch.
	pub exp: i64,
	/// Unique credential id.
	pub jti: String,
}

/// Signed credential returned by a completed login.
#[derive(Clone, Debug)]
pub struct SessionCredential {
	/// Compact JWS.
	pub token: Secret,
	/// Expiry instant.
	pub expires_at: OffsetDateTime,
}

/// Issues HS256 session credentials with a process-wide key.
#[derive(Clone)]
pub struct AuthTokenIssuer {
	encoding_key: EncodingKey,
	decoding_key: DecodingKey,
	issuer: String,
	audience: String,
	ttl: Duration,
}
impl AuthTokenIssuer {
	/// Builds an issuer from validated settings.
	pub fn new(settings: &SessionSettings) -> Result<Self, ConfigError> {
		if settings.signing_key.is_empty() {
			return Err(ConfigError::invalid("session signing key must be set"));
		}
		if settings.ttl_secs <= 0 {
			return Err(ConfigError::invalid("session TTL must be positive"));
		}
		if settings.issuer.is_empty() || settings.audience.is_empty() {
			return Err(ConfigError::invalid("session issuer and audience must be set"));
		}

		let key = settings.signing_key.expose().as_bytes();

		Ok(Self {
			encoding_key: EncodingKey::from_secret(key),
			decoding_key: DecodingKey::from_secret(key),
			issuer: settings.issuer.clone(),
			audience: settings.audience.clone(),
			ttl: Duration::seconds(settings.ttl_secs),
		})
	}

	/// Issues a credential for `pseudonymous_id`.
	pub fn issue(
		&self,
		pseudonymous_id: &PseudonymousId,
		tenant: &TenantId,
	) -> Result<SessionCredential> {
		let issued_at = OffsetDateTime::now_utc();
		let expires_at = issued_at + self.ttl;
		let claims = SessionClaims {
			sub: pseudonymous_id.to_string(),
			tenant: tenant.to_string(),
			iss: self.issuer.clone(),
			aud: self.audience.clone(),
			iat: issued_at.unix_timestamp(),
			exp: expires_at.unix_timestamp(),
			jti: mint_jti(),
		};
		let token =
			jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
				.map_err(ConfigError::from)?;

		Ok(SessionCredential { token: Secret::new(token), expires_at })
	}

	/// Validates signature, issuer, audience, and expiry, returning the claims.
	pub fn decode(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
		let mut validation = Validation::new(Algorithm::HS256);

		validation.set_issuer(&[&self.issuer]);
		validation.set_audience(&[&self.audience]);
		validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

		jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
			.map(|data| data.claims)
	}
}
impl Debug for AuthTokenIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthTokenIssuer")
			.field("issuer", &self.issuer)
			.field("audience", &self.audience)
			.field("ttl", &self.ttl)
			.finish()
	}
}

fn default_ttl_secs() -> i64 {
	DEFAULT_SESSION_TTL_SECS
}

fn mint_jti() -> String {
	let mut bytes = [0_u8; 16];

	rand::rng().fill(&mut bytes);

	hex::encode(bytes)
}
