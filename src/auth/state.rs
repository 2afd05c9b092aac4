//! Single-use authorization state correlating a login request with its callback.

// self
use crate::{_prelude::*, auth::TenantId};

/// Anti-CSRF record minted by begin-login and destroyed by complete-login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
	/// Opaque random token; also the storage key.
	pub token: String,
	/// Instant the record was minted.
	pub created_at: OffsetDateTime,
	/// Tenant resolved at begin-login; the callback reuses its credentials.
	pub tenant: TenantId,
	/// Normalized origin that requested the login.
	pub requested_origin: String,
	/// Application path the client returns to after login.
	pub return_path: String,
	/// Redirect URI embedded in the authorize URL.
	pub redirect_uri: Url,
}
impl AuthorizationState {
	/// Returns `true` once the record is at least `ttl` old at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		now - self.created_at >= ttl
	}
}
impl Debug for AuthorizationState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationState")
			.field("token", &"<redacted>")
			.field("created_at", &self.created_at)
			.field("tenant", &self.tenant)
			.field("requested_origin", &self.requested_origin)
			.field("return_path", &self.return_path)
			.field("redirect_uri", &self.redirect_uri)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn fixture(created_at: OffsetDateTime) -> AuthorizationState {
		AuthorizationState {
			token: "0123456789abcdef0123456789abcdef".into(),
			created_at,
			tenant: TenantId::new("tenant-a").expect("Tenant fixture should be valid."),
			requested_origin: "https://tenant-a.example".into(),
			return_path: "/".into(),
			redirect_uri: Url::parse("https://auth.example/callback/a")
				.expect("Redirect fixture should parse."),
		}
	}

	#[test]
	fn expiry_is_inclusive_of_the_ttl_boundary() {
		let created = macros::datetime!(2025-11-10 12:00 UTC);
		let state = fixture(created);
		let ttl = Duration::minutes(10);

		assert!(!state.is_expired_at(created + Duration::minutes(9), ttl));
		assert!(state.is_expired_at(created + ttl, ttl));
		assert!(state.is_expired_at(created + Duration::hours(1), ttl));
	}

	#[test]
	fn debug_redacts_token() {
		let rendered = format!("{:?}", fixture(macros::datetime!(2025-11-10 12:00 UTC)));

		assert!(!rendered.contains("0123456789abcdef"));
		assert!(rendered.contains("<redacted>"));
	}
}
