//! Per-subject salt records mixed into pseudonymous-id derivation.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
// self
use crate::_prelude::*;

const SALT_BYTES: usize = 16;

/// Persisted salt for one raw subject, keyed by a one-way lookup hash of that subject.
///
/// Immutable once stored; regenerating it would change the subject's pseudonymous id.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySalt {
	/// Random key material (base64url, no padding).
	pub key_material: String,
	/// Instant the salt was generated.
	pub created_at: OffsetDateTime,
}
impl IdentitySalt {
	/// Generates fresh key material from the thread-local CSPRNG.
	pub fn generate(created_at: OffsetDateTime) -> Self {
		let mut bytes = [0_u8; SALT_BYTES];

		rand::rng().fill(&mut bytes);

		Self { key_material: URL_SAFE_NO_PAD.encode(bytes), created_at }
	}
}
impl Debug for IdentitySalt {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentitySalt")
			.field("key_material", &"<redacted>")
			.field("created_at", &self.created_at)
			.finish()
	}
}
