//! Single-use authorization state: minting, atomic consumption, and expiry.

// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	auth::{AuthorizationState, TenantId},
	store::StateBackend,
};

/// Lifetime of an unconsumed state when none is configured.
pub const DEFAULT_STATE_TTL: Duration = Duration::minutes(10);

const TOKEN_BYTES: usize = 16;

/// Fields captured at begin-login and handed back on a successful consume.
#[derive(Clone, Debug)]
pub struct StateRequest {
	/// Tenant resolved for the login.
	pub tenant: TenantId,
	/// Normalized requesting origin.
	pub requested_origin: String,
	/// Sanitized return path.
	pub return_path: String,
	/// Redirect URI placed in the authorize URL.
	pub redirect_uri: Url,
}

/// Mints and consumes [`AuthorizationState`] records over a [`StateBackend`].
#[derive(Clone)]
pub struct StateStore {
	backend: Arc<dyn StateBackend>,
	ttl: Duration,
}
impl StateStore {
	/// Wraps `backend` with the default TTL.
	pub fn new(backend: Arc<dyn StateBackend>) -> Self {
		Self { backend, ttl: DEFAULT_STATE_TTL }
	}

	/// Overrides the TTL.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;

		self
	}

	/// Configured TTL.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Mints a fresh token (32 hex characters from 16 CSPRNG bytes) and persists its record.
	///
	/// Records that already expired are purged first, so abandoned logins do not accumulate even
	/// when nothing calls [`StateStore::purge_expired`].
	pub async fn create(&self, request: StateRequest) -> Result<AuthorizationState> {
		let state = AuthorizationState {
			token: mint_token(),
			created_at: OffsetDateTime::now_utc(),
			tenant: request.tenant,
			requested_origin: request.requested_origin,
			return_path: request.return_path,
			redirect_uri: request.redirect_uri,
		};

		self.backend.purge_created_before(state.created_at - self.ttl).await?;
		self.backend.insert(state.clone()).await?;

		Ok(state)
	}

	/// Atomically removes the record for `token` and returns it if it has not expired.
	///
	/// The record is deleted even when expired, so a token can never be consumed twice. Unknown,
	/// already-consumed, and expired tokens all fail with [`Error::InvalidState`].
	pub async fn consume_and_validate(&self, token: &str) -> Result<AuthorizationState> {
		self.consume_at(token, OffsetDateTime::now_utc()).await
	}

	pub(crate) async fn consume_at(
		&self,
		token: &str,
		now: OffsetDateTime,
	) -> Result<AuthorizationState> {
		let state = self
			.backend
			.take(token)
			.await?
			.ok_or(Error::InvalidState { reason: "unknown or already consumed state" })?;

		if state.is_expired_at(now, self.ttl) {
			return Err(Error::InvalidState { reason: "state has expired" });
		}

		Ok(state)
	}

	/// Deletes every record that expired at `now`, returning how many were removed.
	pub async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize> {
		Ok(self.backend.purge_created_before(now - self.ttl).await?)
	}
}
impl Debug for StateStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StateStore").field("ttl", &self.ttl).finish()
	}
}

fn mint_token() -> String {
	let mut bytes = [0_u8; TOKEN_BYTES];

	rand::rng().fill(&mut bytes);

	hex::encode(bytes)
}
