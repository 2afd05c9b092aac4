//! Complete-login: the callback half of the state machine.

// self
use crate::{
	_prelude::*,
	auth::{AuthorizationState, Profile, PseudonymousId, TenantId},
	exchange::TransportErrorMapper,
	http::ProviderHttpClient,
	login::{LoginOrchestrator, LoginStage, stage::StageTracker},
	obs::{FlowKind, FlowSpan},
	session::SessionCredential,
};

/// Result of [`LoginOrchestrator::complete_login`].
#[derive(Clone, Debug)]
pub struct CompletedLogin {
	/// Signed session credential bound to `pseudonymous_id`.
	pub session: SessionCredential,
	/// Pseudonymous identity the session represents.
	pub pseudonymous_id: PseudonymousId,
	/// Tenant the login went through.
	pub tenant: TenantId,
	/// Best-effort display attributes; empty when the profile call failed.
	pub profile: Profile,
	/// Return path captured at begin-login.
	pub return_path: String,
	/// Origin captured at begin-login.
	pub requested_origin: String,
}

impl<C, M> LoginOrchestrator<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Completes a login from the provider callback parameters.
	///
	/// The state is consumed before any provider call, so a failed callback can never be
	/// retried with the same state. An empty `redirect_uri` reuses the one recorded at
	/// begin-login; a non-empty one must match it.
	///
	/// Identity derivation runs Argon2id, by default costing tens of milliseconds of CPU and
	/// 64 MiB of memory on the calling task. Install a runner with
	/// [`LoginOrchestrator::with_hash_runner`] to move it onto a blocking pool.
	pub async fn complete_login(
		&self,
		code: &str,
		state: &str,
		redirect_uri: &str,
	) -> Result<CompletedLogin> {
		const KIND: FlowKind = FlowKind::CompleteLogin;

		let span = FlowSpan::new(KIND, "complete_login");
		let mut tracker = StageTracker::start(KIND, &self.metrics);
		let result =
			span.instrument(self.run_complete(code, state, redirect_uri, &mut tracker)).await;

		tracker.finish(&result, &self.metrics);

		result
	}

	async fn run_complete(
		&self,
		code: &str,
		state: &str,
		redirect_uri: &str,
		tracker: &mut StageTracker,
	) -> Result<CompletedLogin> {
		if code.is_empty() {
			return Err(Error::MissingParameter { name: "code" });
		}
		if state.is_empty() {
			return Err(Error::MissingParameter { name: "state" });
		}

		let record = self.states.consume_and_validate(state).await.inspect_err(|err| {
			if matches!(err, Error::InvalidState { .. }) {
				self.metrics.record_replay_rejected();
			}
		})?;

		tracker.reach(LoginStage::Consumed);

		let redirect_uri = bound_redirect(&record, redirect_uri)?;
		let credential = self.selector.credential(&record.tenant)?;
		let tokens = self.exchange.exchange_code(code, &redirect_uri, &credential).await?;

		tracker.reach(LoginStage::Exchanged);

		let claim = self.exchange.verify(&tokens.id_token, &credential).await?;

		tracker.reach(LoginStage::Verified);

		let profile = self.exchange.fetch_profile(&tokens.access_token).await;
		let pseudonymous_id = self.hasher.derive_id(&claim.subject).await?;

		self.linkages.upsert(&pseudonymous_id, &claim.subject, &credential.id).await?;
		tracker.reach(LoginStage::Linked);

		let session = self.issuer.issue(&pseudonymous_id, &credential.id)?;

		tracker.reach(LoginStage::Issued);

		let AuthorizationState { return_path, requested_origin, .. } = record;

		Ok(CompletedLogin {
			session,
			pseudonymous_id,
			tenant: credential.id.clone(),
			profile,
			return_path,
			requested_origin,
		})
	}
}

fn bound_redirect(record: &AuthorizationState, presented: &str) -> Result<Url> {
	let presented = presented.trim();

	if presented.is_empty() {
		return Ok(record.redirect_uri.clone());
	}

	match Url::parse(presented) {
		Ok(url) if url == record.redirect_uri => Ok(url),
		_ => Err(Error::InvalidState { reason: "redirect URI does not match the login request" }),
	}
}
