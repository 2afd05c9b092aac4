//! Begin-login: tenant resolution, state minting, and authorize URL construction.

// self
use crate::{
	_prelude::*,
	auth::TenantId,
	error::ConfigError,
	exchange::TransportErrorMapper,
	http::ProviderHttpClient,
	login::{LoginOrchestrator, LoginStage, stage::StageTracker},
	obs::{self, FlowKind, FlowSpan},
	state::StateRequest,
	tenant::{TenantCredential, TenantResolution},
};

/// Result of [`LoginOrchestrator::begin_login`].
#[derive(Clone, Debug)]
pub struct BeginLogin {
	/// Provider authorize URL the user agent should be sent to.
	pub login_url: Url,
	/// State token embedded in `login_url`; echoed back by the provider.
	pub state: String,
	/// Tenant whose credentials the login uses.
	pub tenant: TenantId,
	/// Rule that selected the tenant.
	pub resolution: TenantResolution,
}

impl<C, M> LoginOrchestrator<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts a login for a client at `origin`.
	///
	/// The origin must be allow-listed; `tenant_hint` may be empty; an empty `return_path`
	/// becomes `/`. The returned URL carries `response_type=code`, the resolved tenant's client
	/// id and its first registered redirect URI, a fresh state, and the configured scope.
	pub async fn begin_login(
		&self,
		origin: &str,
		tenant_hint: &str,
		return_path: &str,
	) -> Result<BeginLogin> {
		self.begin_login_with_redirect(origin, tenant_hint, return_path, "").await
	}

	/// Like [`LoginOrchestrator::begin_login`], but sends the provider back to `redirect_uri`.
	///
	/// An empty `redirect_uri` selects the tenant's first registered one. Any other value must
	/// be registered for the resolved tenant or the login fails with [`Error::InvalidOrigin`].
	pub async fn begin_login_with_redirect(
		&self,
		origin: &str,
		tenant_hint: &str,
		return_path: &str,
		redirect_uri: &str,
	) -> Result<BeginLogin> {
		const KIND: FlowKind = FlowKind::BeginLogin;

		let span = FlowSpan::new(KIND, "begin_login");
		let mut tracker = StageTracker::start(KIND, &self.metrics);
		let run = self.run_begin(origin, tenant_hint, return_path, redirect_uri, &mut tracker);
		let result = span.instrument(run).await;

		tracker.finish(&result, &self.metrics);

		result
	}

	async fn run_begin(
		&self,
		origin: &str,
		tenant_hint: &str,
		return_path: &str,
		redirect_uri: &str,
		tracker: &mut StageTracker,
	) -> Result<BeginLogin> {
		let resolved = self.selector.resolve(origin, tenant_hint)?;

		obs::record_resolution(
			&resolved.credential.id,
			resolved.via,
			!tenant_hint.trim().is_empty() && resolved.via != TenantResolution::Hint,
		);

		let return_path = sanitize_return_path(return_path)?;
		let credential = resolved.credential;
		let redirect_uri = select_redirect(&credential, redirect_uri)?;
		let state = self
			.states
			.create(StateRequest {
				tenant: credential.id.clone(),
				requested_origin: resolved.origin,
				return_path,
				redirect_uri: redirect_uri.clone(),
			})
			.await?;
		let login_url = self.exchange.authorize_url(&credential, &redirect_uri, &state.token)?;

		tracker.reach(LoginStage::Initiated);

		Ok(BeginLogin {
			login_url,
			state: state.token,
			tenant: credential.id.clone(),
			resolution: resolved.via,
		})
	}
}

fn select_redirect(credential: &TenantCredential, requested: &str) -> Result<Url> {
	let requested = requested.trim();

	if requested.is_empty() {
		return credential.default_redirect().cloned().ok_or_else(|| {
			ConfigError::invalid(format!("tenant {} has no redirect URI", credential.id)).into()
		});
	}

	Url::parse(requested).ok().filter(|url| credential.allows_redirect(url)).ok_or_else(|| {
		Error::InvalidOrigin {
			reason: format!("redirect URI is not registered for tenant {}", credential.id),
		}
	})
}

/// Normalizes a client-supplied return path.
///
/// Empty input becomes `/`. Anything that is not a same-origin absolute path (a scheme, a
/// protocol-relative `//host`, or a backslash) is rejected with [`Error::InvalidOrigin`].
pub fn sanitize_return_path(return_path: &str) -> Result<String> {
	let path = return_path.trim();

	if path.is_empty() {
		return Ok("/".into());
	}
	if !path.starts_with('/') || path.starts_with("//") || path.contains('\\') {
		return Err(Error::InvalidOrigin { reason: "return path must be a local path".into() });
	}
	if path.chars().any(char::is_control) {
		return Err(Error::InvalidOrigin {
			reason: "return path contains control characters".into(),
		});
	}

	Ok(path.to_owned())
}
