//! Tenant resolution: maps a request origin and tenant hint onto static client credentials.
//!
//! Resolution is a pure lookup against a table built once at startup. The origin is always
//! checked against the allow-list first; a recognized hint then wins, followed by the tenant that
//! claims the origin, followed by the designated default tenant.

// std
use std::collections::HashSet;
// self
use crate::{
	_prelude::*,
	auth::{Secret, TenantId},
	error::ConfigError,
};

/// Static provider credentials for one tenant application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantCredential {
	/// Tenant identifier; also the tenant flag written to linkage records.
	pub id: TenantId,
	/// OAuth client id registered with the provider.
	pub client_id: String,
	/// OAuth client secret; never leaves the server.
	pub client_secret: Secret,
	/// Origins that select this tenant when no hint is given.
	#[serde(default)]
	pub origins: Vec<String>,
	/// Redirect URIs registered for this tenant; the first one is used by begin-login.
	pub redirect_uris: Vec<Url>,
}
impl TenantCredential {
	/// Redirect URI placed in authorize URLs.
	pub fn default_redirect(&self) -> Option<&Url> {
		self.redirect_uris.first()
	}

	/// Returns `true` when `uri` is one of the registered redirect URIs.
	pub fn allows_redirect(&self, uri: &Url) -> bool {
		self.redirect_uris.iter().any(|allowed| allowed == uri)
	}
}

/// Which rule selected the tenant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TenantResolution {
	/// A recognized tenant hint.
	Hint,
	/// The tenant that claims the request origin.
	Origin,
	/// Neither matched; the designated default tenant.
	Default,
}
impl TenantResolution {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Hint => "hint",
			Self::Origin => "origin",
			Self::Default => "default",
		}
	}
}

/// Outcome of [`CredentialSelector::resolve`].
#[derive(Clone, Debug)]
pub struct ResolvedTenant {
	/// Selected credential.
	pub credential: Arc<TenantCredential>,
	/// Rule that selected it.
	pub via: TenantResolution,
	/// Normalized request origin (`scheme://host[:port]`).
	pub origin: String,
}

/// Immutable tenant resolution table.
#[derive(Clone, Debug)]
pub struct CredentialSelector {
	tenants: HashMap<TenantId, Arc<TenantCredential>>,
	origin_owners: HashMap<String, TenantId>,
	allowed_origins: HashSet<String>,
	default_credential: Arc<TenantCredential>,
}
impl CredentialSelector {
	/// Builds the table.
	///
	/// `shared_origins` are allowed without selecting a tenant; every tenant's own origins are
	/// allowed implicitly. Origins are normalized and may be claimed by one tenant only.
	pub fn new(
		tenants: impl IntoIterator<Item = TenantCredential>,
		default_tenant: TenantId,
		shared_origins: impl IntoIterator<Item = String>,
	) -> Result<Self, ConfigError> {
		let mut table = HashMap::new();
		let mut origin_owners = HashMap::new();
		let mut allowed_origins = HashSet::new();

		for mut tenant in tenants {
			if tenant.client_id.trim().is_empty() || tenant.client_secret.is_empty() {
				return Err(ConfigError::invalid(format!(
					"tenant {} needs a client id and a client secret",
					tenant.id
				)));
			}
			if tenant.redirect_uris.is_empty() {
				return Err(ConfigError::invalid(format!(
					"tenant {} needs at least one redirect URI",
					tenant.id
				)));
			}

			let mut normalized = Vec::with_capacity(tenant.origins.len());

			for origin in &tenant.origins {
				let origin = normalize_origin(origin).map_err(|reason| {
					ConfigError::invalid(format!("tenant {} origin is invalid: {reason}", tenant.id))
				})?;

				if let Some(owner) = origin_owners.insert(origin.clone(), tenant.id.clone()) {
					return Err(ConfigError::invalid(format!(
						"origin {origin} is claimed by both {owner} and {}",
						tenant.id
					)));
				}

				allowed_origins.insert(origin.clone());
				normalized.push(origin);
			}

			tenant.origins = normalized;

			let id = tenant.id.clone();

			if table.insert(id.clone(), Arc::new(tenant)).is_some() {
				return Err(ConfigError::invalid(format!("tenant {id} is declared twice")));
			}
		}

		let default_credential = table.get(&default_tenant).cloned().ok_or_else(|| {
			ConfigError::invalid(format!("default tenant {default_tenant} is not declared"))
		})?;

		for origin in shared_origins {
			let origin = normalize_origin(&origin).map_err(|reason| {
				ConfigError::invalid(format!("shared origin is invalid: {reason}"))
			})?;

			allowed_origins.insert(origin);
		}

		Ok(Self { tenants: table, origin_owners, allowed_origins, default_credential })
	}

	/// Resolves the tenant for a begin-login request.
	///
	/// Fails with [`Error::InvalidOrigin`] when the origin is malformed or not allow-listed, and
	/// with [`Error::MissingParameter`] when it is empty.
	pub fn resolve(&self, origin: &str, tenant_hint: &str) -> Result<ResolvedTenant> {
		if origin.trim().is_empty() {
			return Err(Error::MissingParameter { name: "origin" });
		}

		let origin = normalize_origin(origin).map_err(|reason| Error::InvalidOrigin { reason })?;

		if !self.allowed_origins.contains(&origin) {
			return Err(Error::InvalidOrigin { reason: format!("{origin} is not allow-listed") });
		}

		let hint = tenant_hint.trim();

		if let Some(credential) = (!hint.is_empty()).then(|| self.tenants.get(hint)).flatten() {
			return Ok(ResolvedTenant {
				credential: credential.clone(),
				via: TenantResolution::Hint,
				origin,
			});
		}
		if let Some(credential) = self.origin_owners.get(&origin).and_then(|id| self.tenants.get(id))
		{
			return Ok(ResolvedTenant {
				credential: credential.clone(),
				via: TenantResolution::Origin,
				origin,
			});
		}

		Ok(ResolvedTenant {
			credential: self.default_credential.clone(),
			via: TenantResolution::Default,
			origin,
		})
	}

	/// Credential for a tenant recorded in an authorization state.
	pub fn credential(&self, tenant: &TenantId) -> Result<Arc<TenantCredential>> {
		self.tenants.get(tenant).cloned().ok_or_else(|| {
			ConfigError::invalid(format!("tenant {tenant} is no longer configured")).into()
		})
	}

	/// Designated fallback tenant.
	pub fn default_tenant(&self) -> &TenantId {
		&self.default_credential.id
	}
}

/// Normalizes an origin header value to its ASCII serialization (`scheme://host[:port]`).
pub fn normalize_origin(origin: &str) -> Result<String, String> {
	let url = Url::parse(origin.trim()).map_err(|e| format!("{origin:?} is not a URL: {e}"))?;
	let origin = url.origin();

	if !origin.is_tuple() {
		return Err(format!("{:?} has an opaque origin", url.as_str()));
	}

	Ok(origin.ascii_serialization())
}
