//! Accretive persistence of pseudonymous-id to raw-subject linkage.

// self
use crate::{
	_prelude::*,
	auth::{IdentityLinkage, LinkageUpdate, PseudonymousId, TenantId},
	store::LinkageBackend,
};

/// Merge-writes [`IdentityLinkage`] records over a [`LinkageBackend`].
#[derive(Clone)]
pub struct LinkageRepository {
	backend: Arc<dyn LinkageBackend>,
}
impl LinkageRepository {
	/// Wraps `backend`.
	pub fn new(backend: Arc<dyn LinkageBackend>) -> Self {
		Self { backend }
	}

	/// Records that `pseudonymous_id` logged in through `tenant`.
	///
	/// Earlier tenant flags are kept. A record bound to a different raw subject is left untouched
	/// and the call fails with [`Error::PersistenceFailure`].
	pub async fn upsert(
		&self,
		pseudonymous_id: &PseudonymousId,
		raw_subject: &str,
		tenant: &TenantId,
	) -> Result<IdentityLinkage> {
		let update = LinkageUpdate {
			pseudonymous_id: pseudonymous_id.clone(),
			raw_subject: raw_subject.to_owned(),
			tenant: tenant.clone(),
			at: OffsetDateTime::now_utc(),
		};

		Ok(self.backend.merge(update).await?)
	}

	/// Fetches the record for `pseudonymous_id`, if any.
	pub async fn fetch(&self, pseudonymous_id: &PseudonymousId) -> Result<Option<IdentityLinkage>> {
		Ok(self.backend.fetch(pseudonymous_id).await?)
	}
}
impl Debug for LinkageRepository {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("LinkageRepository(..)")
	}
}
