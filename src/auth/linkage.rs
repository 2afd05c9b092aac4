//! Identity-linkage records mapping pseudonymous ids to raw subjects and tenant membership.

// std
use std::collections::BTreeSet;
// self
use crate::{
	_prelude::*,
	auth::{PseudonymousId, TenantId},
	store::StoreError,
};

/// Monotonic set of tenants a pseudonymous identity has logged in through.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantFlags(BTreeSet<TenantId>);
impl TenantFlags {
	/// Sets the flag for `tenant`, returning `true` when it was not set before.
	pub fn set(&mut self, tenant: TenantId) -> bool {
		self.0.insert(tenant)
	}

	/// Returns `true` when the flag for `tenant` is set.
	pub fn contains(&self, tenant: &str) -> bool {
		self.0.contains(tenant)
	}

	/// Iterates over the set flags in tenant order.
	pub fn iter(&self) -> impl Iterator<Item = &TenantId> {
		self.0.iter()
	}

	/// Number of set flags.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no flag is set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl<const N: usize> From<[TenantId; N]> for TenantFlags {
	fn from(value: [TenantId; N]) -> Self {
		Self(BTreeSet::from(value))
	}
}

/// Merge-write applied to a linkage record after a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct LinkageUpdate {
	/// Record key.
	pub pseudonymous_id: PseudonymousId,
	/// Verified provider subject behind the pseudonymous id.
	pub raw_subject: String,
	/// Tenant the login went through.
	pub tenant: TenantId,
	/// Instant of the write.
	pub at: OffsetDateTime,
}
impl Debug for LinkageUpdate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LinkageUpdate")
			.field("pseudonymous_id", &self.pseudonymous_id)
			.field("raw_subject", &"<redacted>")
			.field("tenant", &self.tenant)
			.field("at", &self.at)
			.finish()
	}
}

/// Persisted mapping from pseudonymous id to raw subject and tenant flags.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLinkage {
	/// Primary key.
	pub pseudonymous_id: PseudonymousId,
	/// Raw provider subject; fixed once written.
	pub raw_subject: String,
	/// Tenants this identity has logged in through; only ever grows.
	pub tenant_flags: TenantFlags,
	/// Instant of the last write.
	pub updated_at: OffsetDateTime,
}
impl IdentityLinkage {
	/// Applies `update` on top of `existing`, accreting the tenant flag.
	///
	/// A stored raw subject that differs from the update is a conflict; the stored record must
	/// then be left untouched by the caller.
	pub fn merge(existing: Option<Self>, update: LinkageUpdate) -> Result<Self, StoreError> {
		let LinkageUpdate { pseudonymous_id, raw_subject, tenant, at } = update;

		match existing {
			Some(mut record) => {
				if record.raw_subject != raw_subject {
					return Err(StoreError::Conflict {
						message: format!(
							"Linkage {pseudonymous_id} is bound to a different raw subject"
						),
					});
				}

				record.tenant_flags.set(tenant);
				record.updated_at = at;

				Ok(record)
			},
			None => {
				let mut tenant_flags = TenantFlags::default();

				tenant_flags.set(tenant);

				Ok(Self { pseudonymous_id, raw_subject, tenant_flags, updated_at: at })
			},
		}
	}
}
impl Debug for IdentityLinkage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityLinkage")
			.field("pseudonymous_id", &self.pseudonymous_id)
			.field("raw_subject", &"<redacted>")
			.field("tenant_flags", &self.tenant_flags)
			.field("updated_at", &self.updated_at)
			.finish()
	}
}
