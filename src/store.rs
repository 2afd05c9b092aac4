//! Storage contracts and built-in backends for states, salts, and linkage records.
//!
//! Every method that the login flow relies on for correctness is a single atomic operation on
//! the backend: [`StateBackend::take`] reads and deletes in one step, and
//! [`SaltBackend::get_or_insert`] inserts only when no salt exists. Implementations backed by a
//! database must map these onto a conditional delete / insert-if-absent or a transaction.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AuthorizationState, IdentityLinkage, IdentitySalt, LinkageUpdate, PseudonymousId},
};

/// Boxed future returned by every backend operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable home of [`AuthorizationState`] records keyed by token.
pub trait StateBackend
where
	Self: Send + Sync,
{
	/// Persists a freshly minted state. Fails with [`StoreError::Conflict`] if the token exists.
	fn insert(&self, state: AuthorizationState) -> StoreFuture<'_, ()>;

	/// Atomically removes and returns the record for `token`, if present.
	///
	/// Two concurrent calls for the same token must never both observe `Some`.
	fn take<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<AuthorizationState>>;

	/// Deletes every record created at or before `cutoff`, returning how many were removed.
	fn purge_created_before(&self, cutoff: OffsetDateTime) -> StoreFuture<'_, usize>;
}

/// Durable home of [`IdentitySalt`] records keyed by a one-way lookup hash.
pub trait SaltBackend
where
	Self: Send + Sync,
{
	/// Returns the stored salt for `lookup_key`, inserting `candidate` first if none exists.
	///
	/// Concurrent callers for the same key must all observe the same winning salt.
	fn get_or_insert<'a>(
		&'a self,
		lookup_key: &'a str,
		candidate: IdentitySalt,
	) -> StoreFuture<'a, IdentitySalt>;
}

/// Durable home of [`IdentityLinkage`] records keyed by pseudonymous id.
pub trait LinkageBackend
where
	Self: Send + Sync,
{
	/// Applies [`IdentityLinkage::merge`] to the stored record atomically and returns the result.
	fn merge(&self, update: LinkageUpdate) -> StoreFuture<'_, IdentityLinkage>;

	/// Fetches the record for `id`, if present.
	fn fetch<'a>(&'a self, id: &'a PseudonymousId) -> StoreFuture<'a, Option<IdentityLinkage>>;
}

/// Error type produced by backend implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// A write would violate a record invariant.
	#[error("Conflicting write: {message}.")]
	Conflict {
		/// Human-readable error payload.
		message: String,
	},
}
