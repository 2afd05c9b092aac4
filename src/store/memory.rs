//! Thread-safe in-memory backend for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{AuthorizationState, IdentityLinkage, IdentitySalt, LinkageUpdate, PseudonymousId},
	store::{LinkageBackend, SaltBackend, StateBackend, StoreError, StoreFuture},
};

type Shared<K, V> = Arc<RwLock<HashMap<K, V>>>;

/// In-process backend implementing every storage contract behind `parking_lot` locks.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	states: Shared<String, AuthorizationState>,
	salts: Shared<String, IdentitySalt>,
	linkages: Shared<PseudonymousId, IdentityLinkage>,
}
impl MemoryStore {
	/// Number of pending authorization states.
	pub fn pending_states(&self) -> usize {
		self.states.read().len()
	}

	/// Number of stored salts.
	pub fn salt_count(&self) -> usize {
		self.salts.read().len()
	}

	fn insert_state_now(
		map: Shared<String, AuthorizationState>,
		state: AuthorizationState,
	) -> Result<(), StoreError> {
		let mut guard = map.write();

		if guard.contains_key(&state.token) {
			return Err(StoreError::Conflict {
				message: "Authorization state already exists".into(),
			});
		}

		guard.insert(state.token.clone(), state);

		Ok(())
	}

	fn purge_now(map: Shared<String, AuthorizationState>, cutoff: OffsetDateTime) -> usize {
		let mut guard = map.write();
		let before = guard.len();

		guard.retain(|_, state| state.created_at > cutoff);

		before - guard.len()
	}

	fn get_or_insert_salt_now(
		map: Shared<String, IdentitySalt>,
		lookup_key: String,
		candidate: IdentitySalt,
	) -> IdentitySalt {
		map.write().entry(lookup_key).or_insert(candidate).clone()
	}

	fn merge_now(
		map: Shared<PseudonymousId, IdentityLinkage>,
		update: LinkageUpdate,
	) -> Result<IdentityLinkage, StoreError> {
		let mut guard = map.write();
		let key = update.pseudonymous_id.clone();
		let merged = IdentityLinkage::merge(guard.get(&key).cloned(), update)?;

		guard.insert(key, merged.clone());

		Ok(merged)
	}
}
impl StateBackend for MemoryStore {
	fn insert(&self, state: AuthorizationState) -> StoreFuture<'_, ()> {
		let map = self.states.clone();

		Box::pin(async move { Self::insert_state_now(map, state) })
	}

	fn take<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<AuthorizationState>> {
		let map = self.states.clone();

		Box::pin(async move { Ok(map.write().remove(token)) })
	}

	fn purge_created_before(&self, cutoff: OffsetDateTime) -> StoreFuture<'_, usize> {
		let map = self.states.clone();

		Box::pin(async move { Ok(Self::purge_now(map, cutoff)) })
	}
}
impl SaltBackend for MemoryStore {
	fn get_or_insert<'a>(
		&'a self,
		lookup_key: &'a str,
		candidate: IdentitySalt,
	) -> StoreFuture<'a, IdentitySalt> {
		let map = self.salts.clone();
		let lookup_key = lookup_key.to_owned();

		Box::pin(async move { Ok(Self::get_or_insert_salt_now(map, lookup_key, candidate)) })
	}
}
impl LinkageBackend for MemoryStore {
	fn merge(&self, update: LinkageUpdate) -> StoreFuture<'_, IdentityLinkage> {
		let map = self.linkages.clone();

		Box::pin(async move { Self::merge_now(map, update) })
	}

	fn fetch<'a>(&'a self, id: &'a PseudonymousId) -> StoreFuture<'a, Option<IdentityLinkage>> {
		let map = self.linkages.clone();

		Box::pin(async move { Ok(map.read().get(id).cloned()) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::TenantId;

	fn state(token: &str, created_at: OffsetDateTime) -> AuthorizationState {
		AuthorizationState {
			token: token.into(),
			created_at,
			tenant: TenantId::new("tenant-a").expect("Tenant fixture should be valid."),
			requested_origin: "https://tenant-a.example".into(),
			return_path: "/".into(),
			redirect_uri: Url::parse("https://auth.example/callback/a")
				.expect("Redirect fixture should parse."),
		}
	}

	#[tokio::test]
	async fn states_are_unique_and_taken_once() {
		let store = MemoryStore::default();
		let now = OffsetDateTime::now_utc();

		store.insert(state("s1", now)).await.expect("First insert should pass.");

		assert!(matches!(
			store.insert(state("s1", now)).await,
			Err(StoreError::Conflict { .. })
		));
		assert!(store.take("s1").await.expect("Take should pass.").is_some());
		assert!(store.take("s1").await.expect("Take should pass.").is_none());
	}

	#[tokio::test]
	async fn first_salt_wins_and_purge_respects_cutoff() {
		let store = MemoryStore::default();
		let now = OffsetDateTime::now_utc();
		let first = store
			.get_or_insert("key", IdentitySalt::generate(now))
			.await
			.expect("Salt insert should pass.");
		let second = store
			.get_or_insert("key", IdentitySalt::generate(now))
			.await
			.expect("Salt lookup should pass.");

		assert_eq!(first.key_material, second.key_material);

		store.insert(state("old", now - Duration::minutes(20))).await.expect("Insert should pass.");
		store.insert(state("new", now)).await.expect("Insert should pass.");

		let removed = store
			.purge_created_before(now - Duration::minutes(10))
			.await
			.expect("Purge should pass.");

		assert_eq!(removed, 1);
		assert_eq!(store.pending_states(), 1);
	}
}
