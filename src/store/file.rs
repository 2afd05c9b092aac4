//! Simple file-backed backend for single-node deployments.

// std
use std::{
	fs::{self, File, OpenOptions},
	io::Write,
	path::{Path, PathBuf},
};
// crates.io
use fs2::FileExt;
// self
use crate::{
	_prelude::*,
	auth::{AuthorizationState, IdentityLinkage, IdentitySalt, LinkageUpdate, PseudonymousId},
	store::{LinkageBackend, SaltBackend, StateBackend, StoreError, StoreFuture},
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Snapshot {
	states: HashMap<String, AuthorizationState>,
	salts: HashMap<String, IdentitySalt>,
	linkages: HashMap<PseudonymousId, IdentityLinkage>,
}

/// Persists every collection to one JSON file.
///
/// Every operation takes an exclusive OS lock on a `<file>.lock` sidecar, re-reads the snapshot
/// under that lock, and writes the whole snapshot back before releasing it. Any number of
/// handles, in one process or several, may therefore share a path: take and get-or-insert stay
/// atomic across all of them. Operations block the calling thread on file I/O.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	lock_path: PathBuf,
	gate: Arc<Mutex<()>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path and checks that existing data parses.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();
		let mut lock_path = path.clone().into_os_string();

		lock_path.push(".lock");

		let store = Self { path, lock_path: lock_path.into(), gate: Default::default() };

		store.transact(|_| Ok(((), false)))?;

		Ok(store)
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Snapshot::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	/// Locks the sidecar file; the lock is released when the returned handle drops.
	fn lock_exclusive(&self) -> Result<File, StoreError> {
		Self::ensure_parent_exists(&self.lock_path)?;

		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(false)
			.open(&self.lock_path)
			.map_err(|e| StoreError::Backend {
				message: format!("Failed to open {}: {e}", self.lock_path.display()),
			})?;

		file.lock_exclusive().map_err(|e| StoreError::Backend {
			message: format!("Failed to lock {}: {e}", self.lock_path.display()),
		})?;

		Ok(file)
	}

	fn persist(&self, contents: &Snapshot) -> Result<(), StoreError> {
		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	/// Runs `mutate` against the on-disk snapshot while holding the file lock and persists the
	/// result when `mutate` reports it dirty.
	fn transact<T>(
		&self,
		mutate: impl FnOnce(&mut Snapshot) -> Result<(T, bool), StoreError>,
	) -> Result<T, StoreError> {
		let _gate = self.gate.lock();
		let _lock = self.lock_exclusive()?;
		let mut snapshot = Self::load_snapshot(&self.path)?;
		let (value, dirty) = mutate(&mut snapshot)?;

		if dirty {
			self.persist(&snapshot)?;
		}

		Ok(value)
	}
}
impl StateBackend for FileStore {
	fn insert(&self, state: AuthorizationState) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.transact(|snapshot| {
				if snapshot.states.contains_key(&state.token) {
					return Err(StoreError::Conflict {
						message: "Authorization state already exists".into(),
					});
				}

				snapshot.states.insert(state.token.clone(), state);

				Ok(((), true))
			})
		})
	}

	fn take<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<AuthorizationState>> {
		Box::pin(async move {
			self.transact(|snapshot| {
				let taken = snapshot.states.remove(token);
				let dirty = taken.is_some();

				Ok((taken, dirty))
			})
		})
	}

	fn purge_created_before(&self, cutoff: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			self.transact(|snapshot| {
				let before = snapshot.states.len();

				snapshot.states.retain(|_, state| state.created_at > cutoff);

				let removed = before - snapshot.states.len();

				Ok((removed, removed > 0))
			})
		})
	}
}
impl SaltBackend for FileStore {
	fn get_or_insert<'a>(
		&'a self,
		lookup_key: &'a str,
		candidate: IdentitySalt,
	) -> StoreFuture<'a, IdentitySalt> {
		Box::pin(async move {
			self.transact(|snapshot| match snapshot.salts.get(lookup_key) {
				Some(existing) => Ok((existing.clone(), false)),
				None => {
					snapshot.salts.insert(lookup_key.to_owned(), candidate.clone());

					Ok((candidate, true))
				},
			})
		})
	}
}
impl LinkageBackend for FileStore {
	fn merge(&self, update: LinkageUpdate) -> StoreFuture<'_, IdentityLinkage> {
		Box::pin(async move {
			self.transact(|snapshot| {
				let key = update.pseudonymous_id.clone();
				let merged = IdentityLinkage::merge(snapshot.linkages.get(&key).cloned(), update)?;

				snapshot.linkages.insert(key, merged.clone());

				Ok((merged, true))
			})
		})
	}

	fn fetch<'a>(&'a self, id: &'a PseudonymousId) -> StoreFuture<'a, Option<IdentityLinkage>> {
		Box::pin(async move {
			self.transact(|snapshot| Ok((snapshot.linkages.get(id).cloned(), false)))
		})
	}
}
