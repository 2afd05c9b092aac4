//! Pseudonymous identity derivation.
//!
//! A raw provider subject is never stored under its own name. Instead the hasher keys a
//! per-subject random salt by a one-way lookup hash, then runs the raw subject, that salt, and a
//! process-wide pepper through Argon2id. The result is stable for the lifetime of the salt and
//! consists of lowercase hex characters only.

// crates.io
use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{IdentitySalt, PseudonymousId, Secret},
	error::ConfigError,
	store::SaltBackend,
};

const OUTPUT_BYTES: usize = 32;

/// Argon2id cost parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashParams {
	/// Memory cost in KiB.
	pub memory_kib: u32,
	/// Number of passes.
	pub iterations: u32,
	/// Degree of parallelism.
	pub parallelism: u32,
}
impl Default for HashParams {
	fn default() -> Self {
		Self { memory_kib: 64 * 1024, iterations: 3, parallelism: 1 }
	}
}
impl HashParams {
	fn to_argon2(self) -> Result<Params, ConfigError> {
		Params::new(self.memory_kib, self.iterations, self.parallelism, Some(OUTPUT_BYTES))
			.map_err(hashing_error)
	}
}

/// CPU-bound Argon2 job handed to a [`HashRunner`].
pub type HashJob = Box<dyn FnOnce() -> Result<PseudonymousId, ConfigError> + Send>;
/// Future resolving with a [`HashJob`]'s output.
pub type HashFuture = Pin<Box<dyn Future<Output = Result<PseudonymousId, ConfigError>> + Send>>;

/// Decides where Argon2 derivations execute.
///
/// Async embedders typically implement this over their runtime's blocking pool (for tokio,
/// `spawn_blocking`) so a derivation never stalls an executor worker.
pub trait HashRunner
where
	Self: Send + Sync,
{
	/// Runs `job` and resolves with its output.
	fn run(&self, job: HashJob) -> HashFuture;
}

/// Runs every job inline on the calling task.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineHashRunner;
impl HashRunner for InlineHashRunner {
	fn run(&self, job: HashJob) -> HashFuture {
		Box::pin(std::future::ready(job()))
	}
}

/// Derives [`PseudonymousId`] values from raw provider subjects.
///
/// With the default parameters a derivation costs tens of milliseconds of CPU and 64 MiB of
/// memory. It runs inline on the calling task unless a [`HashRunner`] is installed through
/// [`IdentityHasher::with_runner`].
#[derive(Clone)]
pub struct IdentityHasher {
	salts: Arc<dyn SaltBackend>,
	lookup_secret: Secret,
	pepper: Secret,
	params: Params,
	runner: Arc<dyn HashRunner>,
}
impl IdentityHasher {
	/// Creates a hasher. Fails when a secret is empty or `params` are rejected by Argon2.
	pub fn new(
		salts: Arc<dyn SaltBackend>,
		lookup_secret: Secret,
		pepper: Secret,
		params: HashParams,
	) -> Result<Self, ConfigError> {
		if lookup_secret.is_empty() || pepper.is_empty() {
			return Err(ConfigError::invalid("identity lookup secret and pepper must be set"));
		}

		let params = params.to_argon2()?;

		// Reject a pepper Argon2 refuses before the first login does.
		argon2(&pepper, params.clone())?;

		Ok(Self { salts, lookup_secret, pepper, params, runner: Arc::new(InlineHashRunner) })
	}

	/// Executes derivations through `runner`.
	pub fn with_runner(mut self, runner: Arc<dyn HashRunner>) -> Self {
		self.runner = runner;

		self
	}

	/// One-way key under which the subject's salt is stored.
	pub fn lookup_key(&self, raw_subject: &str) -> String {
		let secret = self.lookup_secret.expose().as_bytes();
		let mut hasher = Sha256::new();

		hasher.update((secret.len() as u64).to_be_bytes());
		hasher.update(secret);
		hasher.update(raw_subject.as_bytes());

		hex::encode(hasher.finalize())
	}

	/// Returns the pseudonymous id for `raw_subject`, creating its salt on first sight.
	///
	/// Concurrent first derivations for one subject agree on the stored salt, so they also agree
	/// on the id.
	pub async fn derive_id(&self, raw_subject: &str) -> Result<PseudonymousId> {
		if raw_subject.is_empty() {
			return Err(Error::InvalidIdToken { reason: "subject is empty".into() });
		}

		let key = self.lookup_key(raw_subject);
		let salt = self
			.salts
			.get_or_insert(&key, IdentitySalt::generate(OffsetDateTime::now_utc()))
			.await?;
		let pepper = self.pepper.clone();
		let params = self.params.clone();
		let raw_subject = raw_subject.to_owned();

		Ok(self
			.runner
			.run(Box::new(move || hash_with_salt(&pepper, params, &raw_subject, &salt)))
			.await?)
	}
}
impl Debug for IdentityHasher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityHasher")
			.field("lookup_secret", &self.lookup_secret)
			.field("pepper", &self.pepper)
			.field("memory_kib", &self.params.m_cost())
			.field("iterations", &self.params.t_cost())
			.field("parallelism", &self.params.p_cost())
			.finish()
	}
}

fn hash_with_salt(
	pepper: &Secret,
	params: Params,
	raw_subject: &str,
	salt: &IdentitySalt,
) -> Result<PseudonymousId, ConfigError> {
	let mut output = [0_u8; OUTPUT_BYTES];

	argon2(pepper, params)?
		.hash_password_into(raw_subject.as_bytes(), salt.key_material.as_bytes(), &mut output)
		.map_err(hashing_error)?;

	PseudonymousId::new(hex::encode(output)).map_err(hashing_error)
}

fn argon2(pepper: &Secret, params: Params) -> Result<Argon2<'_>, ConfigError> {
	Argon2::new_with_secret(pepper.expose().as_bytes(), Algorithm::Argon2id, Version::V0x13, params)
		.map_err(hashing_error)
}

fn hashing_error(e: impl Display) -> ConfigError {
	ConfigError::Hashing { message: e.to_string() }
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::store::MemoryStore;

	const FAST: HashParams = HashParams { memory_kib: 8, iterations: 1, parallelism: 1 };

	fn hasher(store: Arc<MemoryStore>, pepper: &str) -> IdentityHasher {
		IdentityHasher::new(store, Secret::new("lookup"), Secret::new(pepper), FAST)
			.expect("Hasher fixture should build.")
	}

	#[tokio::test]
	async fn derivation_is_stable_and_hex() {
		let store = Arc::new(MemoryStore::default());
		let hasher = hasher(store.clone(), "pepper");
		let first = hasher.derive_id("U1234").await.expect("First derivation should pass.");
		let second = hasher.derive_id("U1234").await.expect("Second derivation should pass.");

		assert_eq!(first, second);
		assert_eq!(first.as_ref().len(), 64);
		assert!(first.as_ref().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
		assert_eq!(store.salt_count(), 1);
	}

	#[tokio::test]
	async fn distinct_subjects_and_peppers_diverge() {
		let store = Arc::new(MemoryStore::default());
		let hasher_a = hasher(store.clone(), "pepper-a");
		let hasher_b = hasher(store.clone(), "pepper-b");
		let u1 = hasher_a.derive_id("U1").await.expect("Derivation should pass.");
		let u2 = hasher_a.derive_id("U2").await.expect("Derivation should pass.");
		let u1_other_pepper = hasher_b.derive_id("U1").await.expect("Derivation should pass.");

		assert_ne!(u1, u2);
		assert_ne!(u1, u1_other_pepper);
		assert_ne!(u1.as_ref(), "U1");
	}

	#[derive(Default)]
	struct BlockingPool {
		jobs: AtomicUsize,
	}
	impl HashRunner for BlockingPool {
		fn run(&self, job: HashJob) -> HashFuture {
			self.jobs.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				match tokio::task::spawn_blocking(job).await {
					Ok(result) => result,
					Err(e) => Err(hashing_error(e)),
				}
			})
		}
	}

	#[tokio::test]
	async fn installed_runner_executes_derivations() {
		let store = Arc::new(MemoryStore::default());
		let pool = Arc::new(BlockingPool::default());
		let offloaded = hasher(store.clone(), "pepper").with_runner(pool.clone());
		let inline = hasher(store, "pepper");
		let via_pool = offloaded.derive_id("U1234").await.expect("Pooled derivation should pass.");
		let via_task = inline.derive_id("U1234").await.expect("Inline derivation should pass.");

		assert_eq!(via_pool, via_task);
		assert_eq!(pool.jobs.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn lookup_key_hides_the_subject() {
		let hasher = hasher(Arc::new(MemoryStore::default()), "pepper");
		let key = hasher.lookup_key("U1234");

		assert_eq!(key.len(), 64);
		assert!(!key.contains("U1234"));
		assert_eq!(key, hasher.lookup_key("U1234"));
		assert_ne!(key, hasher.lookup_key("U1235"));
	}

	#[test]
	fn construction_rejects_bad_parameters() {
		let store: Arc<dyn SaltBackend> = Arc::new(MemoryStore::default());

		assert!(
			IdentityHasher::new(store.clone(), Secret::new(""), Secret::new("pepper"), FAST)
				.is_err()
		);
		assert!(
			IdentityHasher::new(
				store,
				Secret::new("lookup"),
				Secret::new("pepper"),
				HashParams { memory_kib: 8, iterations: 0, parallelism: 1 },
			)
			.is_err()
		);
	}
}
