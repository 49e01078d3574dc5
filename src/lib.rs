//! Dejavu Cache - persistent autotuning results
//!
//! Autotuning a compiled kernel's launch configuration is expensive. This
//! crate stores the winning configuration per runtime key so that later runs
//! against the same kernel build, configuration space and parameters skip
//! re-measurement.
//!
//! Records are content-addressed: their path is derived from the kernel's
//! code hash (published by the compiler), the candidate config list, the
//! runtime key definition and the autotuner parameters. Any change to one
//! of those lands in a fresh record.
//!
//! ```no_run
//! # async fn demo(kernel: &dyn dejavu_cache::Kernel) -> Result<(), dejavu_cache::StoreError> {
//! use dejavu_cache::{BenchmarkRun, CacheSettings, CacheStore, Config, IdentityHashes, RuntimeKey};
//!
//! let store = CacheStore::new(CacheSettings::new("/var/cache/dejavu", "cuda_12.4_h100"))?;
//! let hashes = IdentityHashes::new("cfg-hash", "key-hash", "param-hash");
//!
//! let known = store.restore(kernel, &hashes).await?;
//! if known.is_empty() {
//!     let key: RuntimeKey = [4096, 4096].into_iter().collect();
//!     let run = BenchmarkRun::new(16, 100.0, 25.0, 3.2)
//!         .with_result(key, Config::new().with_num_warps(8), vec![0.41]);
//!     store.add(kernel, &hashes, &run).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod hash;
pub mod settings;
pub mod storage;
pub mod store;

pub use dejavu_codec::{CodecError, Config, DecodedKey, KeyPart, KwargValue, RuntimeKey};
pub use hash::{
    code_hash_channel, config_space_hash, derive_path, list_hash, string_hash, CodeHashPublisher,
    CodeHashReceiver, CompositeIdentity, HashDeriver, HashError, IdentityHashes, Kernel,
};
pub use settings::{
    CacheSettings, FlushPolicy, SettingsError, DEFAULT_TAG, HASH_TIMEOUT_ENV_VAR, STORAGE_ENV_VAR,
    TAG_ENV_VAR,
};
pub use storage::{LockError, RecordLock, StorageLocator, RECORD_FILENAME};
pub use store::{Absorbed, BenchmarkRun, CacheStore, StorageRecord, StoreError, StoreResult, TimingSample};
