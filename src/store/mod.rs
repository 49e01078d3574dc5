//! Persistent autotuning cache
//!
//! [`CacheStore`] keeps an in-memory index of storage records keyed by
//! record path, backed by `cache.json` files under the storage root.
//!
//! ## Protocol
//!
//! - `restore` loads the record for an identity, or creates and persists an
//!   empty template so other readers see a placeholder instead of a miss.
//! - `add` merges new winners into the record. A key that already has a
//!   winner is never overwritten, and samples with non-finite latencies are
//!   dropped. Any accepted entry triggers a flush.
//! - Flushing writes every known record ([`FlushPolicy::Full`]) or only
//!   changed ones ([`FlushPolicy::Dirty`]), each through an atomic replace.
//!
//! ## Concurrency
//!
//! In-process access is serialized by one mutex spanning each
//! restore/add sequence. Independent processes sharing a storage root can
//! still lose each other's updates unless `merge_on_write` is enabled, which
//! takes a record lock and folds in on-disk entries before every write.

mod record;

pub use record::{Absorbed, StorageRecord, TimingSample, LABELS_MS_MIN_MAX, LABEL_MS};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use dejavu_codec::{CodecError, Config, DecodedKey, RuntimeKey};

use crate::hash::{CompositeIdentity, HashDeriver, HashError, IdentityHashes, Kernel};
use crate::settings::{CacheSettings, FlushPolicy, SettingsError};
use crate::storage::{set_permissive, LockError, RecordLock, StorageLocator, RECORD_FILENAME};

use record::to_pretty_json;

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from cache store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed record {}: {source}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("no timing sample for key {0}")]
    MissingTiming(String),

    #[error("timing for key {key} has {len} values, expected 1 or 3")]
    InvalidTiming { key: String, len: usize },

    #[error("benchmark {field} is not finite: {value}")]
    NonFiniteMetadata { field: &'static str, value: f64 },

    #[error("no used configurations for {}; restore or add it first", .0.display())]
    UnknownIdentity(PathBuf),

    #[error("cache state lock poisoned")]
    Poisoned,
}

/// Results of one autotuning session for one identity.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkRun {
    /// Runtime key -> winning configuration
    pub results: BTreeMap<RuntimeKey, Config>,
    /// Runtime key -> latencies of the winner: one value, or `[ms, min, max]`
    pub timings: BTreeMap<RuntimeKey, Vec<f64>>,
    /// Number of configurations evaluated
    pub evaluated_configs: u64,
    pub rep_t_ms: f64,
    pub warmup_t_ms: f64,
    /// Wall-clock benchmarking time of the session
    pub bench_time_s: f64,
}

impl BenchmarkRun {
    pub fn new(evaluated_configs: u64, rep_t_ms: f64, warmup_t_ms: f64, bench_time_s: f64) -> Self {
        Self {
            evaluated_configs,
            rep_t_ms,
            warmup_t_ms,
            bench_time_s,
            ..Default::default()
        }
    }

    /// Add a winner and its latencies.
    pub fn with_result(mut self, key: RuntimeKey, config: Config, timing: Vec<f64>) -> Self {
        self.timings.insert(key.clone(), timing);
        self.results.insert(key, config);
        self
    }
}

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<PathBuf, StorageRecord>,
    used_configs: HashMap<PathBuf, Vec<Config>>,
    known_files: BTreeSet<PathBuf>,
    dirty: BTreeSet<PathBuf>,
    /// Bench time added per record since it was last written
    unsynced_bench_s: HashMap<PathBuf, f64>,
}

/// The persistent autotuning cache.
///
/// Construct once at startup and share by reference.
#[derive(Debug)]
pub struct CacheStore {
    settings: CacheSettings,
    locator: StorageLocator,
    deriver: HashDeriver,
    state: Mutex<StoreState>,
}

impl CacheStore {
    /// Create a store, creating the storage root if needed.
    pub fn new(settings: CacheSettings) -> StoreResult<Self> {
        settings.validate()?;
        let locator = StorageLocator::new(&settings.storage_prefix, &settings.storage_identifier)?;
        let deriver = HashDeriver::new(settings.hash_timeout);

        info!(
            root = %locator.root().display(),
            tag = %settings.tag,
            "dejavu cache ready"
        );

        Ok(Self {
            settings,
            locator,
            deriver,
            state: Mutex::new(StoreState::default()),
        })
    }

    /// Create a store from the process environment.
    pub fn from_env(storage_identifier: impl Into<String>) -> StoreResult<Self> {
        Self::new(CacheSettings::from_env(storage_identifier)?)
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn locator(&self) -> &StorageLocator {
        &self.locator
    }

    pub fn deriver(&self) -> &HashDeriver {
        &self.deriver
    }

    /// Record path of `identity`, relative to the storage root.
    pub fn record_path(&self, identity: &CompositeIdentity) -> PathBuf {
        identity.relative_path(&self.settings.tag)
    }

    /// Load the record of `kernel` under `hashes`, or seed an empty one.
    ///
    /// Waits for the kernel's code hash first.
    pub async fn restore(
        &self,
        kernel: &dyn Kernel,
        hashes: &IdentityHashes,
    ) -> StoreResult<HashMap<DecodedKey, Config>> {
        let identity = self.deriver.identity(kernel, hashes).await?;
        self.restore_identity(&identity, &kernel.signature())
    }

    /// [`restore`](Self::restore) for an already resolved identity.
    pub fn restore_identity(
        &self,
        identity: &CompositeIdentity,
        signature: &str,
    ) -> StoreResult<HashMap<DecodedKey, Config>> {
        let path = self.record_path(identity);
        let file = self.locator.record_file(&path);
        let mut state = self.lock_state()?;

        if !file.is_file() {
            debug!(record = %path.display(), "no configurations found");
            state
                .records
                .insert(path.clone(), StorageRecord::template(signature, 0));
            state.used_configs.insert(path.clone(), Vec::new());
            state.dirty.insert(path);
            self.flush(&mut state)?;
            return Ok(HashMap::new());
        }

        let record = StorageRecord::from_file(&file)?;
        let entries = record.decode_entries()?;

        let mut restored = HashMap::with_capacity(entries.len());
        let mut used: Vec<Config> = Vec::new();
        for (key, config) in entries {
            trace!(record = %path.display(), key = ?key, config = %config, "restored");
            if !used.contains(&config) {
                used.push(config.clone());
            }
            restored.insert(key, config);
        }

        debug!(
            record = %path.display(),
            count = restored.len(),
            "restored configurations"
        );

        state.known_files.insert(file);
        state.records.insert(path.clone(), record);
        state.used_configs.insert(path, used);
        Ok(restored)
    }

    /// Merge the winners of `run` into the record of `kernel` under `hashes`.
    ///
    /// Returns the number of entries added.
    ///
    /// With `merge_on_write`, the write waits on a file lock by blocking the
    /// calling thread for up to `lock_timeout`. On a shared runtime, call
    /// [`add_identity`](Self::add_identity) from `tokio::task::spawn_blocking`
    /// instead.
    pub async fn add(
        &self,
        kernel: &dyn Kernel,
        hashes: &IdentityHashes,
        run: &BenchmarkRun,
    ) -> StoreResult<usize> {
        let identity = self.deriver.identity(kernel, hashes).await?;
        self.add_identity(&identity, &kernel.signature(), run)
    }

    /// [`add`](Self::add) for an already resolved identity.
    pub fn add_identity(
        &self,
        identity: &CompositeIdentity,
        signature: &str,
        run: &BenchmarkRun,
    ) -> StoreResult<usize> {
        validate_run(run)?;

        let path = self.record_path(identity);
        let mut state = self.lock_state()?;

        let mut record = state
            .records
            .get(&path)
            .cloned()
            .unwrap_or_else(|| StorageRecord::template(signature, run.evaluated_configs));
        let mut used = state.used_configs.get(&path).cloned().unwrap_or_default();

        let mut added = 0;
        for (key, config) in &run.results {
            if record.contains_key(key) {
                continue;
            }
            let values = run.timings.get(key).cloned().unwrap_or_default();
            let sample = TimingSample::new(values, run.rep_t_ms, run.warmup_t_ms);
            if !sample.is_finite() {
                debug!(record = %path.display(), key = %key, "skipping non-finite timing");
                continue;
            }

            record.insert(key, config, sample);
            record.evaluated_configs = run.evaluated_configs;
            if !used.contains(config) {
                used.push(config.clone());
            }
            added += 1;
            debug!(record = %path.display(), key = %key, config = %config, "added");
        }

        state.used_configs.insert(path.clone(), used);

        if added > 0 {
            record.total_bench_time_s += run.bench_time_s;
            *state.unsynced_bench_s.entry(path.clone()).or_default() += run.bench_time_s;
            state.records.insert(path.clone(), record);
            state.dirty.insert(path);
            self.flush(&mut state)?;
        }
        Ok(added)
    }

    /// Configurations that won for some key of `kernel` under `hashes`.
    ///
    /// Only identities restored or added in this process are known.
    pub async fn used_configurations(
        &self,
        kernel: &dyn Kernel,
        hashes: &IdentityHashes,
    ) -> StoreResult<Vec<Config>> {
        let identity = self.deriver.identity(kernel, hashes).await?;
        self.used_configurations_identity(&identity)
    }

    pub fn used_configurations_identity(
        &self,
        identity: &CompositeIdentity,
    ) -> StoreResult<Vec<Config>> {
        let path = self.record_path(identity);
        let state = self.lock_state()?;
        state
            .used_configs
            .get(&path)
            .cloned()
            .ok_or(StoreError::UnknownIdentity(path))
    }

    /// The in-memory record of `identity`, if loaded.
    pub fn record(&self, identity: &CompositeIdentity) -> StoreResult<Option<StorageRecord>> {
        let path = self.record_path(identity);
        Ok(self.lock_state()?.records.get(&path).cloned())
    }

    /// Record files read or written by this store.
    pub fn known_files(&self) -> StoreResult<Vec<PathBuf>> {
        Ok(self.lock_state()?.known_files.iter().cloned().collect())
    }

    /// Render the in-memory index for diagnostics.
    ///
    /// With `filter_timings`, the `timings` field is left out of each record.
    pub fn dump(&self, filter_timings: bool) -> StoreResult<String> {
        let state = self.lock_state()?;

        let mut index = serde_json::Map::new();
        for (path, record) in &state.records {
            let mut value = serde_json::to_value(record)?;
            if filter_timings {
                if let Some(obj) = value.as_object_mut() {
                    obj.remove("timings");
                }
            }
            index.insert(path.to_string_lossy().into_owned(), value);
        }

        Ok(format!(
            "DejavuStorage path:\t\t{}\nDejavuStorage identifier:\t{}\n{}",
            self.locator.prefix().display(),
            self.locator.identifier(),
            to_pretty_json(&index)?
        ))
    }

    /// Load every record under the storage root into memory.
    ///
    /// Unreadable records are logged and skipped. Returns the number loaded.
    pub fn load_all(&self) -> StoreResult<usize> {
        let root = self.locator.root().to_path_buf();
        let mut state = self.lock_state()?;
        let mut loaded = 0;

        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || entry.file_name() != RECORD_FILENAME {
                continue;
            }
            let file = entry.path();
            let Some(path) = file
                .parent()
                .and_then(|dir| dir.strip_prefix(&root).ok())
                .map(Path::to_path_buf)
            else {
                continue;
            };

            let (record, used) = match load_with_used(file) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "skipping unreadable record");
                    continue;
                }
            };

            state.known_files.insert(file.to_path_buf());
            state.records.insert(path.clone(), record);
            state.used_configs.insert(path, used);
            loaded += 1;
        }

        debug!(root = %root.display(), count = loaded, "loaded records");
        Ok(loaded)
    }

    fn lock_state(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Write records back to disk according to the flush policy.
    fn flush(&self, state: &mut StoreState) -> StoreResult<()> {
        let targets: Vec<PathBuf> = match self.settings.flush_policy {
            FlushPolicy::Full => state.records.keys().cloned().collect(),
            FlushPolicy::Dirty => state.dirty.iter().cloned().collect(),
        };

        for path in targets {
            self.write_record(state, &path)?;
            state.dirty.remove(&path);
        }
        Ok(())
    }

    fn write_record(&self, state: &mut StoreState, path: &Path) -> StoreResult<()> {
        let dir = self.locator.ensure_record_dir(path)?;
        let file = dir.join(RECORD_FILENAME);

        let _lock = if self.settings.merge_on_write {
            let lock = RecordLock::acquire(&dir, self.settings.lock_timeout)?;
            if file.is_file() {
                self.merge_from_disk(state, path, &file)?;
            }
            Some(lock)
        } else {
            None
        };

        if let Some(record) = state.records.get(path) {
            record.write_to_file(&file)?;
        }
        state.unsynced_bench_s.remove(path);

        set_permissive(&dir);
        state.known_files.insert(file);
        Ok(())
    }

    /// Fold entries another process wrote into the in-memory record.
    fn merge_from_disk(&self, state: &mut StoreState, path: &Path, file: &Path) -> StoreResult<()> {
        let on_disk = StorageRecord::from_file(file)?;
        let unsynced = state.unsynced_bench_s.get(path).copied().unwrap_or_default();
        let Some(record) = state.records.get_mut(path) else {
            return Ok(());
        };

        record.total_bench_time_s = on_disk.total_bench_time_s + unsynced;
        let merge = record.absorb(&on_disk);
        if merge.adopted.is_empty() {
            return Ok(());
        }
        debug!(
            record = %path.display(),
            adopted = merge.adopted.len(),
            displaced = merge.displaced.len(),
            "merged entries from disk"
        );

        let still_winning: BTreeSet<&String> = record.cache.values().collect();
        let used = state.used_configs.entry(path.to_path_buf()).or_default();
        for encoded in merge.displaced.iter().filter(|c| !still_winning.contains(c)) {
            let config = Config::decode(encoded)?;
            used.retain(|c| *c != config);
        }
        for encoded in &merge.adopted {
            let config = Config::decode(encoded)?;
            if !used.contains(&config) {
                used.push(config);
            }
        }
        Ok(())
    }
}

/// Reject runs that would store a malformed record, before any state changes.
fn validate_run(run: &BenchmarkRun) -> StoreResult<()> {
    for (field, value) in [
        ("rep_t_ms", run.rep_t_ms),
        ("warmup_t_ms", run.warmup_t_ms),
        ("bench_time_s", run.bench_time_s),
    ] {
        if !value.is_finite() {
            return Err(StoreError::NonFiniteMetadata { field, value });
        }
    }

    for key in run.results.keys() {
        let Some(values) = run.timings.get(key) else {
            return Err(StoreError::MissingTiming(key.encode()));
        };
        if !TimingSample::valid_len(values.len()) {
            return Err(StoreError::InvalidTiming {
                key: key.encode(),
                len: values.len(),
            });
        }
    }
    Ok(())
}

fn load_with_used(file: &Path) -> StoreResult<(StorageRecord, Vec<Config>)> {
    let record = StorageRecord::from_file(file)?;
    let mut used: Vec<Config> = Vec::new();
    for (_, config) in record.decode_entries()? {
        if !used.contains(&config) {
            used.push(config);
        }
    }
    Ok((record, used))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> CacheStore {
        CacheStore::new(CacheSettings::new(temp_dir.path(), "test-gpu")).unwrap()
    }

    fn identity(code: &str) -> CompositeIdentity {
        CompositeIdentity::new("matmul", code, IdentityHashes::new("cfgA", "keyA", "parA"))
    }

    fn key(parts: &[i64]) -> RuntimeKey {
        parts.iter().copied().collect()
    }

    #[test]
    fn test_restore_miss_writes_template() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let id = identity("c1");

        let restored = store.restore_identity(&id, "sig").unwrap();
        assert!(restored.is_empty());

        let file = store.locator().record_file(&store.record_path(&id));
        let json = fs::read_to_string(&file).unwrap();
        assert!(json.contains("\"cache\": {}"));
        assert!(store.used_configurations_identity(&id).unwrap().is_empty());
        assert_eq!(store.known_files().unwrap(), vec![file]);
    }

    #[test]
    fn test_add_missing_timing_is_rejected_before_mutation() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let id = identity("c1");

        let mut run = BenchmarkRun::new(4, 10.0, 5.0, 1.0);
        run.results.insert(key(&[1]), Config::new());

        let err = store.add_identity(&id, "sig", &run).unwrap_err();
        assert!(matches!(err, StoreError::MissingTiming(ref k) if k == "(1,)"));
        assert!(store.record(&id).unwrap().is_none());
    }

    #[test]
    fn test_add_non_finite_metadata_is_rejected_and_record_stays_readable() {
        let temp_dir = TempDir::new().unwrap();
        let id = identity("c1");
        {
            let store = store(&temp_dir);
            let good = BenchmarkRun::new(1, 10.0, 5.0, 0.5).with_result(key(&[1]), Config::new(), vec![1.0]);
            store.add_identity(&id, "sig", &good).unwrap();

            let bad = BenchmarkRun::new(1, f64::INFINITY, 5.0, f64::NAN)
                .with_result(key(&[2]), Config::new().with_num_warps(8), vec![1.0]);
            let err = store.add_identity(&id, "sig", &bad).unwrap_err();
            assert!(matches!(err, StoreError::NonFiniteMetadata { field: "rep_t_ms", .. }));
            assert!(!store.record(&id).unwrap().unwrap().cache.contains_key("(2,)"));
        }

        let fresh = store(&temp_dir);
        let restored = fresh.restore_identity(&id, "sig").unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(fresh.record(&id).unwrap().unwrap().total_bench_time_s, 0.5);
    }

    #[test]
    fn test_add_rejects_unlabelled_timing_lengths() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let id = identity("c1");

        for values in [vec![], vec![1.0, 0.9]] {
            let len = values.len();
            let run = BenchmarkRun::new(1, 10.0, 5.0, 1.0)
                .with_result(key(&[1]), Config::new(), vec![1.0])
                .with_result(key(&[2]), Config::new(), values);

            let err = store.add_identity(&id, "sig", &run).unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidTiming { ref key, len: l } if key == "(2,)" && l == len)
            );
        }
        assert!(store.record(&id).unwrap().is_none());
    }

    #[test]
    fn test_add_without_restore_creates_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let id = identity("c1");

        let run = BenchmarkRun::new(6, 10.0, 5.0, 2.0)
            .with_result(key(&[8]), Config::new().with_num_warps(8), vec![0.7, 0.6, 0.9]);
        assert_eq!(store.add_identity(&id, "sig", &run).unwrap(), 1);

        let record = store.record(&id).unwrap().unwrap();
        assert_eq!(record.evaluated_configs, 6);
        assert_eq!(record.total_bench_time_s, 2.0);
        assert_eq!(record.timings["(8,)"].labels, vec!["ms", "min_ms", "max_ms"]);
    }

    #[test]
    fn test_add_nothing_new_does_not_touch_bench_time() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let id = identity("c1");

        let run = BenchmarkRun::new(1, 10.0, 5.0, 1.5).with_result(key(&[1]), Config::new(), vec![1.0]);
        store.add_identity(&id, "sig", &run).unwrap();
        assert_eq!(store.add_identity(&id, "sig", &run).unwrap(), 0);

        assert_eq!(store.record(&id).unwrap().unwrap().total_bench_time_s, 1.5);
    }

    #[test]
    fn test_used_configurations_unknown_identity() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let err = store.used_configurations_identity(&identity("never")).unwrap_err();
        assert!(matches!(err, StoreError::UnknownIdentity(_)));
    }

    #[test]
    fn test_used_configurations_dedup() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let id = identity("c1");

        let shared = Config::new().with_kwarg("BLOCK", 32);
        let run = BenchmarkRun::new(3, 10.0, 5.0, 1.0)
            .with_result(key(&[1]), shared.clone(), vec![1.0])
            .with_result(key(&[2]), shared.clone(), vec![1.1])
            .with_result(key(&[3]), Config::new().with_num_warps(2), vec![0.9]);
        store.add_identity(&id, "sig", &run).unwrap();

        let used = store.used_configurations_identity(&id).unwrap();
        assert_eq!(used.len(), 2);
        assert!(used.contains(&shared));
    }

    #[test]
    fn test_full_flush_rewrites_every_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let a = identity("a");
        let b = identity("b");

        store.restore_identity(&a, "sig").unwrap();
        let file_a = store.locator().record_file(&store.record_path(&a));
        fs::remove_file(&file_a).unwrap();

        let run = BenchmarkRun::new(1, 10.0, 5.0, 1.0).with_result(key(&[1]), Config::new(), vec![1.0]);
        store.add_identity(&b, "sig", &run).unwrap();

        assert!(file_a.is_file(), "full flush writes untouched records too");
    }

    #[test]
    fn test_dirty_flush_writes_only_changed_records() {
        let temp_dir = TempDir::new().unwrap();
        let settings =
            CacheSettings::new(temp_dir.path(), "test-gpu").with_flush_policy(FlushPolicy::Dirty);
        let store = CacheStore::new(settings).unwrap();
        let a = identity("a");
        let b = identity("b");

        store.restore_identity(&a, "sig").unwrap();
        let file_a = store.locator().record_file(&store.record_path(&a));
        fs::remove_file(&file_a).unwrap();

        let run = BenchmarkRun::new(1, 10.0, 5.0, 1.0).with_result(key(&[1]), Config::new(), vec![1.0]);
        store.add_identity(&b, "sig", &run).unwrap();

        assert!(!file_a.exists());
        assert!(store.locator().record_file(&store.record_path(&b)).is_file());
    }

    #[test]
    fn test_dump_filters_timings() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let id = identity("c1");

        let run = BenchmarkRun::new(1, 10.0, 5.0, 1.0).with_result(key(&[1]), Config::new(), vec![1.0]);
        store.add_identity(&id, "sig", &run).unwrap();

        let full = store.dump(false).unwrap();
        assert!(full.starts_with("DejavuStorage path:\t\t"));
        assert!(full.contains("DejavuStorage identifier:\ttest-gpu"));
        assert!(full.contains("\"timings\""));

        let filtered = store.dump(true).unwrap();
        assert!(!filtered.contains("\"timings\""));
        assert!(filtered.contains("\"cache\""));
    }

    #[test]
    fn test_load_all_skips_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let id = identity("c1");
        {
            let writer = store(&temp_dir);
            let run = BenchmarkRun::new(1, 10.0, 5.0, 1.0).with_result(key(&[1]), Config::new(), vec![1.0]);
            writer.add_identity(&id, "sig", &run).unwrap();

            let broken = writer.locator().root().join("broken").join(RECORD_FILENAME);
            fs::create_dir_all(broken.parent().unwrap()).unwrap();
            fs::write(&broken, "nope").unwrap();
        }

        let reader = store(&temp_dir);
        assert_eq!(reader.load_all().unwrap(), 1);
        assert_eq!(reader.used_configurations_identity(&id).unwrap(), vec![Config::new()]);
    }
}
