//! Storage record: the persisted document at one composite identity.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use dejavu_codec::{Config, DecodedKey, RuntimeKey};

use super::{StoreError, StoreResult};
use crate::storage::write_atomic;

/// Label of a single latency value.
pub const LABEL_MS: &str = "ms";

/// Labels of a `[median, min, max]` latency triple.
pub const LABELS_MS_MIN_MAX: [&str; 3] = ["ms", "min_ms", "max_ms"];

/// One measured latency result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSample {
    /// Latencies in milliseconds
    pub values: Vec<f64>,
    pub labels: Vec<String>,
    /// Repetition time used for the measurement
    pub rep_t_ms: f64,
    /// Warm-up time used for the measurement
    pub warmup_t_ms: f64,
}

impl TimingSample {
    pub fn new(values: Vec<f64>, rep_t_ms: f64, warmup_t_ms: f64) -> Self {
        let labels = if values.len() == 1 {
            vec![LABEL_MS.to_string()]
        } else {
            LABELS_MS_MIN_MAX.iter().map(|l| l.to_string()).collect()
        };
        Self {
            values,
            labels,
            rep_t_ms,
            warmup_t_ms,
        }
    }

    /// Whether a sample of `len` values can be labelled: a single value or
    /// a `[median, min, max]` triple.
    pub fn valid_len(len: usize) -> bool {
        len == 1 || len == LABELS_MS_MIN_MAX.len()
    }

    /// Whether every value is finite. Non-finite samples are never stored.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

/// Encoded configurations moved by [`StorageRecord::absorb`].
#[derive(Debug, Default, PartialEq)]
pub struct Absorbed {
    /// Configurations taken from the on-disk copy
    pub adopted: Vec<String>,
    /// Our configurations replaced by an on-disk winner
    pub displaced: Vec<String>,
}

/// The persisted unit at one composite identity.
///
/// `cache` and `timings` are keyed by encoded runtime keys and share the
/// same key set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRecord {
    /// Free-text kernel signature
    pub signature: String,
    /// Benchmarking wall-clock time spent producing this record
    pub total_bench_time_s: f64,
    /// Number of configurations evaluated in the latest session
    pub evaluated_configs: u64,
    /// Encoded runtime key -> encoded winning configuration
    pub cache: BTreeMap<String, String>,
    /// Encoded runtime key -> timing sample of the winner
    pub timings: BTreeMap<String, TimingSample>,
}

impl StorageRecord {
    /// An empty record.
    pub fn template(signature: &str, evaluated_configs: u64) -> Self {
        Self {
            signature: signature.to_string(),
            total_bench_time_s: 0.0,
            evaluated_configs,
            cache: BTreeMap::new(),
            timings: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn contains_key(&self, key: &RuntimeKey) -> bool {
        self.cache.contains_key(&key.encode())
    }

    /// Store a winner for `key`. Returns `false` (leaving the record
    /// untouched) if the key is already present.
    pub fn insert(&mut self, key: &RuntimeKey, config: &Config, sample: TimingSample) -> bool {
        let encoded = key.encode();
        if self.cache.contains_key(&encoded) {
            return false;
        }
        self.cache.insert(encoded.clone(), config.encode());
        self.timings.insert(encoded, sample);
        true
    }

    /// Decode every stored entry.
    pub fn decode_entries(&self) -> StoreResult<Vec<(DecodedKey, Config)>> {
        self.cache
            .iter()
            .map(|(k, v)| Ok((RuntimeKey::decode(k)?, Config::decode(v)?)))
            .collect()
    }

    /// Fold in the entries of `on_disk`, a newer copy of this record
    /// written by another process. Its entries win on conflicting keys, so
    /// whoever persisted a key first keeps it.
    pub fn absorb(&mut self, on_disk: &StorageRecord) -> Absorbed {
        let mut merge = Absorbed::default();
        for (key, config) in &on_disk.cache {
            if self.cache.get(key) == Some(config) {
                continue;
            }
            if let Some(lost) = self.cache.insert(key.clone(), config.clone()) {
                merge.displaced.push(lost);
            }
            match on_disk.timings.get(key) {
                Some(sample) => {
                    self.timings.insert(key.clone(), sample.clone());
                }
                None => {
                    self.timings.remove(key);
                }
            }
            merge.adopted.push(config.clone());
        }
        merge
    }

    /// Serialize as 4-space indented JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        to_pretty_json(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load from file.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|source| StoreError::MalformedRecord {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write atomically to file.
    pub fn write_to_file(&self, path: &Path) -> StoreResult<()> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes())?;
        Ok(())
    }
}

/// Serialize any value as 4-space indented JSON.
pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
