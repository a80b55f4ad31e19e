//! Label sets and their identity hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Unordered key/value pairs attached to an alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(HashMap<String, String>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Stable identity of the set.
    ///
    /// SHA-256 over the `key=value` pairs sorted by key and joined with
    /// commas, truncated to the first 8 bytes (big endian). An empty set
    /// hashes to 0.
    pub fn fingerprint(&self) -> u64 {
        if self.0.is_empty() {
            return 0;
        }

        let mut keys: Vec<&String> = self.0.keys().collect();
        keys.sort();

        let joined = keys
            .into_iter()
            .map(|k| format!("{}={}", k, self.0[k]))
            .collect::<Vec<_>>()
            .join(",");

        let digest = Sha256::digest(joined.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut labels = Labels::new();
        for (k, v) in iter {
            labels.set(k, v);
        }
        labels
    }
}
