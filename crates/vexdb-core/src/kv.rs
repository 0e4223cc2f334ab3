//! Key/value collaborators.
//!
//! [`MemoryKv`] keeps pairs in an ordered map so range scans come back in
//! lexicographic order. [`RootedKv`] confines another store to one key-space root,
//! which is how the master keeps catalog metadata and generic KV data apart.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::traits::KvBase;

/// In-memory ordered key/value store.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KvBase for MemoryKv {
    fn save(&self, key: &str, value: &str) -> CoreResult<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn multi_save(&self, kvs: &[(String, String)]) -> CoreResult<()> {
        let mut entries = self.entries.write();
        for (key, value) in kvs {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn load(&self, key: &str) -> CoreResult<String> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::not_found("key", key))
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn load_range(
        &self,
        low: &str,
        high: &str,
        limit: usize,
    ) -> CoreResult<(Vec<String>, Vec<String>)> {
        if !high.is_empty() && high <= low {
            return Ok((Vec::new(), Vec::new()));
        }

        let upper = if high.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(high)
        };
        let take = if limit == 0 { usize::MAX } else { limit };

        let entries = self.entries.read();
        let (keys, values) = entries
            .range::<str, _>((Bound::Included(low), upper))
            .take(take)
            .map(|(k, v)| (k.clone(), v.clone()))
            .unzip();
        Ok((keys, values))
    }
}

/// View of a store restricted to keys under `root`.
///
/// Keys passed in and returned are relative to the root; the stored key is
/// `"{root}/{key}"`.
#[derive(Clone)]
pub struct RootedKv {
    root: String,
    inner: Arc<dyn KvBase>,
}

impl RootedKv {
    /// Wraps `inner`; a trailing `/` on `root` is ignored.
    #[must_use]
    pub fn new(inner: Arc<dyn KvBase>, root: impl Into<String>) -> Self {
        let mut root = root.into();
        while root.ends_with('/') {
            root.pop();
        }
        Self { root, inner }
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}/{}", self.root, key)
    }
}

impl std::fmt::Debug for RootedKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootedKv").field("root", &self.root).finish()
    }
}

impl KvBase for RootedKv {
    fn save(&self, key: &str, value: &str) -> CoreResult<()> {
        self.inner.save(&self.full_key(key), value)
    }

    fn multi_save(&self, kvs: &[(String, String)]) -> CoreResult<()> {
        let rooted: Vec<(String, String)> = kvs
            .iter()
            .map(|(k, v)| (self.full_key(k), v.clone()))
            .collect();
        self.inner.multi_save(&rooted)
    }

    fn load(&self, key: &str) -> CoreResult<String> {
        self.inner.load(&self.full_key(key))
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        self.inner.remove(&self.full_key(key))
    }

    fn load_range(
        &self,
        low: &str,
        high: &str,
        limit: usize,
    ) -> CoreResult<(Vec<String>, Vec<String>)> {
        let low = self.full_key(low);
        // an open upper bound must still stay inside the root
        let high = if high.is_empty() {
            crate::traits::prefix_end(&self.full_key("")).unwrap_or_default()
        } else {
            self.full_key(high)
        };

        let (keys, values) = self.inner.load_range(&low, &high, limit)?;
        let strip = self.root.len() + 1;
        let keys = keys.into_iter().map(|k| k[strip..].to_string()).collect();
        Ok((keys, values))
    }
}
