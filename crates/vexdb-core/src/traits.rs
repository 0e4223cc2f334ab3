use crate::error::CoreResult;

/// String key/value store backing the catalog and the parameter table.
///
/// Keys are compared lexicographically by their UTF-8 bytes. Implementations must be
/// safe to share between threads; each call is individually atomic.
pub trait KvBase: Send + Sync {
    /// Inserts or replaces a value.
    fn save(&self, key: &str, value: &str) -> CoreResult<()>;

    /// Writes several pairs.
    ///
    /// The default implementation saves each pair in order and stops at the first
    /// failure. Stores with batch writes should override it.
    fn multi_save(&self, kvs: &[(String, String)]) -> CoreResult<()> {
        for (key, value) in kvs {
            self.save(key, value)?;
        }
        Ok(())
    }

    /// Reads a value; fails `NotFound` if the key is absent.
    fn load(&self, key: &str) -> CoreResult<String>;

    /// Removes a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> CoreResult<()>;

    /// Returns pairs with `low <= key < high` in ascending key order.
    ///
    /// `values[i]` belongs to `keys[i]`. An empty `high` leaves the range open above;
    /// a `limit` of zero means unbounded.
    fn load_range(&self, low: &str, high: &str, limit: usize)
        -> CoreResult<(Vec<String>, Vec<String>)>;

    /// Returns every pair whose key starts with `prefix`.
    fn load_with_prefix(&self, prefix: &str) -> CoreResult<(Vec<String>, Vec<String>)> {
        let high = prefix_end(prefix).unwrap_or_default();
        self.load_range(prefix, &high, 0)
    }
}

/// Smallest string greater than every string starting with `prefix`.
///
/// Returns `None` when no such bound exists (empty prefix).
#[must_use]
pub fn prefix_end(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let mut next = last as u32 + 1;
        // skip the surrogate gap
        if (0xD800..=0xDFFF).contains(&next) {
            next = 0xE000;
        }
        if let Some(c) = char::from_u32(next) {
            chars.push(c);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end("meta/collection/").as_deref(), Some("meta/collection0"));
        assert_eq!(prefix_end("ab").as_deref(), Some("ac"));
        assert_eq!(prefix_end(""), None);
        assert_eq!(prefix_end("a\u{10FFFF}").as_deref(), Some("b"));
    }
}
