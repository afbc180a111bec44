use crate::storage::{Storage, StorageResult};
use crate::{CrawlError, Result};
use bloomfilter::Bloom;
use parking_lot::RwLock;

/// Additive-only probabilistic set shared by every worker
///
/// No false negatives; false positives at roughly the configured rate once
/// `capacity` items have been added. The exact store stays authoritative
/// wherever a false positive would lose data.
pub struct SeenFilter {
    name: String,
    bloom: RwLock<Bloom<String>>,
}

impl SeenFilter {
    /// Creates an empty filter sized for `capacity` items
    pub fn new(name: &str, capacity: usize, false_positive_rate: f64) -> Result<Self> {
        let bloom = Bloom::new_for_fp_rate(capacity, false_positive_rate)
            .map_err(|e| CrawlError::Filter(format!("{name}: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            bloom: RwLock::new(bloom),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds `key` and reports whether it was (probably) present already
    pub fn test_and_add(&self, key: &str) -> bool {
        self.bloom.write().check_and_set(&key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.bloom.read().check(&key.to_string())
    }

    pub fn insert(&self, key: &str) {
        self.bloom.write().set(&key.to_string());
    }

    /// Loads every frontier URL, live or removed
    pub fn populate_from_frontier(&self, storage: &dyn Storage) -> StorageResult<usize> {
        let mut bloom = self.bloom.write();
        storage.for_each_frontier_url(&mut |url: &str| bloom.set(&url.to_string()))
    }

    /// Loads every stored document hash
    pub fn populate_from_documents(&self, storage: &dyn Storage) -> StorageResult<usize> {
        let mut bloom = self.bloom.write();
        storage.for_each_document_hash(&mut |hash: &str| bloom.set(&hash.to_string()))
    }

    /// Serializes the bitmap and hash keys
    pub fn snapshot(&self) -> Vec<u8> {
        self.bloom.read().to_bytes()
    }

    /// Replaces the filter with a snapshot taken by [`SeenFilter::snapshot`]
    ///
    /// A snapshot sized differently from the current filter (the capacity or
    /// rate changed between runs) is ignored and `false` is returned.
    pub fn restore(&self, data: Vec<u8>) -> Result<bool> {
        let restored = Bloom::from_bytes(data)
            .map_err(|e| CrawlError::Filter(format!("{}: {e}", self.name)))?;

        let mut bloom = self.bloom.write();
        if restored.len() != bloom.len()
            || restored.number_of_hash_functions() != bloom.number_of_hash_functions()
        {
            return Ok(false);
        }

        *bloom = restored;
        Ok(true)
    }

    /// Writes the snapshot under this filter's name
    pub fn flush(&self, storage: &dyn Storage) -> StorageResult<()> {
        storage.save_filter_snapshot(&self.name, &self.snapshot())
    }

    /// Restores from the store if a compatible snapshot exists
    pub fn load(&self, storage: &dyn Storage) -> Result<bool> {
        match storage.load_filter_snapshot(&self.name)? {
            Some(data) => self.restore(data),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FrontierEntry, SqliteStorage};

    #[test]
    fn test_test_and_add() {
        let filter = SeenFilter::new("urls", 1000, 0.0001).unwrap();
        assert!(!filter.test_and_add("https://a.example/x"));
        assert!(filter.test_and_add("https://a.example/x"));
        assert!(filter.contains("https://a.example/x"));
        assert!(!filter.contains("https://a.example/y"));
    }

    #[test]
    fn test_no_false_negatives() {
        let filter = SeenFilter::new("urls", 10_000, 0.00001).unwrap();
        for i in 0..5000 {
            filter.insert(&format!("https://a.example/{i}"));
        }
        assert!((0..5000).all(|i| filter.contains(&format!("https://a.example/{i}"))));
    }

    #[test]
    fn test_populate_from_frontier() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .insert_frontier(&[
                FrontierEntry::new("https://a.example/x", "", ""),
                FrontierEntry::new("https://a.example/y", "", ""),
            ])
            .unwrap();
        storage.mark_removed("https://a.example/x").unwrap();

        let filter = SeenFilter::new("urls", 1000, 0.0001).unwrap();
        assert_eq!(filter.populate_from_frontier(&storage).unwrap(), 2);
        assert!(filter.contains("https://a.example/x"));
        assert!(filter.contains("https://a.example/y"));
    }

    #[test]
    fn test_flush_and_load() {
        let storage = SqliteStorage::new_in_memory().unwrap();

        let filter = SeenFilter::new("urls", 1000, 0.0001).unwrap();
        filter.insert("https://a.example/rejected");
        filter.flush(&storage).unwrap();

        let fresh = SeenFilter::new("urls", 1000, 0.0001).unwrap();
        assert!(fresh.load(&storage).unwrap());
        assert!(fresh.contains("https://a.example/rejected"));
    }

    #[test]
    fn test_incompatible_snapshot_is_ignored() {
        let small = SeenFilter::new("urls", 100, 0.01).unwrap();
        let large = SeenFilter::new("urls", 100_000, 0.00001).unwrap();
        assert!(!large.restore(small.snapshot()).unwrap());
    }
}
