use std::sync::Arc;

use alloy_primitives::B256;
use crucible_types::Bundle;
use parking_lot::RwLock;

use crate::traits::BundleSource;

/// In-memory store of admitted bundles, in admission order.
#[derive(Debug, Default)]
pub struct BundlePool {
    bundles: RwLock<Vec<Arc<Bundle>>>,
}

impl BundlePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bundle unless one with the same hash is already present.
    pub fn insert(&self, bundle: Bundle) -> bool {
        let mut bundles = self.bundles.write();
        if bundles.iter().any(|b| b.hash == bundle.hash) {
            return false;
        }
        bundles.push(Arc::new(bundle));
        true
    }

    pub fn remove(&self, hash: &B256) -> Option<Arc<Bundle>> {
        let mut bundles = self.bundles.write();
        let index = bundles.iter().position(|b| b.hash == *hash)?;
        Some(bundles.remove(index))
    }

    /// Drops bundles pinned to blocks before `block_number`.
    pub fn prune(&self, block_number: u64) {
        self.bundles.write().retain(|b| b.block_number.is_none_or(|n| n >= block_number));
    }

    pub fn len(&self) -> usize {
        self.bundles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.read().is_empty()
    }
}

impl BundleSource for BundlePool {
    fn bundles_for(&self, block_number: u64) -> Vec<Arc<Bundle>> {
        self.bundles.read().iter().filter(|b| b.targets(block_number)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Bytes;

    use super::*;

    fn bundle(tag: u8, block_number: Option<u64>) -> Bundle {
        Bundle::new(vec![Bytes::from(vec![tag; 8])], vec![], block_number)
    }

    #[test]
    fn test_bundles_for_block() {
        let pool = BundlePool::new();
        assert!(pool.insert(bundle(1, None)));
        assert!(pool.insert(bundle(2, Some(10))));
        assert!(pool.insert(bundle(3, Some(11))));

        let hashes: Vec<_> = pool.bundles_for(10).iter().map(|b| b.hash).collect();
        assert_eq!(hashes, vec![bundle(1, None).hash, bundle(2, Some(10)).hash]);
        assert_eq!(pool.bundles_for(11).len(), 2);
        assert_eq!(pool.bundles_for(12).len(), 1);
    }

    #[test]
    fn test_insert_dedup_and_remove() {
        let pool = BundlePool::new();
        assert!(pool.insert(bundle(1, None)));
        assert!(!pool.insert(bundle(1, None)));
        assert_eq!(pool.len(), 1);

        let hash = bundle(1, None).hash;
        assert!(pool.remove(&hash).is_some());
        assert!(pool.remove(&hash).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_prune() {
        let pool = BundlePool::new();
        pool.insert(bundle(1, Some(5)));
        pool.insert(bundle(2, Some(6)));
        pool.insert(bundle(3, None));

        pool.prune(6);
        assert_eq!(pool.len(), 2);
        assert!(pool.bundles_for(5).iter().all(|b| b.block_number != Some(5)));
    }
}
