use std::collections::{HashSet, VecDeque};

/// Bounded memory of recently handled command ids.
///
/// Eviction is FIFO by insertion order. Looking an id up does not refresh
/// it: the cache only has to cover a short redelivery window.
#[derive(Debug)]
pub struct DedupCache {
    capacity: usize,
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
        }
    }

    pub fn seen(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Remember `id`. Recording an id already present is a no-op.
    pub fn record(&mut self, id: &str) {
        if self.ids.contains(id) {
            return;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut cache = DedupCache::new(3);
        for id in ["a", "b", "c", "d"] {
            cache.record(id);
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.seen("a"));
        assert!(cache.seen("b"));
        assert!(cache.seen("d"));
    }

    #[test]
    fn test_lookup_does_not_refresh_position() {
        let mut cache = DedupCache::new(2);
        cache.record("a");
        cache.record("b");
        assert!(cache.seen("a"));
        cache.record("a");
        cache.record("c");

        assert!(!cache.seen("a"));
        assert!(cache.seen("b"));
        assert!(cache.seen("c"));
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut cache = DedupCache::new(5);
        for i in 0..100 {
            cache.record(&format!("cmd-{i}"));
            assert!(cache.len() <= cache.capacity());
        }
        assert!(cache.seen("cmd-99"));
        assert!(!cache.seen("cmd-94"));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut cache = DedupCache::new(0);
        cache.record("x");
        assert!(cache.seen("x"));
        assert_eq!(cache.capacity(), 1);
    }
}
