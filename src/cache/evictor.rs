//! Eviction policy for the in-memory list store.
//!
//! Whole keys are evicted. Priority is the time since the key was last read
//! or written, with larger lists preferred among equally old ones.

use std::collections::BinaryHeap;
use std::time::Instant;

/// What the evictor needs to know about a stored list.
#[derive(Debug, Clone, Copy)]
pub struct ListUsage {
    pub bytes: usize,
    pub last_access: Instant,
}

/// An eviction candidate with its computed priority score.
#[derive(Debug, Clone)]
pub struct EvictionCandidate {
    pub key: String,
    pub score: f64,
    pub bytes: usize,
}

// Higher score = higher eviction priority (should be evicted first).
impl PartialEq for EvictionCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.bytes == other.bytes
    }
}

impl Eq for EvictionCandidate {}

impl PartialOrd for EvictionCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EvictionCandidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.bytes.cmp(&other.bytes))
    }
}

/// Least-recently-used key selection.
#[derive(Debug, Default)]
pub struct Evictor;

impl Evictor {
    pub fn new() -> Self {
        Self
    }

    /// Seconds since last access.
    pub fn compute_priority(&self, usage: &ListUsage, now: Instant) -> f64 {
        now.saturating_duration_since(usage.last_access).as_secs_f64()
    }

    /// Select keys to drop until at least `bytes_to_free` bytes are released.
    ///
    /// Keys in `protected` are never selected.
    pub fn select_victims<'a>(
        &self,
        lists: impl Iterator<Item = (&'a String, ListUsage)>,
        bytes_to_free: usize,
        protected: &[&str],
    ) -> Vec<EvictionCandidate> {
        let now = Instant::now();
        let mut heap: BinaryHeap<EvictionCandidate> = lists
            .filter(|(key, _)| !protected.contains(&key.as_str()))
            .map(|(key, usage)| EvictionCandidate {
                key: key.clone(),
                score: self.compute_priority(&usage, now),
                bytes: usage.bytes,
            })
            .collect();

        let mut victims = Vec::new();
        let mut freed = 0;
        while freed < bytes_to_free {
            let Some(candidate) = heap.pop() else {
                break;
            };
            freed += candidate.bytes;
            victims.push(candidate);
        }
        victims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn usage(bytes: usize, age_secs: u64) -> ListUsage {
        let now = Instant::now();
        ListUsage {
            bytes,
            last_access: now.checked_sub(Duration::from_secs(age_secs)).unwrap_or(now),
        }
    }

    #[test]
    fn test_oldest_first() {
        let keys = ["fresh".to_string(), "stale".to_string(), "older".to_string()];
        let lists = vec![
            (&keys[0], usage(100, 1)),
            (&keys[1], usage(100, 300)),
            (&keys[2], usage(100, 60)),
        ];

        let victims = Evictor::new().select_victims(lists.into_iter(), 150, &[]);
        let names: Vec<&str> = victims.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(names, vec!["stale", "older"]);
    }

    #[test]
    fn test_protected_keys_excluded() {
        let keys = ["a".to_string(), "b".to_string()];
        let lists = vec![(&keys[0], usage(10, 500)), (&keys[1], usage(10, 5))];

        let victims = Evictor::new().select_victims(lists.into_iter(), 100, &["a"]);
        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].key, "b");
    }

    #[test]
    fn test_nothing_to_free() {
        let keys = ["a".to_string()];
        let lists = vec![(&keys[0], usage(10, 500))];
        assert!(Evictor::new().select_victims(lists.into_iter(), 0, &[]).is_empty());
    }
}
