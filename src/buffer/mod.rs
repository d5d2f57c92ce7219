use std::collections::VecDeque;

use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use crate::types::ReplaySample;

/// Bounded FIFO store of (features, label) pairs. Samples arrive unlabeled
/// and receive their label once the paired signal is verified; labels are
/// write-once. Capacity eviction may discard a still-pending sample before
/// its label arrives — accepted information loss, not an error.
pub struct ReplayBuffer {
    samples: VecDeque<ReplaySample>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn add(&mut self, sample: ReplaySample) {
        if self.samples.len() >= self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                debug!("Evicted replay sample {} (labeled: {})", evicted.id, evicted.label.is_some());
            }
        }
        self.samples.push_back(sample);
    }

    /// Sets the label exactly once. A second call for the same id is a no-op;
    /// returns whether the label was written.
    pub fn label_by_id(&mut self, id: Uuid, label: u8) -> bool {
        match self.samples.iter_mut().find(|s| s.id == id) {
            Some(sample) if sample.label.is_none() => {
                sample.label = Some(label);
                true
            }
            _ => false,
        }
    }

    /// Draws up to `n` labeled samples uniformly at random with replacement.
    /// Empty when no labeled sample exists.
    pub fn sample_labeled(&self, n: usize) -> Vec<ReplaySample> {
        let labeled: Vec<&ReplaySample> =
            self.samples.iter().filter(|s| s.label.is_some()).collect();
        if labeled.is_empty() {
            return Vec::new();
        }

        let mut rng = rand::thread_rng();
        let sample_size = n.min(labeled.len());
        (0..sample_size)
            .map(|_| labeled[rng.gen_range(0..labeled.len())].clone())
            .collect()
    }

    pub fn labeled_count(&self) -> usize {
        self.samples.iter().filter(|s| s.label.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(id: Uuid) -> ReplaySample {
        ReplaySample {
            id,
            features: vec![0.0; 18],
            label: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_capacity_eviction_is_fifo() {
        let mut buffer = ReplayBuffer::new(3);
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            buffer.add(sample(*id));
        }
        assert_eq!(buffer.len(), 3);
        // Oldest entry is gone
        assert!(!buffer.label_by_id(ids[0], 1));
        assert!(buffer.label_by_id(ids[1], 1));
    }

    #[test]
    fn test_label_is_write_once() {
        let mut buffer = ReplayBuffer::new(10);
        let id = Uuid::new_v4();
        buffer.add(sample(id));

        assert!(buffer.label_by_id(id, 1));
        assert!(!buffer.label_by_id(id, 0));

        let labeled = buffer.sample_labeled(1);
        assert_eq!(labeled[0].label, Some(1));
    }

    #[test]
    fn test_sample_labeled_only_returns_labeled() {
        let mut buffer = ReplayBuffer::new(10);
        let labeled_id = Uuid::new_v4();
        buffer.add(sample(labeled_id));
        buffer.add(sample(Uuid::new_v4()));
        buffer.label_by_id(labeled_id, 0);

        assert_eq!(buffer.labeled_count(), 1);
        let batch = buffer.sample_labeled(5);
        assert_eq!(batch.len(), 1);
        assert!(batch.iter().all(|s| s.id == labeled_id));

        // With replacement: a draw of n from a smaller labeled set repeats
        let other = Uuid::new_v4();
        buffer.add(sample(other));
        buffer.label_by_id(other, 1);
        let batch = buffer.sample_labeled(2);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_sample_labeled_empty_when_none_labeled() {
        let mut buffer = ReplayBuffer::new(10);
        buffer.add(sample(Uuid::new_v4()));
        assert!(buffer.sample_labeled(4).is_empty());
        assert_eq!(buffer.labeled_count(), 0);
    }
}
