use crate::record::WriteIntent;

/// Upper bound on the up-front allocation; larger batches grow as they fill.
const PREALLOCATE_LIMIT: usize = 1024;

/// Write intents waiting for the next flush, in submission order.
#[derive(Debug, Default)]
pub struct PendingBatch {
    capacity: usize,
    intents: Vec<WriteIntent>,
}

impl PendingBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            intents: Vec::with_capacity(capacity.min(PREALLOCATE_LIMIT)),
        }
    }

    /// Appends `intent` and returns true once the batch is full.
    pub fn push(&mut self, intent: WriteIntent) -> bool {
        self.intents.push(intent);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.intents.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Hands over the accumulated intents, leaving an empty batch behind.
    pub fn drain(&mut self) -> Vec<WriteIntent> {
        let next = Vec::with_capacity(self.capacity.min(PREALLOCATE_LIMIT));
        std::mem::replace(&mut self.intents, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriteMode;
    use crate::record::intent;
    use chrono::Utc;

    #[test]
    fn fills_then_drains_in_order() {
        let now = Utc::now();
        let mut batch = PendingBatch::with_capacity(3);
        assert!(!batch.push(intent(WriteMode::Insert, 0, now)));
        assert!(!batch.push(intent(WriteMode::Insert, 1, now)));
        assert!(batch.push(intent(WriteMode::Insert, 2, now)));

        let drained = batch.drain();
        assert!(batch.is_empty());
        assert_eq!(drained.len(), 3);
        let values: Vec<u64> = drained
            .iter()
            .map(|i| match i {
                WriteIntent::Insert(record) => record.value,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(values, vec![0, 1, 2]);

        assert!(!batch.push(intent(WriteMode::Insert, 3, now)));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn huge_capacity_does_not_preallocate() {
        let mut batch = PendingBatch::with_capacity(usize::MAX);
        assert!(!batch.push(intent(WriteMode::Insert, 0, Utc::now())));
        assert_eq!(batch.drain().len(), 1);
        assert!(!batch.is_full());
    }
}
