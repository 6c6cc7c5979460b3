use crate::config::OFFLINE_QUEUE_KEY;
use crate::models::SymptomReport;
use crate::persistence::Persistence;

/// Durable FIFO of reports captured without connectivity.
///
/// Entries only leave as a whole: the sync coordinator reads the full queue,
/// merges it, then calls [`OfflineQueue::clear_queue`].
#[derive(Clone)]
pub struct OfflineQueue {
    persistence: Persistence,
}

impl OfflineQueue {
    pub fn new(persistence: Persistence) -> Self {
        Self { persistence }
    }

    /// Queued reports, oldest first.
    pub fn get_queue(&self) -> Vec<SymptomReport> {
        self.persistence.load(OFFLINE_QUEUE_KEY, Vec::new())
    }

    /// Append one report and persist the full queue. Returns the new length.
    ///
    /// No deduplication: enqueueing the same report twice syncs it twice.
    pub fn enqueue(&self, report: SymptomReport) -> usize {
        let mut queue = self.get_queue();
        queue.push(report);
        self.persistence.save(OFFLINE_QUEUE_KEY, &queue);
        queue.len()
    }

    /// Drop the queue key entirely.
    pub fn clear_queue(&self) {
        self.persistence.remove(OFFLINE_QUEUE_KEY);
    }

    pub fn len(&self) -> usize {
        self.get_queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
