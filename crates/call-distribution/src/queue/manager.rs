use std::collections::VecDeque;

use chrono::Utc;
use tracing::{debug, info};

use super::types::{HandlingRequest, QueueEntry, QueueStats, RequestId};

/// FIFO holding area for requests with no eligible agent.
///
/// Entries leave only from the head. An entry that failed processing is put
/// back at the head with its original sequence, so order never changes.
#[derive(Debug, Default)]
pub struct WaitQueue {
    entries: VecDeque<QueueEntry>,
    next_sequence: u64,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request and return its 1-based position
    pub fn enqueue(&mut self, request: HandlingRequest) -> usize {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        info!("📞 Enqueuing request {} (call {}, seq {})", request.id, request.call_id, sequence);

        self.entries.push_back(QueueEntry {
            request,
            sequence,
            enqueued_at: Utc::now(),
            enqueued_instant: tokio::time::Instant::now(),
        });

        let position = self.entries.len();
        info!("📊 Queue size: {} requests", position);
        position
    }

    pub fn peek_front(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    pub fn remove_front(&mut self) -> Option<QueueEntry> {
        let entry = self.entries.pop_front();
        if let Some(entry) = &entry {
            info!("📤 Dequeued request {} (remaining: {})", entry.request.id, self.entries.len());
        }
        entry
    }

    /// Put a previously removed head entry back where it was
    pub fn return_to_front(&mut self, entry: QueueEntry) {
        debug_assert!(
            self.entries.front().map_or(true, |front| front.sequence > entry.sequence),
            "returned entry must precede the current head"
        );
        debug!("↩️ Returning request {} to the queue head", entry.request.id);
        self.entries.push_front(entry);
    }

    pub fn contains_call(&self, call_id: &str) -> bool {
        self.entries.iter().any(|e| e.request.call_id == call_id)
    }

    /// 1-based position of a queued request
    pub fn position_of(&self, request_id: &RequestId) -> Option<usize> {
        self.entries.iter().position(|e| e.request.id == *request_id).map(|i| i + 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            depth: self.entries.len(),
            oldest_wait_seconds: self.entries.front().map(|e| e.waited().as_secs()).unwrap_or(0),
            total_enqueued: self.next_sequence,
        }
    }
}
