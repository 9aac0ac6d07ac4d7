//! Per-subject sliding window of recent messages.
//!
//! Each subject gets its own lock so records for one user are serialized
//! while different users proceed concurrently.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use warden_types::{SubjectId, Timestamp};

/// Default window length: 5 seconds.
pub const DEFAULT_WINDOW_MS: u64 = 5_000;

/// Default per-subject record cap under flooding.
pub const DEFAULT_MAX_RECORDS: usize = 50;

/// One message as remembered by the window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRecord {
    pub subject: SubjectId,
    pub body: String,
    /// Declared content types of the attachments.
    pub attachment_kinds: Vec<String>,
    pub sent_at: Timestamp,
}

type Sequence = Arc<Mutex<VecDeque<MessageRecord>>>;

pub struct RateWindow {
    subjects: Mutex<HashMap<SubjectId, Sequence>>,
    window_ms: u64,
    max_records: usize,
}

impl RateWindow {
    pub fn new(window_ms: u64, max_records: usize) -> Self {
        Self {
            subjects: Mutex::new(HashMap::new()),
            window_ms,
            max_records: max_records.max(1),
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Get or create the sequence for a subject.
    async fn sequence(&self, subject: &SubjectId) -> Sequence {
        let mut subjects = self.subjects.lock().await;
        subjects
            .entry(subject.clone())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }

    /// Append a message and return the subject's retained records, oldest first,
    /// including the new one.
    pub async fn record(
        &self,
        subject: &SubjectId,
        body: impl Into<String>,
        attachment_kinds: Vec<String>,
        now: Timestamp,
    ) -> Vec<MessageRecord> {
        let sequence = self.sequence(subject).await;
        let mut records = sequence.lock().await;

        // Keep sent_at non-decreasing even if the clock steps backwards.
        let sent_at = records.back().map_or(now, |last| last.sent_at.max(now));
        records.push_back(MessageRecord {
            subject: subject.clone(),
            body: body.into(),
            attachment_kinds,
            sent_at,
        });
        Self::prune_sequence(&mut records, self.window_ms, sent_at);
        while records.len() > self.max_records {
            records.pop_front();
        }
        records.iter().cloned().collect()
    }

    /// Prune a subject's window at `now` and return how many records remain.
    pub async fn prune(&self, subject: &SubjectId, now: Timestamp) -> usize {
        let sequence = {
            let subjects = self.subjects.lock().await;
            match subjects.get(subject) {
                Some(seq) => seq.clone(),
                None => return 0,
            }
        };
        let mut records = sequence.lock().await;
        Self::prune_sequence(&mut records, self.window_ms, now);
        records.len()
    }

    /// Current retained records for a subject, without pruning.
    pub async fn snapshot(&self, subject: &SubjectId) -> Vec<MessageRecord> {
        let sequence = {
            let subjects = self.subjects.lock().await;
            match subjects.get(subject) {
                Some(seq) => seq.clone(),
                None => return Vec::new(),
            }
        };
        let records = sequence.lock().await;
        records.iter().cloned().collect()
    }

    /// Prune every subject and forget those left empty. Subjects being
    /// recorded right now are skipped. Returns how many subjects were dropped.
    pub async fn sweep(&self, now: Timestamp) -> usize {
        let mut subjects = self.subjects.lock().await;
        let before = subjects.len();
        let window_ms = self.window_ms;
        subjects.retain(|_, sequence| match sequence.try_lock() {
            Ok(mut records) => {
                Self::prune_sequence(&mut records, window_ms, now);
                !records.is_empty()
            }
            Err(_) => true,
        });
        before - subjects.len()
    }

    /// Number of subjects with a tracked window.
    pub async fn subject_count(&self) -> usize {
        self.subjects.lock().await.len()
    }

    fn prune_sequence(records: &mut VecDeque<MessageRecord>, window_ms: u64, now: Timestamp) {
        // Records are ordered by sent_at, so expired ones are all at the front.
        while let Some(front) = records.front() {
            if front.sent_at.elapsed_since(now) < window_ms {
                break;
            }
            records.pop_front();
        }
    }
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS, DEFAULT_MAX_RECORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> SubjectId {
        SubjectId::new(id)
    }

    #[tokio::test]
    async fn record_returns_retained_sequence_in_order() {
        let window = RateWindow::default();
        let u = user("a");
        window.record(&u, "one", vec![], Timestamp::new(1_000)).await;
        let seq = window.record(&u, "two", vec![], Timestamp::new(2_000)).await;
        let bodies: Vec<_> = seq.iter().map(|r| r.body.as_str()).collect();
        assert_eq!(bodies, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn records_older_than_window_are_pruned() {
        let window = RateWindow::default();
        let u = user("a");
        window.record(&u, "old", vec![], Timestamp::new(0)).await;
        // Exactly WINDOW old is outside the window.
        let seq = window.record(&u, "new", vec![], Timestamp::new(5_000)).await;
        assert_eq!(seq.len(), 1);
        assert_eq!(seq[0].body, "new");
    }

    #[tokio::test]
    async fn record_just_inside_window_is_kept() {
        let window = RateWindow::default();
        let u = user("a");
        window.record(&u, "old", vec![], Timestamp::new(0)).await;
        let seq = window.record(&u, "new", vec![], Timestamp::new(4_999)).await;
        assert_eq!(seq.len(), 2);
    }

    #[tokio::test]
    async fn subjects_are_independent() {
        let window = RateWindow::default();
        window.record(&user("a"), "x", vec![], Timestamp::new(0)).await;
        let seq = window.record(&user("b"), "y", vec![], Timestamp::new(10)).await;
        assert_eq!(seq.len(), 1);
        assert_eq!(window.subject_count().await, 2);
    }

    #[tokio::test]
    async fn cap_drops_oldest_first() {
        let window = RateWindow::new(DEFAULT_WINDOW_MS, 3);
        let u = user("a");
        let mut seq = Vec::new();
        for i in 0..5 {
            seq = window
                .record(&u, format!("m{i}"), vec![], Timestamp::new(i))
                .await;
        }
        let bodies: Vec<_> = seq.iter().map(|r| r.body.as_str()).collect();
        assert_eq!(bodies, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn backwards_clock_keeps_order_monotonic() {
        let window = RateWindow::default();
        let u = user("a");
        window.record(&u, "a", vec![], Timestamp::new(3_000)).await;
        let seq = window.record(&u, "b", vec![], Timestamp::new(2_000)).await;
        assert!(seq[0].sent_at <= seq[1].sent_at);
    }

    #[tokio::test]
    async fn prune_is_idempotent() {
        let window = RateWindow::default();
        let u = user("a");
        for t in [0, 1_000, 2_000, 3_000] {
            window.record(&u, "m", vec![], Timestamp::new(t)).await;
        }
        let now = Timestamp::new(6_500);
        let first = window.prune(&u, now).await;
        let second = window.prune(&u, now).await;
        assert_eq!(first, 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn sweep_drops_empty_subjects() {
        let window = RateWindow::default();
        window.record(&user("a"), "m", vec![], Timestamp::new(0)).await;
        window.record(&user("b"), "m", vec![], Timestamp::new(4_000)).await;
        assert_eq!(window.sweep(Timestamp::new(6_000)).await, 1);
        assert_eq!(window.subject_count().await, 1);
        assert!(window.snapshot(&user("a")).await.is_empty());
    }
}
