//! Failure review queue.
//!
//! Entries live in a map keyed by [`FailureId`] and are ordered by
//! last-updated time in a separate tree, so targeted removal does not
//! require a scan. Both structures sit behind one lock and change
//! together. Timestamps never run backwards; a sequence number breaks
//! ties between entries touched within the same clock tick.

use crate::failure::{Failure, FailureId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

type OrderKey = (DateTime<Utc>, u64);

#[derive(Debug)]
struct Entry {
    failure: Failure,
    last_updated: DateTime<Utc>,
    // None while checked out by `poll`
    key: Option<OrderKey>,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: HashMap<FailureId, Entry>,
    order: BTreeMap<OrderKey, FailureId>,
    seq: u64,
    last: Option<DateTime<Utc>>,
}

impl QueueState {
    fn next_key(&mut self) -> OrderKey {
        let now = Utc::now();
        let stamp = self.last.map_or(now, |last| last.max(now));
        self.last = Some(stamp);
        self.seq += 1;
        (stamp, self.seq)
    }

    fn enqueue(&mut self, id: &FailureId) {
        let key = self.next_key();
        if let Some(entry) = self.entries.get_mut(id) {
            if let Some(old) = entry.key.replace(key) {
                self.order.remove(&old);
            }
            entry.last_updated = key.0;
            self.order.insert(key, id.clone());
        }
    }

    fn remove(&mut self, id: &FailureId) -> Option<Failure> {
        let entry = self.entries.remove(id)?;
        if let Some(key) = entry.key {
            self.order.remove(&key);
        }
        Some(entry.failure)
    }

    fn remove_where(&mut self, pred: impl Fn(&Failure) -> bool) -> Vec<FailureId> {
        let ids: Vec<FailureId> = self
            .entries
            .iter()
            .filter(|(_, entry)| pred(&entry.failure))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            self.remove(id);
        }
        ids
    }
}

/// Oldest-first queue of failures awaiting review
#[derive(Debug, Default)]
pub struct FailureQueue {
    state: Mutex<QueueState>,
}

impl FailureQueue {
    /// Empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a failure. A failure whose id is already present replaces
    /// the stored value and keeps its position; one checked out by
    /// [`poll`](Self::poll) goes back in as the newest entry. Returns
    /// true if the id was new.
    pub fn add_value(&self, failure: Failure) -> bool {
        let id = failure.id();
        let mut state = self.state();
        if let Some(entry) = state.entries.get_mut(&id) {
            entry.failure = failure;
            let checked_out = entry.key.is_none();
            if checked_out {
                state.enqueue(&id);
            }
            tracing::debug!(failure = %id, requeued = checked_out, "pixelcheck.queue.replaced");
            return false;
        }
        state.entries.insert(
            id.clone(),
            Entry {
                failure,
                last_updated: Utc::now(),
                key: None,
            },
        );
        state.enqueue(&id);
        tracing::debug!(failure = %id, pending = state.order.len(), "pixelcheck.queue.added");
        true
    }

    /// Oldest queued failure, left in place
    #[must_use]
    pub fn peek(&self) -> Option<(FailureId, Failure)> {
        let state = self.state();
        let (_, id) = state.order.first_key_value()?;
        let entry = state.entries.get(id)?;
        Some((id.clone(), entry.failure.clone()))
    }

    /// Take the oldest failure out of the ordering. It stays known to
    /// the queue until removed, and [`touch`](Self::touch) puts it back.
    #[must_use]
    pub fn poll(&self) -> Option<(FailureId, Failure)> {
        let mut state = self.state();
        let (_, id) = state.order.pop_first()?;
        let entry = state.entries.get_mut(&id)?;
        entry.key = None;
        Some((id, entry.failure.clone()))
    }

    /// Stored failure by id
    #[must_use]
    pub fn get(&self, id: &FailureId) -> Option<Failure> {
        self.state().entries.get(id).map(|entry| entry.failure.clone())
    }

    /// When `id` was last queued or touched
    #[must_use]
    pub fn last_updated(&self, id: &FailureId) -> Option<DateTime<Utc>> {
        self.state().entries.get(id).map(|entry| entry.last_updated)
    }

    /// Refresh the timestamp of `id` and move it to the back of the
    /// queue. Returns false if the id is unknown.
    pub fn touch(&self, id: &FailureId) -> bool {
        let mut state = self.state();
        if !state.entries.contains_key(id) {
            return false;
        }
        state.enqueue(id);
        true
    }

    /// Remove `id` from the queue entirely
    pub fn remove(&self, id: &FailureId) -> Option<Failure> {
        self.state().remove(id)
    }

    /// Remove everything, returning the removed ids
    pub fn clear(&self) -> Vec<FailureId> {
        let mut state = self.state();
        let ids = state.entries.keys().cloned().collect();
        state.entries.clear();
        state.order.clear();
        ids
    }

    /// Remove every failure of tests named `test_name`
    pub fn clear_test_name(&self, test_name: &str) -> Vec<FailureId> {
        self.state().remove_where(|failure| failure.test_name() == test_name)
    }

    /// Remove every failure of the test `test_id`
    pub fn clear_test_id(&self, test_id: &str) -> Vec<FailureId> {
        self.state().remove_where(|failure| failure.screenshot.test_id == test_id)
    }

    /// Queued ids, oldest first. Checked-out entries are not listed.
    #[must_use]
    pub fn ids(&self) -> Vec<FailureId> {
        self.state().order.values().cloned().collect()
    }

    /// Number of known failures, including checked-out ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    /// Number of failures waiting in the ordering
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state().order.len()
    }

    /// No failures known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::screenshot::ScreenshotCheck;

    fn failure(test_id: &str) -> Failure {
        Failure::new(ScreenshotCheck::new(test_id, "suite", format!("{test_id}.png"), "h"))
    }

    fn polled(queue: &FailureQueue) -> Option<String> {
        queue.poll().map(|(id, _)| id.test_id)
    }

    #[test]
    fn test_ignore_moves_to_back() {
        let queue = FailureQueue::new();
        queue.add_value(failure("f1"));
        queue.add_value(failure("f2"));
        let (f1, _) = queue.poll().unwrap();
        assert_eq!(f1.test_id, "f1");
        assert!(queue.touch(&f1));
        assert_eq!(polled(&queue).as_deref(), Some("f2"));
        assert_eq!(polled(&queue).as_deref(), Some("f1"));
        assert_eq!(polled(&queue), None);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_touch_without_poll_reorders() {
        let queue = FailureQueue::new();
        queue.add_value(failure("f1"));
        queue.add_value(failure("f2"));
        queue.add_value(failure("f3"));
        let before = queue.last_updated(&failure("f1").id()).unwrap();
        queue.touch(&failure("f1").id());
        assert!(queue.last_updated(&failure("f1").id()).unwrap() >= before);
        let order: Vec<_> = queue.ids().into_iter().map(|id| id.test_id).collect();
        assert_eq!(order, vec!["f2", "f3", "f1"]);
    }

    #[test]
    fn test_add_existing_replaces_in_place() {
        let queue = FailureQueue::new();
        assert!(queue.add_value(failure("f1")));
        queue.add_value(failure("f2"));
        let replacement = failure("f1").with_current_hash(Some("new".to_string()));
        assert!(!queue.add_value(replacement));
        assert_eq!(queue.pending(), 2);
        let (id, value) = queue.peek().unwrap();
        assert_eq!(id.test_id, "f1");
        assert_eq!(value.current_hash.as_deref(), Some("new"));
    }

    #[test]
    fn test_refailed_after_poll_is_requeued() {
        let queue = FailureQueue::new();
        queue.add_value(failure("a"));
        queue.add_value(failure("b"));
        assert_eq!(polled(&queue).as_deref(), Some("a"));
        let refailed = failure("a").with_current_hash(Some("again".to_string()));
        assert!(!queue.add_value(refailed));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending(), 2);
        let order: Vec<_> = queue.ids().into_iter().map(|id| id.test_id).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(polled(&queue).as_deref(), Some("b"));
        let (id, value) = queue.poll().unwrap();
        assert_eq!(id.test_id, "a");
        assert_eq!(value.current_hash.as_deref(), Some("again"));
    }

    #[test]
    fn test_remove_from_middle() {
        let queue = FailureQueue::new();
        for name in ["f1", "f2", "f3"] {
            queue.add_value(failure(name));
        }
        assert!(queue.remove(&failure("f2").id()).is_some());
        assert!(queue.remove(&failure("f2").id()).is_none());
        let order: Vec<_> = queue.ids().into_iter().map(|id| id.test_id).collect();
        assert_eq!(order, vec!["f1", "f3"]);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let queue = FailureQueue::new();
        queue.add_value(failure("f1"));
        assert_eq!(queue.peek().map(|(id, _)| id.test_id).as_deref(), Some("f1"));
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_polled_entry_still_known() {
        let queue = FailureQueue::new();
        queue.add_value(failure("f1"));
        let (id, _) = queue.poll().unwrap();
        assert!(queue.peek().is_none());
        assert!(queue.get(&id).is_some());
        assert!(!queue.is_empty());
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_scoped_clear() {
        let queue = FailureQueue::new();
        queue.add_value(failure("a"));
        queue.add_value(Failure::new(
            ScreenshotCheck::new("b", "suite", "b.png", "h").with_test_name("login"),
        ));
        queue.add_value(failure("c"));
        assert_eq!(queue.clear_test_name("login").len(), 1);
        assert_eq!(queue.clear_test_id("a"), vec![failure("a").id()]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.clear().len(), 1);
        assert!(queue.is_empty());
        assert!(queue.peek().is_none());
    }

    #[test]
    fn test_unknown_touch_is_noop() {
        let queue = FailureQueue::new();
        assert!(!queue.touch(&FailureId::new("x", "y", "z")));
    }
}
