//! Thread-safe result collection.
//!
//! Workers hand every terminal [`Outcome`] to one [`ResultAggregator`]. A
//! single lock covers the checkpoint and the per-status [`ResultSet`], so an
//! outcome is either in both or in neither, and snapshots written to disk are
//! never interleaved.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::HandleCheckError;
use crate::types::{Identifier, Outcome, Status};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Identifiers grouped by status, in the order their outcomes arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    by_status: BTreeMap<Status, Vec<Identifier>>,
}

impl ResultSet {
    /// An empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the outcomes already recorded in `checkpoint`.
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        let mut results = Self::new();
        for outcome in checkpoint.outcomes.values() {
            results.push(outcome);
        }
        results
    }

    /// Append one outcome.
    pub fn push(&mut self, outcome: &Outcome) {
        self.by_status
            .entry(outcome.status)
            .or_default()
            .push(outcome.identifier.clone());
    }

    /// Identifiers recorded with `status`.
    pub fn identifiers(&self, status: Status) -> &[Identifier] {
        self.by_status
            .get(&status)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Statuses with at least one identifier, with their identifiers.
    pub fn iter(&self) -> impl Iterator<Item = (Status, &[Identifier])> {
        self.by_status
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(status, ids)| (*status, ids.as_slice()))
    }

    /// Total identifiers across every status.
    pub fn len(&self) -> usize {
        self.by_status.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Inner {
    checkpoint: Checkpoint,
    results: ResultSet,
    in_flight: HashSet<Identifier>,
    completed: usize,
    since_save: usize,
}

/// Single guarded owner of the checkpoint and the result set.
pub struct ResultAggregator {
    inner: Mutex<Inner>,
    store: CheckpointStore,
    save_every: usize,
}

impl ResultAggregator {
    /// Wrap `checkpoint`, persisting through `store` every `save_every` outcomes.
    pub fn new(checkpoint: Checkpoint, store: CheckpointStore, save_every: usize) -> Self {
        let results = ResultSet::from_checkpoint(&checkpoint);
        Self {
            inner: Mutex::new(Inner {
                checkpoint,
                results,
                in_flight: HashSet::new(),
                completed: 0,
                since_save: 0,
            }),
            store,
            save_every: save_every.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Mark `identifier` as being worked on.
    ///
    /// It stays in the checkpoint's pending list until [`record`](Self::record)
    /// resolves it.
    pub fn begin(&self, identifier: &str) {
        let mut inner = self.lock();
        if !inner.checkpoint.pending.iter().any(|id| id == identifier) {
            inner.checkpoint.pending.push_back(identifier.to_string());
        }
        inner.in_flight.insert(identifier.to_string());
    }

    /// Store a terminal outcome and resolve its identifier.
    pub fn record(&self, outcome: Outcome) {
        let mut inner = self.lock();

        if let Some(pos) = inner
            .checkpoint
            .pending
            .iter()
            .position(|id| *id == outcome.identifier)
        {
            inner.checkpoint.pending.remove(pos);
        }
        inner.in_flight.remove(&outcome.identifier);

        debug!(identifier = %outcome.identifier, status = %outcome.status, "Outcome recorded");
        inner.results.push(&outcome);
        inner
            .checkpoint
            .outcomes
            .insert(outcome.identifier.clone(), outcome);
        inner.completed += 1;
        inner.since_save += 1;

        if inner.since_save >= self.save_every {
            inner.since_save = 0;
            self.persist(&mut inner);
        }
    }

    /// Record a service-wide cooldown and persist it immediately.
    pub fn note_cooldown(&self, until: DateTime<Utc>) {
        let mut inner = self.lock();
        inner.checkpoint.extend_cooldown(until);
        info!(until = %until, "Cooldown recorded");
        self.persist(&mut inner);
    }

    /// Persist the current state, reporting failure to the caller.
    pub fn save(&self) -> Result<(), HandleCheckError> {
        let mut inner = self.lock();
        inner.since_save = 0;
        inner.checkpoint.touch();
        self.store.save(&inner.checkpoint)
    }

    // Blocking write under the lock, so the file always matches a published
    // state. Runs every `save_every` outcomes and on cooldowns.
    fn persist(&self, inner: &mut Inner) {
        inner.checkpoint.touch();
        if let Err(e) = self.store.save(&inner.checkpoint) {
            warn!(error = %e, "Checkpoint save failed, continuing");
        }
    }

    /// Copy of the checkpoint as it stands.
    pub fn checkpoint(&self) -> Checkpoint {
        self.lock().checkpoint.clone()
    }

    /// Copy of the result set as it stands.
    pub fn results(&self) -> ResultSet {
        self.lock().results.clone()
    }

    /// Outcomes recorded through this aggregator.
    pub fn completed(&self) -> usize {
        self.lock().completed
    }

    /// Identifiers currently between [`begin`](Self::begin) and
    /// [`record`](Self::record).
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Availability;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn aggregator_in(dir: &TempDir, queue: &[&str], save_every: usize) -> (ResultAggregator, CheckpointStore) {
        let store = CheckpointStore::new(dir.path().join("state.json"));
        let mut checkpoint = Checkpoint::new();
        let queue: Vec<Identifier> = queue.iter().map(|s| s.to_string()).collect();
        checkpoint.begin_run(&queue);
        (ResultAggregator::new(checkpoint, store.clone(), save_every), store)
    }

    #[test]
    fn test_record_moves_identifier_from_pending_to_outcomes() {
        let dir = TempDir::new().unwrap();
        let (aggregator, _) = aggregator_in(&dir, &["alice", "bob"], 10);

        aggregator.begin("alice");
        assert_eq!(aggregator.in_flight(), 1);
        aggregator.record(Outcome::classified("alice", Availability::Taken));

        let checkpoint = aggregator.checkpoint();
        assert_eq!(checkpoint.pending, VecDeque::from(vec!["bob".to_string()]));
        assert_eq!(checkpoint.outcome("alice").unwrap().status, Status::Taken);
        assert_eq!(checkpoint.total_seen(), 2);
        assert_eq!(aggregator.in_flight(), 0);
        assert_eq!(aggregator.results().identifiers(Status::Taken), ["alice".to_string()]);
    }

    #[test]
    fn test_saves_every_nth_outcome() {
        let dir = TempDir::new().unwrap();
        let (aggregator, store) = aggregator_in(&dir, &["a", "b", "c", "d"], 2);

        aggregator.record(Outcome::classified("a", Availability::Available));
        assert!(store.try_load().unwrap().is_none());

        aggregator.record(Outcome::classified("b", Availability::Available));
        let saved = store.try_load().unwrap().unwrap();
        assert_eq!(saved.outcomes.len(), 2);
        assert_eq!(saved.pending.len(), 2);

        aggregator.record(Outcome::classified("c", Availability::Available));
        assert_eq!(store.try_load().unwrap().unwrap().outcomes.len(), 2);
    }

    #[test]
    fn test_cooldown_is_persisted_immediately() {
        let dir = TempDir::new().unwrap();
        let (aggregator, store) = aggregator_in(&dir, &["a"], 10);

        let until = Utc::now() + chrono::Duration::seconds(30);
        aggregator.note_cooldown(until);

        let saved = store.try_load().unwrap().unwrap();
        assert_eq!(saved.cooldown_until, Some(until));
    }

    #[test]
    fn test_result_set_seeded_from_prior_outcomes() {
        let mut checkpoint = Checkpoint::new();
        checkpoint
            .outcomes
            .insert("zed".into(), Outcome::classified("zed", Availability::Invalid));
        checkpoint
            .outcomes
            .insert("amy".into(), Outcome::classified("amy", Availability::Invalid));

        let results = ResultSet::from_checkpoint(&checkpoint);
        assert_eq!(
            results.identifiers(Status::Invalid),
            ["amy".to_string(), "zed".to_string()]
        );
        assert!(results.identifiers(Status::Taken).is_empty());
        assert_eq!(results.iter().count(), 1);
    }

    #[test]
    fn test_concurrent_records_are_all_kept() {
        let dir = TempDir::new().unwrap();
        let names: Vec<String> = (0..64).map(|i| format!("user{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (aggregator, _) = aggregator_in(&dir, &refs, 5);
        let aggregator = Arc::new(aggregator);

        let handles: Vec<_> = names
            .chunks(16)
            .map(|chunk| {
                let aggregator = Arc::clone(&aggregator);
                let chunk = chunk.to_vec();
                std::thread::spawn(move || {
                    for name in chunk {
                        aggregator.begin(&name);
                        aggregator.record(Outcome::classified(name, Availability::Taken));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let checkpoint = aggregator.checkpoint();
        assert!(checkpoint.pending.is_empty());
        assert_eq!(checkpoint.outcomes.len(), 64);
        assert_eq!(aggregator.results().len(), 64);
        assert_eq!(aggregator.completed(), 64);
    }
}
