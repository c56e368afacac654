// handle-check-lib/tests/integration.rs

//! Integration tests for whole runs: interruption, resume and result files

use async_trait::async_trait;
use handle_check_lib::{
    Availability, Checker, Checkpoint, CheckpointStore, HandleCheckError, Identifier, Outcome,
    RunConfig, Runner, Status, DETAILED_RESULTS_FILE,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

fn names(list: &[&str]) -> Vec<Identifier> {
    list.iter().map(|s| s.to_string()).collect()
}

fn config_in(dir: &TempDir) -> RunConfig {
    RunConfig::default()
        .with_workers(3)
        .with_base_delay(Duration::from_millis(10))
        .with_state_path(dir.path().join("state.json"))
        .with_output_dir(dir.path().join("results"))
}

/// Answers with a fixed classification and remembers who was asked.
struct FixedChecker {
    answer: Availability,
    calls: Mutex<Vec<String>>,
}

impl FixedChecker {
    fn new(answer: Availability) -> Self {
        Self {
            answer,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl Checker for FixedChecker {
    async fn check(&self, identifier: &str) -> Result<Availability, HandleCheckError> {
        self.calls.lock().unwrap().push(identifier.to_string());
        Ok(self.answer)
    }
}

/// Identifiers starting with "slow" hang until the run is cancelled.
struct GatedChecker {
    cancel: CancellationToken,
    entered: AtomicUsize,
    expected: usize,
    all_in: Notify,
}

#[async_trait]
impl Checker for GatedChecker {
    async fn check(&self, identifier: &str) -> Result<Availability, HandleCheckError> {
        if !identifier.starts_with("slow") {
            return Ok(Availability::Taken);
        }
        if self.entered.fetch_add(1, Ordering::SeqCst) + 1 == self.expected {
            self.all_in.notify_one();
        }
        self.cancel.cancelled().await;
        // Arrives after cancellation and must be discarded
        Ok(Availability::Available)
    }
}

fn ten_names() -> Vec<Identifier> {
    names(&[
        "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "slow1", "slow2",
        "slow3",
    ])
}

async fn interrupted_run(dir: &TempDir) -> handle_check_lib::RunReport {
    let cancel = CancellationToken::new();
    let checker = Arc::new(GatedChecker {
        cancel: cancel.clone(),
        entered: AtomicUsize::new(0),
        expected: 3,
        all_in: Notify::new(),
    });
    let runner = Runner::new(config_in(dir), checker.clone());
    let input = ten_names();

    let (report, ()) = tokio::join!(runner.run(&input, cancel.clone()), async {
        checker.all_in.notified().await;
        cancel.cancel();
    });
    report.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_interruption_keeps_in_flight_identifiers_pending() {
    let dir = TempDir::new().unwrap();

    let report = interrupted_run(&dir).await;

    assert!(report.interrupted);
    assert_eq!(report.queued, 10);
    assert_eq!(report.completed, 7);
    assert_eq!(report.pending, 3);

    let checkpoint = CheckpointStore::new(dir.path().join("state.json"))
        .try_load()
        .unwrap()
        .unwrap();
    let mut pending: Vec<String> = checkpoint.pending.iter().cloned().collect();
    pending.sort();
    assert_eq!(pending, names(&["slow1", "slow2", "slow3"]));
    assert_eq!(checkpoint.outcomes.len(), 7);
    assert_eq!(checkpoint.total_seen(), 10);
    assert!(checkpoint.outcomes.values().all(|o| o.status == Status::Taken));

    // Result files are only written by a run that drains its queue
    assert!(!dir.path().join("results").join(DETAILED_RESULTS_FILE).exists());
}

#[tokio::test(start_paused = true)]
async fn test_resume_processes_only_unfinished_identifiers() {
    let dir = TempDir::new().unwrap();
    interrupted_run(&dir).await;

    let checker = Arc::new(FixedChecker::new(Availability::Available));
    let runner = Runner::new(config_in(&dir), checker.clone());

    assert_eq!(runner.plan(&ten_names()), names(&["slow1", "slow2", "slow3"]));

    let report = runner
        .run(&ten_names(), CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.interrupted);
    assert_eq!(report.queued, 3);
    assert_eq!(report.completed, 3);
    assert_eq!(report.pending, 0);
    assert_eq!(report.count(Status::Taken), 7);
    assert_eq!(report.count(Status::Available), 3);
    assert_eq!(checker.calls(), names(&["slow1", "slow2", "slow3"]));

    let results = dir.path().join("results");
    let available = std::fs::read_to_string(results.join("available_usernames.txt")).unwrap();
    let mut available: Vec<&str> = available.lines().collect();
    available.sort();
    assert_eq!(available, ["slow1", "slow2", "slow3"]);

    let taken = std::fs::read_to_string(results.join("taken_usernames.txt")).unwrap();
    assert_eq!(taken.lines().count(), 7);

    let detailed: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(results.join(DETAILED_RESULTS_FILE)).unwrap())
            .unwrap();
    assert_eq!(detailed.len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_prior_errors_are_retried_and_verdicts_kept() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let mut checkpoint = Checkpoint::new();
    checkpoint.outcomes.insert(
        "alice".into(),
        Outcome::classified("alice", Availability::Purchasable),
    );
    checkpoint
        .outcomes
        .insert("carol".into(), Outcome::failed("carol", "timeout"));
    CheckpointStore::new(&config.state_path)
        .save(&checkpoint)
        .unwrap();

    let checker = Arc::new(FixedChecker::new(Availability::Invalid));
    let runner = Runner::new(config, checker.clone());
    let report = runner
        .run(&names(&["alice", "carol", "alice"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(checker.calls(), names(&["carol"]));
    assert_eq!(report.count(Status::Purchasable), 1);
    assert_eq!(report.count(Status::Invalid), 1);
    assert_eq!(report.count(Status::Error), 0);
}

#[tokio::test(start_paused = true)]
async fn test_persisted_cooldown_delays_first_call() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let mut checkpoint = Checkpoint::new();
    checkpoint.extend_cooldown(chrono::Utc::now() + chrono::Duration::seconds(30));
    CheckpointStore::new(&config.state_path)
        .save(&checkpoint)
        .unwrap();

    let checker = Arc::new(FixedChecker::new(Availability::Taken));
    let runner = Runner::new(config, checker.clone());
    let start = tokio::time::Instant::now();

    let report = runner
        .run(&names(&["alice"]), CancellationToken::new())
        .await
        .unwrap();

    assert!(start.elapsed() >= Duration::from_secs(29));
    assert_eq!(report.count(Status::Taken), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_cooldown_leaves_queue_pending() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let mut checkpoint = Checkpoint::new();
    checkpoint.extend_cooldown(chrono::Utc::now() + chrono::Duration::seconds(600));
    CheckpointStore::new(&config.state_path)
        .save(&checkpoint)
        .unwrap();

    let checker = Arc::new(FixedChecker::new(Availability::Taken));
    let runner = Runner::new(config, checker.clone());
    let cancel = CancellationToken::new();

    let queue = names(&["a", "b"]);
    let (report, ()) = tokio::join!(runner.run(&queue, cancel.clone()), async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
    });
    let report = report.unwrap();

    assert!(report.interrupted);
    assert_eq!(report.pending, 2);
    assert!(checker.calls().is_empty());
}

#[tokio::test]
async fn test_unusable_output_dir_is_fatal() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "").unwrap();

    let config = config_in(&dir).with_output_dir(blocker.join("results"));
    let runner = Runner::new(config, Arc::new(FixedChecker::new(Availability::Taken)));

    let result = runner
        .run(&names(&["alice"]), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(HandleCheckError::FileError { .. })));
    assert!(!dir.path().join("state.json").exists());
}
