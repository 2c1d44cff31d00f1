//! Integration tests for the archive worker's scheduling behaviour.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chat_link_keeper::archiver::{candidate_queue, ArchiveWorker, CandidateMessage, Outcome};
use chat_link_keeper::config::Config;
use chat_link_keeper::db::{lookup_url, Database};
use chat_link_keeper::wayback::{ArchiveService, Availability};
use tempfile::TempDir;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Check(String),
    Save(String),
}

/// Archive service double that reports a snapshot for a fixed set of URLs
/// and records when each call was made.
#[derive(Clone, Default)]
struct FakeService {
    archived: HashSet<String>,
    save_status: u16,
    calls: Arc<Mutex<Vec<(Call, Instant)>>>,
}

impl FakeService {
    fn new(archived: &[&str], save_status: u16) -> Self {
        Self {
            archived: archived.iter().map(|u| (*u).to_string()).collect(),
            save_status,
            calls: Arc::default(),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(call, _)| call.clone())
            .collect()
    }

    fn save_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(call, _)| matches!(call, Call::Save(_)))
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl ArchiveService for FakeService {
    async fn check_availability(&self, url: &str) -> Availability {
        self.calls
            .lock()
            .unwrap()
            .push((Call::Check(url.to_string()), Instant::now()));
        if self.archived.contains(url) {
            Availability {
                available: true,
                status_code: 200,
            }
        } else {
            Availability::default()
        }
    }

    async fn submit_archive(&self, url: &str) -> u16 {
        self.calls
            .lock()
            .unwrap()
            .push((Call::Save(url.to_string()), Instant::now()));
        self.save_status
    }
}

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

fn config_with_interval(interval: Duration) -> Config {
    Config {
        save_interval: interval,
        ..Config::for_testing()
    }
}

fn candidate(url: &str) -> CandidateMessage {
    CandidateMessage::new(url, "U1", "G1", "C1")
}

#[tokio::test]
async fn test_saves_are_spaced_by_interval() {
    let (db, _temp_dir) = setup_db().await;
    let interval = Duration::from_millis(200);
    let service = FakeService::new(&[], 200);
    let worker = ArchiveWorker::new(&config_with_interval(interval), db.clone(), service.clone());

    let (sender, receiver) = candidate_queue(10);
    for url in [
        "https://a.example.com/",
        "https://b.example.com/",
        "https://c.example.com/",
    ] {
        sender.send(candidate(url)).await.unwrap();
    }
    drop(sender);

    worker
        .run(receiver, CancellationToken::new())
        .await
        .expect("Worker failed");

    let saves = service.save_times();
    assert_eq!(saves.len(), 3);
    for pair in saves.windows(2) {
        assert!(
            pair[1].duration_since(pair[0]) >= interval,
            "saves only {:?} apart",
            pair[1].duration_since(pair[0])
        );
    }
}

#[tokio::test]
async fn test_skips_and_cache_hits_are_not_delayed() {
    let (db, _temp_dir) = setup_db().await;
    let archived = [
        "https://a.example.com/",
        "https://b.example.com/",
        "https://c.example.com/",
    ];
    let service = FakeService::new(&archived, 200);
    let worker = ArchiveWorker::new(
        &config_with_interval(Duration::from_secs(30)),
        db.clone(),
        service.clone(),
    );

    let (sender, receiver) = candidate_queue(10);
    for url in archived.iter().chain(archived.iter()) {
        sender.send(candidate(url)).await.unwrap();
    }
    drop(sender);

    let started = Instant::now();
    tokio::time::timeout(
        Duration::from_secs(5),
        worker.run(receiver, CancellationToken::new()),
    )
    .await
    .expect("Worker waited on a cooldown it did not need")
    .expect("Worker failed");
    assert!(started.elapsed() < Duration::from_secs(5));

    // One availability check per distinct URL, never a save
    assert_eq!(
        service.calls(),
        archived
            .iter()
            .map(|u| Call::Check((*u).to_string()))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_duplicate_url_is_processed_once() {
    let (db, _temp_dir) = setup_db().await;
    let service = FakeService::new(&[], 502);
    let mut worker = ArchiveWorker::new(
        &config_with_interval(Duration::from_millis(10)),
        db.clone(),
        service.clone(),
    );

    let url = "https://example.com/story";
    assert_eq!(
        worker.process(&candidate(url)).await.unwrap(),
        Outcome::Saved(502)
    );
    assert_eq!(
        worker.process(&candidate(url)).await.unwrap(),
        Outcome::Seen(502)
    );

    assert_eq!(
        service.calls(),
        vec![Call::Check(url.to_string()), Call::Save(url.to_string())]
    );
    assert_eq!(lookup_url(db.pool(), url).await.unwrap(), Some(502));
}

#[tokio::test]
async fn test_unreachable_service_is_recorded_as_zero() {
    let (db, _temp_dir) = setup_db().await;
    let service = FakeService::new(&[], 0);
    let mut worker = ArchiveWorker::new(&Config::for_testing(), db.clone(), service);

    let outcome = worker
        .process(&candidate("https://example.com/"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Saved(0));
    assert_eq!(
        lookup_url(db.pool(), "https://example.com/").await.unwrap(),
        Some(0)
    );
}

#[tokio::test]
async fn test_shutdown_interrupts_cooldown() {
    let (db, _temp_dir) = setup_db().await;
    let service = FakeService::new(&[], 200);
    let worker = ArchiveWorker::new(
        &config_with_interval(Duration::from_secs(60)),
        db.clone(),
        service.clone(),
    );

    let (sender, receiver) = candidate_queue(10);
    sender
        .send(candidate("https://a.example.com/"))
        .await
        .unwrap();
    sender
        .send(candidate("https://b.example.com/"))
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(worker.run(receiver, shutdown.clone()));

    // Wait for the first save to be recorded, then stop mid-cooldown
    let deadline = Instant::now() + Duration::from_secs(5);
    while lookup_url(db.pool(), "https://a.example.com/")
        .await
        .unwrap()
        .is_none()
    {
        assert!(Instant::now() < deadline, "First save was never recorded");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("Worker ignored shutdown")
        .expect("Worker panicked")
        .expect("Worker failed");

    // The second candidate was never touched
    assert_eq!(service.save_times().len(), 1);
    assert_eq!(
        lookup_url(db.pool(), "https://b.example.com/").await.unwrap(),
        None
    );
    drop(sender);
}

#[tokio::test]
async fn test_idle_worker_stops_on_shutdown() {
    let (db, _temp_dir) = setup_db().await;
    let worker = ArchiveWorker::new(&Config::for_testing(), db, FakeService::default());

    let (_sender, receiver) = candidate_queue(1);
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(worker.run(receiver, shutdown.clone()));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("Worker ignored shutdown")
        .expect("Worker panicked")
        .expect("Worker failed");
}

#[tokio::test]
async fn test_store_failure_stops_worker() {
    let (db, _temp_dir) = setup_db().await;
    let service = FakeService::new(&[], 200);
    let worker = ArchiveWorker::new(&Config::for_testing(), db.clone(), service.clone());

    db.close().await;

    let (sender, receiver) = candidate_queue(1);
    sender
        .send(candidate("https://example.com/"))
        .await
        .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        worker.run(receiver, CancellationToken::new()),
    )
    .await
    .expect("Worker hung on a closed store");
    assert!(result.is_err());

    // The lookup failed before any call to the archive service
    assert!(service.calls().is_empty());
}
