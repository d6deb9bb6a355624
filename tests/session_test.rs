use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tracklet::domain::RecordKind;
use tracklet::queue::{PersistentQueue, QueueConfig, RecordPipeline};
use tracklet::session::{SessionConfig, SessionManager, SessionPhase};

struct Fixture {
    queue: Arc<PersistentQueue>,
    manager: Arc<SessionManager>,
    _dir: TempDir,
}

fn fixture(threshold: Duration) -> Fixture {
    let dir = TempDir::new().unwrap();
    let queue = Arc::new(
        PersistentQueue::open(QueueConfig {
            storage_dir: dir.path().to_path_buf(),
            max_entries: 100,
            write_retries: 3,
        })
        .unwrap(),
    );
    let pipeline = Arc::new(RecordPipeline::new(
        Arc::clone(&queue),
        Arc::new(Notify::new()),
        "device-1".to_string(),
    ));
    let manager = SessionManager::new(
        SessionConfig {
            inactivity_threshold: threshold,
        },
        pipeline,
        tokio::runtime::Handle::current(),
    );
    Fixture {
        queue,
        manager,
        _dir: dir,
    }
}

fn queued_kinds(queue: &PersistentQueue) -> Vec<RecordKind> {
    queue
        .snapshot()
        .iter()
        .map(|e| e.record().kind())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn first_resume_starts_a_session() {
    let fixture = fixture(Duration::from_secs(10));

    assert_eq!(fixture.manager.phase(), SessionPhase::NoSession);
    fixture.manager.on_resume();

    assert_eq!(fixture.manager.phase(), SessionPhase::Active);
    assert!(fixture.manager.current_session().is_some());
    assert_eq!(queued_kinds(&fixture.queue), vec![RecordKind::SessionStart]);
}

#[tokio::test(start_paused = true)]
async fn repeated_resume_keeps_the_same_session() {
    let fixture = fixture(Duration::from_secs(10));

    fixture.manager.on_resume();
    let first = fixture.manager.current_session();
    fixture.manager.on_resume();

    assert_eq!(fixture.manager.current_session(), first);
    assert_eq!(queued_kinds(&fixture.queue), vec![RecordKind::SessionStart]);
}

#[tokio::test(start_paused = true)]
async fn resume_within_threshold_continues_the_session() {
    let fixture = fixture(Duration::from_secs(10));

    fixture.manager.on_resume();
    let session = fixture.manager.current_session();

    fixture.manager.on_pause();
    assert_eq!(fixture.manager.phase(), SessionPhase::Finalizing);

    tokio::time::sleep(Duration::from_secs(3)).await;
    fixture.manager.on_resume();

    // Brief backgrounding: same session, zero SessionEnd records.
    assert_eq!(fixture.manager.phase(), SessionPhase::Active);
    assert_eq!(fixture.manager.current_session(), session);
    assert_eq!(queued_kinds(&fixture.queue), vec![RecordKind::SessionStart]);
}

#[tokio::test(start_paused = true)]
async fn threshold_expiry_finalizes_the_session() {
    let fixture = fixture(Duration::from_secs(10));

    fixture.manager.on_resume();
    fixture.manager.on_pause();

    tokio::time::sleep(Duration::from_secs(11)).await;
    tokio::task::yield_now().await;

    assert_eq!(fixture.manager.phase(), SessionPhase::NoSession);
    assert_eq!(
        queued_kinds(&fixture.queue),
        vec![RecordKind::SessionStart, RecordKind::SessionEnd]
    );
}

#[tokio::test(start_paused = true)]
async fn resume_after_expiry_starts_a_new_session_after_the_end_record() {
    let fixture = fixture(Duration::from_secs(10));

    fixture.manager.on_resume();
    let first = fixture.manager.current_session();

    fixture.manager.on_pause();
    tokio::time::sleep(Duration::from_secs(11)).await;
    tokio::task::yield_now().await;

    fixture.manager.on_resume();

    let second = fixture.manager.current_session();
    assert!(second.is_some());
    assert_ne!(first, second);

    // Exactly one SessionEnd, enqueued before the new session's start.
    assert_eq!(
        queued_kinds(&fixture.queue),
        vec![
            RecordKind::SessionStart,
            RecordKind::SessionEnd,
            RecordKind::SessionStart
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn pause_without_active_session_is_ignored() {
    let fixture = fixture(Duration::from_secs(10));

    fixture.manager.on_pause();
    assert_eq!(fixture.manager.phase(), SessionPhase::NoSession);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(queued_kinds(&fixture.queue).is_empty());
}
