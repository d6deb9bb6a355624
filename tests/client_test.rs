use serial_test::serial;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tracklet::client::{Config, Environment, StartError, Tracker, TrackerError};
use tracklet::sender::{HttpConfig, HttpTransport};
use tracklet::Event;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn collector_transport(endpoint: String) -> Arc<HttpTransport> {
    Arc::new(
        HttpTransport::new(HttpConfig {
            endpoint,
            app_token: "app-token-1".to_string(),
            timeout: Duration::from_secs(5),
            ..HttpConfig::default()
        })
        .unwrap(),
    )
}

#[tokio::test]
async fn start_rejects_an_empty_app_token() {
    let dir = TempDir::new().unwrap();
    let result = Tracker::start(
        Config::new("  ", Environment::Sandbox).with_storage_dir(dir.path()),
    )
    .await;
    assert!(matches!(result, Err(StartError::Config(_))));
}

#[tokio::test]
async fn invalid_event_token_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let tracker = Tracker::start(
        Config::new("app-token-1", Environment::Sandbox)
            .with_storage_dir(dir.path())
            .with_offline_mode(true),
    )
    .await
    .unwrap();

    let result = tracker.track_event(Event::new(""));
    assert!(matches!(result, Err(TrackerError::InvalidEvent(_))));

    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn disabled_tracker_drops_events_quietly() {
    let dir = TempDir::new().unwrap();
    let tracker = Tracker::start(
        Config::new("app-token-1", Environment::Sandbox)
            .with_storage_dir(dir.path())
            .with_offline_mode(true),
    )
    .await
    .unwrap();

    tracker.set_enabled(false);
    assert!(!tracker.is_enabled());

    tracker.track_event(Event::new("ignored")).unwrap();
    assert_eq!(tracker.queue_stats().enqueued, 0);

    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn end_to_end_delivery_with_attribution_change() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/track"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "Tracked",
            "adid": "adid-123",
            "attribution": {"trackerToken": "tt", "network": "Organic"}
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let changes = Arc::new(AtomicUsize::new(0));
    let changes_seen = Arc::clone(&changes);

    let config = Config::new("app-token-1", Environment::Sandbox)
        .with_storage_dir(dir.path())
        .with_transport(collector_transport(server.uri()))
        .on_event_success(move |success| {
            tx.send(success).unwrap();
        })
        .on_attribution_changed(move |_| {
            changes_seen.fetch_add(1, Ordering::SeqCst);
        });

    let tracker = Tracker::start(config).await.unwrap();
    tracker
        .track_event(Event::new("purchase").with_revenue(0.99, "USD"))
        .unwrap();

    let success = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(success.event_token.as_deref(), Some("purchase"));
    assert_eq!(success.adid.as_deref(), Some("adid-123"));

    // Same attribution on the second response: success fires again, the
    // change callback does not.
    tracker.track_event(Event::new("purchase")).unwrap();
    tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(changes.load(Ordering::SeqCst), 1);
    let attribution = tracker.attribution().unwrap();
    assert_eq!(attribution.tracker_token.as_deref(), Some("tt"));
    assert_eq!(tracker.queue_stats().delivered, 2);

    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn auto_start_feeds_the_first_session() {
    let dir = TempDir::new().unwrap();
    let tracker = Tracker::start(
        Config::new("app-token-1", Environment::Sandbox)
            .with_storage_dir(dir.path())
            .with_offline_mode(true)
            .with_manual_start(false),
    )
    .await
    .unwrap();

    // The facade fed the first resume itself: one SessionStart queued.
    assert_eq!(tracker.queue_stats().enqueued, 1);
    assert_eq!(
        tracker.session_phase(),
        tracklet::session::SessionPhase::Active
    );

    tracker.shutdown().await.unwrap();
}

#[tokio::test]
async fn client_info_fields_are_merged_into_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/track"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let tracker = Tracker::start(
        Config::new("app-token-1", Environment::Sandbox)
            .with_storage_dir(dir.path())
            .with_transport(collector_transport(server.uri())),
    )
    .await
    .unwrap();

    tracker.set_device_token("push-token-1");
    tracker.set_referrer("utm_source=newsletter");
    tracker.track_event(Event::new("signup")).unwrap();

    for _ in 0..300 {
        if tracker.queue_stats().delivered == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(tracker.queue_stats().delivered, 1);

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    let line: serde_json::Value = serde_json::from_str(body.lines().next().unwrap()).unwrap();
    assert_eq!(line["payload"]["push_token"], "push-token-1");
    assert_eq!(line["payload"]["referrer"], "utm_source=newsletter");
    assert_eq!(line["payload"]["event_token"], "signup");

    tracker.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn calls_before_start_report_not_started() {
    let _ = tracklet::shutdown().await;

    assert!(matches!(
        tracklet::track_event(Event::new("early")),
        Err(TrackerError::NotStarted)
    ));
    assert!(matches!(tracklet::on_resume(), Err(TrackerError::NotStarted)));
    assert!(matches!(
        tracklet::set_offline_mode(true),
        Err(TrackerError::NotStarted)
    ));
    assert!(!tracklet::is_enabled());
    assert!(tracklet::current_attribution().is_none());
}

#[tokio::test]
#[serial]
async fn global_start_initializes_exactly_once() {
    let _ = tracklet::shutdown().await;

    let dir = TempDir::new().unwrap();
    tracklet::start(
        Config::new("app-token-1", Environment::Sandbox)
            .with_storage_dir(dir.path())
            .with_offline_mode(true),
    )
    .await
    .unwrap();

    assert!(tracklet::is_enabled());
    tracklet::track_event(Event::new("queued-offline")).unwrap();

    // A second start is a logged no-op; the running client is untouched.
    let other_dir = TempDir::new().unwrap();
    tracklet::start(
        Config::new("other-token", Environment::Production)
            .with_storage_dir(other_dir.path())
            .with_offline_mode(true),
    )
    .await
    .unwrap();
    assert!(tracklet::is_enabled());

    tracklet::shutdown().await.unwrap();
    assert!(matches!(
        tracklet::shutdown().await,
        Err(TrackerError::NotStarted)
    ));
}
