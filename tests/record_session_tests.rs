use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use storytrim::app::{EditSession, RecordSession, RecordSettings};
use storytrim::domain::errors::DomainError;
use storytrim::domain::model::*;
use storytrim::domain::rules::TimelineGeometry;
use storytrim::engine::{CancelToken, ProgressTracker};

mod support;
use support::*;

fn settings(countdown_secs: u32, max_duration: Option<Duration>) -> RecordSettings {
    RecordSettings {
        countdown_secs,
        bitrate: 2_500_000,
        timeslice: Duration::from_millis(200),
        max_duration,
    }
}

fn spawn(camera: Arc<FakeCamera>, capture: Arc<FakeCapture>, settings: RecordSettings) -> RecordSession {
    RecordSession::spawn(camera, capture, settings, CameraFacing::Front)
}

#[tokio::test(start_paused = true)]
async fn test_denied_permission_then_retry() {
    let camera = Arc::new(FakeCamera::denying());
    let session = spawn(camera.clone(), Arc::new(FakeCapture::default()), settings(3, None));

    let result = session.init().await;
    assert!(matches!(result, Err(DomainError::PermissionDenied(_))));
    assert_eq!(session.state(), SessionState::NoPermission);
    assert!(matches!(session.start().await, Err(DomainError::InvalidState(_))));

    camera.deny.store(false, Ordering::SeqCst);
    session.retry().await.unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(matches!(session.retry().await, Err(DomainError::InvalidState(_))));

    session.close().await.unwrap();
    assert_eq!(camera.stats.released.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_record_and_stop() {
    let camera = Arc::new(FakeCamera::default());
    let capture = Arc::new(FakeCapture::supporting(&["video/mp4"]));
    let mut session = spawn(camera, capture.clone(), settings(3, None));

    session.init().await.unwrap();
    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::CountingDown(3));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(session.state(), SessionState::CountingDown(2));

    // Start while counting down is ignored
    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::CountingDown(2));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(session.state(), SessionState::Recording(0));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(session.state(), SessionState::Recording(2));

    session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Stopped);

    let take = session.next_take().await.unwrap();
    assert_eq!(take.file_name, "recorded-video.mp4");
    assert_eq!(take.mime_type, "video/mp4");
    assert_eq!(take.bytes, b"chunk-1chunk-2".to_vec());

    let logs = capture.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].bits_per_second, Some(2_500_000));
    assert_eq!(logs[0].recorded, Some(Duration::from_millis(2500)));

    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_rejected_bitrate_falls_back_to_defaults() {
    let capture = Arc::new(FakeCapture {
        reject_bitrate: true,
        ..FakeCapture::default()
    });
    let mut session = spawn(Arc::new(FakeCamera::default()), capture.clone(), settings(0, None));

    session.init().await.unwrap();
    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Recording(0));
    session.stop().await.unwrap();

    let take = session.next_take().await.unwrap();
    assert_eq!(take.extension, "webm");
    let logs = capture.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].bits_per_second, None);

    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_max_duration_finishes_the_take() {
    let capture = Arc::new(FakeCapture::supporting(&["video/mp4"]));
    let mut session = spawn(
        Arc::new(FakeCamera::default()),
        capture.clone(),
        settings(0, Some(Duration::from_secs(2))),
    );

    session.init().await.unwrap();
    session.start().await.unwrap();
    let take = session.next_take().await.unwrap();

    assert_eq!(take.file_name, "recorded-video.mp4");
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(capture.logs()[0].recorded, Some(Duration::from_secs(2)));

    // Another take may start from Stopped
    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Recording(0));
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_outside_recording_is_rejected() {
    let session = spawn(
        Arc::new(FakeCamera::default()),
        Arc::new(FakeCapture::default()),
        settings(3, None),
    );
    session.init().await.unwrap();
    assert!(matches!(session.stop().await, Err(DomainError::InvalidState(_))));

    session.start().await.unwrap();
    assert!(matches!(session.stop().await, Err(DomainError::InvalidState(_))));
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_switch_camera_releases_before_reacquiring() {
    let camera = Arc::new(FakeCamera::default());
    let session = spawn(camera.clone(), Arc::new(FakeCapture::default()), settings(0, None));

    session.init().await.unwrap();
    assert_eq!(session.switch_camera().await.unwrap(), CameraFacing::Back);
    assert_eq!(camera.stats.acquired.load(Ordering::SeqCst), 2);
    assert_eq!(camera.stats.released.load(Ordering::SeqCst), 1);
    assert_eq!(
        *camera.facings.lock().unwrap(),
        vec![CameraFacing::Front, CameraFacing::Back]
    );

    session.start().await.unwrap();
    assert_eq!(session.switch_camera().await.unwrap(), CameraFacing::Back);
    assert_eq!(camera.stats.acquired.load(Ordering::SeqCst), 2);

    session.close().await.unwrap();
    assert_eq!(camera.stats.released.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_close_while_recording_returns_to_idle() {
    let camera = Arc::new(FakeCamera::default());
    let capture = Arc::new(FakeCapture::default());
    let session = spawn(camera.clone(), capture.clone(), settings(0, None));

    session.init().await.unwrap();
    session.start().await.unwrap();
    let states = session.subscribe();
    tokio::time::sleep(Duration::from_secs(1)).await;

    session.close().await.unwrap();
    assert_eq!(*states.borrow(), SessionState::Idle);
    assert_eq!(camera.stats.released.load(Ordering::SeqCst), 1);
    assert_eq!(capture.logs()[0].recorded, Some(Duration::from_secs(1)));
}

#[tokio::test(start_paused = true)]
async fn test_take_opens_in_the_editor() {
    let capture = Arc::new(FakeCapture::supporting(&["video/mp4"]));
    let mut session = spawn(
        Arc::new(FakeCamera::default()),
        capture.clone(),
        settings(0, Some(Duration::from_secs(2))),
    );
    session.init().await.unwrap();
    session.start().await.unwrap();
    let take = session.next_take().await.unwrap();
    session.close().await.unwrap();

    let mut editor = EditSession::new(
        Arc::new(FakePlayback::new(2.0)),
        capture,
        EditorConfig::default(),
    );
    let source = MediaSource::from_produced(&take).unwrap();
    assert_eq!(source.kind, MediaKind::Video);
    editor
        .open_source(source, TimelineGeometry::new(0.0, 1000.0, 20.0))
        .await
        .unwrap();
    let output = editor
        .commit(&ProgressTracker::new("trim"), &CancelToken::new())
        .await
        .unwrap();
    editor.close();

    assert!(!output.trim_applied);
    assert_eq!(output.file.file_name, "recorded-video.mp4");
    assert_eq!(output.file.bytes, b"chunk-1chunk-2".to_vec());
}
