use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storytrim::app::{CaptureRecorder, EditMode, EditSession, PreviewCommand, ThumbnailSampler};
use storytrim::domain::errors::DomainError;
use storytrim::domain::model::*;
use storytrim::domain::rules::TimelineGeometry;
use storytrim::engine::{CancelToken, ProgressCallback, ProgressPhase, ProgressTracker};

mod support;
use support::*;

/// 10 px per second over a 45 s source
fn geometry() -> TimelineGeometry {
    TimelineGeometry::new(0.0, 450.0, 20.0)
}

fn session(playback: Arc<FakePlayback>, capture: Arc<FakeCapture>) -> EditSession {
    EditSession::new(playback, capture, EditorConfig::default())
}

#[derive(Default)]
struct RecordingCallback {
    percents: Mutex<Vec<f64>>,
}

impl ProgressCallback for RecordingCallback {
    fn on_start(&self, _operation: &str, _target: Duration) {}

    fn on_progress(&self, percent: f64, _message: Option<String>) {
        self.percents.lock().unwrap().push(percent);
    }

    fn on_complete(&self, _message: Option<String>) {}

    fn on_error(&self, _error: &str) {}

    fn on_cancel(&self) {}
}

#[tokio::test(start_paused = true)]
async fn test_capture_output_matches_selected_span() {
    let playback = Arc::new(FakePlayback::new(45.0));
    let capture = Arc::new(FakeCapture::supporting(&["video/mp4"]));
    let config = EditorConfig::default();
    let recorder = CaptureRecorder::new(playback.clone(), capture.clone(), &config);

    let progress = ProgressTracker::new("trim");
    let callback = Arc::new(RecordingCallback::default());
    progress.add_callback(callback.clone());

    let file = recorder
        .trim(&video_source("clip.mp4"), 5.0, 12.0, &progress, &CancelToken::new())
        .await
        .unwrap();

    assert!(file.file_name.starts_with("story_trimmed_"));
    assert!(file.file_name.ends_with(".mp4"));
    assert_eq!(file.mime_type, "video/mp4");
    assert_eq!(file.bytes, b"chunk-1chunk-2".to_vec());

    let recorded = capture.logs()[0].recorded.unwrap();
    assert!(recorded >= Duration::from_secs(7));
    assert!(recorded <= Duration::from_secs(7) + config.guard_margin());

    let percents = callback.percents.lock().unwrap().clone();
    assert!(!percents.is_empty());
    assert!(percents.iter().all(|p| *p <= 99.0));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.percent(), 100.0);
    assert_eq!(playback.stats.released.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_capture_prefers_supported_format() {
    let playback = Arc::new(FakePlayback::new(45.0));
    let capture = Arc::new(FakeCapture::supporting(&["video/webm;codecs=h264"]));
    let recorder = CaptureRecorder::new(playback, capture.clone(), &EditorConfig::default());

    assert_eq!(recorder.select_format().mime_type, "video/webm;codecs=h264");
    let file = recorder
        .trim(
            &video_source("clip.mov"),
            0.0,
            2.0,
            &ProgressTracker::new("trim"),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(file.extension, "webm");
    assert_eq!(file.mime_type, "video/webm");
}

#[tokio::test(start_paused = true)]
async fn test_capture_cancel_stops_recorder_and_releases_element() {
    let playback = Arc::new(FakePlayback::new(45.0));
    let capture = Arc::new(FakeCapture::supporting(&["video/mp4"]));
    let recorder = CaptureRecorder::new(playback.clone(), capture.clone(), &EditorConfig::default());

    let cancel = CancelToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            cancel.cancel();
        })
    };

    let progress = ProgressTracker::new("trim");
    let result = recorder
        .trim(&video_source("clip.mp4"), 0.0, 20.0, &progress, &cancel)
        .await;
    canceller.await.unwrap();

    assert_eq!(result, Err(DomainError::Cancelled));
    assert_eq!(progress.get_info().unwrap().phase, ProgressPhase::Cancelled);
    assert_eq!(capture.logs()[0].recorded, Some(Duration::from_secs(2)));
    assert_eq!(playback.stats.released.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_capture_stops_recorder_when_playback_fails() {
    let playback = Arc::new(FakePlayback {
        fail_play: true,
        ..FakePlayback::new(45.0)
    });
    let capture = Arc::new(FakeCapture::supporting(&["video/mp4"]));
    let recorder = CaptureRecorder::new(playback.clone(), capture.clone(), &EditorConfig::default());

    let result = recorder
        .trim(
            &video_source("clip.mp4"),
            5.0,
            12.0,
            &ProgressTracker::new("trim"),
            &CancelToken::new(),
        )
        .await;

    assert!(matches!(result, Err(DomainError::CaptureFailure(_))));
    assert_eq!(capture.logs()[0].recorded, Some(Duration::ZERO));
    assert_eq!(playback.stats.released.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_capture_rejects_start_past_the_end() {
    let playback = Arc::new(FakePlayback::new(10.0));
    let capture = Arc::new(FakeCapture::supporting(&["video/mp4"]));
    let recorder = CaptureRecorder::new(playback, capture.clone(), &EditorConfig::default());

    let result = recorder
        .trim(
            &video_source("clip.mp4"),
            12.0,
            15.0,
            &ProgressTracker::new("trim"),
            &CancelToken::new(),
        )
        .await;
    assert!(matches!(result, Err(DomainError::BadArgs(_))));
    assert!(capture.logs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_recording_is_a_capture_failure() {
    let playback = Arc::new(FakePlayback::new(45.0));
    let capture = Arc::new(FakeCapture {
        empty_output: true,
        ..FakeCapture::supporting(&["video/mp4"])
    });
    let recorder = CaptureRecorder::new(playback, capture, &EditorConfig::default());

    let result = recorder
        .trim(
            &video_source("clip.mp4"),
            0.0,
            1.0,
            &ProgressTracker::new("trim"),
            &CancelToken::new(),
        )
        .await;
    assert!(matches!(result, Err(DomainError::CaptureFailure(_))));
}

#[tokio::test(start_paused = true)]
async fn test_thumbnail_strip_has_one_entry_per_step() {
    let playback = Arc::new(FakePlayback {
        snapshot_fails_from: Some(30.0),
        ..FakePlayback::new(45.0)
    });
    let sampler = ThumbnailSampler::new(playback.clone(), 5, 80, 50);

    let strip = sampler.sample(&video_source("clip.mp4"), 45.0).await;
    let timestamps: Vec<f64> = strip.iter().map(|t| t.timestamp()).collect();
    assert_eq!(timestamps, vec![0.0, 9.0, 18.0, 27.0, 36.0]);

    let placeholders: Vec<bool> = strip.iter().map(|t| t.is_placeholder()).collect();
    assert_eq!(placeholders, vec![false, false, false, false, true]);
    match &strip[0] {
        Thumbnail::Frame { jpeg, .. } => assert_eq!(&jpeg[..2], &[0xFF, 0xD8]),
        other => panic!("expected a frame, got {:?}", other),
    }
    assert_eq!(playback.stats.released.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_thumbnail_strip_degrades_to_placeholders() {
    let sampler = ThumbnailSampler::new(Arc::new(FakePlayback::new(45.0)), 4, 80, 50);
    assert!(sampler.sample(&video_source("clip.mp4"), 0.0).await.is_empty());

    let broken = ThumbnailSampler::new(
        Arc::new(FakePlayback {
            fail_open: true,
            ..FakePlayback::new(45.0)
        }),
        4,
        80,
        50,
    );
    let strip = broken.sample(&video_source("clip.mp4"), 45.0).await;
    assert_eq!(strip.len(), 4);
    assert!(strip.iter().all(|t| t.is_placeholder()));
}

#[tokio::test(start_paused = true)]
async fn test_long_video_opens_in_trim_mode() {
    let playback = Arc::new(FakePlayback::new(45.0));
    let mut session = session(playback.clone(), Arc::new(FakeCapture::default()));

    let mode = session
        .open_source(video_source("long.mp4"), geometry())
        .await
        .unwrap();
    assert_eq!(mode, EditMode::Trim);
    let range = session.range().unwrap();
    assert_eq!((range.start(), range.end()), (0.0, 30.0));
    assert_eq!(session.thumbnails().await.len(), 5);

    session.close();
    assert_eq!(
        playback.stats.released.load(Ordering::SeqCst),
        playback.stats.opened.load(Ordering::SeqCst)
    );
}

#[tokio::test(start_paused = true)]
async fn test_short_video_commits_without_reencode() {
    let capture = Arc::new(FakeCapture::supporting(&["video/mp4"]));
    let mut session = session(Arc::new(FakePlayback::new(20.0)), capture.clone());

    let mode = session
        .open_source(video_source("short.mp4"), geometry())
        .await
        .unwrap();
    assert_eq!(mode, EditMode::Media);

    let output = session
        .commit(&ProgressTracker::new("trim"), &CancelToken::new())
        .await
        .unwrap();
    assert!(!output.trim_applied);
    assert_eq!(output.file.file_name, "short.mp4");
    assert_eq!(output.trim, Some(TrimDescriptor { start: 0.0, end: 20.0 }));
    assert!(capture.logs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_selected_range_is_reencoded() {
    let capture = Arc::new(FakeCapture::supporting(&["video/mp4"]));
    let mut session = session(Arc::new(FakePlayback::new(45.0)), capture.clone());
    session
        .open_source(video_source("long.mp4"), geometry())
        .await
        .unwrap();

    let range = session.select_range(5.0, 12.0).await.unwrap();
    assert!((range.start() - 5.0).abs() < 1e-9);
    assert!((range.end() - 12.0).abs() < 1e-9);

    let output = session
        .commit(&ProgressTracker::new("trim"), &CancelToken::new())
        .await
        .unwrap();
    assert!(output.trim_applied);
    assert!(output.file.file_name.starts_with("story_trimmed_"));
    let trim = output.trim.unwrap();
    assert!((trim.start - 5.0).abs() < 1e-9 && (trim.end - 12.0).abs() < 1e-9);
    assert_eq!(capture.logs().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_falls_back_to_source() {
    let capture = Arc::new(FakeCapture {
        fail_create: true,
        ..FakeCapture::default()
    });
    let mut session = session(Arc::new(FakePlayback::new(45.0)), capture);
    session
        .open_source(video_source("long.mp4"), geometry())
        .await
        .unwrap();

    let output = session
        .commit(&ProgressTracker::new("trim"), &CancelToken::new())
        .await
        .unwrap();
    assert!(!output.trim_applied);
    assert_eq!(output.file.file_name, "long.mp4");
    assert_eq!(output.file.bytes, vec![0u8; 64]);
    assert_eq!(output.trim, Some(TrimDescriptor { start: 0.0, end: 30.0 }));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_commit_does_not_fall_back() {
    let capture = Arc::new(FakeCapture::supporting(&["video/mp4"]));
    let mut session = session(Arc::new(FakePlayback::new(45.0)), capture);
    session
        .open_source(video_source("long.mp4"), geometry())
        .await
        .unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let result = session.commit(&ProgressTracker::new("trim"), &cancel).await;
    assert!(matches!(result, Err(DomainError::Cancelled)));
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_video_is_unsupported() {
    let playback = Arc::new(FakePlayback {
        fail_open: true,
        ..FakePlayback::new(45.0)
    });
    let mut session = session(playback, Arc::new(FakeCapture::default()));
    let result = session
        .open_source(video_source("broken.mp4"), geometry())
        .await;
    assert!(matches!(result, Err(DomainError::UnsupportedSource(_))));
    assert!(session.mode().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_image_passes_through_with_overlays() {
    let mut session = session(Arc::new(FakePlayback::new(45.0)), Arc::new(FakeCapture::default()));
    let mode = session
        .open_source(image_source("photo.jpg"), geometry())
        .await
        .unwrap();
    assert_eq!(mode, EditMode::Media);
    assert!(session.range().is_none());

    session.overlays_mut().add("Hello", "#FFFFFF").unwrap();
    let output = session
        .commit(&ProgressTracker::new("trim"), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(output.file.file_name, "photo.jpg");
    assert_eq!(output.file.mime_type, "image/jpeg");
    assert!(output.trim.is_none());
    assert_eq!(output.overlays.len(), 1);

    let manifest = serde_json::to_value(output.manifest()).unwrap();
    assert_eq!(manifest["overlays"][0]["text"], "Hello");
    assert!(manifest["trim"].is_null());
}

#[tokio::test(start_paused = true)]
async fn test_drag_and_loop_drive_the_preview() {
    let mut session = session(Arc::new(FakePlayback::new(45.0)), Arc::new(FakeCapture::default()));
    session
        .open_source(video_source("long.mp4"), geometry())
        .await
        .unwrap();

    let down = session
        .pointer_down(DragHandle::End, Point::new(300.0, 0.0))
        .await
        .unwrap();
    assert!(down.is_empty());

    let moved = session.pointer_move(Point::new(225.0, 0.0)).await.unwrap();
    assert_eq!(moved, vec![PreviewCommand::Seek(22.5)]);

    let up = session.pointer_up().await.unwrap();
    assert_eq!(up, vec![PreviewCommand::Seek(0.0), PreviewCommand::Play]);
    assert_eq!(session.range().unwrap().end(), 22.5);

    assert!(session.time_update().await.unwrap().is_empty());
    tokio::time::advance(Duration::from_secs(25)).await;
    assert_eq!(
        session.time_update().await.unwrap(),
        vec![PreviewCommand::Seek(0.0)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_paused_preview_is_not_restarted() {
    let mut session = session(Arc::new(FakePlayback::new(45.0)), Arc::new(FakeCapture::default()));
    session
        .open_source(video_source("long.mp4"), geometry())
        .await
        .unwrap();

    session.play_preview().await.unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;
    session.pause_preview().await.unwrap();

    assert_eq!(
        session.time_update().await.unwrap(),
        vec![PreviewCommand::Seek(0.0)]
    );
    assert!(!session.controller().unwrap().is_looping());
}

#[tokio::test(start_paused = true)]
async fn test_new_source_resets_overlays() {
    let mut session = session(Arc::new(FakePlayback::new(45.0)), Arc::new(FakeCapture::default()));
    session
        .open_source(video_source("a.mp4"), geometry())
        .await
        .unwrap();
    let item = session.overlays_mut().add("first", "#FF3B30").unwrap();
    assert_eq!(item.position, Point::new(540.0, 960.0));

    session
        .open_source(video_source("b.mp4"), geometry())
        .await
        .unwrap();
    assert!(session.overlays().items().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_image_after_video_gets_fresh_overlays() {
    let mut session = session(Arc::new(FakePlayback::new(45.0)), Arc::new(FakeCapture::default()));
    session
        .open_source(video_source("a.mp4"), geometry())
        .await
        .unwrap();
    session.overlays_mut().add("from video", "#FF3B30").unwrap();

    session
        .open_source(png_source("p.png", 200, 100), geometry())
        .await
        .unwrap();
    assert!(session.overlays().items().is_empty());

    let item = session.overlays_mut().add("on image", "#FFFFFF").unwrap();
    assert_eq!(item.position, Point::new(100.0, 50.0));

    let output = session
        .commit(&ProgressTracker::new("trim"), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(output.overlays.len(), 1);
    assert_eq!(output.overlays[0].text, "on image");
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_image_centers_on_story_frame() {
    let mut session = session(Arc::new(FakePlayback::new(45.0)), Arc::new(FakeCapture::default()));
    session
        .open_source(image_source("broken.jpg"), geometry())
        .await
        .unwrap();
    let item = session.overlays_mut().add("Hello", "#FFFFFF").unwrap();
    assert_eq!(item.position, Point::new(540.0, 960.0));
}
