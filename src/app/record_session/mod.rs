// Record session - Camera, countdown and live recording as a single actor

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::*;
use crate::engine::ScopedCamera;
use crate::ports::*;

/// File stem of every take
const TAKE_STEM: &str = "recorded-video";

type Reply<T> = oneshot::Sender<Result<T, DomainError>>;

enum SessionCommand {
    Init(Reply<()>),
    Start(Reply<()>),
    Stop(Reply<()>),
    SwitchCamera(Reply<CameraFacing>),
    Retry(Reply<()>),
    Close(Reply<()>),
}

/// Tunables the session reads from the editor configuration
#[derive(Debug, Clone)]
pub struct RecordSettings {
    pub countdown_secs: u32,
    pub bitrate: u64,
    pub timeslice: Duration,
    pub max_duration: Option<Duration>,
}

impl RecordSettings {
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            countdown_secs: config.countdown_secs,
            bitrate: config.recording_bitrate,
            timeslice: config.capture_timeslice(),
            max_duration: config.max_recording(),
        }
    }
}

/// Client side of a running session
pub struct RecordSession {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<SessionState>,
    takes: mpsc::UnboundedReceiver<ProducedFile>,
    task: JoinHandle<()>,
}

impl RecordSession {
    /// Spawn the session actor; nothing is acquired until `init`
    pub fn spawn(
        camera: Arc<dyn CameraPort>,
        capture: Arc<dyn CapturePort>,
        settings: RecordSettings,
        facing: CameraFacing,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (take_tx, take_rx) = mpsc::unbounded_channel();

        let actor = SessionActor {
            camera_port: camera,
            capture_port: capture,
            settings,
            facing,
            camera: None,
            recorder: None,
            state: state_tx,
            takes: take_tx,
            countdown: None,
            remaining: 0,
            ticker: None,
            elapsed: 0,
            deadline: None,
        };
        let task = tokio::spawn(actor.run(command_rx));

        Self {
            commands: command_tx,
            state: state_rx,
            takes: take_rx,
            task,
        }
    }

    /// Acquire the camera; denial leaves the session in `NoPermission`
    pub async fn init(&self) -> Result<(), DomainError> {
        self.request(SessionCommand::Init).await
    }

    /// Begin the countdown; ignored while counting down or recording
    pub async fn start(&self) -> Result<(), DomainError> {
        self.request(SessionCommand::Start).await
    }

    /// Finish the current take; the file arrives on `next_take`
    pub async fn stop(&self) -> Result<(), DomainError> {
        self.request(SessionCommand::Stop).await
    }

    /// Toggle front/back; only honored while idle
    pub async fn switch_camera(&self) -> Result<CameraFacing, DomainError> {
        self.request(SessionCommand::SwitchCamera).await
    }

    /// Try acquiring the camera again after a denial
    pub async fn retry(&self) -> Result<(), DomainError> {
        self.request(SessionCommand::Retry).await
    }

    /// Stop timers and recorder, release the camera, end the actor
    pub async fn close(self) -> Result<(), DomainError> {
        let result = self.request(SessionCommand::Close).await;
        if let Err(e) = self.task.await {
            warn!("Record session task ended abnormally: {}", e);
        }
        result
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Next finished take, `None` once the session is gone
    pub async fn next_take(&mut self) -> Option<ProducedFile> {
        self.takes.recv().await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| DomainError::InvalidState("Record session is closed".to_string()))?;
        reply_rx
            .await
            .map_err(|_| DomainError::InvalidState("Record session is closed".to_string()))?
    }
}

/// Owns every piece of session state
struct SessionActor {
    camera_port: Arc<dyn CameraPort>,
    capture_port: Arc<dyn CapturePort>,
    settings: RecordSettings,
    facing: CameraFacing,
    camera: Option<ScopedCamera>,
    recorder: Option<Box<dyn StreamRecorder>>,
    state: watch::Sender<SessionState>,
    takes: mpsc::UnboundedSender<ProducedFile>,
    countdown: Option<Interval>,
    remaining: u32,
    ticker: Option<Interval>,
    elapsed: u64,
    deadline: Option<Instant>,
}

/// Tick of an optional interval; never resolves when absent
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn one_second_interval() -> Interval {
    let period = Duration::from_secs(1);
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Close(reply)) => {
                        self.shutdown().await;
                        let _ = reply.send(Ok(()));
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                _ = tick(&mut self.countdown) => self.on_countdown_tick().await,
                _ = tick(&mut self.ticker) => self.on_elapsed_tick(),
                _ = sleep_until_opt(self.deadline) => {
                    info!("Maximum recording duration reached");
                    if let Err(e) = self.finish_take().await {
                        warn!("Failed to finalize take: {}", e);
                    }
                }
            }
        }
        debug!("Record session ended");
    }

    fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Init(reply) => {
                let _ = reply.send(self.init().await);
            }
            SessionCommand::Start(reply) => {
                let _ = reply.send(self.start().await);
            }
            SessionCommand::Stop(reply) => {
                let result = match self.current() {
                    SessionState::Recording(_) => self.finish_take().await,
                    other => Err(DomainError::InvalidState(format!(
                        "Cannot stop while {:?}",
                        other
                    ))),
                };
                let _ = reply.send(result);
            }
            SessionCommand::SwitchCamera(reply) => {
                let _ = reply.send(self.switch_camera().await);
            }
            SessionCommand::Retry(reply) => {
                let result = match self.current() {
                    SessionState::NoPermission => self.acquire().await,
                    other => Err(DomainError::InvalidState(format!(
                        "Nothing to retry while {:?}",
                        other
                    ))),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Close(reply) => {
                self.shutdown().await;
                let _ = reply.send(Ok(()));
            }
        }
    }

    async fn init(&mut self) -> Result<(), DomainError> {
        if self.camera.is_some() {
            return Ok(());
        }
        self.acquire().await
    }

    /// Acquire the camera for `self.facing`; any failure means no permission
    async fn acquire(&mut self) -> Result<(), DomainError> {
        match self.camera_port.acquire(self.facing).await {
            Ok(handle) => {
                self.camera = Some(ScopedCamera::new(handle));
                self.set_state(SessionState::Idle);
                info!(facing = ?self.facing, "Camera ready");
                Ok(())
            }
            Err(e) => {
                warn!("Camera unavailable: {}", e);
                self.set_state(SessionState::NoPermission);
                Err(e)
            }
        }
    }

    async fn start(&mut self) -> Result<(), DomainError> {
        match self.current() {
            SessionState::CountingDown(_) | SessionState::Recording(_) => {
                debug!("Start ignored while busy");
                return Ok(());
            }
            SessionState::NoPermission => {
                return Err(DomainError::InvalidState(
                    "Camera permission was not granted".to_string(),
                ))
            }
            SessionState::Idle | SessionState::Stopped => {}
        }
        if self.camera.is_none() {
            return Err(DomainError::InvalidState(
                "Camera has not been initialized".to_string(),
            ));
        }

        if self.settings.countdown_secs == 0 {
            return self.begin_recording().await;
        }
        self.remaining = self.settings.countdown_secs;
        self.countdown = Some(one_second_interval());
        self.set_state(SessionState::CountingDown(self.remaining));
        Ok(())
    }

    async fn on_countdown_tick(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            self.set_state(SessionState::CountingDown(self.remaining));
            return;
        }
        self.countdown = None;
        if let Err(e) = self.begin_recording().await {
            warn!("Recording could not start: {}", e);
            self.set_state(SessionState::Idle);
        }
    }

    fn on_elapsed_tick(&mut self) {
        self.elapsed += 1;
        self.set_state(SessionState::Recording(self.elapsed));
    }

    async fn begin_recording(&mut self) -> Result<(), DomainError> {
        let stream = self
            .camera
            .as_ref()
            .ok_or_else(|| DomainError::InvalidState("Camera was released".to_string()))?
            .capture_stream()?;

        let capture = Arc::clone(&self.capture_port);
        let format = FormatSelector::select(&FormatSelector::RECORD_CANDIDATES, |mime| {
            capture.is_type_supported(mime)
        });
        let options = RecorderOptions {
            format: Some(format),
            video_bits_per_second: Some(self.settings.bitrate),
        };
        let mut recorder = match capture.create_recorder(stream.clone(), options) {
            Ok(recorder) => recorder,
            Err(DomainError::BadArgs(reason)) => {
                debug!("Recorder rejected options ({}); using defaults", reason);
                capture
                    .create_recorder(stream, RecorderOptions::default())
                    .map_err(|e| DomainError::CaptureFailure(format!("Recorder unavailable: {}", e)))?
            }
            Err(e) => {
                return Err(DomainError::CaptureFailure(format!(
                    "Recorder unavailable: {}",
                    e
                )))
            }
        };
        recorder.start(self.settings.timeslice).await?;

        info!(mime = %recorder.format().mime_type, "Recording started");
        self.recorder = Some(recorder);
        self.elapsed = 0;
        self.ticker = Some(one_second_interval());
        self.deadline = self.settings.max_duration.map(|max| Instant::now() + max);
        self.set_state(SessionState::Recording(0));
        Ok(())
    }

    fn stop_timers(&mut self) {
        self.countdown = None;
        self.ticker = None;
        self.deadline = None;
    }

    /// Stop the recorder and hand the take to the caller
    async fn finish_take(&mut self) -> Result<(), DomainError> {
        self.stop_timers();
        self.set_state(SessionState::Stopped);

        let mut recorder = self
            .recorder
            .take()
            .ok_or_else(|| DomainError::InvalidState("No recorder running".to_string()))?;
        let chunks = recorder.stop().await?;
        let take = ProducedFile::from_chunks(TAKE_STEM, chunks, recorder.format());
        if take.is_empty() {
            return Err(DomainError::CaptureFailure(
                "Recording produced no output".to_string(),
            ));
        }

        info!(
            file = %take.file_name,
            bytes = take.len(),
            secs = self.elapsed,
            "Take finished"
        );
        if self.takes.send(take).is_err() {
            debug!("Take dropped; nobody is listening");
        }
        Ok(())
    }

    async fn switch_camera(&mut self) -> Result<CameraFacing, DomainError> {
        if self.current() != SessionState::Idle {
            debug!("Camera switch ignored outside idle");
            return Ok(self.facing);
        }
        // Old device must be fully released before the next acquire
        self.camera = None;
        self.facing = self.facing.toggled();
        self.acquire().await?;
        Ok(self.facing)
    }

    async fn shutdown(&mut self) {
        self.stop_timers();
        if let Some(mut recorder) = self.recorder.take() {
            if recorder.state() == RecorderState::Recording {
                if let Err(e) = recorder.stop().await {
                    debug!("Recorder stop on close failed: {}", e);
                }
            }
        }
        self.camera = None;
        if self.current().is_busy() {
            self.set_state(SessionState::Idle);
        }
    }
}
