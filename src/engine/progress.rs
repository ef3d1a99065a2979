//! Progress tracking and callback system for capture jobs

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::rules::ProgressRules;

/// Progress callback trait for UI integration
pub trait ProgressCallback: Send + Sync {
    /// Called when the job starts; `target` is the media length being captured
    fn on_start(&self, operation: &str, target: Duration);

    /// Called on every progress tick with a monotonic percentage
    fn on_progress(&self, percent: f64, message: Option<String>);

    /// Called when the job completes successfully
    fn on_complete(&self, message: Option<String>);

    /// Called when the job fails
    fn on_error(&self, error: &str);

    /// Called when the job is cancelled
    fn on_cancel(&self);
}

/// Snapshot of a job's progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub phase: ProgressPhase,
    /// 0.0 - 100.0, never decreasing
    pub percent: f64,
    pub message: String,
    /// Media time covered so far
    pub elapsed: Duration,
    /// Media time the job aims for
    pub target: Duration,
}

/// Progress phases
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Loading the source and seeking
    Initializing,
    /// Recorder running
    Capturing,
    /// Recorder stopped, output being assembled
    Finalizing,
    Complete,
    Failed,
    Cancelled,
}

/// Progress tracker with thread-safe updates
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Mutex<ProgressInfo>>,
    callbacks: Arc<Mutex<Vec<Arc<dyn ProgressCallback>>>>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    pub fn new(operation: &str) -> Self {
        let info = ProgressInfo {
            phase: ProgressPhase::Initializing,
            percent: 0.0,
            message: operation.to_string(),
            elapsed: Duration::ZERO,
            target: Duration::ZERO,
        };

        Self {
            inner: Arc::new(Mutex::new(info)),
            callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a progress callback
    pub fn add_callback(&self, callback: Arc<dyn ProgressCallback>) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.push(callback);
        }
    }

    /// Start a job capturing `target` worth of media
    pub fn start(&self, operation: &str, target: Duration) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.phase = ProgressPhase::Initializing;
            inner.message = operation.to_string();
            inner.percent = 0.0;
            inner.elapsed = Duration::ZERO;
            inner.target = target;
        }

        self.notify_callbacks(|cb| cb.on_start(operation, target));
    }

    /// Set current phase
    pub fn set_phase(&self, phase: ProgressPhase) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.phase = phase;
        }
    }

    /// Record elapsed media time; the percentage is capped until `complete`
    pub fn update(&self, elapsed: Duration) {
        let percent = {
            let mut inner = match self.inner.lock() {
                Ok(inner) => inner,
                Err(_) => return,
            };
            if matches!(
                inner.phase,
                ProgressPhase::Complete | ProgressPhase::Failed | ProgressPhase::Cancelled
            ) {
                return;
            }
            let percent =
                ProgressRules::capture_percent(elapsed.as_secs_f64(), inner.target.as_secs_f64());
            inner.elapsed = elapsed;
            inner.percent = inner.percent.max(percent);
            inner.percent
        };

        self.notify_callbacks(|cb| cb.on_progress(percent, None));
    }

    /// Complete the job successfully
    pub fn complete(&self, message: Option<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.phase = ProgressPhase::Complete;
            inner.percent = 100.0;
            if let Some(ref msg) = message {
                inner.message = msg.clone();
            }
        }

        self.notify_callbacks(|cb| cb.on_complete(message.clone()));
    }

    /// Mark the job as failed
    pub fn error(&self, error: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.phase = ProgressPhase::Failed;
            inner.message = error.to_string();
        }

        self.notify_callbacks(|cb| cb.on_error(error));
    }

    /// Mark the job as cancelled
    pub fn cancel(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.phase = ProgressPhase::Cancelled;
            inner.message = "Operation cancelled".to_string();
        }

        self.notify_callbacks(|cb| cb.on_cancel());
    }

    /// Get current progress information
    pub fn get_info(&self) -> Option<ProgressInfo> {
        self.inner.lock().ok().map(|inner| inner.clone())
    }

    /// Current percentage
    pub fn percent(&self) -> f64 {
        self.inner.lock().map(|inner| inner.percent).unwrap_or(0.0)
    }

    fn notify_callbacks<F>(&self, f: F)
    where
        F: Fn(&dyn ProgressCallback),
    {
        if let Ok(callbacks) = self.callbacks.lock() {
            for callback in callbacks.iter() {
                f(callback.as_ref());
            }
        }
    }
}

/// Progress reported through `tracing`, for the CLI
pub struct LogProgressCallback {
    /// Only log when the integer percentage moved by at least this much
    step: f64,
    last: Mutex<f64>,
}

impl LogProgressCallback {
    pub fn new(step: f64) -> Self {
        Self {
            step,
            last: Mutex::new(-1.0),
        }
    }
}

impl ProgressCallback for LogProgressCallback {
    fn on_start(&self, operation: &str, target: Duration) {
        tracing::info!(
            operation,
            target_secs = target.as_secs_f64(),
            "Starting capture"
        );
    }

    fn on_progress(&self, percent: f64, message: Option<String>) {
        let mut last = match self.last.lock() {
            Ok(last) => last,
            Err(_) => return,
        };
        if percent - *last < self.step {
            return;
        }
        *last = percent;

        let bar_length = 20;
        let filled = ((percent / 100.0) * bar_length as f64) as usize;
        let bar = "#".repeat(filled) + &"-".repeat(bar_length - filled.min(bar_length));
        match message {
            Some(msg) => tracing::info!("[{}] {:>3.0}% {}", bar, percent, msg),
            None => tracing::info!("[{}] {:>3.0}%", bar, percent),
        }
    }

    fn on_complete(&self, message: Option<String>) {
        tracing::info!("Capture complete: {}", message.unwrap_or_default());
    }

    fn on_error(&self, error: &str) {
        tracing::warn!("Capture failed: {}", error);
    }

    fn on_cancel(&self) {
        tracing::warn!("Capture cancelled");
    }
}

/// JSON progress events on stdout for structured consumers
pub struct JsonProgressCallback;

impl ProgressCallback for JsonProgressCallback {
    fn on_start(&self, operation: &str, target: Duration) {
        let event = serde_json::json!({
            "event": "start",
            "operation": operation,
            "target_secs": target.as_secs_f64(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_progress(&self, percent: f64, message: Option<String>) {
        let event = serde_json::json!({
            "event": "progress",
            "percent": percent,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_complete(&self, message: Option<String>) {
        let event = serde_json::json!({
            "event": "complete",
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_error(&self, error: &str) {
        let event = serde_json::json!({
            "event": "error",
            "error": error,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_cancel(&self) {
        let event = serde_json::json!({
            "event": "cancel",
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }
}
