// Application layer - Editing and recording flows over the ports

pub mod capture_recorder;
pub mod container;
pub mod edit_session;
pub mod overlay_layer;
pub mod record_session;
pub mod thumbnail_sampler;
pub mod trim_controller;

pub use capture_recorder::CaptureRecorder;
pub use container::{AppContainer, DefaultAppContainer};
pub use edit_session::{EditMode, EditOutput, EditSession, OutputManifest};
pub use overlay_layer::OverlayLayer;
pub use record_session::{RecordSession, RecordSettings};
pub use thumbnail_sampler::ThumbnailSampler;
pub use trim_controller::{apply_preview_commands, PreviewCommand, TrimController};
