// Thumbnail sampler - Evenly spaced preview frames for the timeline strip

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::engine::raster::encode_thumbnail;
use crate::engine::ScopedElement;
use crate::ports::*;

/// Samples a source on its own detached element
#[derive(Clone)]
pub struct ThumbnailSampler {
    playback: Arc<dyn PlaybackPort>,
    steps: usize,
    size: u32,
    quality: u8,
}

impl ThumbnailSampler {
    pub fn new(playback: Arc<dyn PlaybackPort>, steps: usize, size: u32, quality: u8) -> Self {
        Self {
            playback,
            steps,
            size,
            quality,
        }
    }

    pub fn from_config(playback: Arc<dyn PlaybackPort>, config: &EditorConfig) -> Self {
        Self::new(
            playback,
            config.thumbnail_steps,
            config.thumbnail_size,
            config.thumbnail_quality,
        )
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Start of each of `steps` equal intervals over `[0, total)`
    pub fn timestamps(total_duration: f64, steps: usize) -> Vec<f64> {
        if !(total_duration > 0.0) || steps == 0 {
            return Vec::new();
        }
        (0..steps)
            .map(|i| i as f64 * total_duration / steps as f64)
            .collect()
    }

    /// Exactly `steps` entries for a positive duration; failed samples become placeholders
    pub async fn sample(&self, source: &MediaSource, total_duration: f64) -> Vec<Thumbnail> {
        let timestamps = Self::timestamps(total_duration, self.steps);
        if timestamps.is_empty() {
            return Vec::new();
        }

        let mut element = match self.playback.open(source).await {
            Ok(element) => ScopedElement::new(element),
            Err(e) => {
                warn!("Thumbnail element failed to load: {}", e);
                return timestamps
                    .into_iter()
                    .map(|timestamp| Thumbnail::Placeholder { timestamp })
                    .collect();
            }
        };

        let mut thumbnails = Vec::with_capacity(timestamps.len());
        for timestamp in timestamps {
            match self.sample_one(&mut element, timestamp).await {
                Ok(jpeg) => thumbnails.push(Thumbnail::Frame { timestamp, jpeg }),
                Err(e) => {
                    debug!(timestamp, "Thumbnail sample failed: {}", e);
                    thumbnails.push(Thumbnail::Placeholder { timestamp });
                }
            }
        }

        let failed = thumbnails.iter().filter(|t| t.is_placeholder()).count();
        debug!(total = thumbnails.len(), failed, "Thumbnail strip sampled");
        thumbnails
    }

    async fn sample_one(
        &self,
        element: &mut ScopedElement,
        timestamp: f64,
    ) -> Result<Vec<u8>, DomainError> {
        element.seek(timestamp).await?;
        let frame = element.snapshot().await?;
        encode_thumbnail(&frame, self.size, self.quality)
    }

    /// Run `sample` in the background
    pub fn spawn(&self, source: MediaSource, total_duration: f64) -> JoinHandle<Vec<Thumbnail>> {
        let sampler = self.clone();
        tokio::spawn(async move { sampler.sample(&source, total_duration).await })
    }
}
