// Trim controller - Pointer gestures over the timeline turned into range updates

use tracing::debug;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::*;
use crate::ports::MediaElement;

/// What the preview element should do in response to a gesture or time update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreviewCommand {
    Pause,
    Seek(f64),
    Play,
}

/// Owns the selected range for one source while it is being edited
pub struct TrimController {
    range: TimeRange,
    constraints: TrimConstraints,
    geometry: TimelineGeometry,
    drag: Option<ConstrainedDrag<TrimDragConstraint>>,
    /// Looped playback of the selection was started and not paused since
    looping: bool,
}

impl TrimController {
    /// Controller with the initial `[0, min(total, max_segment)]` selection
    pub fn new(
        total_duration: f64,
        constraints: TrimConstraints,
        geometry: TimelineGeometry,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            range: TimeRange::initial(total_duration, &constraints)?,
            constraints,
            geometry,
            drag: None,
            looping: false,
        })
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn constraints(&self) -> &TrimConstraints {
        &self.constraints
    }

    /// Widget moved or resized; an active gesture keeps the geometry it started with
    pub fn set_geometry(&mut self, geometry: TimelineGeometry) {
        self.geometry = geometry;
    }

    /// Selection box `(left_px, width_px)` to draw
    pub fn selection_box(&self) -> (f64, f64) {
        self.geometry.selection_box(&self.range)
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.as_ref().is_some_and(|drag| drag.is_active())
    }

    /// Handle grabbed by the active gesture
    pub fn active_handle(&self) -> Option<DragHandle> {
        self.drag
            .as_ref()
            .filter(|drag| drag.is_active())
            .map(|drag| drag.constraint().handle)
    }

    /// Whether committing needs a re-encode
    pub fn needs_trim(&self, kind: MediaKind) -> bool {
        TrimRules::needs_trim(kind, &self.range, &self.constraints)
    }

    /// Grab a handle; a playing preview is paused
    pub fn pointer_down(
        &mut self,
        handle: DragHandle,
        pointer: Point,
        is_playing: bool,
    ) -> Vec<PreviewCommand> {
        let mut drag = ConstrainedDrag::new(TrimDragConstraint {
            handle,
            geometry: self.geometry,
            constraints: self.constraints,
        });
        drag.begin(&self.range, pointer);
        self.drag = Some(drag);
        self.looping = false;
        debug!(?handle, x = pointer.x, "Trim gesture started");

        if is_playing {
            vec![PreviewCommand::Pause]
        } else {
            Vec::new()
        }
    }

    /// Move the grabbed handle; the preview follows the moved edge
    pub fn pointer_move(&mut self, pointer: Point) -> Vec<PreviewCommand> {
        let Some(drag) = self.drag.as_ref() else {
            return Vec::new();
        };
        let Some(updated) = drag.update(&self.range, pointer) else {
            return Vec::new();
        };
        if updated == self.range {
            return Vec::new();
        }
        self.range = updated;
        vec![PreviewCommand::Seek(TrimRules::preview_edge(
            &self.range,
            drag.constraint().handle,
        ))]
    }

    /// Release; looped playback resumes from `start`
    pub fn pointer_up(&mut self) -> Vec<PreviewCommand> {
        match self.drag.take() {
            Some(mut drag) if drag.is_active() => {
                drag.end();
                self.looping = true;
                debug!(
                    start = self.range.start(),
                    end = self.range.end(),
                    "Trim gesture finished"
                );
                vec![PreviewCommand::Seek(self.range.start()), PreviewCommand::Play]
            }
            _ => Vec::new(),
        }
    }

    /// Play the selection on a loop from `start`
    pub fn start_looping(&mut self) -> Vec<PreviewCommand> {
        self.looping = true;
        vec![PreviewCommand::Seek(self.range.start()), PreviewCommand::Play]
    }

    /// User paused the preview; the loop check stops restarting it
    pub fn stop_looping(&mut self) -> Vec<PreviewCommand> {
        self.looping = false;
        vec![PreviewCommand::Pause]
    }

    /// Select `[start, end]` without a pointer: pan onto its middle, then
    /// move each handle. Constraints clamp the request the same way a drag would.
    pub fn select(&mut self, start: f64, end: f64) -> TimeRange {
        self.drag = None;
        let range = TrimRules::pan(&self.range, (start + end) / 2.0);
        let range = TrimRules::move_start(&range, start, &self.constraints);
        self.range = TrimRules::move_end(&range, end, &self.constraints);
        self.range
    }

    /// Loop check, run on every media time update. A stalled preview is only
    /// restarted while looping.
    pub fn on_time_update(&self, current_time: f64, is_paused: bool) -> Vec<PreviewCommand> {
        if self.is_dragging() || self.range.contains(current_time) {
            return Vec::new();
        }
        let mut commands = vec![PreviewCommand::Seek(self.range.start())];
        if is_paused && self.looping {
            commands.push(PreviewCommand::Play);
        }
        commands
    }
}

/// Run preview commands against an element, in order
pub async fn apply_preview_commands(
    element: &mut dyn MediaElement,
    commands: &[PreviewCommand],
) -> Result<(), DomainError> {
    for command in commands {
        match *command {
            PreviewCommand::Pause => element.pause(),
            PreviewCommand::Seek(time) => element.seek(time).await?,
            PreviewCommand::Play => element.play().await?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
