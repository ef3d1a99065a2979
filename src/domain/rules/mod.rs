// Domain rules - Business logic and policies

use crate::domain::model::*;

/// Constraint applied while a pointer drags something around.
///
/// `grab` captures whatever the gesture needs to remember at pointer-down,
/// `apply` maps the current pointer to a new, constraint-respecting value.
pub trait DragConstraint {
    type Target;
    type Anchor;

    fn grab(&self, target: &Self::Target, pointer: Point) -> Self::Anchor;

    fn apply(&self, target: &Self::Target, anchor: &Self::Anchor, pointer: Point) -> Self::Target;
}

/// Pointer capture, move and release for one gesture at a time
pub struct ConstrainedDrag<C: DragConstraint> {
    constraint: C,
    anchor: Option<C::Anchor>,
}

impl<C: DragConstraint> ConstrainedDrag<C> {
    pub fn new(constraint: C) -> Self {
        Self {
            constraint,
            anchor: None,
        }
    }

    /// Pointer down: capture the anchor
    pub fn begin(&mut self, target: &C::Target, pointer: Point) {
        self.anchor = Some(self.constraint.grab(target, pointer));
    }

    /// Pointer move: `None` unless a gesture is active
    pub fn update(&self, target: &C::Target, pointer: Point) -> Option<C::Target> {
        self.anchor
            .as_ref()
            .map(|anchor| self.constraint.apply(target, anchor, pointer))
    }

    /// Pointer up or cancel
    pub fn end(&mut self) {
        self.anchor = None;
    }

    pub fn is_active(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn constraint(&self) -> &C {
        &self.constraint
    }
}

/// Horizontal placement of the timeline widget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineGeometry {
    /// Widget left edge in pointer coordinates
    pub left: f64,
    /// Widget width in pixels
    pub width: f64,
    /// Narrowest the selection box is ever drawn
    pub min_selection_px: f64,
}

impl TimelineGeometry {
    pub fn new(left: f64, width: f64, min_selection_px: f64) -> Self {
        Self {
            left,
            width,
            min_selection_px,
        }
    }

    /// Pointer x to timeline fraction in `[0, 1]`; `None` for a collapsed widget
    pub fn fraction_at(&self, pointer_x: f64) -> Option<f64> {
        if !(self.width > 0.0) {
            return None;
        }
        Some(((pointer_x - self.left) / self.width).clamp(0.0, 1.0))
    }

    /// Selection box `(left_px, width_px)` relative to the widget
    pub fn selection_box(&self, range: &TimeRange) -> (f64, f64) {
        let total = range.total_duration();
        if !(total > 0.0) || !(self.width > 0.0) {
            return (0.0, 0.0);
        }
        let width = (range.span() / total * self.width)
            .max(self.min_selection_px)
            .min(self.width);
        let left = (range.start() / total * self.width).min(self.width - width).max(0.0);
        (left, width)
    }
}

/// Trim range transition functions; every result satisfies the constraints
pub struct TrimRules;

impl TrimRules {
    /// Left handle moved to time `t`
    pub fn move_start(range: &TimeRange, t: f64, constraints: &TrimConstraints) -> TimeRange {
        let total = range.total_duration();
        let min = constraints.effective_min(total);
        let end = range.end();

        let mut start = t.min(end - min);
        if let Some(max) = constraints.max_segment {
            if end - start > max {
                start = end - max;
            }
        }
        TimeRange::from_bounds(start.max(0.0), end, total)
    }

    /// Right handle moved to time `t`
    pub fn move_end(range: &TimeRange, t: f64, constraints: &TrimConstraints) -> TimeRange {
        let total = range.total_duration();
        let min = constraints.effective_min(total);
        let start = range.start();

        let mut end = t.max(start + min);
        if let Some(max) = constraints.max_segment {
            if end - start > max {
                end = start + max;
            }
        }
        TimeRange::from_bounds(start, end.min(total), total)
    }

    /// Selection centered on time `t`, span preserved
    pub fn pan(range: &TimeRange, t: f64) -> TimeRange {
        let total = range.total_duration();
        let span = range.span();
        let start = (t - span / 2.0).min(total - span).max(0.0);
        TimeRange::from_bounds(start, start + span, total)
    }

    /// Apply a gesture on `handle` at time `t`
    pub fn apply(
        range: &TimeRange,
        handle: DragHandle,
        t: f64,
        constraints: &TrimConstraints,
    ) -> TimeRange {
        match handle {
            DragHandle::Start => Self::move_start(range, t, constraints),
            DragHandle::End => Self::move_end(range, t, constraints),
            DragHandle::Bar => Self::pan(range, t),
        }
    }

    /// Timestamp the preview should show after a gesture on `handle`
    pub fn preview_edge(range: &TimeRange, handle: DragHandle) -> f64 {
        match handle {
            DragHandle::Start | DragHandle::Bar => range.start(),
            DragHandle::End => range.end(),
        }
    }

    /// Whether committing `range` requires re-encoding
    pub fn needs_trim(kind: MediaKind, range: &TimeRange, constraints: &TrimConstraints) -> bool {
        kind == MediaKind::Video
            && (constraints.exceeds_cap(range.total_duration())
                || range.span() < range.total_duration())
    }
}

/// Trim drag: absolute pointer position mapped onto the timeline
#[derive(Debug, Clone, Copy)]
pub struct TrimDragConstraint {
    pub handle: DragHandle,
    pub geometry: TimelineGeometry,
    pub constraints: TrimConstraints,
}

impl DragConstraint for TrimDragConstraint {
    type Target = TimeRange;
    type Anchor = ();

    fn grab(&self, _target: &TimeRange, _pointer: Point) {}

    fn apply(&self, target: &TimeRange, _anchor: &(), pointer: Point) -> TimeRange {
        match self.geometry.fraction_at(pointer.x) {
            Some(fraction) => {
                let t = fraction * target.total_duration();
                TrimRules::apply(target, self.handle, t, &self.constraints)
            }
            None => *target,
        }
    }
}

/// Free drag keeping the grab offset between pointer and item
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetDragConstraint;

impl DragConstraint for OffsetDragConstraint {
    type Target = Point;
    type Anchor = Point;

    fn grab(&self, target: &Point, pointer: Point) -> Point {
        pointer - *target
    }

    fn apply(&self, _target: &Point, offset: &Point, pointer: Point) -> Point {
        pointer - *offset
    }
}

/// Ordered preference lists for recorder output formats
pub struct FormatSelector;

impl FormatSelector {
    /// Re-encoding a trimmed range
    pub const TRIM_CANDIDATES: [&'static str; 3] = [
        "video/mp4",
        "video/webm;codecs=h264",
        "video/webm;codecs=vp8,opus",
    ];

    /// Live camera recording
    pub const RECORD_CANDIDATES: [&'static str; 3] =
        ["video/mp4", "video/webm;codecs=h264", "video/webm"];

    /// First supported candidate; the last one is assumed to always work
    pub fn select<F>(candidates: &[&str], is_supported: F) -> CaptureFormat
    where
        F: Fn(&str) -> bool,
    {
        let (last, preferred) = match candidates.split_last() {
            Some(split) => split,
            None => return CaptureFormat::new("video/webm"),
        };
        preferred
            .iter()
            .find(|mime| is_supported(**mime))
            .map(|mime| CaptureFormat::new(*mime))
            .unwrap_or_else(|| CaptureFormat::new(*last))
    }
}

/// Capture progress policy
pub struct ProgressRules;

impl ProgressRules {
    /// Cap until the recorder confirms finalize
    pub const CEILING: f64 = 99.0;

    /// Percentage from elapsed vs. target seconds, never above the ceiling
    pub fn capture_percent(elapsed_secs: f64, target_secs: f64) -> f64 {
        if !(target_secs > 0.0) {
            return Self::CEILING;
        }
        (elapsed_secs / target_secs * 100.0).clamp(0.0, Self::CEILING)
    }
}

/// Overlay scale policy
pub struct ScaleRules;

impl ScaleRules {
    pub fn clamp(scale: f64, min: f64, max: f64) -> f64 {
        if scale.is_nan() {
            return 1.0_f64.clamp(min, max);
        }
        scale.clamp(min, max)
    }
}
