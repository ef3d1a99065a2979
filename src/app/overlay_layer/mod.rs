// Overlay layer - Text items dragged and scaled over the video

use tracing::debug;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::*;

/// Ordered overlay items with at most one selected
pub struct OverlayLayer {
    items: Vec<OverlayItem>,
    selected: Option<i64>,
    container: (f64, f64),
    min_scale: f64,
    max_scale: f64,
    drag: ConstrainedDrag<OffsetDragConstraint>,
    last_id: i64,
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl OverlayLayer {
    /// Empty layer over a `width`x`height` container
    pub fn new(width: f64, height: f64, min_scale: f64, max_scale: f64) -> Self {
        Self {
            items: Vec::new(),
            selected: None,
            container: (width, height),
            min_scale,
            max_scale,
            drag: ConstrainedDrag::new(OffsetDragConstraint),
            last_id: 0,
        }
    }

    pub fn from_config(width: f64, height: f64, config: &EditorConfig) -> Self {
        Self::new(width, height, config.overlay_min_scale, config.overlay_max_scale)
    }

    pub fn items(&self) -> &[OverlayItem] {
        &self.items
    }

    pub fn selected(&self) -> Option<&OverlayItem> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: i64) -> Option<&OverlayItem> {
        self.items.iter().find(|item| item.id == id)
    }

    fn get_mut(&mut self, id: i64) -> Result<&mut OverlayItem, DomainError> {
        self.items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| DomainError::BadArgs(format!("Unknown overlay item: {}", id)))
    }

    /// Millisecond timestamp ids, bumped when two items land in the same millisecond
    fn next_id(&mut self) -> i64 {
        let id = chrono::Utc::now().timestamp_millis().max(self.last_id + 1);
        self.last_id = id;
        id
    }

    /// Add a centered item and select it
    pub fn add(&mut self, text: &str, color: &str) -> Result<OverlayItem, DomainError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::BadArgs("Overlay text cannot be empty".to_string()));
        }
        if !is_hex_color(color) {
            return Err(DomainError::BadArgs(format!(
                "Invalid overlay color: {}. Expected #RRGGBB",
                color
            )));
        }

        let item = OverlayItem {
            id: self.next_id(),
            text: text.to_string(),
            position: Point::new(self.container.0 / 2.0, self.container.1 / 2.0),
            scale: ScaleRules::clamp(1.0, self.min_scale, self.max_scale),
            color: color.to_uppercase(),
        };
        debug!(id = item.id, text = %item.text, "Overlay added");
        self.items.push(item.clone());
        self.selected = Some(item.id);
        Ok(item)
    }

    /// Update position and/or scale; only the selected item may change
    pub fn update(&mut self, id: i64, update: OverlayUpdate) -> Result<(), DomainError> {
        if self.get(id).is_none() {
            return Err(DomainError::BadArgs(format!("Unknown overlay item: {}", id)));
        }
        if self.selected != Some(id) {
            return Err(DomainError::InvalidState(format!(
                "Overlay item {} is not selected",
                id
            )));
        }
        let (min, max) = (self.min_scale, self.max_scale);
        let item = self.get_mut(id)?;
        if let Some(position) = update.position {
            item.position = position;
        }
        if let Some(scale) = update.scale {
            item.scale = ScaleRules::clamp(scale, min, max);
        }
        Ok(())
    }

    /// Select an item, or clear the selection with `None`
    pub fn select(&mut self, id: Option<i64>) -> Result<(), DomainError> {
        if let Some(id) = id {
            self.get_mut(id)?;
        }
        if self.selected != id {
            self.drag.end();
        }
        self.selected = id;
        Ok(())
    }

    pub fn remove(&mut self, id: i64) -> Result<OverlayItem, DomainError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| DomainError::BadArgs(format!("Unknown overlay item: {}", id)))?;
        if self.selected == Some(id) {
            self.selected = None;
            self.drag.end();
        }
        Ok(self.items.remove(index))
    }

    /// Gesture start on an item: select it and remember the grab offset
    pub fn pointer_down(&mut self, id: i64, pointer: Point) -> Result<(), DomainError> {
        let position = self.get_mut(id)?.position;
        self.selected = Some(id);
        self.drag.begin(&position, pointer);
        Ok(())
    }

    /// Drag the selected item along with the pointer
    pub fn pointer_move(&mut self, pointer: Point) -> Option<Point> {
        let id = self.selected?;
        let current = self.get(id)?.position;
        let moved = self.drag.update(&current, pointer)?;
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
            item.position = moved;
        }
        Some(moved)
    }

    pub fn pointer_up(&mut self) {
        self.drag.end();
    }

    /// Interaction with empty canvas clears the selection
    pub fn click_empty(&mut self) {
        self.drag.end();
        self.selected = None;
    }

    /// Slider value applied to the selected item
    pub fn set_scale(&mut self, scale: f64) -> Result<f64, DomainError> {
        let id = self
            .selected
            .ok_or_else(|| DomainError::InvalidState("No overlay item selected".to_string()))?;
        self.update(
            id,
            OverlayUpdate {
                position: None,
                scale: Some(scale),
            },
        )?;
        Ok(self.get(id).map(|item| item.scale).unwrap_or(scale))
    }

    /// Container resized; items keep their positions
    pub fn set_container_size(&mut self, width: f64, height: f64) {
        self.container = (width, height);
    }
}
