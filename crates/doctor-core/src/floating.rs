//! Floating objects (images and shapes) and their placement.
//!
//! ## Drag Model
//!
//! ```text
//! begin_drag(pointer, start) ──► update_drag(pointer, p) ... ──► commit_drag(pointer, end)
//!        │                              │                               │
//!   capture pointer            transient offset only          position = origin + delta
//! ```
//!
//! The pointer delta is measured in screen pixels and divided by the
//! zoom factor, so a drag covers the same document distance at every
//! zoom level. Only the commit writes the stored position.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::FloatingConfig;
use crate::{CoreError, CoreResult};

/// How an object interacts with the surrounding text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapMode {
    Square,
    Tight,
    None,
    Behind,
    Front,
}

impl WrapMode {
    pub const ALL: [WrapMode; 5] = [
        WrapMode::Square,
        WrapMode::Tight,
        WrapMode::None,
        WrapMode::Behind,
        WrapMode::Front,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WrapMode::Square => "square",
            WrapMode::Tight => "tight",
            WrapMode::None => "none",
            WrapMode::Behind => "behind",
            WrapMode::Front => "front",
        }
    }

    /// Text reflows around the object.
    pub fn reflows_text(self) -> bool {
        matches!(self, WrapMode::Square | WrapMode::Tight)
    }
}

impl FromStr for WrapMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WrapMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown wrap mode '{s}'"))
    }
}

impl fmt::Display for WrapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Image,
    Shape,
}

impl ObjectKind {
    fn id_prefix(self) -> &'static str {
        match self {
            ObjectKind::Image => "img",
            ObjectKind::Shape => "shape",
        }
    }
}

/// A point in page-local pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// An object floating over the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingObject {
    pub id: String,
    pub kind: ObjectKind,
    /// Image source reference
    pub source: String,
    pub position: Point,
    pub size: Size,
    pub wrap: WrapMode,
}

impl FloatingObject {
    /// Horizontal centre in page pixels.
    pub fn center_x(&self) -> f64 {
        self.position.x + self.size.width / 2.0
    }

    pub fn right(&self) -> f64 {
        self.position.x + self.size.width
    }

    /// Clamps position and size to non-negative values.
    fn normalized(mut self) -> Self {
        self.position.x = self.position.x.max(0.0);
        self.position.y = self.position.y.max(0.0);
        self.size.width = self.size.width.max(0.0);
        self.size.height = self.size.height.max(0.0);
        self
    }
}

/// Identifies the pointer that owns a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PointerId(pub u64);

#[derive(Debug, Clone)]
struct DragState {
    object_id: String,
    pointer: PointerId,
    origin: Point,
    pointer_start: Point,
    offset: Point,
}

/// Owns the floating objects of the current level.
#[derive(Debug, Clone)]
pub struct FloatingController {
    objects: Vec<FloatingObject>,
    selected: Option<String>,
    drag: Option<DragState>,
    defaults: FloatingConfig,
}

impl FloatingController {
    pub fn new(defaults: FloatingConfig) -> Self {
        Self {
            objects: Vec::new(),
            selected: None,
            drag: None,
            defaults,
        }
    }

    /// Replaces every object, dropping selection and any drag.
    pub fn load(&mut self, objects: Vec<FloatingObject>) {
        self.objects = objects.into_iter().map(FloatingObject::normalized).collect();
        self.selected = None;
        self.drag = None;
    }

    pub fn objects(&self) -> &[FloatingObject] {
        &self.objects
    }

    pub fn get(&self, id: &str) -> Option<&FloatingObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    fn get_mut(&mut self, id: &str) -> CoreResult<&mut FloatingObject> {
        self.objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| CoreError::ObjectNotFound(id.to_string()))
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_object(&self) -> Option<&FloatingObject> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    // ==================== Lifecycle ====================

    /// Inserts a new object at the default spot and selects it.
    pub fn insert(&mut self, kind: ObjectKind, source: impl Into<String>) -> &FloatingObject {
        let simple = Uuid::new_v4().simple().to_string();
        let id = format!("{}-{}", kind.id_prefix(), &simple[..8]);
        let object = FloatingObject {
            id: id.clone(),
            kind,
            source: source.into(),
            position: Point::new(self.defaults.x, self.defaults.y),
            size: Size::new(self.defaults.width, self.defaults.height),
            wrap: WrapMode::Front,
        }
        .normalized();
        tracing::debug!("Inserted floating object {}", id);
        self.objects.push(object);
        self.selected = Some(id);
        let index = self.objects.len() - 1;
        &self.objects[index]
    }

    pub fn delete(&mut self, id: &str) -> CoreResult<FloatingObject> {
        let index = self
            .objects
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| CoreError::ObjectNotFound(id.to_string()))?;
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        if self.drag.as_ref().is_some_and(|d| d.object_id == id) {
            self.drag = None;
        }
        tracing::debug!("Deleted floating object {}", id);
        Ok(self.objects.remove(index))
    }

    pub fn set_wrap_mode(&mut self, id: &str, mode: WrapMode) -> CoreResult<()> {
        self.get_mut(id)?.wrap = mode;
        Ok(())
    }

    // ==================== Selection ====================

    /// Selects one object; any other selection is dropped.
    pub fn select(&mut self, id: &str) -> CoreResult<()> {
        if self.get(id).is_none() {
            return Err(CoreError::ObjectNotFound(id.to_string()));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Delete/Backspace handling.
    ///
    /// Decided by selection state alone: with nothing selected the key
    /// belongs to the text surface and `None` is returned.
    pub fn handle_delete_key(&mut self) -> Option<FloatingObject> {
        let id = self.selected.clone()?;
        self.delete(&id).ok()
    }

    // ==================== Dragging ====================

    /// Starts dragging `id` with `pointer`, capturing that pointer.
    pub fn begin_drag(&mut self, id: &str, pointer: PointerId, start: Point) -> CoreResult<()> {
        if let Some(active) = &self.drag {
            return Err(CoreError::DragInProgress(active.object_id.clone()));
        }
        let origin = self
            .get(id)
            .map(|o| o.position)
            .ok_or_else(|| CoreError::ObjectNotFound(id.to_string()))?;
        self.selected = Some(id.to_string());
        self.drag = Some(DragState {
            object_id: id.to_string(),
            pointer,
            origin,
            pointer_start: start,
            offset: Point::default(),
        });
        Ok(())
    }

    /// Updates the transient offset. Events from other pointers are ignored.
    pub fn update_drag(&mut self, pointer: PointerId, current: Point, zoom: u16) -> Option<Point> {
        let drag = self.drag.as_mut().filter(|d| d.pointer == pointer)?;
        drag.offset = document_delta(drag.pointer_start, current, zoom);
        Some(drag.offset)
    }

    /// Ends the drag and writes the final position.
    pub fn commit_drag(&mut self, pointer: PointerId, end: Point, zoom: u16) -> Option<Point> {
        if self.drag.as_ref()?.pointer != pointer {
            return None;
        }
        let drag = self.drag.take()?;
        let delta = document_delta(drag.pointer_start, end, zoom);
        let position = Point::new(
            (drag.origin.x + delta.x).max(0.0),
            (drag.origin.y + delta.y).max(0.0),
        );
        let object = self.get_mut(&drag.object_id).ok()?;
        object.position = position;
        tracing::debug!(
            "Moved {} to ({:.1}, {:.1})",
            drag.object_id,
            position.x,
            position.y
        );
        Some(position)
    }

    /// Pointer cancel: drops the transient offset without moving anything.
    pub fn cancel_drag(&mut self, pointer: PointerId) {
        if self.drag.as_ref().is_some_and(|d| d.pointer == pointer) {
            self.drag = None;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Transient visual offset of an object being dragged.
    pub fn drag_offset(&self, id: &str) -> Option<Point> {
        self.drag
            .as_ref()
            .filter(|d| d.object_id == id)
            .map(|d| d.offset)
    }
}

impl Default for FloatingController {
    fn default() -> Self {
        Self::new(FloatingConfig::default())
    }
}

/// Screen-space pointer movement converted to document space.
fn document_delta(start: Point, current: Point, zoom: u16) -> Point {
    let scale = f64::from(zoom.max(1)) / 100.0;
    Point::new((current.x - start.x) / scale, (current.y - start.y) / scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str, x: f64, y: f64) -> FloatingObject {
        FloatingObject {
            id: id.to_string(),
            kind: ObjectKind::Image,
            source: "photo.png".to_string(),
            position: Point::new(x, y),
            size: Size::new(200.0, 150.0),
            wrap: WrapMode::Front,
        }
    }

    #[test]
    fn test_insert_uses_defaults_and_selects() {
        let mut controller = FloatingController::default();
        let object = controller.insert(ObjectKind::Image, "logo.png").clone();
        assert_eq!(object.position, Point::new(100.0, 100.0));
        assert_eq!(object.size, Size::new(200.0, 150.0));
        assert_eq!(object.wrap, WrapMode::Front);
        assert!(object.id.starts_with("img-"));
        assert_eq!(controller.selected(), Some(object.id.as_str()));
    }

    #[test]
    fn test_selection_is_exclusive() {
        let mut controller = FloatingController::default();
        controller.load(vec![image("a", 0.0, 0.0), image("b", 10.0, 10.0)]);
        controller.select("a").unwrap();
        controller.select("b").unwrap();
        assert_eq!(controller.selected(), Some("b"));
        controller.deselect();
        assert_eq!(controller.selected(), None);
    }

    #[test]
    fn test_drag_commit_is_exact_at_every_zoom() {
        for (zoom, expected) in [(50, (160.0, 140.0)), (100, (130.0, 120.0)), (200, (115.0, 110.0))] {
            let mut controller = FloatingController::default();
            controller.load(vec![image("a", 100.0, 100.0)]);
            controller
                .begin_drag("a", PointerId(1), Point::new(500.0, 500.0))
                .unwrap();
            let end = Point::new(530.0, 520.0);
            let position = controller.commit_drag(PointerId(1), end, zoom).unwrap();
            assert_eq!((position.x, position.y), expected, "zoom {zoom}");
            assert_eq!(controller.get("a").unwrap().position, position);
        }
    }

    #[test]
    fn test_update_drag_leaves_position_alone() {
        let mut controller = FloatingController::default();
        controller.load(vec![image("a", 100.0, 100.0)]);
        controller.begin_drag("a", PointerId(1), Point::new(0.0, 0.0)).unwrap();
        let offset = controller
            .update_drag(PointerId(1), Point::new(40.0, 0.0), 100)
            .unwrap();
        assert_eq!(offset, Point::new(40.0, 0.0));
        assert_eq!(controller.drag_offset("a"), Some(offset));
        assert_eq!(controller.get("a").unwrap().position, Point::new(100.0, 100.0));
    }

    #[test]
    fn test_pointer_capture_ignores_other_pointers() {
        let mut controller = FloatingController::default();
        controller.load(vec![image("a", 100.0, 100.0), image("b", 300.0, 100.0)]);
        controller.begin_drag("a", PointerId(1), Point::new(0.0, 0.0)).unwrap();

        assert!(controller.update_drag(PointerId(2), Point::new(50.0, 0.0), 100).is_none());
        assert!(matches!(
            controller.begin_drag("b", PointerId(2), Point::new(0.0, 0.0)),
            Err(CoreError::DragInProgress(_))
        ));
        assert!(controller.commit_drag(PointerId(2), Point::new(50.0, 0.0), 100).is_none());
        assert!(controller.is_dragging());

        controller.commit_drag(PointerId(1), Point::new(20.0, 0.0), 100);
        assert_eq!(controller.get("a").unwrap().position.x, 120.0);
    }

    #[test]
    fn test_commit_clamps_to_page_origin() {
        let mut controller = FloatingController::default();
        controller.load(vec![image("a", 10.0, 10.0)]);
        controller.begin_drag("a", PointerId(1), Point::new(100.0, 100.0)).unwrap();
        let position = controller
            .commit_drag(PointerId(1), Point::new(0.0, 0.0), 100)
            .unwrap();
        assert_eq!(position, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_cancel_drag_discards_offset() {
        let mut controller = FloatingController::default();
        controller.load(vec![image("a", 10.0, 10.0)]);
        controller.begin_drag("a", PointerId(7), Point::new(0.0, 0.0)).unwrap();
        controller.update_drag(PointerId(7), Point::new(80.0, 0.0), 100);
        controller.cancel_drag(PointerId(7));
        assert!(!controller.is_dragging());
        assert_eq!(controller.get("a").unwrap().position, Point::new(10.0, 10.0));
    }

    #[test]
    fn test_delete_key_depends_on_selection() {
        let mut controller = FloatingController::default();
        controller.load(vec![image("a", 0.0, 0.0)]);
        assert!(controller.handle_delete_key().is_none());
        assert_eq!(controller.objects().len(), 1);

        controller.select("a").unwrap();
        let removed = controller.handle_delete_key().unwrap();
        assert_eq!(removed.id, "a");
        assert!(controller.objects().is_empty());
        assert_eq!(controller.selected(), None);
    }

    #[test]
    fn test_wrap_mode_parse() {
        assert_eq!("Square".parse::<WrapMode>().unwrap(), WrapMode::Square);
        assert!("diagonal".parse::<WrapMode>().is_err());
    }
}
