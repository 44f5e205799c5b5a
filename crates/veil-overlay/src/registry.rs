//! Opt-in registry of interactive surfaces.
//!
//! UI components that want to receive clicks register their bounds here.
//! Anything not registered is treated as see-through.

use crate::geometry::Rect;

#[derive(Debug, Clone)]
struct Surface {
    id: String,
    bounds: Rect,
    visible: bool,
}

/// Interactive surfaces, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct SurfaceRegistry {
    surfaces: Vec<Surface>,
}

impl SurfaceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a visible surface.
    ///
    /// Re-registering an id replaces its bounds and keeps its position.
    /// Returns true if the id was new.
    pub fn register(&mut self, id: impl Into<String>, bounds: Rect) -> bool {
        let id = id.into();
        if let Some(surface) = self.find_mut(&id) {
            surface.bounds = bounds;
            surface.visible = true;
            return false;
        }
        self.surfaces.push(Surface {
            id,
            bounds,
            visible: true,
        });
        true
    }

    /// Returns false for unknown ids.
    pub fn set_visible(&mut self, id: &str, visible: bool) -> bool {
        match self.find_mut(id) {
            Some(surface) => {
                surface.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Returns false for unknown ids.
    pub fn update_bounds(&mut self, id: &str, bounds: Rect) -> bool {
        match self.find_mut(id) {
            Some(surface) => {
                surface.bounds = bounds;
                true
            }
            None => false,
        }
    }

    /// Remove a surface. Returns false for unknown ids.
    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.surfaces.len();
        self.surfaces.retain(|s| s.id != id);
        self.surfaces.len() != before
    }

    /// Bounds of the visible surfaces, in registration order.
    pub fn visible_regions(&self) -> Vec<Rect> {
        self.surfaces
            .iter()
            .filter(|s| s.visible)
            .map(|s| s.bounds)
            .collect()
    }

    /// Number of registered surfaces, hidden ones included.
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Surface> {
        self.surfaces.iter_mut().find(|s| s.id == id)
    }
}
