//! Click-through arbitration for a transparent, always-on-top overlay window.
//!
//! UI components opt in to receiving clicks through a [`SurfaceRegistry`].
//! The [`ClickThroughArbiter`] checks every pointer move against the visible
//! surfaces and tells the [`HostWindow`] whether to let clicks fall through.

pub mod arbiter;
pub mod error;
pub mod geometry;
pub mod host;
pub mod registry;

pub use arbiter::{ArbiterConfig, ClickThroughArbiter, DEFAULT_DEBOUNCE};
pub use error::{OverlayError, Result};
pub use geometry::Rect;
pub use host::{HostWindow, NoPanels, PanelController};
pub use registry::SurfaceRegistry;
