//! Capabilities the arbiter needs from the desktop shell.

use async_trait::async_trait;

use crate::error::Result;

/// The native overlay window.
///
/// Adapters for shells with Electron-style semantics pass
/// `{ forward: true }` whenever `ignore` is true, so hover tracking keeps
/// working while clicks fall through.
#[async_trait]
pub trait HostWindow: Send + Sync {
    /// Make the window transparent to clicks (`true`) or capture them (`false`).
    async fn set_ignore_cursor_events(&self, ignore: bool) -> Result<()>;
}

/// Owner of dismissable UI (menus, popovers, expanded cards).
#[async_trait]
pub trait PanelController: Send + Sync {
    /// Close every transient panel.
    async fn collapse_transient(&self);
}

/// Panel controller for windows without transient panels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPanels;

#[async_trait]
impl PanelController for NoPanels {
    async fn collapse_transient(&self) {}
}
