//! Click-through arbitration for the overlay window.
//!
//! The overlay is a transparent window stacked over everything else. While
//! the pointer is over nothing interactive the window ignores the mouse and
//! clicks reach the application underneath. Each pointer move is checked
//! against the visible interactive regions; when the answer flips, a toggle
//! is queued for the host window. Toggles are coalesced over a short
//! debounce window by a single worker task, so at most one is ever pending.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::geometry::{Rect, any_contains};
use crate::host::{HostWindow, PanelController};
use crate::registry::SurfaceRegistry;

/// Default coalescing window for click-through toggles.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(10);

/// Arbiter settings.
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// Coalescing window for click-through toggles.
    pub debounce: Duration,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl ArbiterConfig {
    /// Settings with the default debounce window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the coalescing window. Zero applies toggles on the next tick.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

impl From<&veil_config::OverlaySection> for ArbiterConfig {
    fn from(section: &veil_config::OverlaySection) -> Self {
        Self::new().with_debounce(section.debounce())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PointerState {
    is_over_interactive: bool,
    visible_regions: Vec<Rect>,
    modal_open: bool,
    /// Last value the host accepted. `None` until a call succeeds.
    applied: Option<bool>,
    /// Value of the host call currently running, if any.
    in_flight: Option<bool>,
    last_pointer: Option<(f64, f64)>,
}

impl PointerState {
    fn evaluate(&mut self, x: f64, y: f64) -> bool {
        self.last_pointer = Some((x, y));
        self.is_over_interactive = self.modal_open || any_contains(&self.visible_regions, x, y);
        self.is_over_interactive
    }

    /// Where the host is heading: the running call's value, else the applied one.
    fn host_target(&self) -> Option<bool> {
        self.in_flight.or(self.applied)
    }
}

struct Shared {
    state: Mutex<PointerState>,
    /// Pending `ignore` value for the host, `None` when nothing is queued.
    pending: watch::Sender<Option<bool>>,
    host: Arc<dyn HostWindow>,
    debounce: Duration,
}

impl Shared {
    /// Queue `ignore` unless the host already has it or is about to.
    fn schedule(&self, ignore: bool, target: Option<bool>) {
        let next = if target == Some(ignore) {
            None
        } else {
            Some(ignore)
        };
        self.pending.send_if_modified(|pending| {
            if *pending == next {
                return false;
            }
            *pending = next;
            next.is_some()
        });
    }

    async fn apply(&self, ignore: bool) -> bool {
        let result = self.host.set_ignore_cursor_events(ignore).await;
        let mut state = self.state.lock();
        state.in_flight = None;
        match result {
            Ok(()) => {
                state.applied = Some(ignore);
                debug!(ignore, "Updated overlay click-through");
                true
            }
            Err(e) => {
                warn!(ignore, error = %e, "Failed to update overlay click-through");
                false
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Arbiter
// ─────────────────────────────────────────────────────────────────────────────

/// Decides, per pointer move, whether the overlay captures or forwards clicks.
pub struct ClickThroughArbiter {
    shared: Arc<Shared>,
    panels: Arc<dyn PanelController>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ClickThroughArbiter {
    /// Start arbitration for a window.
    ///
    /// The window starts out click-through. Must be called inside a Tokio
    /// runtime.
    pub async fn mount(
        host: Arc<dyn HostWindow>,
        panels: Arc<dyn PanelController>,
        config: ArbiterConfig,
    ) -> Self {
        let (tx, rx) = watch::channel(None);
        let shared = Arc::new(Shared {
            state: Mutex::new(PointerState::default()),
            pending: tx,
            host,
            debounce: config.debounce,
        });

        shared.apply(true).await;

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(toggle_worker(shared.clone(), rx, cancel.clone()));
        debug!(debounce_ms = config.debounce.as_millis() as u64, "Click-through arbiter mounted");

        Self {
            shared,
            panels,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stop the worker and hand the mouse back to the window.
    pub async fn unmount(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        self.cancel.cancel();
        if let Err(e) = worker.await {
            warn!(error = %e, "Click-through worker ended abnormally");
        }
        self.shared.pending.send_replace(None);
        self.shared.apply(false).await;
        debug!("Click-through arbiter unmounted");
    }

    /// Whether the toggle worker is running.
    pub fn is_mounted(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Re-evaluate hover state at `(x, y)`.
    ///
    /// Returns whether the pointer is over interactive UI.
    pub fn on_pointer_move(&self, x: f64, y: f64) -> bool {
        let (over, target) = {
            let mut state = self.shared.state.lock();
            (state.evaluate(x, y), state.host_target())
        };
        self.shared.schedule(!over, target);
        over
    }

    /// Handle a click the overlay captured.
    ///
    /// A click that landed outside every interactive region collapses the
    /// transient panels. Returns whether they were collapsed.
    pub async fn on_capture_click(&self, x: f64, y: f64) -> bool {
        if self.shared.state.lock().is_over_interactive {
            return false;
        }
        debug!(x, y, "Click outside interactive UI, collapsing panels");
        self.panels.collapse_transient().await;
        true
    }

    /// Replace the interactive regions.
    ///
    /// Takes effect on the next pointer move.
    pub fn set_visible_regions(&self, regions: Vec<Rect>) {
        self.shared.state.lock().visible_regions = regions;
    }

    /// Feed the visible surfaces of a registry into the arbiter.
    pub fn sync_surfaces(&self, registry: &SurfaceRegistry) {
        self.set_visible_regions(registry.visible_regions());
    }

    /// While a modal is open the whole window captures the mouse.
    ///
    /// Re-evaluates at the last known pointer position.
    pub fn set_modal_open(&self, open: bool) {
        let evaluated = {
            let mut state = self.shared.state.lock();
            state.modal_open = open;
            match state.last_pointer {
                Some((x, y)) => Some((state.evaluate(x, y), state.host_target())),
                None => None,
            }
        };
        if let Some((over, target)) = evaluated {
            self.shared.schedule(!over, target);
        }
    }

    /// Hover state from the last evaluation.
    pub fn is_over_interactive(&self) -> bool {
        self.shared.state.lock().is_over_interactive
    }

    /// Whether a modal currently forces capture.
    pub fn is_modal_open(&self) -> bool {
        self.shared.state.lock().modal_open
    }

    /// Click-through state the host last accepted.
    pub fn applied_ignore(&self) -> Option<bool> {
        self.shared.state.lock().applied
    }

    /// Regions the next pointer move is checked against.
    pub fn visible_regions(&self) -> Vec<Rect> {
        self.shared.state.lock().visible_regions.clone()
    }
}

impl Drop for ClickThroughArbiter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for ClickThroughArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ClickThroughArbiter")
            .field("is_over_interactive", &state.is_over_interactive)
            .field("modal_open", &state.modal_open)
            .field("applied", &state.applied)
            .field("regions", &state.visible_regions.len())
            .finish()
    }
}

async fn toggle_worker(
    shared: Arc<Shared>,
    mut pending: watch::Receiver<Option<bool>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = pending.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        if pending.borrow_and_update().is_none() {
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(shared.debounce) => {}
        }

        let Some(ignore) = *pending.borrow_and_update() else {
            continue;
        };
        {
            let mut state = shared.state.lock();
            if state.applied == Some(ignore) {
                shared.pending.send_if_modified(|p| {
                    if *p == Some(ignore) {
                        *p = None;
                    }
                    false
                });
                continue;
            }
            state.in_flight = Some(ignore);
        }

        let applied = shared.apply(ignore).await;

        // Failed calls are not retried until the next pointer move.
        shared.pending.send_if_modified(|p| {
            if *p == Some(ignore) {
                *p = None;
            }
            false
        });

        // Moves during the call were compared against its value.
        if applied {
            let (over, target) = {
                let state = shared.state.lock();
                (state.is_over_interactive, state.host_target())
            };
            shared.schedule(!over, target);
        }
    }
}
