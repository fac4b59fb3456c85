//! Terminal drawing primitives and the scoped terminal session.
//!
//! Controllers never talk to crossterm directly: they draw through a [`TerminalSurface`]
//! owned by a [`TerminalSession`]. The session is created once per process, passed by
//! reference into every controller, and guarantees the terminal is restored on every exit
//! path (normal close, error propagation, or unwinding).

use anyhow::Result;
use core_events::InputEvent;
use std::time::Duration;

pub mod capabilities;
pub mod crossterm_surface;
pub mod headless;

pub use capabilities::TerminalCapabilities;
pub use crossterm_surface::CrosstermSurface;
pub use headless::HeadlessSurface;

/// Visual attribute of a drawn run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Normal,
    /// The input line (prompt and typed text).
    Input,
    /// Highlighted row and the overflow marker of truncated rows.
    Selected,
}

/// Raw drawing and input primitives. Coordinates are zero based `(row, col)` cells.
pub trait TerminalSurface {
    /// Current size as `(cols, rows)`.
    fn size(&self) -> Result<(u16, u16)>;
    fn clear(&mut self) -> Result<()>;
    /// Draw `text` starting at `(row, col)`. Text past the right edge is clipped.
    fn put_str(&mut self, row: u16, col: u16, text: &str, style: Style) -> Result<()>;
    fn set_cursor(&mut self, row: u16, col: u16) -> Result<()>;
    /// Flush everything queued since the last present.
    fn present(&mut self) -> Result<()>;
    /// Wait up to `timeout` for the next input event. `Ok(None)` means the timeout elapsed.
    fn poll_input(&mut self, timeout: Duration) -> Result<Option<InputEvent>>;
    /// Hand the terminal back to the shell (cooked mode, main screen).
    fn suspend(&mut self) -> Result<()>;
    /// Take the terminal (raw mode, alternate screen). Idempotent.
    fn resume(&mut self) -> Result<()>;
}

/// Owned, scoped terminal handle.
///
/// `acquire` enters the surface; dropping the session leaves it. [`TerminalSession::released`]
/// runs a closure with the terminal handed back to the shell and reacquires it afterwards,
/// including when the closure panics.
pub struct TerminalSession {
    surface: Box<dyn TerminalSurface>,
    active: bool,
}

impl TerminalSession {
    pub fn acquire(mut surface: Box<dyn TerminalSurface>) -> Result<Self> {
        surface.resume()?;
        tracing::debug!(target: "terminal", "session_acquired");
        Ok(Self {
            surface,
            active: true,
        })
    }

    pub fn surface(&mut self) -> &mut dyn TerminalSurface {
        self.surface.as_mut()
    }

    pub fn size(&self) -> Result<(u16, u16)> {
        self.surface.size()
    }

    /// Run `f` with the terminal released.
    pub fn released<R>(&mut self, f: impl FnOnce() -> R) -> Result<R> {
        self.surface.suspend()?;
        self.active = false;
        let guard = Reacquire {
            session: self,
            armed: true,
        };
        let out = f();
        guard.finish()?;
        Ok(out)
    }

    /// Leave the terminal early (before drop). Idempotent.
    pub fn leave(&mut self) -> Result<()> {
        if self.active {
            self.surface.suspend()?;
            self.active = false;
            tracing::debug!(target: "terminal", "session_released");
        }
        Ok(())
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Err(e) = self.leave() {
            tracing::warn!(target: "terminal", error = %e, "session_leave_failed");
        }
    }
}

struct Reacquire<'a> {
    session: &'a mut TerminalSession,
    armed: bool,
}

impl Reacquire<'_> {
    fn finish(mut self) -> Result<()> {
        self.armed = false;
        self.session.surface.resume()?;
        self.session.active = true;
        Ok(())
    }
}

impl Drop for Reacquire<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.session.surface.resume() {
            Ok(()) => self.session.active = true,
            Err(e) => tracing::warn!(target: "terminal", error = %e, "reacquire_failed"),
        }
    }
}
