//! Top-level session loop: a failed or panicking main screen is reported and restarted.

use crate::App;
use crate::screens::main_screen;
use anyhow::Result;
use core_menu::is_interrupted;
use core_terminal::TerminalSession;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run main screen sessions until one closes normally or the user interrupts with Ctrl+C.
///
/// Any other failure is passed to `report` with the terminal released; `report` is expected
/// to block until the user acknowledged it. An error from `report` ends the loop.
pub fn run_sessions(
    app: &mut App,
    term: &mut TerminalSession,
    mut report: impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    let mut sessions = 0usize;
    loop {
        sessions += 1;
        info!(target: "runtime", session = sessions, "session_start");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| main_screen::run(app, term)));
        let text = match outcome {
            Ok(Ok(())) => {
                info!(target: "runtime", "session_closed");
                return Ok(());
            }
            Ok(Err(e)) if is_interrupted(&e) => {
                info!(target: "runtime", "interrupted");
                return Ok(());
            }
            Ok(Err(e)) => {
                error!(target: "runtime", error = ?e, "session_failed");
                format!("Error: {e:?}")
            }
            Err(payload) => {
                let msg = panic_message(&*payload);
                error!(target: "runtime", panic = %msg, "session_panicked");
                format!("Panic: {msg}")
            }
        };
        term.released(|| report(&text))??;
    }
}
