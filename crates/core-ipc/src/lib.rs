//! Local trigger server: lets other processes ask the running launcher to run a script.
//!
//! # Protocol
//!
//! Plain TCP on a loopback port, one JSON object per line in each direction:
//!
//! ```json
//! {"script": "net/ping.sh", "args": ["-c", "1"], "selected": "/home/me/scripts/hosts.txt"}
//! {"status": "ok"}
//! ```
//!
//! `status` is one of `ok`, `not_found`, `busy` (the launcher did not answer in time) or
//! `invalid` (the request line could not be parsed). `ok` acknowledges the dispatch only; the
//! script's own exit status is never reported back.
//!
//! The server thread never touches launcher state. Each request is forwarded with a one-shot
//! reply channel into a [`TriggerQueue`] that the main loop drains on idle ticks.

pub mod client;
pub mod server;

pub use client::send_request;
pub use server::{BindOutcome, TriggerServer};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;

pub const DEFAULT_HOST: [u8; 4] = [127, 0, 0, 1];

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("binding trigger endpoint: {0}")]
    Bind(#[source] std::io::Error),
    #[error("no running instance answered: {0}")]
    NoInstance(#[source] std::io::Error),
    #[error("malformed reply: {0}")]
    Protocol(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    NotFound,
    Busy,
    Invalid,
}

/// Wire form of a request line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRequest {
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireResponse {
    pub status: RunStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    pub selected_script_path: PathBuf,
}

/// A request to run a script, as handed to the main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Script path or display name.
    pub script_ref: String,
    pub args: Option<Vec<String>>,
    pub source: Option<SourceContext>,
}

impl RunRequest {
    pub fn new(script_ref: impl Into<String>) -> Self {
        Self {
            script_ref: script_ref.into(),
            args: None,
            source: None,
        }
    }
}

impl From<WireRequest> for RunRequest {
    fn from(w: WireRequest) -> Self {
        Self {
            script_ref: w.script,
            args: w.args,
            source: w.selected.map(|p| SourceContext {
                selected_script_path: PathBuf::from(p),
            }),
        }
    }
}

impl From<&RunRequest> for WireRequest {
    fn from(r: &RunRequest) -> Self {
        Self {
            script: r.script_ref.clone(),
            args: r.args.clone(),
            selected: r
                .source
                .as_ref()
                .map(|s| s.selected_script_path.to_string_lossy().into_owned()),
        }
    }
}

const PENDING: u8 = 0;
const ANSWERED: u8 = 1;
const EXPIRED: u8 = 2;

/// Settled exactly once, either by the main loop answering or by the server giving up.
#[derive(Debug, Clone, Default)]
pub(crate) struct Verdict(Arc<AtomicU8>);

impl Verdict {
    fn settle(&self, to: u8) -> bool {
        self.0
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn answer(&self) -> bool {
        self.settle(ANSWERED)
    }

    /// False when the main loop answered first; its reply is then already on the way.
    pub(crate) fn expire(&self) -> bool {
        self.settle(EXPIRED)
    }
}

/// A request waiting for the main loop's verdict.
#[derive(Debug)]
pub struct PendingRequest {
    pub request: RunRequest,
    reply: Sender<RunStatus>,
    verdict: Verdict,
}

impl PendingRequest {
    pub(crate) fn new(request: RunRequest, reply: Sender<RunStatus>, verdict: Verdict) -> Self {
        Self {
            request,
            reply,
            verdict,
        }
    }

    /// Answer the caller. Returns false when the server already timed out and told the
    /// caller `busy`; such a request must not be acted on.
    pub fn respond(self, status: RunStatus) -> bool {
        if !self.verdict.answer() {
            tracing::debug!(target: "ipc.server", script = %self.request.script_ref, "reply_expired");
            return false;
        }
        if self.reply.send(status).is_err() {
            tracing::debug!(target: "ipc.server", script = %self.request.script_ref, "reply_dropped");
        }
        true
    }
}

/// Receiving end of forwarded requests, drained by the main loop.
#[derive(Debug, Clone)]
pub struct TriggerQueue {
    rx: Receiver<PendingRequest>,
}

impl TriggerQueue {
    pub(crate) fn new(rx: Receiver<PendingRequest>) -> Self {
        Self { rx }
    }

    /// Everything queued so far, FIFO. Never blocks.
    pub fn drain(&self) -> Vec<PendingRequest> {
        self.rx.try_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
