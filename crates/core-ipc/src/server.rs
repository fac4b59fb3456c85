use crate::{
    IpcError, PendingRequest, RunStatus, TriggerQueue, Verdict, WireRequest, WireResponse,
};
use crossbeam_channel::{RecvTimeoutError, Sender};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const ACCEPT_POLL: Duration = Duration::from_millis(25);
const CONNECTION_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of trying to become the single running instance.
#[derive(Debug)]
pub enum BindOutcome {
    Started(TriggerServer, TriggerQueue),
    /// Another process already owns the endpoint.
    AlreadyRunning,
}

/// Handle to the listener thread. Dropping it stops the listener.
#[derive(Debug)]
pub struct TriggerServer {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TriggerServer {
    /// Bind `addr` and start listening. `reply_timeout` bounds how long a connection waits for
    /// the main loop before answering `busy`.
    pub fn bind(addr: SocketAddr, reply_timeout: Duration) -> Result<BindOutcome, IpcError> {
        let listener = match TcpListener::bind(addr) {
            Ok(l) => l,
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                info!(target: "ipc.server", %addr, "instance_already_running");
                return Ok(BindOutcome::AlreadyRunning);
            }
            Err(e) => return Err(IpcError::Bind(e)),
        };
        listener.set_nonblocking(true).map_err(IpcError::Bind)?;
        let addr = listener.local_addr().map_err(IpcError::Bind)?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let thread = thread::Builder::new()
            .name("trigger-server".into())
            .spawn(move || accept_loop(listener, flag, tx, reply_timeout))?;
        info!(target: "ipc.server", %addr, "trigger_server_started");
        Ok(BindOutcome::Started(
            Self {
                addr,
                running,
                thread: Some(thread),
            },
            TriggerQueue::new(rx),
        ))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop accepting and wait for the listener thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!(target: "ipc.server", "listener_thread_panicked");
            }
            info!(target: "ipc.server", addr = %self.addr, "trigger_server_stopped");
        }
    }
}

impl Drop for TriggerServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: TcpListener,
    running: Arc<AtomicBool>,
    tx: Sender<PendingRequest>,
    reply_timeout: Duration,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(target: "ipc.server", %peer, "connection_accepted");
                let tx = tx.clone();
                let spawned = thread::Builder::new()
                    .name("trigger-conn".into())
                    .spawn(move || {
                        if let Err(e) = handle_connection(stream, &tx, reply_timeout) {
                            warn!(target: "ipc.server", %peer, error = %e, "connection_failed");
                        }
                    });
                if let Err(e) = spawned {
                    error!(target: "ipc.server", error = %e, "connection_thread_spawn_failed");
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                error!(target: "ipc.server", error = %e, "accept_failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

fn handle_connection(
    stream: TcpStream,
    tx: &Sender<PendingRequest>,
    reply_timeout: Duration,
) -> Result<(), IpcError> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(CONNECTION_READ_TIMEOUT))?;
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let status = match serde_json::from_str::<WireRequest>(&line) {
            Ok(req) => forward(req, tx, reply_timeout),
            Err(e) => {
                warn!(target: "ipc.server", error = %e, len = line.len(), "request_invalid");
                RunStatus::Invalid
            }
        };
        serde_json::to_writer(&mut writer, &WireResponse { status })?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    Ok(())
}

fn forward(req: WireRequest, tx: &Sender<PendingRequest>, reply_timeout: Duration) -> RunStatus {
    let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
    let script = req.script.clone();
    let verdict = Verdict::default();
    if tx
        .send(PendingRequest::new(req.into(), reply_tx, verdict.clone()))
        .is_err()
    {
        return RunStatus::Busy;
    }
    let status = match reply_rx.recv_timeout(reply_timeout) {
        Ok(status) => status,
        // An expired request is refused by `respond`, so `busy` means it never runs.
        Err(RecvTimeoutError::Timeout) if verdict.expire() => RunStatus::Busy,
        Err(RecvTimeoutError::Timeout) => reply_rx.recv().unwrap_or(RunStatus::Busy),
        Err(RecvTimeoutError::Disconnected) => RunStatus::Busy,
    };
    info!(target: "ipc.server", script = %script, status = ?status, "request_answered");
    status
}
