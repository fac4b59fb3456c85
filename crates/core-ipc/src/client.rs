use crate::{IpcError, RunRequest, RunStatus, WireRequest, WireResponse};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::debug;

/// Send one request to the running instance and wait for its status.
///
/// Connection failures map to [`IpcError::NoInstance`].
pub fn send_request(
    addr: SocketAddr,
    request: &RunRequest,
    timeout: Duration,
) -> Result<RunStatus, IpcError> {
    let mut stream = TcpStream::connect_timeout(&addr, timeout).map_err(IpcError::NoInstance)?;
    stream.set_read_timeout(Some(timeout))?;
    serde_json::to_writer(&mut stream, &WireRequest::from(request))?;
    stream.write_all(b"\n")?;
    stream.flush()?;

    let mut line = String::new();
    let read = BufReader::new(&stream).read_line(&mut line);
    match read {
        Ok(0) => return Err(IpcError::Protocol("connection closed".into())),
        Ok(_) => {}
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            return Ok(RunStatus::Busy);
        }
        Err(e) => return Err(e.into()),
    }
    let reply: WireResponse =
        serde_json::from_str(line.trim()).map_err(|e| IpcError::Protocol(e.to_string()))?;
    debug!(target: "ipc.client", script = %request.script_ref, status = ?reply.status, "reply_received");
    Ok(reply.status)
}
