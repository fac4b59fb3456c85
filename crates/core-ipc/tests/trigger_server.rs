use core_ipc::{BindOutcome, RunRequest, RunStatus, TriggerQueue, TriggerServer, send_request};
use pretty_assertions::assert_eq;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

fn start(reply_timeout: Duration) -> (TriggerServer, TriggerQueue) {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    match TriggerServer::bind(addr, reply_timeout).unwrap() {
        BindOutcome::Started(server, queue) => (server, queue),
        BindOutcome::AlreadyRunning => panic!("port 0 is never taken"),
    }
}

/// Stand-in for the main loop: answers `ok` for known names, `not_found` otherwise.
fn answer_loop(queue: TriggerQueue, known: &'static [&'static str]) -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    thread::spawn(move || {
        while !flag.load(Ordering::SeqCst) {
            for pending in queue.drain() {
                let status = if known.contains(&pending.request.script_ref.as_str()) {
                    RunStatus::Ok
                } else {
                    RunStatus::NotFound
                };
                pending.respond(status);
            }
            thread::sleep(Duration::from_millis(5));
        }
    });
    stop
}

#[test]
fn second_bind_reports_running_instance() {
    let (server, _queue) = start(Duration::from_secs(1));
    let outcome = TriggerServer::bind(server.local_addr(), Duration::from_secs(1)).unwrap();
    assert!(matches!(outcome, BindOutcome::AlreadyRunning));
}

#[test]
fn known_and_unknown_scripts() {
    let (server, queue) = start(Duration::from_secs(2));
    let stop = answer_loop(queue, &["backup.sh"]);

    let ok = send_request(server.local_addr(), &RunRequest::new("backup.sh"), CLIENT_TIMEOUT).unwrap();
    assert_eq!(ok, RunStatus::Ok);
    let missing =
        send_request(server.local_addr(), &RunRequest::new("nope.sh"), CLIENT_TIMEOUT).unwrap();
    assert_eq!(missing, RunStatus::NotFound);
    stop.store(true, Ordering::SeqCst);
}

#[test]
fn request_fields_reach_the_queue() {
    let (server, queue) = start(Duration::from_secs(2));
    let addr = server.local_addr();
    let client = thread::spawn(move || {
        let mut req = RunRequest::new("deploy.sh");
        req.args = Some(vec!["--dry-run".into(), "prod".into()]);
        send_request(addr, &req, CLIENT_TIMEOUT)
    });

    let pending = loop {
        if let Some(p) = queue.drain().into_iter().next() {
            break p;
        }
        thread::sleep(Duration::from_millis(5));
    };
    assert_eq!(pending.request.script_ref, "deploy.sh");
    assert_eq!(
        pending.request.args.as_deref(),
        Some(&["--dry-run".to_string(), "prod".to_string()][..])
    );
    assert!(pending.request.source.is_none());
    pending.respond(RunStatus::Ok);
    assert_eq!(client.join().unwrap().unwrap(), RunStatus::Ok);
}

#[test]
fn garbage_line_is_invalid_and_connection_stays_usable() {
    let (server, queue) = start(Duration::from_secs(2));
    let stop = answer_loop(queue, &["a.sh"]);

    let stream = TcpStream::connect(server.local_addr()).unwrap();
    stream.set_read_timeout(Some(CLIENT_TIMEOUT)).unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    writer.write_all(b"this is not json\n").unwrap();
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line.trim(), r#"{"status":"invalid"}"#);

    writer.write_all(b"{\"script\":\"a.sh\"}\n").unwrap();
    line.clear();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line.trim(), r#"{"status":"ok"}"#);
    stop.store(true, Ordering::SeqCst);
}

#[test]
fn unanswered_request_is_busy() {
    let (server, _queue) = start(Duration::from_millis(100));
    let status =
        send_request(server.local_addr(), &RunRequest::new("slow.sh"), CLIENT_TIMEOUT).unwrap();
    assert_eq!(status, RunStatus::Busy);
}

#[test]
fn request_answered_busy_cannot_be_dispatched_later() {
    let (server, queue) = start(Duration::from_millis(50));
    let status =
        send_request(server.local_addr(), &RunRequest::new("late.sh"), CLIENT_TIMEOUT).unwrap();
    assert_eq!(status, RunStatus::Busy);

    let pending = queue.drain();
    assert_eq!(pending.len(), 1);
    let delivered: Vec<bool> = pending
        .into_iter()
        .map(|p| p.respond(RunStatus::Ok))
        .collect();
    assert_eq!(delivered, vec![false]);
}

#[test]
fn no_instance_when_nothing_listens() {
    let (mut server, _queue) = start(Duration::from_secs(1));
    let addr = server.local_addr();
    server.stop();
    drop(server);
    let err = send_request(addr, &RunRequest::new("x.sh"), Duration::from_millis(500));
    assert!(matches!(err, Err(core_ipc::IpcError::NoInstance(_))));
}
