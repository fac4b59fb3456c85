//! Overwriting a bound code is reported on the `keymap` target.

use core_keymap::HotkeyRegistry;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::Level;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

struct LockedWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl Write for LockedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = LockedWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LockedWriter {
            guard: self.inner.lock().expect("log buffer poisoned"),
        }
    }
}

#[test]
fn overwrite_is_logged_with_both_labels() {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(BufferWriter {
            inner: buffer.clone(),
        })
        .finish();

    let mut reg = HotkeyRegistry::new();
    with_default(subscriber, || {
        reg.register("ctrl+r", "refresh", 1).unwrap();
        reg.register("ctrl+r", "rerun", 2).unwrap();
    });

    let out = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(out.contains("INFO keymap:"));
    assert!(out.contains("hotkey_overwritten"));
    assert!(out.contains("previous=refresh"));
    assert!(out.contains("label=rerun"));
    assert_eq!(reg.len(), 1);
}
