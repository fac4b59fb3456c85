//! JSON persistence helpers.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Read `path` as JSON. Missing files yield the default silently; unreadable or malformed
/// files yield the default with a warning.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(target: "state.persist", path = %path.display(), error = %e, "persist_read_failed");
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!(target: "state.persist", path = %path.display(), error = %e, "persist_parse_failed");
            T::default()
        }
    }
}

/// Serialize `value` to a temp file next to `path`, then rename it over `path`.
pub fn save_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    debug!(target: "state.persist", path = %path.display(), "persist_saved");
    Ok(())
}
