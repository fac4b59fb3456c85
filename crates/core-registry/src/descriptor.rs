//! In-memory record of one discovered script.

use crate::schedule::{SchedulePredicate, rule_from_config};
use anyhow::{Context, Result};
use core_config::{ConfigSchema, ScriptConfig};
use regex::Regex;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::SystemTime;
use tracing::warn;

/// Suffix of per-script override files (`deploy.sh.config.json`).
pub const OVERRIDE_SUFFIX: &str = ".config.json";

/// Files above this size are not searched for variable references.
pub const VARIABLE_SCAN_LIMIT: u64 = 1024 * 1024;

static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").unwrap_or_else(|_| unreachable!())
});

/// Modification times used to decide whether a rescan must rebuild a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fingerprint {
    pub script: Option<SystemTime>,
    pub overrides: Option<SystemTime>,
}

impl Fingerprint {
    pub fn read(path: &Path) -> Self {
        let mtime = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
        Self {
            script: mtime(path),
            overrides: mtime(&override_path(path)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptDescriptor {
    /// Absolute path, unique within the registry.
    pub path: PathBuf,
    /// Path relative to its root, `/` separated.
    pub display_name: String,
    pub config: ScriptConfig,
    /// Variables referenced by the script, in first-appearance order.
    pub variables: Vec<String>,
    /// Unix seconds of the last launch, 0 when never launched.
    pub last_access: i64,
    pub schedule: Option<Arc<dyn SchedulePredicate>>,
    root: PathBuf,
    variable_prefix: String,
    fingerprint: Fingerprint,
}

/// `<dir>/<file name>.config.json` for a script path.
pub fn override_path(script: &Path) -> PathBuf {
    let mut name = script
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(OVERRIDE_SUFFIX);
    script.with_file_name(name)
}

pub fn is_override_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(OVERRIDE_SUFFIX))
}

/// Uppercase file stem with non-alphanumerics replaced by `_`, plus a trailing `_`.
pub fn variable_prefix(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let mut out: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    out.push('_');
    out
}

/// `{{NAME}}` references in `source`, deduplicated, in first-appearance order.
pub fn extract_variables(source: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cap in VARIABLE_RE.captures_iter(source) {
        let name = &cap[1];
        if !out.iter().any(|v| v == name) {
            out.push(name.to_string());
        }
    }
    out
}

fn read_source(path: &Path) -> Result<Option<String>> {
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if meta.len() > VARIABLE_SCAN_LIMIT {
        return Ok(None);
    }
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(String::from_utf8(bytes).ok())
}

pub(crate) fn display_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl ScriptDescriptor {
    /// Build a descriptor from disk. Override problems degrade to defaults with a warning.
    pub fn load(
        root: &Path,
        path: &Path,
        schema: &Arc<ConfigSchema>,
        last_access: i64,
        startup: bool,
    ) -> Self {
        let display_name = display_name(root, path);
        let overrides: JsonMap<String, JsonValue> =
            core_state::persist::load_json_or_default(&override_path(path));
        let (config, dropped) = schema.merge(&overrides);
        for key in dropped {
            warn!(target: "registry.scan", script = %display_name, key = %key, "config_key_dropped");
        }
        let variables = match read_source(path) {
            Ok(Some(src)) => extract_variables(&src),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(target: "registry.scan", script = %display_name, error = %e, "script_read_failed");
                Vec::new()
            }
        };
        let schedule = rule_from_config(&display_name, &config, startup);
        Self {
            path: path.to_path_buf(),
            display_name,
            config,
            variables,
            last_access,
            schedule,
            root: root.to_path_buf(),
            variable_prefix: variable_prefix(path),
            fingerprint: Fingerprint::read(path),
        }
    }

    /// Scan root the script was found under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn variable_prefix(&self) -> &str {
        &self.variable_prefix
    }

    /// Variable name without this script's prefix, for display.
    pub fn short_variable_name<'a>(&self, name: &'a str) -> &'a str {
        match name.strip_prefix(self.variable_prefix.as_str()) {
            Some(rest) if !rest.is_empty() => rest,
            _ => name,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub(crate) fn set_fingerprint(&mut self, fp: Fingerprint) {
        self.fingerprint = fp;
    }

    /// Re-read variable references from disk. Fails when the file vanished.
    pub fn read_variables(&self) -> Result<Vec<String>> {
        Ok(read_source(&self.path)?
            .map(|s| extract_variables(&s))
            .unwrap_or_default())
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}
