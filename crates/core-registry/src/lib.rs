//! Catalog of script descriptors.
//!
//! The registry is owned by the main loop and passed explicitly to whoever needs it; it is
//! never shared across threads. Descriptors are `Arc`s so menus can hold cheap snapshots of
//! the list while the registry is mutated in place (`Arc::make_mut`).
//!
//! Scans are incremental: a descriptor whose script and override file kept their
//! modification times is reused as is, access times always survive, and new scripts are
//! appended in discovery order (directory walk sorted by file name).

pub mod descriptor;
pub mod files;
pub mod schedule;

pub use descriptor::{ScriptDescriptor, override_path};
pub use schedule::{ScheduleContext, SchedulePredicate};

use anyhow::{Context, Result};
use chrono::Utc;
use core_config::{ConfigSchema, ScriptConfig};
use descriptor::{Fingerprint, is_override_file};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

pub const ACCESS_TIMES_FILE: &str = "access_times.json";

/// Progress is reported every this many files.
pub const PROGRESS_EVERY: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanDelta {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Descriptors rebuilt because the script or its override file changed.
    pub changed: Vec<PathBuf>,
    /// False when the progress callback stopped the scan early.
    pub completed: bool,
}

impl ScanDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[derive(Debug)]
pub struct ScriptRegistry {
    schema: Arc<ConfigSchema>,
    data_dir: PathBuf,
    startup: bool,
    scripts: Vec<Arc<ScriptDescriptor>>,
    access: BTreeMap<String, i64>,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|s| s.starts_with('.'))
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl ScriptRegistry {
    /// Create an empty registry. `startup` arms `runAtStartup` rules.
    pub fn new(schema: Arc<ConfigSchema>, data_dir: impl Into<PathBuf>, startup: bool) -> Self {
        let data_dir = data_dir.into();
        let access = core_state::persist::load_json_or_default(&data_dir.join(ACCESS_TIMES_FILE));
        Self {
            schema,
            data_dir,
            startup,
            scripts: Vec::new(),
            access,
        }
    }

    pub fn schema(&self) -> &Arc<ConfigSchema> {
        &self.schema
    }

    /// Walk `roots` and reconcile the catalog. `progress` is called every
    /// [`PROGRESS_EVERY`] files with the number of files seen so far; returning
    /// `ControlFlow::Break` stops the scan. A stopped scan keeps what it found but removes
    /// nothing.
    pub fn scan(
        &mut self,
        roots: &[PathBuf],
        mut progress: impl FnMut(usize) -> ControlFlow<()>,
    ) -> ScanDelta {
        let mut delta = ScanDelta {
            completed: true,
            ..ScanDelta::default()
        };
        let index: HashMap<PathBuf, usize> = self
            .scripts
            .iter()
            .enumerate()
            .map(|(i, d)| (d.path.clone(), i))
            .collect();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut fresh: Vec<Arc<ScriptDescriptor>> = Vec::new();
        let mut files = 0usize;
        let mut walked: Vec<PathBuf> = Vec::new();

        'roots: for root in roots {
            let root = match std::path::absolute(root) {
                Ok(r) => r,
                Err(e) => {
                    warn!(target: "registry.scan", root = %root.display(), error = %e, "root_unresolvable");
                    continue;
                }
            };
            if !root.is_dir() {
                debug!(target: "registry.scan", root = %root.display(), "root_missing");
                continue;
            }
            walked.push(root.clone());
            let walker = WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| !is_hidden(e));
            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(target: "registry.scan", error = %e, "walk_entry_failed");
                        continue;
                    }
                };
                if !entry.file_type().is_file() || is_override_file(entry.path()) {
                    continue;
                }
                let path = entry.into_path();
                if !seen.insert(path.clone()) {
                    continue;
                }
                files += 1;
                match index.get(&path) {
                    Some(&i) => {
                        let existing = &self.scripts[i];
                        if existing.fingerprint() != Fingerprint::read(&path) {
                            let rebuilt = ScriptDescriptor::load(
                                &root,
                                &path,
                                &self.schema,
                                existing.last_access,
                                self.startup,
                            );
                            self.scripts[i] = Arc::new(rebuilt);
                            delta.changed.push(path);
                        }
                    }
                    None => {
                        let last = self.access.get(&key(&path)).copied().unwrap_or(0);
                        fresh.push(Arc::new(ScriptDescriptor::load(
                            &root,
                            &path,
                            &self.schema,
                            last,
                            self.startup,
                        )));
                        delta.added.push(path);
                    }
                }
                if files % PROGRESS_EVERY == 0 && progress(files).is_break() {
                    delta.completed = false;
                    break 'roots;
                }
            }
        }

        if delta.completed {
            let before: Vec<PathBuf> = self.scripts.iter().map(|d| d.path.clone()).collect();
            self.scripts.retain(|d| seen.contains(&d.path));
            delta.removed = before.into_iter().filter(|p| !seen.contains(p)).collect();
            self.prune_access_times(&walked, &seen);
        }
        self.scripts.extend(fresh);

        info!(
            target: "registry.scan",
            files,
            total = self.scripts.len(),
            added = delta.added.len(),
            removed = delta.removed.len(),
            changed = delta.changed.len(),
            completed = delta.completed,
            "scan_complete"
        );
        delta
    }

    /// Forget access times of files under a walked root that the walk no longer found.
    /// Roots that were missing this time keep their entries.
    fn prune_access_times(&mut self, walked: &[PathBuf], seen: &HashSet<PathBuf>) {
        let before = self.access.len();
        self.access.retain(|k, _| {
            let p = Path::new(k);
            seen.contains(p) || !walked.iter().any(|root| p.starts_with(root))
        });
        let pruned = before - self.access.len();
        if pruned == 0 {
            return;
        }
        debug!(target: "registry.access", pruned, "access_times_pruned");
        if let Err(e) =
            core_state::persist::save_json_atomic(&self.data_dir.join(ACCESS_TIMES_FILE), &self.access)
        {
            warn!(target: "registry.access", error = %e, "access_time_save_failed");
        }
    }

    pub fn get(&self, path: &Path) -> Option<&Arc<ScriptDescriptor>> {
        self.scripts.iter().find(|d| d.path == path)
    }

    /// Resolve an external reference: absolute path, display name, or file name (first hit in
    /// catalog order).
    pub fn find(&self, script_ref: &str) -> Option<&Arc<ScriptDescriptor>> {
        let as_path = Path::new(script_ref);
        self.scripts
            .iter()
            .find(|d| d.path == as_path)
            .or_else(|| self.scripts.iter().find(|d| d.display_name == script_ref))
            .or_else(|| self.scripts.iter().find(|d| d.file_name() == script_ref))
    }

    /// Descriptors in catalog order.
    pub fn all(&self) -> &[Arc<ScriptDescriptor>] {
        &self.scripts
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Stable sort, most recently accessed first.
    pub fn sort_by_access_time(&mut self) {
        self.scripts.sort_by_key(|d| Reverse(d.last_access));
    }

    /// Add or replace a descriptor (keyed by path).
    pub fn insert(&mut self, desc: ScriptDescriptor) {
        match self.scripts.iter().position(|d| d.path == desc.path) {
            Some(i) => self.scripts[i] = Arc::new(desc),
            None => self.scripts.push(Arc::new(desc)),
        }
    }

    pub fn remove(&mut self, path: &Path) -> Option<Arc<ScriptDescriptor>> {
        let i = self.scripts.iter().position(|d| d.path == path)?;
        Some(self.scripts.remove(i))
    }

    fn get_mut(&mut self, path: &Path) -> Option<&mut ScriptDescriptor> {
        self.scripts
            .iter_mut()
            .find(|d| d.path == path)
            .map(Arc::make_mut)
    }

    /// Record a launch at the current time and persist all access times.
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.touch_at(path, Utc::now().timestamp())
    }

    pub fn touch_at(&mut self, path: &Path, secs: i64) -> Result<()> {
        let Some(desc) = self.get_mut(path) else {
            warn!(target: "registry.access", path = %path.display(), "touch_unknown_script");
            return Ok(());
        };
        desc.last_access = secs;
        self.access.insert(key(path), secs);
        debug!(target: "registry.access", path = %path.display(), secs, "access_time_updated");
        core_state::persist::save_json_atomic(&self.data_dir.join(ACCESS_TIMES_FILE), &self.access)
    }

    /// Replace a script's config, writing its override file. An override equal to the
    /// defaults removes the file.
    pub fn update_config(&mut self, path: &Path, config: ScriptConfig) -> Result<()> {
        let startup = self.startup;
        let Some(desc) = self.get_mut(path) else {
            anyhow::bail!("unknown script {}", path.display());
        };
        let file = override_path(path);
        let overrides = config.to_overrides();
        if overrides.is_empty() {
            match std::fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("removing {}", file.display()));
                }
            }
        } else {
            core_state::persist::save_json_atomic(&file, &overrides)?;
        }
        desc.schedule = schedule::rule_from_config(&desc.display_name, &config, startup);
        desc.config = config;
        desc.set_fingerprint(Fingerprint::read(path));
        info!(target: "registry.scan", script = %desc.display_name, overrides = overrides.len(), "config_saved");
        Ok(())
    }

    /// `(hotkey, path)` for every script with a configured hotkey, in catalog order.
    pub fn hotkeys(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.scripts.iter().filter_map(|d| {
            let hk = d.config.hotkey().trim();
            (!hk.is_empty()).then_some((hk, d.path.as_path()))
        })
    }

    /// Scripts carrying a schedule rule.
    pub fn scheduled(&self) -> impl Iterator<Item = &Arc<ScriptDescriptor>> {
        self.scripts.iter().filter(|d| d.schedule.is_some())
    }
}
