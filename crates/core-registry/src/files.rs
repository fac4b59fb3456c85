//! Catalog edits backed by the file system: new, duplicate and rename.
//!
//! Every operation works next to an existing script, keeps the script's override file in
//! step with it and leaves the catalog ordered the way the launcher shows it: new and
//! duplicated scripts go to the front with a fresh access time, a renamed script keeps its
//! place and its access time.

use crate::descriptor::{ScriptDescriptor, is_override_file, override_path};
use crate::{ACCESS_TIMES_FILE, ScriptRegistry, key};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Resolve a typed name against the directory of `beside`. The name may contain `/` to
/// reach a subdirectory but must stay below that directory and not name a hidden or
/// override file, since a scan would never pick those up.
pub fn sibling_path(beside: &Path, name: &str) -> Result<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        bail!("name is empty");
    }
    let rel = Path::new(name);
    for component in rel.components() {
        match component {
            Component::Normal(part) if !part.to_string_lossy().starts_with('.') => {}
            Component::Normal(_) => bail!("`{name}` would be a hidden file"),
            _ => bail!("`{name}` must stay inside the script's directory"),
        }
    }
    if is_override_file(rel) {
        bail!("`{name}` is reserved for script config");
    }
    let dir = beside
        .parent()
        .with_context(|| format!("{} has no parent directory", beside.display()))?;
    Ok(dir.join(rel))
}

/// `sibling_path` that also refuses to replace anything on disk.
pub fn free_sibling_path(beside: &Path, name: &str) -> Result<PathBuf> {
    let target = sibling_path(beside, name)?;
    if target.exists() || override_path(&target).exists() {
        bail!("{} already exists", target.display());
    }
    Ok(target)
}

fn create_new(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("creating {}", path.display()))
}

impl ScriptRegistry {
    fn existing(&self, path: &Path) -> Result<Arc<ScriptDescriptor>> {
        self.get(path)
            .cloned()
            .with_context(|| format!("unknown script {}", path.display()))
    }

    /// Load `path` as a catalog entry at the front, launched "now".
    fn adopt_front(&mut self, root: &Path, path: &Path) -> Result<()> {
        let now = Utc::now().timestamp();
        let desc = ScriptDescriptor::load(root, path, &self.schema, now, self.startup);
        self.scripts.insert(0, Arc::new(desc));
        self.access.insert(key(path), now);
        self.save_access_times()
    }

    fn save_access_times(&self) -> Result<()> {
        core_state::persist::save_json_atomic(&self.data_dir.join(ACCESS_TIMES_FILE), &self.access)
    }

    /// Create an empty script named `name` in the directory of `beside`.
    pub fn create_script(&mut self, beside: &Path, name: &str) -> Result<PathBuf> {
        let reference = self.existing(beside)?;
        let target = free_sibling_path(beside, name)?;
        create_new(&target)?;
        self.adopt_front(reference.root(), &target)?;
        info!(target: "registry.files", path = %target.display(), "script_created");
        Ok(target)
    }

    /// Copy `source` and its override file to `name` next to it.
    pub fn duplicate_script(&mut self, source: &Path, name: &str) -> Result<PathBuf> {
        let original = self.existing(source)?;
        let target = free_sibling_path(source, name)?;
        let mut from =
            File::open(source).with_context(|| format!("opening {}", source.display()))?;
        let mut to = create_new(&target)?;
        std::io::copy(&mut from, &mut to)
            .with_context(|| format!("copying to {}", target.display()))?;
        if let Ok(perms) = from.metadata().map(|m| m.permissions()) {
            // Keeps the executable bit of the original.
            to.set_permissions(perms)
                .with_context(|| format!("setting permissions of {}", target.display()))?;
        }
        let overrides = override_path(source);
        if overrides.exists() {
            fs::copy(&overrides, override_path(&target))
                .with_context(|| format!("copying {}", overrides.display()))?;
        }
        self.adopt_front(original.root(), &target)?;
        info!(
            target: "registry.files",
            from = %source.display(),
            path = %target.display(),
            "script_duplicated"
        );
        Ok(target)
    }

    /// Rename `source` (and its override file) to `name` in the same directory. The
    /// descriptor keeps its catalog position and access time.
    pub fn rename_script(&mut self, source: &Path, name: &str) -> Result<PathBuf> {
        let original = self.existing(source)?;
        let target = free_sibling_path(source, name)?;
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        fs::rename(source, &target).with_context(|| {
            format!("renaming {} to {}", source.display(), target.display())
        })?;
        let overrides = override_path(source);
        if overrides.exists() {
            fs::rename(&overrides, override_path(&target))
                .with_context(|| format!("renaming {}", overrides.display()))?;
        }

        let last = original.last_access;
        let renamed =
            ScriptDescriptor::load(original.root(), &target, &self.schema, last, self.startup);
        if let Some(slot) = self.scripts.iter_mut().find(|d| d.path == source) {
            *slot = Arc::new(renamed);
        }
        self.access.remove(&key(source));
        if last != 0 {
            self.access.insert(key(&target), last);
        }
        self.save_access_times()?;
        info!(
            target: "registry.files",
            from = %source.display(),
            path = %target.display(),
            "script_renamed"
        );
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_stay_inside_the_directory() {
        let beside = Path::new("/s/tools/a.sh");
        assert_eq!(
            sibling_path(beside, " b.sh ").unwrap(),
            PathBuf::from("/s/tools/b.sh")
        );
        assert_eq!(
            sibling_path(beside, "net/ping.sh").unwrap(),
            PathBuf::from("/s/tools/net/ping.sh")
        );
        for bad in ["", "   ", "../x.sh", "/etc/x.sh", ".hidden", "sub/.x", "a.sh.config.json"] {
            assert!(sibling_path(beside, bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn taken_names_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let beside = dir.path().join("a.sh");
        fs::write(&beside, "").unwrap();
        fs::write(dir.path().join("b.sh.config.json"), "{}").unwrap();
        assert!(free_sibling_path(&beside, "a.sh").is_err());
        assert!(free_sibling_path(&beside, "b.sh").is_err());
        assert!(free_sibling_path(&beside, "c.sh").is_ok());
    }
}
