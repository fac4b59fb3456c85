//! Idle-driven timing: when to run a full refresh and which scheduled scripts are due.
//!
//! The scheduler owns no thread. The main loop calls it from the menu's idle hook, so its
//! decisions never race with rendering or registry iteration. Time is always passed in,
//! which keeps the rules testable without sleeping.

use chrono::{DateTime, Local};
use core_registry::{ScheduleContext, ScriptRegistry};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Scheduler {
    interval: Duration,
    last_key: Instant,
    last_refresh: Instant,
    refreshing: bool,
    armed_at: DateTime<Local>,
    fired: HashMap<PathBuf, DateTime<Local>>,
}

impl Scheduler {
    /// `interval` is the idle time (no key, no refresh) after which a full refresh is due.
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now(), Local::now())
    }

    pub fn starting_at(interval: Duration, start: Instant, armed_at: DateTime<Local>) -> Self {
        Self {
            interval,
            last_key: start,
            last_refresh: start,
            refreshing: false,
            armed_at,
            fired: HashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn note_key_press(&mut self, at: Instant) {
        self.last_key = at;
    }

    pub fn last_key_press(&self) -> Instant {
        self.last_key
    }

    /// True when neither a key press nor a refresh happened for the whole interval, and no
    /// refresh is running.
    pub fn refresh_due(&self, now: Instant) -> bool {
        !self.refreshing
            && now.saturating_duration_since(self.last_key) >= self.interval
            && now.saturating_duration_since(self.last_refresh) >= self.interval
    }

    /// Mark a refresh as started. Returns false when one is already running.
    pub fn begin_refresh(&mut self) -> bool {
        if self.refreshing {
            return false;
        }
        self.refreshing = true;
        debug!(target: "scheduler", "refresh_started");
        true
    }

    pub fn finish_refresh(&mut self, at: Instant) {
        self.refreshing = false;
        self.last_refresh = at;
        debug!(target: "scheduler", "refresh_finished");
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// Evaluate every scheduled script once. Each qualifying script is returned once and
    /// recorded as fired at `now`, so a rule that stays true is not re-triggered within the
    /// same tick.
    pub fn due_scripts(&mut self, registry: &ScriptRegistry, now: DateTime<Local>) -> Vec<PathBuf> {
        let mut due = Vec::new();
        for desc in registry.scheduled() {
            let Some(rule) = &desc.schedule else {
                continue;
            };
            if due.contains(&desc.path) {
                continue;
            }
            let ctx = ScheduleContext {
                now,
                last_fired: self.fired.get(&desc.path).copied(),
                armed_at: self.armed_at,
            };
            if rule.is_due(&ctx) {
                info!(
                    target: "scheduler",
                    script = %desc.display_name,
                    rule = %rule.describe(),
                    "scheduled_launch"
                );
                self.fired.insert(desc.path.clone(), now);
                due.push(desc.path.clone());
            }
        }
        due
    }

    /// Last time `path` was launched by the scheduler.
    pub fn last_fired(&self, path: &std::path::Path) -> Option<DateTime<Local>> {
        self.fired.get(path).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use core_config::ConfigSchema;
    use std::ops::ControlFlow;
    use std::sync::Arc;

    #[test]
    fn refresh_needs_both_idle_conditions() {
        let t0 = Instant::now();
        let mut s = Scheduler::starting_at(Duration::from_secs(60), t0, Local::now());
        assert!(!s.refresh_due(t0 + Duration::from_secs(59)));
        assert!(s.refresh_due(t0 + Duration::from_secs(60)));

        s.note_key_press(t0 + Duration::from_secs(30));
        assert!(!s.refresh_due(t0 + Duration::from_secs(80)));
        assert!(s.refresh_due(t0 + Duration::from_secs(90)));

        assert!(s.begin_refresh());
        assert!(!s.begin_refresh());
        assert!(!s.refresh_due(t0 + Duration::from_secs(200)));
        s.finish_refresh(t0 + Duration::from_secs(200));
        assert!(!s.refresh_due(t0 + Duration::from_secs(230)));
        assert!(s.refresh_due(t0 + Duration::from_secs(260)));
    }

    fn registry_with(dir: &std::path::Path, files: &[(&str, &str)], startup: bool) -> ScriptRegistry {
        let root = dir.join("scripts");
        std::fs::create_dir_all(&root).unwrap();
        for (name, overrides) in files {
            let p = root.join(name);
            std::fs::write(&p, "echo").unwrap();
            if !overrides.is_empty() {
                std::fs::write(core_registry::override_path(&p), overrides).unwrap();
            }
        }
        let mut reg = ScriptRegistry::new(Arc::new(ConfigSchema::builtin()), dir.join("data"), startup);
        reg.scan(&[root], |_| ControlFlow::Continue(()));
        reg
    }

    #[test]
    fn interval_scripts_fire_once_per_qualifying_tick() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = registry_with(
            tmp.path(),
            &[("tick.sh", r#"{"runEvery": 60}"#), ("plain.sh", "")],
            false,
        );
        let armed = Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut s = Scheduler::starting_at(Duration::from_secs(60), Instant::now(), armed);

        assert!(s.due_scripts(&reg, armed + TimeDelta::seconds(30)).is_empty());
        let due = s.due_scripts(&reg, armed + TimeDelta::seconds(61));
        assert_eq!(due.len(), 1);
        assert!(due[0].ends_with("tick.sh"));
        // Same instant again: already fired.
        assert!(s.due_scripts(&reg, armed + TimeDelta::seconds(61)).is_empty());
        assert!(s.due_scripts(&reg, armed + TimeDelta::seconds(100)).is_empty());
        assert_eq!(s.due_scripts(&reg, armed + TimeDelta::seconds(122)).len(), 1);
    }

    #[test]
    fn startup_scripts_only_in_startup_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let files = [("boot.sh", r#"{"runAtStartup": true}"#)];
        let now = Local.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        let reg = registry_with(tmp.path(), &files, false);
        let mut s = Scheduler::starting_at(Duration::from_secs(60), Instant::now(), now);
        assert!(s.due_scripts(&reg, now).is_empty());

        let reg = registry_with(tmp.path(), &files, true);
        let mut s = Scheduler::starting_at(Duration::from_secs(60), Instant::now(), now);
        assert_eq!(s.due_scripts(&reg, now).len(), 1);
        assert!(s.due_scripts(&reg, now + TimeDelta::hours(5)).is_empty());
        assert!(s.last_fired(&reg.all()[0].path).is_some());
    }
}
