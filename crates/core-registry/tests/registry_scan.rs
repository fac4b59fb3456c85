use core_config::ConfigSchema;
use core_config::schema::{HOTKEY, RUN_EVERY};
use core_registry::{ScriptRegistry, override_path};
use pretty_assertions::assert_eq;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct Fixture {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    data: PathBuf,
}

fn fixture(files: &[&str]) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("scripts");
    let data = tmp.path().join("data");
    for f in files {
        let p = root.join(f);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, format!("echo {f}")).unwrap();
    }
    Fixture {
        _tmp: tmp,
        root,
        data,
    }
}

fn registry(fx: &Fixture) -> ScriptRegistry {
    ScriptRegistry::new(Arc::new(ConfigSchema::builtin()), &fx.data, false)
}

fn names(reg: &ScriptRegistry) -> Vec<String> {
    reg.all().iter().map(|d| d.display_name.clone()).collect()
}

fn keep_going(_: usize) -> ControlFlow<()> {
    ControlFlow::Continue(())
}

#[test]
fn discovers_sorted_and_skips_hidden_and_overrides() {
    let fx = fixture(&["b.sh", "a.py", "sub/c.sh", ".hidden.sh", ".git/x.sh"]);
    fs::write(fx.root.join("a.py.config.json"), "{}").unwrap();
    let mut reg = registry(&fx);
    let delta = reg.scan(&[fx.root.clone()], keep_going);
    assert!(delta.completed);
    assert_eq!(delta.added.len(), 3);
    assert_eq!(names(&reg), vec!["a.py", "b.sh", "sub/c.sh"]);
    assert!(reg.all().iter().all(|d| d.path.is_absolute()));
}

#[test]
fn deleted_script_is_removed_and_others_keep_access_times() {
    let fx = fixture(&["one.sh", "two.sh", "three.sh"]);
    let mut reg = registry(&fx);
    reg.scan(&[fx.root.clone()], keep_going);
    assert_eq!(reg.len(), 3);

    let one = fx.root.join("one.sh");
    let two = fx.root.join("two.sh");
    let three = fx.root.join("three.sh");
    let abs = |p: &Path| std::path::absolute(p).unwrap();
    reg.touch_at(&abs(&one), 100).unwrap();
    reg.touch_at(&abs(&three), 300).unwrap();

    fs::remove_file(&two).unwrap();
    let delta = reg.scan(&[fx.root.clone()], keep_going);
    assert_eq!(delta.removed, vec![abs(&two)]);
    assert!(delta.added.is_empty());
    assert_eq!(reg.len(), 2);
    assert_eq!(reg.get(&abs(&one)).unwrap().last_access, 100);
    assert_eq!(reg.get(&abs(&three)).unwrap().last_access, 300);
}

fn stored_access_keys(fx: &Fixture) -> Vec<String> {
    let raw = fs::read_to_string(fx.data.join(core_registry::ACCESS_TIMES_FILE)).unwrap();
    let map: std::collections::BTreeMap<String, i64> = serde_json::from_str(&raw).unwrap();
    map.into_keys().collect()
}

#[test]
fn deleted_script_access_time_is_forgotten() {
    let fx = fixture(&["keep.sh", "gone.sh"]);
    let other_root = fx.root.parent().unwrap().join("elsewhere");
    let mut reg = registry(&fx);
    reg.scan(&[fx.root.clone(), other_root.clone()], keep_going);
    let abs = |p: &Path| std::path::absolute(p).unwrap();
    let keep = abs(&fx.root.join("keep.sh"));
    let gone = abs(&fx.root.join("gone.sh"));
    reg.touch_at(&keep, 10).unwrap();
    reg.touch_at(&gone, 20).unwrap();

    fs::remove_file(&gone).unwrap();
    reg.scan(&[fx.root.clone(), other_root], keep_going);
    assert_eq!(
        stored_access_keys(&fx),
        vec![keep.to_string_lossy().into_owned()]
    );

    // A root that is missing for one scan does not lose its history.
    let moved = fx.root.with_file_name("scripts-away");
    fs::rename(&fx.root, &moved).unwrap();
    reg.scan(&[fx.root.clone()], keep_going);
    assert_eq!(stored_access_keys(&fx).len(), 1);
}

#[test]
fn unchanged_descriptors_are_reused() {
    let fx = fixture(&["keep.sh"]);
    let mut reg = registry(&fx);
    reg.scan(&[fx.root.clone()], keep_going);
    let before = Arc::clone(&reg.all()[0]);
    let delta = reg.scan(&[fx.root.clone()], keep_going);
    assert!(delta.is_empty());
    assert!(Arc::ptr_eq(&before, &reg.all()[0]));
}

#[test]
fn sort_is_stable_and_descending() {
    let fx = fixture(&["a.sh", "b.sh", "c.sh", "d.sh"]);
    let mut reg = registry(&fx);
    reg.scan(&[fx.root.clone()], keep_going);
    let path = |n: &str| std::path::absolute(fx.root.join(n)).unwrap();
    reg.touch_at(&path("c.sh"), 50).unwrap();
    reg.touch_at(&path("b.sh"), 10).unwrap();
    reg.touch_at(&path("d.sh"), 10).unwrap();
    reg.sort_by_access_time();
    assert_eq!(names(&reg), vec!["c.sh", "b.sh", "d.sh", "a.sh"]);
}

#[test]
fn access_times_survive_a_new_registry() {
    let fx = fixture(&["a.sh", "b.sh"]);
    let mut reg = registry(&fx);
    reg.scan(&[fx.root.clone()], keep_going);
    let b = std::path::absolute(fx.root.join("b.sh")).unwrap();
    reg.touch_at(&b, 42).unwrap();

    let mut again = registry(&fx);
    again.scan(&[fx.root.clone()], keep_going);
    again.sort_by_access_time();
    assert_eq!(names(&again), vec!["b.sh", "a.sh"]);
    assert_eq!(again.all()[0].last_access, 42);
}

#[test]
fn stopped_scan_removes_nothing() {
    let files: Vec<String> = (0..40).map(|i| format!("s{i:02}.sh")).collect();
    let refs: Vec<&str> = files.iter().map(String::as_str).collect();
    let fx = fixture(&refs);
    let mut reg = registry(&fx);
    reg.scan(&[fx.root.clone()], keep_going);
    assert_eq!(reg.len(), 40);

    fs::remove_file(fx.root.join("s39.sh")).unwrap();
    fs::write(fx.root.join("s00a.sh"), "new").unwrap();
    let mut calls = Vec::new();
    let delta = reg.scan(&[fx.root.clone()], |n| {
        calls.push(n);
        ControlFlow::Break(())
    });
    assert!(!delta.completed);
    assert_eq!(calls, vec![16]);
    assert!(delta.removed.is_empty());
    assert_eq!(delta.added.len(), 1);
    assert_eq!(reg.len(), 41);
}

#[test]
fn overrides_merge_and_update_config_roundtrips() {
    let fx = fixture(&["job.sh"]);
    let script = std::path::absolute(fx.root.join("job.sh")).unwrap();
    fs::write(
        override_path(&script),
        r#"{"hotkey": "ctrl+j", "mystery": 1, "runEvery": "soon"}"#,
    )
    .unwrap();
    let mut reg = registry(&fx);
    reg.scan(&[fx.root.clone()], keep_going);
    let d = reg.get(&script).unwrap();
    assert_eq!(d.config.hotkey(), "ctrl+j");
    assert_eq!(d.config.run_every_secs(), 0);
    assert!(d.schedule.is_none());
    assert_eq!(reg.hotkeys().collect::<Vec<_>>(), vec![("ctrl+j", script.as_path())]);

    let mut cfg = d.config.clone();
    cfg.set_from_text(RUN_EVERY, "30").unwrap();
    reg.update_config(&script, cfg).unwrap();
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(override_path(&script)).unwrap()).unwrap();
    assert_eq!(saved, serde_json::json!({"hotkey": "ctrl+j", "runEvery": 30}));
    assert!(reg.get(&script).unwrap().schedule.is_some());
    assert_eq!(reg.scheduled().count(), 1);

    // Back to defaults deletes the file.
    let mut cfg = reg.get(&script).unwrap().config.clone();
    cfg.set_from_text(RUN_EVERY, "0").unwrap();
    cfg.set_from_text(HOTKEY, "").unwrap();
    reg.update_config(&script, cfg).unwrap();
    assert!(!override_path(&script).exists());

    // The rewrite above does not count as a change on the next scan.
    let delta = reg.scan(&[fx.root.clone()], keep_going);
    assert!(delta.changed.is_empty());
}

#[test]
fn find_by_path_display_name_or_file_name() {
    let fx = fixture(&["net/ping.sh", "backup.py"]);
    let mut reg = registry(&fx);
    reg.scan(&[fx.root.clone()], keep_going);
    let ping = std::path::absolute(fx.root.join("net/ping.sh")).unwrap();
    assert_eq!(reg.find("net/ping.sh").unwrap().path, ping);
    assert_eq!(reg.find("ping.sh").unwrap().path, ping);
    assert_eq!(reg.find(ping.to_str().unwrap()).unwrap().path, ping);
    assert!(reg.find("nope.sh").is_none());
}

#[test]
fn missing_root_is_not_an_error() {
    let fx = fixture(&[]);
    let mut reg = registry(&fx);
    let delta = reg.scan(&[fx.root.join("absent")], keep_going);
    assert!(delta.completed);
    assert!(reg.is_empty());
}

#[test]
fn new_and_duplicated_scripts_go_to_the_front() {
    let fx = fixture(&["a.sh", "tools/b.sh"]);
    let b = std::path::absolute(fx.root.join("tools/b.sh")).unwrap();
    fs::write(override_path(&b), r#"{"args": "-v"}"#).unwrap();
    let mut reg = registry(&fx);
    reg.scan(&[fx.root.clone()], keep_going);

    let fresh = reg.create_script(&b, "c.sh").unwrap();
    assert_eq!(fresh, b.with_file_name("c.sh"));
    assert_eq!(fs::read_to_string(&fresh).unwrap(), "");
    assert_eq!(names(&reg), vec!["tools/c.sh", "a.sh", "tools/b.sh"]);
    assert!(reg.all()[0].last_access > 0);

    let copy = reg.duplicate_script(&b, "b2.sh").unwrap();
    assert_eq!(fs::read_to_string(&copy).unwrap(), "echo tools/b.sh");
    assert_eq!(reg.get(&copy).unwrap().config.args(), "-v");
    assert_eq!(names(&reg)[0], "tools/b2.sh");

    // Nothing is replaced, and the catalog is untouched on failure.
    assert!(reg.duplicate_script(&b, "c.sh").is_err());
    assert!(reg.create_script(&b, "../escape.sh").is_err());
    assert_eq!(reg.len(), 4);

    // The next scan sees the same set of files.
    let delta = reg.scan(&[fx.root.clone()], keep_going);
    assert!(delta.added.is_empty() && delta.removed.is_empty());
}

#[test]
fn rename_moves_file_config_and_access_time() {
    let fx = fixture(&["a.sh", "old.sh"]);
    let old = std::path::absolute(fx.root.join("old.sh")).unwrap();
    fs::write(override_path(&old), r#"{"hotkey": "ctrl+o"}"#).unwrap();
    let mut reg = registry(&fx);
    reg.scan(&[fx.root.clone()], keep_going);
    reg.touch_at(&old, 77).unwrap();
    let position = reg.all().iter().position(|d| d.path == old).unwrap();

    let new = reg.rename_script(&old, "new.sh").unwrap();
    assert!(!old.exists() && !override_path(&old).exists());
    assert!(new.exists() && override_path(&new).exists());
    assert!(reg.get(&old).is_none());
    let renamed = reg.get(&new).unwrap();
    assert_eq!(renamed.display_name, "new.sh");
    assert_eq!(renamed.last_access, 77);
    assert_eq!(renamed.config.hotkey(), "ctrl+o");
    assert_eq!(reg.all()[position].path, new);

    // A fresh registry finds the access time under the new name.
    let mut again = registry(&fx);
    again.scan(&[fx.root.clone()], keep_going);
    assert_eq!(again.get(&new).unwrap().last_access, 77);
    assert_eq!(
        stored_access_keys(&fx),
        vec![new.to_string_lossy().into_owned()]
    );
}
