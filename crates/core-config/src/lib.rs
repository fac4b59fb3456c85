//! Configuration loading and parsing.
//!
//! Two layers live here:
//! * the application config, `scriptdeck.toml` (or an override path provided by the binary),
//!   discovered in the working directory first and then in the platform config dir;
//! * the typed per-script config schema ([`schema`]), whose defaults can be adjusted from
//!   the application config's `[script_defaults]` table.
//!
//! Unknown fields are ignored (TOML deserialization tolerance). A file that fails to parse
//! falls back to defaults with a warning; a broken config never prevents startup.

pub mod schema;

pub use schema::{ConfigEditError, ConfigKind, ConfigSchema, ConfigValue, ScriptConfig};

use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const APP_NAME: &str = "scriptdeck";
pub const CONFIG_FILE_NAME: &str = "scriptdeck.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct ScriptsConfig {
    #[serde(default = "ScriptsConfig::default_roots")]
    pub roots: Vec<PathBuf>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            roots: Self::default_roots(),
        }
    }
}

impl ScriptsConfig {
    fn default_roots() -> Vec<PathBuf> {
        vec![PathBuf::from("scripts")]
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    #[serde(default = "RefreshConfig::default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: Self::default_interval_secs(),
        }
    }
}

impl RefreshConfig {
    const fn default_interval_secs() -> u64 {
        60
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    #[serde(default = "UiConfig::default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default = "UiConfig::default_ascii_only")]
    pub ascii_only: bool,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: Self::default_poll_timeout_ms(),
            ascii_only: Self::default_ascii_only(),
            prompt: None,
        }
    }
}

impl UiConfig {
    const fn default_poll_timeout_ms() -> u64 {
        1000
    }
    const fn default_ascii_only() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default = "ServerConfig::default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            port: Self::default_port(),
            reply_timeout_ms: Self::default_reply_timeout_ms(),
        }
    }
}

impl ServerConfig {
    const fn default_enabled() -> bool {
        true
    }
    pub const fn default_port() -> u16 {
        47123
    }
    const fn default_reply_timeout_ms() -> u64 {
        3000
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DataConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub script_defaults: toml::Table,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join(APP_NAME).join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "config_missing_using_defaults");
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                file,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Directory holding history, variables, access times and the log file.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.file.data.dir {
            return dir.clone();
        }
        dirs::data_local_dir()
            .map(|d| d.join(APP_NAME))
            .unwrap_or_else(|| PathBuf::from(".scriptdeck"))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.file.refresh.interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.file.ui.poll_timeout_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.file.server.reply_timeout_ms)
    }

    /// Prompt label for the main screen: configured value, else the host name.
    pub fn prompt(&self) -> String {
        if let Some(p) = &self.file.ui.prompt {
            return p.clone();
        }
        ["HOSTNAME", "COMPUTERNAME"]
            .iter()
            .find_map(|k| std::env::var(k).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| APP_NAME.to_string())
    }

    pub fn script_schema(&self) -> Arc<ConfigSchema> {
        Arc::new(ConfigSchema::with_defaults(&self.file.script_defaults))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
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
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.file.refresh.interval_secs, 60);
        assert_eq!(cfg.file.scripts.roots, vec![PathBuf::from("scripts")]);
        assert_eq!(cfg.poll_timeout(), Duration::from_millis(1000));
        assert!(cfg.file.ui.ascii_only);
        assert!(cfg.file.server.enabled);
        assert_eq!(cfg.file.server.port, 47123);
        assert!(cfg.raw.is_none());
    }

    #[test]
    fn parses_sections() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[scripts]\nroots = [\"a\", \"b\"]\n[refresh]\ninterval_secs = 5\n\
             [ui]\nprompt = \"box\"\nascii_only = false\n[server]\nport = 9000\n\
             [data]\ndir = \"/tmp/deck\"\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.scripts.roots.len(), 2);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(5));
        assert_eq!(cfg.prompt(), "box");
        assert!(!cfg.file.ui.ascii_only);
        assert_eq!(cfg.file.server.port, 9000);
        assert!(cfg.file.server.enabled);
        assert_eq!(cfg.data_dir(), PathBuf::from("/tmp/deck"));
    }

    #[test]
    fn script_defaults_flow_into_schema() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[script_defaults]\ncloseOnExit = false\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let defaults = cfg.script_schema().defaults();
        assert!(!defaults.close_on_exit());
    }

    #[test]
    fn parse_error_falls_back_and_warns() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[refresh\ninterval_secs = ").unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let cfg = with_default(subscriber, || load_from(Some(tmp.path().to_path_buf())).unwrap());

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("WARN config:"));
        assert!(log_output.contains("config_parse_failed"));
        assert_eq!(cfg.file.refresh.interval_secs, 60);
    }
}
