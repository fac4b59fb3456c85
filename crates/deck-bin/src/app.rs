//! Long-lived launcher state shared by every screen session.

use crate::exec::{ExecOutcome, ExecRequest, Launch, ScriptExecutor, build_request};
use anyhow::Result;
use core_config::Config;
use core_ipc::TriggerQueue;
use core_registry::{ScriptDescriptor, ScriptRegistry};
use core_scheduler::Scheduler;
use core_state::KeyedHistoryFile;
use core_terminal::TerminalSession;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const LOG_FILE_NAME: &str = "scriptdeck.log";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppOptions {
    /// Arms `runAtStartup` rules.
    pub startup: bool,
    /// Close the main screen after the first script run.
    pub quit_after_run: bool,
}

pub struct App {
    pub config: Config,
    pub registry: ScriptRegistry,
    pub scheduler: Scheduler,
    pub variables: KeyedHistoryFile,
    pub config_history: KeyedHistoryFile,
    data_dir: PathBuf,
    executor: Box<dyn ScriptExecutor>,
    triggers: Option<TriggerQueue>,
    options: AppOptions,
}

impl App {
    /// Load persisted state from the config's data directory and run the first scan.
    pub fn new(config: Config, options: AppOptions, executor: Box<dyn ScriptExecutor>) -> Self {
        let data_dir = config.data_dir();
        let mut registry = ScriptRegistry::new(config.script_schema(), &data_dir, options.startup);
        let delta = registry.scan(&config.file.scripts.roots, |_| ControlFlow::Continue(()));
        registry.sort_by_access_time();
        info!(
            target: "runtime",
            scripts = registry.len(),
            added = delta.added.len(),
            data_dir = %data_dir.display(),
            "catalog_ready"
        );
        Self {
            scheduler: Scheduler::new(config.refresh_interval()),
            variables: KeyedHistoryFile::variables(&data_dir),
            config_history: KeyedHistoryFile::config_history(&data_dir),
            registry,
            config,
            data_dir,
            executor,
            triggers: None,
            options,
        }
    }

    pub fn with_triggers(mut self, queue: TriggerQueue) -> Self {
        self.triggers = Some(queue);
        self
    }

    pub fn triggers(&self) -> Option<&TriggerQueue> {
        self.triggers.as_ref()
    }

    pub fn options(&self) -> AppOptions {
        self.options
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }

    pub fn descriptor(&self, path: &Path) -> Option<Arc<ScriptDescriptor>> {
        self.registry.get(path).cloned()
    }

    /// Run a script with the terminal released. Returns `None` when the script is no longer
    /// in the catalog.
    pub fn launch(
        &mut self,
        term: &mut TerminalSession,
        path: &Path,
        launch: &Launch,
    ) -> Result<Option<ExecOutcome>> {
        let Some(desc) = self.descriptor(path) else {
            warn!(target: "runtime.exec", path = %path.display(), "launch_unknown_script");
            return Ok(None);
        };
        let request = build_request(&desc, &self.variables, launch)?;
        info!(
            target: "runtime.exec",
            script = %desc.display_name,
            args = request.args.len(),
            env = request.env.len(),
            "script_launch"
        );
        let outcome = self.execute(term, &request)?;
        info!(target: "runtime.exec", script = %desc.display_name, exit_code = ?outcome.exit_code, "script_exited");
        Ok(Some(outcome))
    }

    /// Hand a prepared request to the executor with the terminal released.
    pub fn execute(&mut self, term: &mut TerminalSession, request: &ExecRequest) -> Result<ExecOutcome> {
        let executor = &mut self.executor;
        term.released(|| executor.execute(request))?
    }
}
