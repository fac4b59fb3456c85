//! scriptdeck: a terminal launcher for a folder of scripts.
//!
//! The binary is a thin shell around this library so the screens can be driven by a
//! headless terminal in tests.

pub mod app;
pub mod exec;
pub mod runtime;
pub mod screens;

pub use app::{App, AppOptions};
pub use exec::{ExecOutcome, ExecRequest, Launch, ProcessExecutor, ScriptExecutor};
pub use runtime::run_sessions;
