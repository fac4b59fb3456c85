//! scriptdeck entrypoint.
use anyhow::Result;
use clap::{Parser, Subcommand};
use core_config::{Config, load_from};
use core_ipc::{BindOutcome, DEFAULT_HOST, RunRequest, RunStatus, TriggerServer};
use core_terminal::{CrosstermSurface, TerminalSession};
use scriptdeck::app::LOG_FILE_NAME;
use scriptdeck::exec::pause_for_ack;
use scriptdeck::{App, AppOptions, ProcessExecutor, run_sessions};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Once;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "scriptdeck", version, about = "Terminal script launcher")]
struct Args {
    /// Configuration file path (overrides discovery of `scriptdeck.toml`).
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,
    /// Arm `runAtStartup` scripts.
    #[arg(long)]
    startup: bool,
    /// Exit after the first script run.
    #[arg(long)]
    quit: bool,
    /// Do not listen for trigger requests.
    #[arg(long = "no-server")]
    no_server: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the running instance to run a script.
    Run {
        /// Script path or display name.
        script: String,
        /// Extra arguments passed to the script.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Port of the running instance (defaults to the configured one).
        #[arg(long)]
        port: Option<u16>,
    },
}

fn configure_logging(dir: &Path) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("cannot create {}: {e}", dir.display());
        return None;
    }
    let file_appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(nb_writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Some(guard),
        // Global subscriber already installed; dropping the guard shuts the writer down.
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn server_addr(config: &Config, port: Option<u16>) -> SocketAddr {
    SocketAddr::from((DEFAULT_HOST, port.unwrap_or(config.file.server.port)))
}

/// `scriptdeck run`: forward a request to the running instance.
fn run_client(config: &Config, script: String, args: Vec<String>, port: Option<u16>) -> ExitCode {
    let mut request = RunRequest::new(script);
    if !args.is_empty() {
        request.args = Some(args);
    }
    let addr = server_addr(config, port);
    match core_ipc::send_request(addr, &request, CLIENT_TIMEOUT) {
        Ok(RunStatus::Ok) => ExitCode::SUCCESS,
        Ok(RunStatus::NotFound) => {
            eprintln!("script not found: {}", request.script_ref);
            ExitCode::from(2)
        }
        Ok(status @ (RunStatus::Busy | RunStatus::Invalid)) => {
            eprintln!("request refused: {status:?}");
            ExitCode::from(3)
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

fn run_launcher(args: &Args, config: Config) -> Result<ExitCode> {
    let server = if config.file.server.enabled && !args.no_server {
        match TriggerServer::bind(server_addr(&config, None), config.reply_timeout())? {
            BindOutcome::AlreadyRunning => {
                println!("An instance is already running, exiting.");
                return Ok(ExitCode::SUCCESS);
            }
            BindOutcome::Started(server, queue) => Some((server, queue)),
        }
    } else {
        None
    };

    let options = AppOptions {
        startup: args.startup,
        quit_after_run: args.quit,
    };
    let mut app = App::new(config, options, Box::new(ProcessExecutor));
    let mut server = match server {
        Some((server, queue)) => {
            app = app.with_triggers(queue);
            Some(server)
        }
        None => None,
    };

    let mut term = TerminalSession::acquire(Box::new(CrosstermSurface::new()))?;
    let result = run_sessions(&mut app, &mut term, |report| {
        eprintln!("{report}");
        pause_for_ack("The launcher will restart.")
    });
    term.leave()?;
    if let Some(server) = server.as_mut() {
        server.stop();
    }
    result?;
    info!(target: "runtime", "shutdown");
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let mut args = Args::parse();
    let config = load_from(args.config.clone())?;
    let _log_guard = configure_logging(&config.data_dir());
    install_panic_hook();
    info!(target: "runtime", version = env!("CARGO_PKG_VERSION"), "startup");

    if let Some(Command::Run {
        script,
        args: extra,
        port,
    }) = args.command.take()
    {
        return Ok(run_client(&config, script, extra, port));
    }
    run_launcher(&args, config).inspect_err(|e| {
        warn!(target: "runtime", error = ?e, "launcher_failed");
    })
}
