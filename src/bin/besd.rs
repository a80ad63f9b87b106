//! BES Daemon - back-end data server speaking PPT
//!
//! # Usage
//!
//! ```bash
//! # Start in the foreground
//! besd start --config /etc/bes/bes.toml
//!
//! # Start in the background
//! besd start -d
//!
//! # Stop / check the running daemon
//! besd stop
//! besd status
//! ```
//!
//! The configuration file can also be named by `BES_CONFIG`; `BES_SOCKET`
//! overrides the Unix socket path.

use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use besd::config::CONFIG_ENV;
use besd::{build_dispatcher, BesServer, Config, ServerSettings};

/// BES daemon - back-end data server
#[derive(Parser, Debug)]
#[command(name = "besd", version, about)]
struct Args {
    /// Configuration file (TOML). Defaults to $BES_CONFIG.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Detach and run in the background
        #[arg(short = 'd', long)]
        daemon: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show whether the daemon is running
    Status,
}

/// Files the daemon keeps under the user's state directory.
struct StateFiles {
    dir: PathBuf,
}

impl StateFiles {
    fn new() -> Self {
        let base = dirs::state_dir().unwrap_or_else(env::temp_dir);
        Self {
            dir: base.join("bes"),
        }
    }

    fn pid(&self) -> PathBuf {
        self.dir.join("besd.pid")
    }

    fn log(&self) -> PathBuf {
        self.dir.join("besd.log")
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))
    }

    fn read_pid(&self) -> Option<i32> {
        fs::read_to_string(self.pid()).ok()?.trim().parse().ok()
    }

    fn write_pid(&self) -> Result<()> {
        self.ensure_dir()?;
        fs::write(self.pid(), process::id().to_string()).context("Failed to write PID file")
    }

    fn remove_pid(&self) {
        let _ = fs::remove_file(self.pid());
    }

    /// PID of a live daemon. A stale PID file is removed.
    fn running_pid(&self) -> Option<i32> {
        let pid = self.read_pid()?;
        if is_alive(pid) {
            Some(pid)
        } else {
            self.remove_pid();
            None
        }
    }
}

fn is_alive(pid: i32) -> bool {
    // Signal 0 only checks that the process exists.
    unsafe { libc::kill(pid, 0) == 0 }
}

fn load_settings(path: Option<&Path>) -> Result<ServerSettings> {
    let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
    let mut config = match path.map(Path::to_path_buf).or(from_env) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::new(),
    };
    config.apply_env_overrides();
    ServerSettings::from_config(&config).context("Invalid configuration")
}

fn main() -> Result<()> {
    let args = Args::parse();
    let state = StateFiles::new();

    match args.command.unwrap_or(Command::Start { daemon: false }) {
        Command::Start { daemon } => {
            if let Some(pid) = state.running_pid() {
                eprintln!("besd is already running (PID {pid})");
                eprintln!("Use 'besd stop' to stop it first.");
                process::exit(1);
            }

            // Validate before detaching so errors reach the terminal.
            let settings = load_settings(args.config.as_deref())?;

            if daemon {
                detach(&state)?;
            }
            state.write_pid()?;
            let result = run_daemon(settings);
            state.remove_pid();
            result
        }
        Command::Stop => {
            let Some(pid) = state.running_pid() else {
                println!("besd is not running.");
                return Ok(());
            };

            println!("Stopping besd (PID {pid})...");
            if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
                bail!("Failed to send SIGTERM to process {pid}");
            }
            for _ in 0..50 {
                if !is_alive(pid) {
                    println!("besd stopped.");
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            eprintln!("besd did not stop within 5 seconds.");
            process::exit(1);
        }
        Command::Status => {
            let Some(pid) = state.running_pid() else {
                println!("besd is not running.");
                process::exit(1);
            };

            println!("besd is running (PID {pid})");
            if let Ok(settings) = load_settings(args.config.as_deref()) {
                if settings.unix_socket.exists() {
                    println!("Socket: {}", settings.unix_socket.display());
                }
                if let Some((host, port)) = &settings.tcp {
                    println!("TCP: {host}:{port}");
                }
            }
            Ok(())
        }
    }
}

fn detach(state: &StateFiles) -> Result<()> {
    state.ensure_dir()?;
    let log = state.log();
    let stdout = File::create(&log).context("Failed to create log file")?;
    let stderr = stdout.try_clone().context("Failed to duplicate log file handle")?;

    daemonize::Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;
    Ok(())
}

#[tokio::main]
async fn run_daemon(settings: ServerSettings) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("besd=info".parse()?)
                .add_directive("bes_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        modules = ?settings.modules,
        "BES daemon starting"
    );

    let dispatcher = Arc::new(build_dispatcher(&settings)?);
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        shutdown_token.cancel();
    });

    let server = BesServer::new(settings, dispatcher, cancel_token);
    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("BES daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}
