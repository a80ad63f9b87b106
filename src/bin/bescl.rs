//! bescl - command-line client for the BES daemon
//!
//! # Usage
//!
//! ```bash
//! # One-shot
//! bescl -x "show version;"
//!
//! # Interactive, over TCP
//! bescl --host localhost --port 10022
//! ```
//!
//! In interactive mode each line is sent as one request once it ends with
//! `;`; a statement may span several lines. `exit` or `quit` (or EOF)
//! ends the session.

use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use bes_client::{BesClient, ClientError, Response};
use bes_protocol::ConnectSpec;
use besd::config::{DEFAULT_SOCKET_PATH, SOCKET_ENV};

/// Command-line client for the BES daemon
#[derive(Parser, Debug)]
#[command(name = "bescl", version, about)]
struct Args {
    /// Unix socket of the server. Defaults to $BES_SOCKET, then /tmp/bes.sock.
    #[arg(short, long, conflicts_with = "port")]
    socket: Option<PathBuf>,

    /// TCP host (used with --port)
    #[arg(long, default_value = "localhost")]
    host: String,

    /// TCP port; selects TCP instead of the Unix socket
    #[arg(short, long)]
    port: Option<u16>,

    /// Connect timeout in seconds
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    /// Commands to run, then exit
    #[arg(short = 'x', long = "execute")]
    execute: Option<String>,
}

impl Args {
    fn connect_spec(&self) -> ConnectSpec {
        let spec = match self.port {
            Some(port) => ConnectSpec::tcp(&self.host, port),
            None => {
                let path = self
                    .socket
                    .clone()
                    .or_else(|| std::env::var_os(SOCKET_ENV).map(PathBuf::from))
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH));
                ConnectSpec::unix(path)
            }
        };
        spec.with_timeout(Duration::from_secs(self.timeout))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bescl=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let spec = args.connect_spec();
    let mut client = BesClient::connect(&spec)
        .await
        .with_context(|| format!("Is besd running at {}?", spec.endpoint))?;

    let failed = match &args.execute {
        Some(commands) => {
            let response = client.execute(commands).await?;
            print_response(&response)?;
            response.is_error()
        }
        None => repl(&mut client).await?,
    };

    client.exit().await?;
    if failed {
        process::exit(1);
    }
    Ok(())
}

/// Reads statements from stdin until EOF or `exit`.
///
/// Returns true if the last request failed.
async fn repl(client: &mut BesClient) -> Result<bool> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = String::new();
    let mut last_failed = false;

    loop {
        prompt(if pending.is_empty() { "BESClient> " } else { "        -> " })?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        if pending.is_empty() && matches!(line, "exit" | "quit" | "exit;" | "quit;") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        pending.push_str(line);
        pending.push(' ');
        if !line.ends_with(';') {
            continue;
        }

        match client.execute(&pending).await {
            Ok(response) => {
                print_response(&response)?;
                last_failed = response.is_error();
            }
            Err(e) if e.is_disconnect() => bail!(e),
            Err(ClientError::EmptyRequest) => {}
            Err(e) => {
                eprintln!("{e}");
                last_failed = true;
            }
        }
        pending.clear();
    }

    if !pending.trim().is_empty() {
        eprintln!("Discarding unterminated input: {}", pending.trim());
    }
    Ok(last_failed)
}

fn prompt(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn print_response(response: &Response) -> Result<()> {
    if response.is_error() {
        eprint!("{}", response.text());
    } else {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&response.data)?;
        if !response.data.ends_with(b"\n") && !response.data.is_empty() {
            stdout.write_all(b"\n")?;
        }
        stdout.flush()?;
    }
    Ok(())
}
