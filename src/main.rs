mod assets;
mod auth;
mod db;
mod import;
mod ipc;

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Hikaya reading tracker sidecar. Reads one JSON request per line on stdin and
/// answers one JSON response per line on stdout.
#[derive(Debug, Parser)]
#[command(name = "hikayad", version)]
struct Cli {
    /// Workspace directory to open at startup.
    #[arg(long, env = "HIKAYA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Log filter, e.g. `info` or `hikayad=debug`. Logs go to stderr.
    #[arg(long, env = "HIKAYA_LOG", default_value = "info")]
    log: String,
}

fn main() {
    let cli = Cli::parse();

    // stdout carries the protocol; everything else goes to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .compact()
        .try_init();

    let mut state = ipc::AppState::default();
    if let Some(path) = cli.workspace.as_ref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(workspace = %path.to_string_lossy(), error = %e, "failed to open workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to answer to.
                tracing::warn!(error = %e, "bad request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
