// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use lsp_bridge::config::ConfigStore;
use lsp_bridge::Bridge;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lsp-bridged", about = "Multiplexes a fixed tool catalog over long-lived LSP server sessions", version)]
struct Args {
    /// Path to the server catalog JSON document. Overrides LSP_FILE_PATH.
    #[arg(long, env = "LSP_FILE_PATH")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LSP_BRIDGE_LOG")]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    setup_logging(&log_level);

    let Some(config_path) = args.config else {
        bail!("no config path given: pass --config or set LSP_FILE_PATH");
    };

    let config = ConfigStore::load(&config_path);
    info!(path = %config_path.display(), "config loaded");

    let bridge = Bridge::new(config);
    run_stdio_loop(bridge).await
}

/// Mirrors the daemon's `setup_logging` shape but with no file sink: this
/// process has no long-lived log directory to rotate into.
fn setup_logging(log_level: &str) {
    tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
}

/// One JSON request per line in (`{"tool": "...", "arguments": {...}}`), one
/// response envelope per line out. No protocol logic lives here: this is
/// the thinnest possible harness exercising the tool dispatcher.
async fn run_stdio_loop(bridge: Bridge) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = tokio::io::stdout();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received, draining sessions");
                bridge.shutdown().await;
                break;
            }
            next = lines.next_line() => {
                match next.context("failed to read stdin")? {
                    None => break,
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => {
                        let response = handle_line(&bridge, &line).await;
                        let mut text = serde_json::to_string(&response)
                            .unwrap_or_else(|_| r#"{"content":[{"type":"text","text":"internal error"}]}"#.to_string());
                        text.push('\n');
                        out.write_all(text.as_bytes()).await?;
                        out.flush().await?;
                    }
                }
            }
        }
    }
    Ok(())
}

async fn handle_line(bridge: &Bridge, line: &str) -> Value {
    let request: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "malformed request line");
            return json!({"content": [{"type": "text", "text": format!("invalid request: {e}")}]});
        }
    };
    let Some(tool) = request.get("tool").and_then(Value::as_str) else {
        return json!({"content": [{"type": "text", "text": "invalid request: missing 'tool'"}]});
    };
    let arguments = request.get("arguments").cloned().unwrap_or_else(|| json!({}));
    serde_json::to_value(bridge.call(tool, arguments).await).unwrap_or(Value::Null)
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
