//! smartmark RPC server — JSON-RPC over stdin/stdout for the external UI.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"list.submit", "params":{}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Pushed:   {"event":"bookmarks", "bookmarks":[...]} on change-feed updates.
//!
//! Logging goes to stderr; stdout carries only the protocol.

use std::process;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::error;
use tracing_subscriber::EnvFilter;

use smartmark::app::App;
use smartmark::config::BackendConfig;
use smartmark::rpc_handler::handle_method;

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            window_start: Instant::now(),
            request_count: 0,
            max_per_second,
        }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

/// Writes one protocol line. A false return means stdout is gone and the
/// server should exit.
async fn write_line(stdout: &mut io::Stdout, value: &Value) -> bool {
    let mut line = value.to_string().into_bytes();
    line.push(b'\n');
    stdout.write_all(&line).await.is_ok() && stdout.flush().await.is_ok()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Missing backend address or key is fatal before anything else runs.
    let backend = match BackendConfig::from_env() {
        Ok(backend) => backend,
        Err(e) => {
            error!("fatal: {}", e);
            process::exit(1);
        }
    };

    let app = Mutex::new(App::new(&backend));
    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();

    let mut stdout = io::stdout();
    let ready = json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")});
    if !write_line(&mut stdout, &ready).await {
        return;
    }

    // Max 200 RPC requests per second.
    let mut rate_limiter = RateLimiter::new(200);

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }

                let req: Value = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        let err = json!({"id": null, "error": format!("parse error: {}", e)});
                        if !write_line(&mut stdout, &err).await {
                            break;
                        }
                        continue;
                    }
                };

                let id = req.get("id").cloned().unwrap_or(Value::Null);
                if !rate_limiter.check() {
                    let response = json!({"id": id, "error": "rate limit exceeded"});
                    if !write_line(&mut stdout, &response).await {
                        break;
                    }
                    continue;
                }

                let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
                let params = req.get("params").cloned().unwrap_or(json!({}));

                let response = match handle_method(&app, method, &params, &updates_tx).await {
                    Ok(val) => json!({"id": id, "result": val}),
                    Err(err) => json!({"id": id, "error": err}),
                };
                if !write_line(&mut stdout, &response).await {
                    break;
                }
            }
            Some(snapshot) = updates_rx.recv() => {
                let event = json!({"event": "bookmarks", "bookmarks": snapshot});
                if !write_line(&mut stdout, &event).await {
                    break;
                }
            }
        }
    }

    app.lock().await.shutdown().await;
}
