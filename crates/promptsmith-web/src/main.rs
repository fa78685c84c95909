//! Browser-based prompt generator.
//!
//! Serves the form on a local port. Each browser tab gets its own session
//! and history.
//!
//! # Usage
//!
//! ```bash
//! GEMINI_API_KEY=... cargo run -p promptsmith-web
//! GEMINI_API_KEY=... cargo run -p promptsmith-web -- --port 8080
//! GEMINI_API_KEY=... cargo run -p promptsmith-web -- --model gemini-1.5-pro
//! ```
//!
//! Then open the printed URL in a browser, or drive the REST API directly:
//!
//! ```bash
//! curl -X POST localhost:3001/api/sessions
//! curl -X POST localhost:3001/api/sessions/<id>/generate \
//!   -H 'content-type: application/json' \
//!   -d '{"topic":"A cat cafe launch","style":"Creative","use_case":"Marketing"}'
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use promptsmith::GeminiClient;
use promptsmith::config::AppConfig;
use promptsmith_web::{WebConfig, spawn_web};
use tracing::info;

/// Browser-based prompt generator.
#[derive(Parser)]
#[command(about = "Generate AI prompts from a browser form")]
struct Args {
    /// Model to use (overrides GEMINI_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// Address to bind to.
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Port for the web UI server.
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Serve files from this directory instead of the built-in page.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// End sessions idle for this many minutes (0 keeps them forever).
    #[arg(long, default_value_t = 30)]
    session_idle_mins: u64,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let _ = promptsmith::logging::init_tracing();
    let args = Args::parse();

    let config = AppConfig::from_env()
        .map_err(|e| e.to_string())?
        .with_model(args.model);
    let client = GeminiClient::from_config(&config).map_err(|e| e.to_string())?;
    info!("Using model {} at {}", client.model(), config.api_base);

    let web_config = WebConfig {
        bind_addr: (args.bind, args.port).into(),
        static_dir: args.static_dir,
        session_idle_timeout: (args.session_idle_mins > 0)
            .then(|| Duration::from_secs(args.session_idle_mins * 60)),
        ..Default::default()
    };
    let addr = spawn_web(Arc::new(client), web_config)
        .await
        .map_err(|e| format!("failed to start web server: {e}"))?;
    println!("Web UI: http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for ctrl-c: {e}"))?;
    info!("Shutting down");
    Ok(())
}
