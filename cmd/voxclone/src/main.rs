//! voxclone - HTTP server for voice-cloning text-to-speech.

mod app;
mod config;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::AppContext;

/// HTTP server for voice-cloning text-to-speech.
///
/// Registers reference recordings per speaker and synthesizes text in a
/// registered speaker's voice, caching every result on disk.
#[derive(Parser, Debug)]
#[command(name = "voxclone")]
#[command(about = "Voice-cloning text-to-speech server")]
#[command(version)]
struct Args {
    /// Config file (YAML). Defaults apply when omitted.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config (e.g. :80, 127.0.0.1:8080)
    #[arg(short, long)]
    listen: Option<String>,

    /// Artifact root directory, overrides the config
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Inference service URL, overrides the config
    #[arg(long)]
    inference_url: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut cfg = config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        cfg.listen = listen;
    }
    if let Some(dir) = args.output_dir {
        cfg.store.root = dir;
    }
    if let Some(url) = args.inference_url {
        cfg.inference.base_url = url;
    }

    let addr = config::parse_addr(&cfg.listen)?;
    let ctx = AppContext::from_config(&cfg)?;
    info!(
        backend = ?cfg.store.backend,
        root = %cfg.store.root.display(),
        warm_on_register = cfg.warm_on_register,
        "voxclone: starting"
    );

    let app = server::router(Arc::new(ctx), cfg.max_upload_bytes);
    server::serve(addr, app).await
}

/// RUST_LOG wins over the verbose flag.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
