use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use inference::{http, ServiceContext};
use tiny_http::Server;

#[derive(Parser, Debug)]
#[command(name = "serve", about = "Serve the tamper classifier over HTTP")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8000")]
    addr: String,
    /// Checkpoint directory (defaults to artifacts/model two levels above the
    /// working directory).
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

fn default_model_dir() -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let base = cwd.ancestors().nth(2).unwrap_or(cwd.as_path()).to_path_buf();
    Ok(base.join("artifacts").join("model"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let model_dir = match args.model_dir {
        Some(dir) => dir,
        None => default_model_dir()?,
    };
    let ctx = Arc::new(ServiceContext::from_checkpoint_dir(&model_dir)?);

    let server = Server::http(&args.addr)
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", args.addr))?;
    tracing::info!(addr = %args.addr, "serving predictions");

    // Thread per request; the context is read-only after startup.
    for request in server.incoming_requests() {
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            http::dispatch(request, ctx);
        });
    }

    Ok(())
}
