use anyhow::Context;
use clap::Parser;
use codelens_exec::ExecConfig;
use codelens_exec_server::{create_app, run_server};
use std::{net::SocketAddr, path::PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to listen on
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    addr: SocketAddr,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of concurrent executions
    #[arg(short, long)]
    max_concurrent: Option<usize>,

    /// Per-stream output cap in bytes
    #[arg(long)]
    max_output_bytes: Option<usize>,

    /// CPU time limit in seconds
    #[arg(long)]
    cpu_time_limit: Option<u32>,

    /// File size limit in bytes
    #[arg(long)]
    file_size_limit: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ExecConfig> {
        let mut config = match &self.config {
            Some(path) => ExecConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ExecConfig::default(),
        };

        if let Some(max_concurrent) = self.max_concurrent {
            config.max_concurrent_executions = max_concurrent;
        }
        if let Some(max_output_bytes) = self.max_output_bytes {
            config.max_output_bytes = max_output_bytes;
        }
        if let Some(cpu_time) = self.cpu_time_limit {
            config.limits.cpu_time = cpu_time;
        }
        if let Some(file_size) = self.file_size_limit {
            config.limits.file_size = file_size;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let addr = args.addr;
    let config = args.into_config()?;

    let app = create_app(config)?;
    run_server(app, addr).await?;

    Ok(())
}
