use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};

use tc_config::TwcloudConfig;
use tc_runtime::lifecycle::{Pipeline, wait_for_signal};
use tc_runtime::tracing_init::init_tracing;

#[derive(Parser)]
#[command(name = "tweet-cloud", about = "Capture posts, persist them, and rank words per time window")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one capture and assess every window
    Run {
        /// Path to the tweet-cloud TOML config file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config_path = config
                .canonicalize()
                .map_err(|e| anyhow::anyhow!("config path '{}': {e}", config.display()))?;
            let twcloud_config = TwcloudConfig::load(&config_path)?;
            let base_dir = config_path
                .parent()
                .ok_or_else(|| anyhow::anyhow!("config path has no parent directory"))?
                .to_path_buf();

            let _guard = init_tracing(&twcloud_config.logging, &base_dir)?;

            let started = Instant::now();
            let pipeline = Pipeline::new(twcloud_config, base_dir);
            let signals = tokio::spawn(wait_for_signal(pipeline.stop_handle()));

            let result = pipeline.run().await;
            signals.abort();
            let report = result.map_err(|e| anyhow::anyhow!("{e}"))?;

            tracing::info!(
                domain = "sys",
                pulled = report.pulled,
                discarded = report.discarded,
                windows = report.windows,
                failed_windows = report.dispatch.failed,
                committed = report.writer.committed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "tweet-cloud run complete"
            );
        }
    }

    Ok(())
}
