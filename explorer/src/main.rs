//! `cdbx`: explore and extend a CDB (chessdb.cn) position tree from a root
//! FEN, printing one snapshot per iterative-deepening pass.

mod cli;

use clap::Parser;
use cli::Cli;
use engine::{Engine, Position};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let config = cli.to_config();

    let root = Position::from_fen(
        &cli.fen,
        if config.chess960 { chess::board::Variant::Chess960 } else { chess::board::Variant::Standard },
    )?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handle = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received ctrl-c, stopping after the in-flight pass drains");
            shutdown_handle.store(true, Ordering::Relaxed);
        }
    });

    let engine = Engine::new(&config);
    let mut snapshots = Box::pin(engine.search(root, config, shutdown));

    while let Some(snapshot) = snapshots.next().await {
        println!("{snapshot}");
    }

    Ok(())
}
