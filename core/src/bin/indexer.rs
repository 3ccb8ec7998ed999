use clap::Parser;
use ragcore::{
    app::state::AppState,
    config::{init_tracing, StartArgs},
    core::service::indexer::IndexerConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// One-shot ingestion run over every enabled provider. Exits 0 on
/// success or no-op, 1 on error, 130 if cancelled mid-run.
#[derive(Debug, Parser)]
struct IndexerArgs {
    #[command(flatten)]
    start: StartArgs,

    /// Re-embed every document regardless of etag match.
    #[arg(long)]
    force_full_reindex: bool,

    /// Skip deleting chunks for documents no longer present upstream.
    #[arg(long)]
    no_cleanup_orphans: bool,

    /// Cap the number of documents processed per provider this run.
    #[arg(long)]
    max_files: Option<usize>,
}

#[tokio::main]
async fn main() {
    let args = IndexerArgs::parse();
    init_tracing(&args.start.log());

    let state = match AppState::new(&args.start).await {
        Ok(state) => state,
        Err(e) => {
            e.print();
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_termination().await;
        info!("termination signal received, finishing current document then exiting");
        signal_cancel.cancel();
    });

    let config = IndexerConfig {
        force_full_reindex: args.force_full_reindex,
        cleanup_orphans: !args.no_cleanup_orphans,
        max_files: args.max_files,
        ..Default::default()
    };

    let pipeline = state.indexer_pipeline(config);
    let report = pipeline.run(&cancel).await;

    info!(
        providers_processed = report.providers_processed,
        documents_processed = report.documents_processed,
        documents_skipped = report.documents_skipped,
        documents_failed = report.documents_failed,
        chunks_written = report.chunks_written,
        elapsed_secs = report.elapsed_secs,
        status = ?report.status,
        "indexer run finished"
    );

    if report.documents_failed > 0 {
        error!(documents_failed = report.documents_failed, "some documents failed to index");
    }

    std::process::exit(report.status.exit_code());
}

async fn wait_for_termination() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
