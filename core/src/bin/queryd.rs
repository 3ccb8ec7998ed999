use clap::Parser;
use ragcore::{
    app::{server::router::router, state::AppState},
    config::{init_tracing, StartArgs},
};
use tracing::info;

#[tokio::main]
async fn main() {
    let args = StartArgs::parse();
    init_tracing(&args.log());

    let state = match AppState::new(&args).await {
        Ok(state) => state,
        Err(e) => {
            e.print();
            std::process::exit(1);
        }
    };

    let addr = args.address();
    let origins = args.allowed_origins();

    let listener = tokio::net::TcpListener::bind(&addr).await.expect("error while starting TCP listener");
    let app = router(state, origins);

    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("error while running server");
}

async fn shutdown_signal() {
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
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); }
        _ = terminate => { info!("received SIGTERM, shutting down"); }
    }
}
