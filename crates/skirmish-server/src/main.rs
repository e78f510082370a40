use tracing_subscriber::EnvFilter;

use skirmish_server::build_app;
use skirmish_server::config::ServerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load();
    config.validate();
    let listen_addr = config.listen_addr.clone();

    let (app, state) = build_app(config);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {listen_addr}: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("Skirmish server listening on {listen_addr}");
    tracing::info!("WebSocket endpoint: ws://{listen_addr}/ws");

    // Ctrl-C: stop accepting upgrades and cancel every live session.
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    let cancelled = state.shutdown.clone();
    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancelled.cancelled().await });
    if let Err(e) = serve.await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}
