use llama_gate_server::Config;
use llama_gate_server::api;
use llama_gate_server::models::{
    ModelAccessGate, RemoteBackendClient, RemoteFailurePolicy, RequestRouter, default_native_port,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::load()?;

    // Initialize structured logging
    let level = tracing::Level::from_str(&config.server.log_level).unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    tracing::info!("🚀 Starting llama gate server");
    tracing::info!(
        "📊 Gate Configuration - Model: {}, Max Prompt: {} chars, Timeout: {}s, Max Concurrent: {}",
        config.gate.model_path,
        config.gate.max_prompt_length,
        config.gate.generation_timeout_seconds,
        config.gate.max_concurrent_generations
    );

    // LAZY LOADING: the gate starts without a model so a missing artifact
    // cannot fail startup; the first request loads it.
    let gate = Arc::new(ModelAccessGate::new(default_native_port(), &config.gate));

    let remote = Arc::new(
        RemoteBackendClient::new(&config.remote)
            .map_err(|e| anyhow::anyhow!("failed to build llama-server client: {e}"))?,
    );
    let policy = RemoteFailurePolicy::from(&config.router);
    tracing::info!(
        "🌉 Remote llama-server: {} (on remote failure: {:?})",
        remote.base_url(),
        policy
    );

    let router = Arc::new(RequestRouter::new(remote, Arc::clone(&gate), policy));
    let app = api::router(router);

    let addr = SocketAddr::new(config.server.bind_ip()?, config.server.port);
    tracing::info!("🌐 Server starting on http://{}", addr);
    tracing::info!("📡 Available endpoints:");
    tracing::info!("  • POST /generate - Text generation (JSON body)");
    tracing::info!("  • GET  /generate?prompt=... - Text generation");
    tracing::info!("  • GET  /status - Backend and model status");
    tracing::info!("  • POST /reload - Unload model, reload on next request");
    tracing::info!("  • GET  /health - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    tracing::info!("✅ Server ready and accepting requests");

    let result = server.await;

    // CLEANUP: release the native model exactly once at service stop
    gate.shutdown().await;

    if let Err(e) = result {
        tracing::error!("❌ Server error: {}", e);
        return Err(e.into());
    }

    tracing::info!("👋 Server shutdown complete");
    Ok(())
}

// RELIABILITY: Multi-Platform Shutdown Signal Handling
// Handles both interactive (Ctrl+C) and system (SIGTERM) shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    // Windows doesn't support SIGTERM, use pending future
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("🛑 Shutdown signal received");
}
