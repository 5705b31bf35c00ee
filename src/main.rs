use std::net::SocketAddr;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,code_whisper_gateway=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = code_whisper_gateway::build_state()?;
    let addr: SocketAddr = format!(
        "{}:{}",
        state.settings.listen_host, state.settings.listen_port
    )
    .parse()?;
    let app = code_whisper_gateway::build_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway listening");

    axum::serve(listener, app).await?;
    Ok(())
}
