use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use statbridge_mcp_runtime::{MCP_SERVER_NAME, StatsArgs, build_server};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod middleware;
mod routes;
mod session;
mod state;

#[derive(Parser)]
#[command(
    name = "statbridge-api",
    version,
    about = "statbridge MCP server over HTTP and server-sent events"
)]
struct Cli {
    #[command(flatten)]
    stats: StatsArgs,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "STATBRIDGE_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Comma-separated allowed CORS origins, or `*` for any
    #[arg(long, env = "STATBRIDGE_CORS_ORIGINS", default_value = "*")]
    cors_origins: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "statbridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let server = match build_server(&cli.stats) {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(event = "mcp_startup_error", error = %err, "failed to build MCP server");
            std::process::exit(1);
        }
    };
    let tools = server.registry().definitions().len();
    let app_state = state::AppState::new(server);
    let sessions = app_state.sessions.clone();

    let app = routes::router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer(&cli.cors_origins)),
        )
        .with_state(app_state);

    let addr = SocketAddr::new(cli.bind, cli.port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(event = "bind_failed", %addr, error = %err, "failed to bind listener");
            std::process::exit(1);
        }
    };
    tracing::info!(
        event = "mcp_http_started",
        server = MCP_SERVER_NAME,
        version = env!("CARGO_PKG_VERSION"),
        api_url = %cli.stats.api_url,
        tools,
        %addr,
        "statbridge API listening"
    );

    let shutdown = async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        let closed = sessions.close_all();
        tracing::info!(event = "shutdown", closed_sessions = closed, "shutting down");
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!(event = "server_error", error = %err, "server terminated");
        std::process::exit(1);
    }
}
