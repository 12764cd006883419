use clap::Parser;

use statbridge_mcp_runtime::{McpCommands, StatsArgs, run as run_mcp};

#[derive(Parser)]
#[command(
    name = "statbridge-mcp",
    version,
    about = "statbridge MCP server: statistical data tools over stdio"
)]
struct Cli {
    #[command(flatten)]
    stats: StatsArgs,

    #[command(subcommand)]
    command: McpCommands,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "statbridge=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = run_mcp(cli.stats, cli.command).await;
    std::process::exit(code);
}
