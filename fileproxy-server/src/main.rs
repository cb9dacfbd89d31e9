use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fileproxy_server_lib::app::create_route;
use fileproxy_server_lib::config::FileproxyServerConfig;
use fileproxy_server_lib::logging;
use fileproxy_server_lib::setup::create_proxy;
use poem::listener::{BoxListener, Listener};
use poem::{Server, listener::TcpListener};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Authenticating caching proxy for individual files.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the proxy server (default).
    Serve,
    /// Checks whether a running server is healthy.
    HealthCheck {
        /// Base URL of the server, e.g. http://localhost:8708
        base_url: Url,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::HealthCheck { base_url } => health_check(base_url).await,
    }
}

async fn serve() -> Result<()> {
    let settings = FileproxyServerConfig::load()?;
    logging::init(settings.log_format)?;

    let proxy = Arc::new(create_proxy(&settings)?);
    let listener: BoxListener = settings
        .bind_addrs
        .iter()
        .cloned()
        .map(|addr| {
            info!("Listening on http://{addr}");
            TcpListener::bind(addr).boxed()
        })
        .reduce(|a, b| a.combine(b).boxed())
        .context("No bind addresses provided")?;
    Server::new(listener)
        .run_with_graceful_shutdown(
            create_route(proxy, settings.enable_api_docs),
            async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Shutting down server"),
                    Err(err) => {
                        warn!(error = %err, "unable to listen for shutdown signal");
                        std::future::pending::<()>().await
                    }
                }
            },
            Some(Duration::from_secs(30)),
        )
        .await?;
    Ok(())
}

async fn health_check(mut base_url: Url) -> Result<()> {
    if !base_url.path().ends_with('/') {
        base_url.set_path(&format!("{}/", base_url.path()));
    }
    let url = base_url.join("_api/health")?;
    reqwest::Client::new()
        .get(url.clone())
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .with_context(|| format!("health check of {url} failed"))?;
    println!("OK");
    Ok(())
}
