use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qbo_gateway::cli::{self, Cli, Commands};
use qbo_gateway::config::{self, Config};
use qbo_gateway::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before config, so --help works without credentials.
    let args = Cli::parse();

    // Export spans over OTLP only when a collector endpoint is configured.
    use opentelemetry::KeyValue;

    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "qbo-gateway"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "qbo_gateway=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;

    let result = match args.command {
        Some(Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(Commands::Refresh) => refresh_once(cfg).await,
        Some(Commands::Status) => print_status(cfg).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    tracing::info!(
        policy = %cfg.refresh_policy,
        validate_state = cfg.validate_state,
        api = %cfg.api_base_url,
        "Initializing QuickBooks gateway"
    );
    let public_url = cfg.public_base_url();
    let state = Arc::new(AppState::new(cfg).await?);

    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("Server running at http://localhost:{}", port);
    tracing::info!("Available at your primary URL {}", public_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn refresh_once(cfg: Config) -> anyhow::Result<()> {
    let state = AppState::new(cfg).await?;
    println!("{}", cli::refresh_report(&state).await?);
    Ok(())
}

async fn print_status(cfg: Config) -> anyhow::Result<()> {
    let state = AppState::new(cfg).await?;
    println!("{}", cli::status_report(&state).await?);
    Ok(())
}
