use clap::Parser;
use data_gravity_backend::config::RelayConfig;
use data_gravity_backend::infrastructure::scratch;
use data_gravity_backend::services::analysis::{AnalysisRunner, ScriptRunner};
use data_gravity_backend::services::relay::RelayService;
use data_gravity_backend::{AppState, create_app};
use dotenvy::dotenv;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port for the HTTP server
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "data_gravity_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Data Gravity Backend...");

    let config = RelayConfig::from_env();

    // Scratch directory must exist before the first request
    let scratch_dir = scratch::init_scratch_dir(&config.scratch_dir).await?;
    if let Err(e) = scratch::sweep_stale(&scratch_dir).await {
        warn!("Stale scratch sweep failed: {:#}", e);
    }

    let runner = Arc::new(ScriptRunner::from_config(&config));
    let status = runner.status();
    info!(
        "🧪 Analysis: interpreter={} (fallback={}), script={} (present={}), timeout={}",
        status.command,
        status.fallback,
        config.script_path.display(),
        status.script_present,
        config
            .analysis_timeout_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "none".to_string())
    );
    if status.fallback {
        warn!(
            "None of {:?} exists; '{}' will be looked up on PATH",
            config.executable_candidates, status.command
        );
    }
    if !status.script_present {
        warn!(
            "Analysis script {} does not exist; /analyze will fail until it does",
            config.script_path.display()
        );
    }

    let relay = Arc::new(RelayService::new(
        scratch_dir,
        config.default_extension.clone(),
        runner,
    ));

    let state = AppState {
        relay,
        config: config.clone(),
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ Server listening on: http://{}", addr);
    info!("📖 Swagger UI documentation: http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
