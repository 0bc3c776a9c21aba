use anyhow::Result;
use axum::{routing::get, Json, Router};
use clap::{Parser, ValueEnum};
use maa_core::{
    create_engine, default_screenshot_dir, EngineConfig, EngineKind, ScreenshotStore,
    SessionOrchestrator,
};
use maa_mcp_agent::logging::init_logging;
use maa_mcp_agent::MaaServer;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use rmcp::ServiceExt;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    Native,
    Simulated,
}

impl From<EngineArg> for EngineKind {
    fn from(value: EngineArg) -> Self {
        match value {
            EngineArg::Native => EngineKind::Native,
            EngineArg::Simulated => EngineKind::Simulated,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(name = "maa-mcp-agent")]
#[clap(about = "MCP server for Android device and desktop window automation", long_about = None)]
struct Args {
    /// Transport to serve MCP over
    #[clap(short, long, value_enum, default_value = "stdio", env = "MAA_MCP_TRANSPORT")]
    transport: Transport,

    /// Port for the HTTP transport
    #[clap(short, long, default_value = "3000", env = "MAA_MCP_PORT")]
    port: u16,

    /// Bind address for the HTTP transport
    #[clap(long, default_value = "127.0.0.1", env = "MAA_MCP_HOST")]
    host: String,

    /// Automation backend; `simulated` needs no devices or external tools
    #[clap(long, value_enum, default_value = "native", env = "MAA_MCP_ENGINE")]
    engine: EngineArg,

    /// Path to the adb executable (default: looked up on PATH)
    #[clap(long, env = "MAA_MCP_ADB_PATH")]
    adb_path: Option<PathBuf>,

    /// Timeout for a single adb invocation, in seconds
    #[clap(long, default_value = "20", env = "MAA_MCP_ADB_TIMEOUT_SECS")]
    adb_timeout_secs: u64,

    /// Path to the tesseract executable (default: looked up on PATH)
    #[clap(long, env = "MAA_MCP_TESSERACT_PATH")]
    tesseract_path: Option<PathBuf>,

    /// Timeout for a single tesseract recognition, in seconds
    #[clap(long, default_value = "30", env = "MAA_MCP_OCR_TIMEOUT_SECS")]
    ocr_timeout_secs: u64,

    /// Where screenshots are written (default: <local data dir>/maa-mcp/screenshots)
    #[clap(long, env = "MAA_MCP_SCREENSHOT_DIR")]
    screenshot_dir: Option<PathBuf>,

    /// Default log level, overridden by RUST_LOG
    #[clap(long, default_value = "info", env = "MAA_MCP_LOG_LEVEL")]
    log_level: String,

    /// Also write daily rotated logs into this directory
    #[clap(long, env = "MAA_MCP_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

async fn serve_stdio(server: MaaServer) -> Result<()> {
    let service = server.serve(rmcp::transport::stdio()).await?;
    tokio::select! {
        result = service.waiting() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }
    Ok(())
}

async fn serve_http(server: MaaServer, host: &str, port: u16) -> Result<()> {
    let engine = server.session().engine_name();
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let router = Router::new()
        .nest_service("/mcp", service)
        .route(
            "/health",
            get(move || async move { Json(json!({"status": "ok", "engine": engine})) }),
        );

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Streamable HTTP transport listening on http://{}/mcp", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down");
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args.log_level, args.log_dir.as_deref())?;

    info!(
        "Starting maa-mcp-agent {} (git {}, built {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or("unknown"),
        option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
    );

    let config = EngineConfig {
        kind: args.engine.into(),
        adb_path: args.adb_path,
        adb_timeout: Duration::from_secs(args.adb_timeout_secs),
        tesseract_path: args.tesseract_path,
        ocr_timeout: Duration::from_secs(args.ocr_timeout_secs),
    };
    let engine = create_engine(&config);
    let screenshots =
        ScreenshotStore::new(args.screenshot_dir.unwrap_or_else(default_screenshot_dir));
    let session = Arc::new(SessionOrchestrator::new(engine, screenshots));
    info!(
        "Engine: {}, screenshots in {}",
        session.engine_name(),
        session.screenshots().dir().display()
    );

    let server = MaaServer::new(session.clone());
    let result = match args.transport {
        Transport::Stdio => serve_stdio(server).await,
        Transport::Http => serve_http(server, &args.host, args.port).await,
    };
    if let Err(e) = &result {
        error!("Server error: {}", e);
    }

    let removed = session.shutdown();
    info!("Shutdown complete, removed {} screenshot(s)", removed);
    result
}
