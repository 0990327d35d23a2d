//! HEXON PDF Server
//!
//! Accepts multipart uploads and runs the document-assembly core on them:
//!
//! - Merge, split and structural compression of PDFs
//! - Image-to-PDF
//! - Office document conversion (when a LibreOffice binary is configured)
//!
//! Produced PDFs are written to the output directory and served back under
//! `/uploads/<name>`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use hexon_core::{DocumentConverter, OfficeConverter, UnavailableConverter};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
mod storage;
mod upload;

use api::{
    handle_compress, handle_doc_to_pdf, handle_excel_to_pdf, handle_extract_images,
    handle_health, handle_html_to_pdf, handle_image_to_pdf, handle_merge,
    handle_powerpoint_to_pdf, handle_root, handle_split,
};
use storage::{ArtifactStore, PUBLIC_PREFIX};

/// Command-line arguments for the HEXON server
#[derive(Parser, Debug)]
#[command(name = "hexon-server")]
#[command(about = "HEXON PDF server: merge, split, compress and convert")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "HEXON_PORT", default_value = "5000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HEXON_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory for produced PDFs
    #[arg(long, env = "HEXON_OUTPUT_DIR", default_value = "uploads")]
    output_dir: PathBuf,

    /// Per-request processing timeout in milliseconds
    #[arg(long, env = "HEXON_TIMEOUT_MS", default_value = "30000")]
    timeout_ms: u64,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "HEXON_RATE_LIMIT", default_value = "10")]
    rate_limit: u32,

    /// Maximum request body size in megabytes
    #[arg(long, env = "HEXON_MAX_UPLOAD_MB", default_value = "50")]
    max_upload_mb: usize,

    /// LibreOffice binary used for office conversions
    #[arg(long, env = "HEXON_SOFFICE")]
    soffice: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, env = "HEXON_VERBOSE")]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Processing timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum request body size in bytes
    pub max_upload_bytes: usize,
    pub store: ArtifactStore,
    pub converter: Arc<dyn DocumentConverter>,
}

/// Routes and per-request middleware, without rate limiting
pub fn app(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let artifacts = ServeDir::new(state.store.dir());

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        // Document operations
        .route("/merge", post(handle_merge))
        .route("/split-pdf", post(handle_split))
        .route("/compress-pdf", post(handle_compress))
        .route("/image-to-pdf", post(handle_image_to_pdf))
        .route("/extract-images", post(handle_extract_images))
        // Conversions
        .route("/doc-to-pdf", post(handle_doc_to_pdf))
        .route("/excel-to-pdf", post(handle_excel_to_pdf))
        .route("/powerpoint-to-pdf", post(handle_powerpoint_to_pdf))
        .route("/html-to-pdf", post(handle_html_to_pdf))
        // Produced artifacts
        .nest_service(PUBLIC_PREFIX, artifacts)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting HEXON server on {}:{}", args.host, args.port);

    // Create rate limiter configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.max(1).into())
            .burst_size(args.rate_limit.max(1) * 2)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to create rate limiter config"))?,
    );

    let store = ArtifactStore::open(&args.output_dir)?;

    let converter: Arc<dyn DocumentConverter> = match &args.soffice {
        Some(binary) => {
            let office = OfficeConverter::new(binary);
            info!("Office conversion via {}", office.binary().display());
            Arc::new(office)
        }
        None => {
            info!("Office conversion disabled (no --soffice)");
            Arc::new(UnavailableConverter)
        }
    };

    // Create shared state
    let state = AppState {
        timeout_ms: args.timeout_ms,
        max_upload_bytes: args.max_upload_mb * 1024 * 1024,
        store,
        converter,
    };

    let app = app(state).layer(GovernorLayer {
        config: governor_conf,
    });

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Artifacts stored in {}", args.output_dir.display());
    info!("Rate limit: {} requests/second per IP", args.rate_limit);
    info!("Processing timeout: {}ms", args.timeout_ms);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
