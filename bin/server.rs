// Loan Portfolio - Web Server
// Owner uploads the three exports; anyone can download the latest extract.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use loan_portfolio::logging::init_logging;
use loan_portfolio::{
    encode, load_table_bytes, ExtractFormat, ExtractStore, PipelineError, PipelineReport, PortfolioConfig,
    PortfolioPipeline,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Uploads larger than this are rejected before reaching a handler
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Multipart field names for the three exports
const LOAN_FIELD: &str = "loan_file";
const ARC_FIELD: &str = "arc_file";
const LMS_FIELD: &str = "lms_file";

/// Shared application state
#[derive(Clone)]
struct AppState {
    config: Arc<PortfolioConfig>,
    store: Arc<ExtractStore>,
    pipeline: Arc<PortfolioPipeline>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::err(message))).into_response()
}

#[derive(Deserialize)]
struct OwnerQuery {
    owner: Option<String>,
}

#[derive(Serialize)]
struct ProcessResponse {
    file_name: String,
    report: PipelineReport,
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Why a processing request failed, mapped to a status code
enum ProcessFailure {
    Input(anyhow::Error),
    Pipeline(PipelineError),
    Storage(anyhow::Error),
}

impl IntoResponse for ProcessFailure {
    fn into_response(self) -> Response {
        match self {
            ProcessFailure::Input(e) => error_response(StatusCode::BAD_REQUEST, format!("{:#}", e)),
            ProcessFailure::Pipeline(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ProcessFailure::Storage(e) => {
                error!("Error saving extract: {:#}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save processed file")
            }
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/process?owner=<token> - Upload the three exports and build the extract
async fn process_files(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
    mut multipart: Multipart,
) -> Response {
    if !state.config.is_owner(query.owner.as_deref()) {
        warn!("process request rejected: owner token mismatch");
        return error_response(StatusCode::FORBIDDEN, "Owner token required");
    }

    let (mut loan, mut arc, mut lms) = (None, None, None);
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e)),
        };

        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Failed to read '{}': {}", name, e)),
        };

        let slot = match name.as_str() {
            LOAN_FIELD => &mut loan,
            ARC_FIELD => &mut arc,
            LMS_FIELD => &mut lms,
            _ => continue,
        };
        *slot = Some(Upload { file_name, bytes });
    }

    let (loan, arc, lms) = match (loan, arc, lms) {
        (Some(loan), Some(arc), Some(lms)) => (loan, arc, lms),
        (loan, arc, _) => {
            let missing = if loan.is_none() {
                LOAN_FIELD
            } else if arc.is_none() {
                ARC_FIELD
            } else {
                LMS_FIELD
            };
            return error_response(StatusCode::BAD_REQUEST, format!("Missing upload field '{}'", missing));
        }
    };

    let task_state = state.clone();
    let outcome = tokio::task::spawn_blocking(move || run_upload(&task_state, loan, arc, lms)).await;

    match outcome {
        Ok(Ok(response)) => {
            info!(file = %response.file_name, "{}", response.report.summary());
            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Ok(Err(failure)) => failure.into_response(),
        Err(e) => {
            error!("Processing task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Processing task failed")
        }
    }
}

/// Decode, run, encode and store; runs on the blocking pool
fn run_upload(state: &AppState, loan: Upload, arc: Upload, lms: Upload) -> Result<ProcessResponse, ProcessFailure> {
    let decode = |label: &str, upload: Upload| {
        load_table_bytes(&upload.file_name, upload.bytes)
            .map_err(|e| ProcessFailure::Input(e.context(format!("{} could not be read", label))))
    };

    let loans = decode("Loan Portfolio file", loan)?;
    let arc = decode("ARC Finance file", arc)?;
    let ledger = decode("LMS053 Voucher MIS file", lms)?;

    let output = state
        .pipeline
        .run(&loans, &arc, &ledger)
        .map_err(ProcessFailure::Pipeline)?;

    let bytes = encode(&output.table, ExtractFormat::Xlsx, &state.config.sheet_name).map_err(ProcessFailure::Storage)?;
    let path = state
        .store
        .save(&bytes, ExtractFormat::Xlsx)
        .map_err(ProcessFailure::Storage)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    Ok(ProcessResponse {
        file_name,
        report: output.report,
    })
}

/// GET /api/latest - Download the most recent extract
async fn download_latest(State(state): State<AppState>) -> Response {
    let latest = match state.store.latest() {
        Ok(Some(path)) => path,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "No file has been uploaded yet."),
        Err(e) => {
            error!("Error listing extracts: {:#}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list extracts");
        }
    };

    let bytes = match tokio::fs::read(&latest).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Error reading {}: {}", latest.display(), e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read latest file");
        }
    };

    let file_name = latest
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("Loan_Portfolio.xlsx")
        .to_string();
    let content_type = ExtractFormat::from_path(&latest)
        .map(|format| format.mime_type())
        .unwrap_or("application/octet-stream")
        .to_string();
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&file_name)
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    println!("🌐 Loan Portfolio - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config_path = std::env::var_os("LOAN_PORTFOLIO_CONFIG").map(std::path::PathBuf::from);
    let config = PortfolioConfig::load(config_path.as_deref())?;

    if config.owner_token.is_none() {
        println!("⚠️  No owner token configured - uploads are disabled");
        println!("   Set LOAN_PORTFOLIO_OWNER_TOKEN to enable /api/process");
    }
    let store = ExtractStore::from_config(&config);
    println!("✓ Output directory: {}", store.dir().display());

    let state = AppState {
        store: Arc::new(store),
        pipeline: Arc::new(PortfolioPipeline::new()),
        config: Arc::new(config),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/process", post(process_files))
        .route("/latest", get(download_latest))
        .with_state(state.clone());

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive());

    let addr = state.config.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   Upload:   POST /api/process?owner=<token>");
    println!("   Download: GET  /api/latest");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}
