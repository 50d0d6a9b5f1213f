//! pangbank-api: read-only HTTP API over the PangBank store.

mod handlers;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::OpenApi;

use pangbank_core::defaults;
use pangbank_core::telemetry::{init_tracing, Console};
use pangbank_db::{log_pool_metrics, Database, PoolConfig};

use handlers::{collections, genomes, pangenomes};

/// Shared state of every handler.
#[derive(Clone)]
struct AppState {
    db: Database,
    /// Base directory for relative pangenome artifact paths.
    data_dir: PathBuf,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PangBank API",
        description = "Collections of pangenomes with their genomes, metrics and taxonomies"
    ),
    paths(
        collections::list_collections,
        collections::get_collection,
        genomes::list_genomes,
        genomes::get_genome,
        pangenomes::list_pangenomes,
        pangenomes::count_pangenomes,
        pangenomes::get_pangenome,
        pangenomes::list_pangenome_genomes,
        pangenomes::download_pangenome_file,
    ),
    components(schemas(
        pangbank_core::Collection,
        pangbank_core::CollectionRelease,
        pangbank_core::CollectionReleaseSummary,
        pangbank_core::CollectionWithReleases,
        pangbank_core::Genome,
        pangbank_core::GenomeWithTaxonomies,
        pangbank_core::GenomeInPangenome,
        pangbank_core::GenomeMetrics,
        pangbank_core::GenomeMetadataSource,
        pangbank_core::MetadataEntry,
        pangbank_core::Pangenome,
        pangbank_core::PangenomeMetrics,
        pangbank_core::PangenomeSummary,
        pangbank_core::PartitionMetrics,
        pangbank_core::Taxon,
        pangbank_core::Taxonomy,
        pangbank_core::TaxonomySource,
    )),
    tags(
        (name = "Collections", description = "Collections and their releases"),
        (name = "Genomes", description = "Genomes and their taxonomies"),
        (name = "Pangenomes", description = "Pangenomes, members and artifacts")
    )
)]
struct ApiDoc;

// =============================================================================
// ERRORS
// =============================================================================

/// Handler error, rendered as `{"error": message}`.
#[derive(Debug)]
enum ApiError {
    Database(pangbank_core::Error),
    NotFound(String),
    BadRequest(String),
}

impl From<pangbank_core::Error> for ApiError {
    fn from(err: pangbank_core::Error) -> Self {
        match err {
            pangbank_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            pangbank_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Database(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => {
                warn!(subsystem = "api", error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// ROUTES
// =============================================================================

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi_json))
        .route("/api/v1/collections", get(collections::list_collections))
        .route("/api/v1/collections/:id", get(collections::get_collection))
        .route("/api/v1/genomes", get(genomes::list_genomes))
        .route("/api/v1/genomes/:id", get(genomes::get_genome))
        .route("/api/v1/pangenomes", get(pangenomes::list_pangenomes))
        .route(
            "/api/v1/pangenomes/count",
            get(pangenomes::count_pangenomes),
        )
        .route("/api/v1/pangenomes/:id", get(pangenomes::get_pangenome))
        .route(
            "/api/v1/pangenomes/:id/genomes",
            get(pangenomes::list_pangenome_genomes),
        )
        .route(
            "/api/v1/pangenomes/:id/file",
            get(pangenomes::download_pangenome_file),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS]),
        )
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(state.db.pool()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "database": "ok",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => {
            warn!(subsystem = "api", error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "database": e.to_string(),
                    "version": env!("CARGO_PKG_VERSION"),
                })),
            )
        }
    }
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let _log_guard = init_tracing(
        "pangbank_api=debug,pangbank_db=info,tower_http=debug",
        Console::Stdout,
    );

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DATABASE_URL.to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| defaults::SERVER_HOST.to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);
    let data_dir = std::env::var("PANGBANK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let migrate_on_startup = std::env::var("MIGRATE_ON_STARTUP")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!("Connecting to database...");
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
    log_pool_metrics(db.pool());
    info!("Database connected");

    if migrate_on_startup {
        info!("Running database migrations...");
        db.migrate().await?;
        info!("Database migrations complete");
    }

    let state = AppState { db, data_dir };
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(data_dir = %state.data_dir.display(), "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    /// State over a pool that never connects; only requests rejected before
    /// any query can be served.
    fn offline_state() -> AppState {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(defaults::DATABASE_URL)
            .unwrap();
        AppState {
            db: Database::new(pool),
            data_dir: PathBuf::from("."),
        }
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app(offline_state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                pangbank_core::Error::NotFound("x".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                pangbank_core::Error::InvalidInput("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                pangbank_core::Error::InvalidVersion("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_limit_out_of_range_is_bad_request() {
        let (status, body) = get_json("/api/v1/genomes?limit=500").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn test_short_taxon_name_is_bad_request() {
        let (status, body) = get_json("/api/v1/pangenomes?taxon_name=ab&substring_match=true").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("taxon_name"));
    }

    #[tokio::test]
    async fn test_negative_member_offset_is_bad_request() {
        let (status, _) = get_json(
            "/api/v1/pangenomes/0190a7d2-0000-7000-8000-000000000001/genomes?offset=-1",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_metadata_value_without_key_is_bad_request() {
        let (status, body) = get_json(
            "/api/v1/pangenomes/0190a7d2-0000-7000-8000-000000000001/genomes?metadata_value=human",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("metadata_key"));
    }

    #[tokio::test]
    async fn test_count_validates_taxon_filter() {
        let (status, body) = get_json("/api/v1/pangenomes/count?taxon_name=ab").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("taxon_name"));
    }

    #[tokio::test]
    async fn test_malformed_id_is_rejected() {
        let (status, _) = get_json("/api/v1/pangenomes/not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_openapi_document_lists_routes() {
        let (status, doc) = get_json("/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        let paths = doc["paths"].as_object().unwrap();
        assert!(paths.contains_key("/api/v1/collections"));
        assert!(paths.contains_key("/api/v1/pangenomes/{id}/file"));
        assert!(paths.contains_key("/api/v1/pangenomes/count"));
        let schemas = doc["components"]["schemas"].as_object().unwrap();
        assert!(schemas.contains_key("MetadataEntry"));
    }
}
