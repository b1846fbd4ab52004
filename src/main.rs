use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use nfe_audit_rust::api::{self, AppState};
use nfe_audit_rust::llm::{GeminiEngine, ReasoningEngine};
use nfe_audit_rust::{AgentService, AppConfig};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

/// Uploaded ZIP archives are small tabular exports; cap the body well above
/// the axum default.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging initialized exactly once, ambient everywhere else
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    let engine: Option<Arc<dyn ReasoningEngine>> = match &config.llm.api_key {
        Some(key) => {
            let engine = GeminiEngine::new(key.clone(), config.llm.model.clone());
            info!("Reasoning engine ready: Gemini model {}", engine.model_name());
            Some(Arc::new(engine))
        }
        None => {
            warn!("GOOGLE_API_KEY not set; questions will be refused");
            None
        }
    };
    let agent = Arc::new(AgentService::new(engine));
    let state = AppState::new(agent);

    let app = Router::new()
        .route("/health", get(api::health_check))
        .route("/api/upload", post(api::upload_archive))
        .route("/api/ask", post(api::ask))
        .route("/api/clear", post(api::clear_session))
        .layer(ServiceBuilder::new().layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)))
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/upload  - upload a ZIP with the two NF-e datasets");
    info!("  POST /api/ask     - ask a question about the uploaded data");
    info!("  POST /api/clear   - discard the session and its files");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
