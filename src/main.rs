mod config;
mod core;
mod models;
mod routes;
mod services;

use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use config::Settings;
use core::{InvitationManager, MatchManager, SwipeLedger, ViewingEngine};
use models::ScoringWeights;
use routes::engine::AppState;
use services::{EngineStore, EventBus, MemoryStore, PostgresStore, ProfileClient};
use std::sync::Arc;
use tracing::{error, info};

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .content_type("application/json")
            .body(serde_json::to_string(self).unwrap())
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting Roomio matching engine...");

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        panic!("Configuration error: {}", e);
    });

    info!("Configuration loaded successfully");

    // Select the store: PostgreSQL when configured, in-memory otherwise
    let store: Arc<dyn EngineStore> = match settings.database.url.as_deref() {
        Some(url) if !url.is_empty() => {
            let postgres = PostgresStore::from_settings(
                url,
                settings.database.max_connections,
                settings.database.min_connections,
            )
            .await
            .unwrap_or_else(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                panic!("PostgreSQL connection error: {}", e);
            });
            info!("PostgreSQL store initialized");
            Arc::new(postgres)
        }
        _ => {
            info!("No database configured, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    // Profile directory client
    let directory = Arc::new(ProfileClient::new(
        settings.directory.endpoint,
        settings.directory.api_key,
    ));

    info!("Profile directory client initialized");

    // Domain events: drain into structured logs until a notification
    // consumer takes over the receiver
    let (events, mut event_rx) = EventBus::channel();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            info!(event = ?event, "domain event");
        }
    });

    // Build the engine with configured weights
    let weights = ScoringWeights {
        cleanliness: settings.scoring.weights.cleanliness,
        sleep: settings.scoring.weights.sleep,
        noise: settings.scoring.weights.noise,
        guests: settings.scoring.weights.guests,
        smoking: settings.scoring.weights.smoking,
        pets: settings.scoring.weights.pets,
        dietary: settings.scoring.weights.dietary,
        hobbies: settings.scoring.weights.hobbies,
        languages: settings.scoring.weights.languages,
        budget: settings.scoring.weights.budget,
        neighborhood: settings.scoring.weights.neighborhood,
    };

    let score_cache_size = settings.cache.score_cache_size.unwrap_or(10_000);
    let score_ttl_secs = settings.cache.score_ttl_secs.unwrap_or(300);
    let invitation_ttl_days = settings.matching.invitation_ttl_days.unwrap_or(7);

    let matches = Arc::new(MatchManager::new(
        store.clone(),
        directory.clone(),
        weights,
        score_cache_size,
        score_ttl_secs,
        events.clone(),
    ));
    let ledger = Arc::new(SwipeLedger::new(
        store.clone(),
        directory.clone(),
        matches.clone(),
    ));
    let invitations = Arc::new(InvitationManager::new(
        store.clone(),
        directory.clone(),
        matches.clone(),
        invitation_ttl_days,
    ));
    let viewings = Arc::new(ViewingEngine::new(store.clone(), events));

    info!(
        "Engine initialized (invitation TTL: {} days, score cache: {} entries)",
        invitation_ttl_days, score_cache_size
    );

    // Build application state
    let app_state = AppState {
        store,
        ledger,
        matches,
        invitations,
        viewings,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
