use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use neighborly_match::config::{LoggingSettings, Settings};
use neighborly_match::routes::{self, AppState};
use neighborly_match::services::{CacheManager, MatchService, PostgresClient};
use neighborly_match::{Matcher, ZoneDirectory};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// RUST_LOG wins over the configured level
fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn io_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| io_error("Configuration error", e))?;

    init_logging(&settings.logging);
    info!("Starting Neighborly matching service...");

    let zones = match &settings.matching.zone_directory_path {
        Some(path) => {
            let zones = ZoneDirectory::load(path).map_err(|e| io_error("Zone directory error", e))?;
            info!(
                path = %path.display(),
                centroids = zones.centroids.len(),
                "Zone directory loaded"
            );
            zones
        }
        None => {
            warn!("No zone directory configured; zone-only members match within their own zone");
            ZoneDirectory::new()
        }
    };

    // Redis is optional; fall back to the in-process tier
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(3600);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let cache = match &settings.cache.redis_url {
        Some(url) => match CacheManager::new(url, l1_cache_size, cache_ttl).await {
            Ok(c) => {
                info!("Cache manager initialized (L1: {} entries, TTL: {}s, Redis enabled)", l1_cache_size, cache_ttl);
                c
            }
            Err(e) => {
                error!("Failed to connect to Redis ({}), caching in-process only", e);
                CacheManager::local(l1_cache_size, cache_ttl)
            }
        },
        None => CacheManager::local(l1_cache_size, cache_ttl),
    };

    let db_max_conn = settings.database.max_connections.unwrap_or(10);

    let postgres = PostgresClient::from_settings(
        &settings.database.url,
        Some(db_max_conn),
        settings.database.min_connections,
        settings.database.acquire_timeout_secs,
        settings.database.idle_timeout_secs,
    )
    .await
    .map_err(|e| {
        error!("Failed to connect to PostgreSQL: {}", e);
        io_error("PostgreSQL connection error", e)
    })?;

    info!("PostgreSQL client initialized (max: {} connections)", db_max_conn);

    let solver = settings.matching.solver_settings();
    info!(?solver, "Matcher initialized");

    let app_state = AppState {
        service: MatchService::new(
            Arc::new(postgres),
            Arc::new(cache),
            Arc::new(zones),
            Matcher::new(solver),
        ),
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
            .app_data(routes::json_config())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes::<PostgresClient>)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
