use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use chrono::Utc;
use collab_backend::auth::JwtSecret;
use collab_backend::config::AppConfig;
use collab_backend::create_pool;
use collab_backend::handlers;
use collab_backend::services::{HttpPaymentGateway, LogNotifier, PaymentGateway};
use collab_backend::state::AppState;
use collab_backend::store::PostgresStore;
use collab_backend::upload::{MemorySink, SupabaseStorageSink, UploadSink};
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    let db = create_pool(&config.database_url)
        .await
        .expect("Failed to connect to the database");
    if config.run_migrations {
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");
        tracing::info!("Migrations applied");
    }

    let sink: Arc<dyn UploadSink> = match &config.storage {
        Some(storage) => {
            tracing::info!("Uploads go to Supabase bucket {}", storage.bucket);
            Arc::new(SupabaseStorageSink::new(
                &storage.url,
                &storage.service_key,
                &storage.bucket,
            ))
        }
        None => {
            tracing::warn!("SUPABASE_URL not set, uploads are kept in memory");
            Arc::new(MemorySink::new())
        }
    };
    let gateway = config
        .payments
        .as_ref()
        .expect("PAYMENT_GATEWAY_URL and PAYMENT_GATEWAY_KEY must be set");
    let payments: Arc<dyn PaymentGateway> =
        Arc::new(HttpPaymentGateway::new(&gateway.url, &gateway.api_key));

    let state = AppState::new(
        Arc::new(PostgresStore::new(db)),
        sink,
        payments,
        Arc::new(LogNotifier),
        config.offer_settings(),
        config.evidence_settings(),
    );

    // Periodic expiry of offers nobody answered in time.
    let sweeper = Arc::clone(&state.offers);
    let sweep_every = config.expiry_sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            match sweeper.expire_due(Utc::now()).await {
                Ok(expired) if !expired.is_empty() => {
                    tracing::info!("Expired {} offer(s)", expired.len());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Offer expiry sweep failed: {e}"),
            }
        }
    });

    let state_data = web::Data::new(state);
    let secret_data = web::Data::new(JwtSecret(config.jwt_secret.clone()));
    let json_limit = config.max_request_bytes;

    let bind_addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Server running at http://{bind_addr}");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::JsonConfig::default().limit(json_limit))
            .app_data(state_data.clone())
            .app_data(secret_data.clone())
            .service(web::scope("/api").configure(handlers::init_routes))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
