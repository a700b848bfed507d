use gazette::{
    AppState,
    auth::ensure_superadmin,
    config::{AppConfig, BlobBackend, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{BlobState, PostgresBlobStore, S3BlobStore},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, connects and migrates the
/// database, selects the blob backend, bootstraps the superadmin and serves.
/// Any failure during startup is fatal.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: pretty locally, JSON for log aggregation in production.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gazette=debug,tower_http=info,axum=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Database migrations failed.");
    tracing::info!("Database migrations applied.");

    let repo = Arc::new(PostgresRepository::new(pool.clone())) as RepositoryState;

    // 4. Blob storage
    let blobs: BlobState = match &config.blob_backend {
        BlobBackend::Database => Arc::new(PostgresBlobStore::new(pool)),
        BlobBackend::S3(s3) => {
            tracing::info!(endpoint = %s3.endpoint, bucket = %s3.bucket, "Using S3 blob storage.");
            Arc::new(S3BlobStore::new(s3))
        }
    };
    blobs
        .prepare()
        .await
        .expect("FATAL: Blob storage could not be prepared.");

    // 5. Superadmin bootstrap
    if let Some(admin) = &config.superadmin {
        ensure_superadmin(&repo, admin)
            .await
            .expect("FATAL: Could not provision the superadmin account.");
    }

    // 6. Router and server
    let port = config.port;
    let public_url = config.public_url.clone();
    let app = create_router(AppState {
        repo,
        blobs,
        config,
    });

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("FATAL: Could not bind the HTTP port.");

    tracing::info!("Listening on 0.0.0.0:{port}");
    tracing::info!("API Documentation (Swagger UI) available at: {public_url}/swagger-ui");

    axum::serve(listener, app).await.expect("FATAL: HTTP server error.");
}
