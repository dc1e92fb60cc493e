use docboard::{
    AppState, LockedRepository, RepositoryState, Views, backends,
    config::{AppConfig, Env, UploadConfig},
    create_router,
    uploads::{DiskUploadStore, S3UploadStore, UploadState},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, connects the storage backend and
/// the upload store, then serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins over the defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "docboard=debug,tower_http=info".into());

    // Human-readable output locally, one JSON object per line in production.
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

    // 3. Storage backend, selected once. Every request goes through the same
    // locked repository, so there is never more than one writer.
    let backend = backends::connect(&config.backend)
        .await
        .expect("FATAL: Failed to initialize the storage backend. Check STORAGE_BACKEND settings.");
    let repo = Arc::new(LockedRepository::from_boxed(backend)) as RepositoryState;

    // 4. Upload store: a local directory served at /uploads, or an S3 bucket.
    // The destination is created up front so the first upload cannot fail on it.
    let uploads: UploadState = match &config.uploads {
        UploadConfig::Disk { dir } => Arc::new(DiskUploadStore::new(dir.clone(), &config.public_base_url)),
        UploadConfig::S3 { endpoint, region, access_key, secret_key, bucket } => Arc::new(
            S3UploadStore::new(endpoint, region, access_key, secret_key, bucket).await,
        ),
    };
    uploads
        .ensure_ready()
        .await
        .expect("FATAL: Upload destination is not usable.");

    // 5. Templates
    let views = Arc::new(Views::new().expect("FATAL: Failed to compile templates."));

    // 6. State and router
    let port = config.port;
    let app = create_router(AppState { repo, uploads, config, views });

    // 7. Bind and serve
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind the HTTP port.");

    tracing::info!("Listening on {}", addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui", port);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server stopped unexpectedly.");
}
