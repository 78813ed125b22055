//! Kaizen admin - content administration for a martial-arts club website

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kaizen_admin::{
    api::{self, AppState},
    auth::FirebaseIdentityProvider,
    cloudinary::CloudinaryClient,
    config::Config,
    db,
};

/// How often expired sessions and stale rate-limit entries are swept
const CLEANUP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kaizen_admin=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Kaizen admin...");

    let config_path = std::env::var("KAIZEN_CONFIG").unwrap_or_else(|_| "config.yml".to_string());
    let config = Config::load_with_env(Path::new(&config_path))?;
    tracing::info!("Configuration loaded from {}", config_path);

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    if !config.cloudinary.is_configured() {
        tracing::warn!("Image host is not configured; uploads will fail");
    }
    let host = CloudinaryClient::shared(config.cloudinary.clone());

    let provider = FirebaseIdentityProvider::from_config(&config.auth.provider);
    if config.auth.provider.enabled {
        tracing::info!("Identity provider sign-in enabled");
    }

    let state = AppState::new(&config, pool, host, provider);

    if let Some(bootstrap) = &config.auth.bootstrap_user {
        if state.credentials.ensure_bootstrap_user(bootstrap).await? {
            tracing::info!("Created bootstrap user {}", bootstrap.username);
        }
    }
    if state.credentials.count().await? == 0 {
        tracing::warn!("No staff accounts exist; create one with the create-user binary");
    }

    // Sweep expired sessions and rate-limit windows (every 5 minutes)
    {
        let auth = state.auth.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                if let Err(e) = auth.cleanup().await {
                    tracing::warn!("Auth cleanup failed: {}", e);
                }
            }
        });
    }

    let app = api::build_router(state, &config);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
