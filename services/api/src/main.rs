use anyhow::Result;
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod contact;
mod credentials;
mod error;
mod middleware;
mod models;
mod rate_limiter;
mod repositories;
mod routes;
mod session;
mod state;
mod validation;

use ngo_common::s3::S3ObjectStore;
use tokio::net::TcpListener;

use crate::{
    config::AppConfig,
    contact::{ContactService, HttpRelayMailer, Mailer},
    credentials::AdminCredentials,
    rate_limiter::RateLimiter,
    repositories::ImageRepository,
    session::SessionStore,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting NGO site API");

    let config = AppConfig::from_env()?;

    let credentials = AdminCredentials::from_config(&config)?;
    info!("Admin account configured for user: {}", credentials.username());

    let s3_config = config.s3_config();
    let store = S3ObjectStore::connect(&s3_config).await;
    info!(
        "Using bucket {} in {} ({})",
        s3_config.bucket,
        s3_config.region,
        s3_config.public_base_url()
    );

    let mailer: Option<Arc<dyn Mailer>> = match &config.contact_relay_url {
        Some(url) => {
            info!("Contact form messages relayed to {}", url);
            Some(Arc::new(HttpRelayMailer::new(
                url.clone(),
                config.contact_relay_token.clone(),
            )?))
        }
        None => None,
    };

    let app_state = AppState {
        sessions: SessionStore::new(credentials, config.session_ttl_secs),
        images: ImageRepository::new(Arc::new(store)),
        contact: ContactService::new(mailer, config.contact_recipient.clone()),
        rate_limiter: RateLimiter::new(config.rate_limiter_config()),
    };

    // Start the web server
    let app = routes::create_router(app_state, routes::cors_layer(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(
        "NGO site API listening on {} ({} mode)",
        addr, config.app_env
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("NGO site API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
