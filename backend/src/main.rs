use anyhow::Context;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use backend::admin::ADMIN_PASSWORD_HEADER;
use backend::config::Config;
use backend::{app, AppState};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let state = AppState::from_config(&config)
        .await
        .context("could not open puzzle store")?;

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new().allow_origin(
            origin
                .parse::<HeaderValue>()
                .context("CORS_ORIGIN is not a valid origin")?,
        ),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
    .allow_headers([CONTENT_TYPE, HeaderName::from_static(ADMIN_PASSWORD_HEADER)]);

    let app = app(state).layer(cors).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("could not bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "starting server");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
