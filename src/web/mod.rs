//! Web layer module
//!
//! HTTP interface of the APOD proxy: the page route, cached media, embedded
//! static assets and a health probe, wrapped in logging, rate limiting and
//! security header middleware.
//!
//! # Routes
//!
//! - `GET /` and `GET /?date=YYYY-MM-DD`: the rendered APOD page (rate limited)
//! - `GET /media/{file}`: media files from the cache directory
//! - `GET /static/{*path}`, `GET /favicon.ico`: embedded assets
//! - `GET /_health`: liveness probe

use anyhow::{Context, Result};
use axum::{Router, middleware::from_fn, middleware::from_fn_with_state, routing::get};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::Config;
use crate::media_assets::HttpMediaFetcher;
use crate::services::{ApodCacheStore, ApodService, RateLimiter};
use crate::sources::NasaApodClient;

pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use extractors::RequestContext;
pub use middleware::SecurityHeaders;

/// Grace period for in-flight requests on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub apod_service: ApodService,
    pub rate_limiter: RateLimiter,
    pub security_headers: Arc<SecurityHeaders>,
}

impl AppState {
    /// Wire the production pipeline: NASA client, HTTP media fetcher and the
    /// on-disk cache at `storage.cache_path`
    pub fn from_config(config: Config) -> Result<Self> {
        let source = NasaApodClient::new(&config.apod)?;
        let fetcher = HttpMediaFetcher::new(&config.apod)?;
        let cache = ApodCacheStore::new(config.storage.cache_path.clone());
        let apod_service = ApodService::new(Arc::new(source), Arc::new(fetcher), cache);

        Self::new(config, apod_service)
    }

    pub fn new(config: Config, apod_service: ApodService) -> Result<Self> {
        let security_headers = SecurityHeaders::from_config(&config)?;
        let rate_limiter = RateLimiter::new(config.rate_limit.clone());

        Ok(Self {
            config: Arc::new(config),
            apod_service,
            rate_limiter,
            security_headers: Arc::new(security_headers),
        })
    }
}

/// Build the router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let media_dir = state.apod_service.cache().media_dir().to_path_buf();

    // Only the page route reaches the pipeline, so only it is rate limited
    let pages = Router::new()
        .route("/", get(handlers::index::index))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ));

    Router::new()
        .merge(pages)
        .route("/_health", get(handlers::health::health_check))
        .route(
            "/static/{*path}",
            get(handlers::static_assets::serve_static_asset),
        )
        .route("/favicon.ico", get(handlers::static_assets::serve_favicon))
        .nest_service("/media", ServeDir::new(media_dir))
        // Outermost first: logging sees the final status and headers
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(middleware::request_logging_middleware))
                .layer(from_fn_with_state(
                    state.clone(),
                    middleware::security_headers_middleware,
                )),
        )
        .with_state(state)
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
    tls: Option<(PathBuf, PathBuf)>,
}

impl WebServer {
    pub fn new(state: AppState) -> Result<Self> {
        let config = state.config.clone();
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port)
            .parse()
            .with_context(|| {
                format!("Invalid listen address {}:{}", config.web.host, config.web.port)
            })?;
        let tls = config
            .web
            .tls
            .as_ref()
            .map(|tls| (tls.cert_path.clone(), tls.key_path.clone()));

        Ok(Self {
            app: create_app(state),
            addr,
            tls,
        })
    }

    /// Serve until SIGTERM/SIGINT, over TLS when certificate paths are set
    pub async fn serve(self) -> Result<()> {
        let service = self
            .app
            .into_make_service_with_connect_info::<SocketAddr>();

        match self.tls {
            Some((cert_path, key_path)) => {
                // Both rustls backends may be linked; pick one explicitly
                let _ = rustls::crypto::ring::default_provider().install_default();

                let tls_config =
                    axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert_path, &key_path)
                        .await
                        .with_context(|| {
                            format!(
                                "Failed to load TLS certificate {} / key {}",
                                cert_path.display(),
                                key_path.display()
                            )
                        })?;

                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    shutdown_signal().await;
                    shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
                });

                info!("Listening on https://{}", self.addr);
                axum_server::bind_rustls(self.addr, tls_config)
                    .handle(handle)
                    .serve(service)
                    .await?;
            }
            None => {
                let listener = tokio::net::TcpListener::bind(&self.addr)
                    .await
                    .with_context(|| format!("Failed to bind to {}", self.addr))?;

                info!("Listening on http://{}", self.addr);
                axum::serve(listener, service)
                    .with_graceful_shutdown(shutdown_signal())
                    .await?;
            }
        }

        info!("Web server stopped");
        Ok(())
    }

    /// Get the host address
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                    _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
                }
            }
            _ => {
                tracing::warn!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down gracefully");
    }
}
