//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared handler state from config and stores
//! - Assemble the ordered pipeline and the route table
//! - Attach the abuse guard to the message-creation route only
//! - Answer unknown paths and methods with the JSON error envelope
//! - Serve plain TCP or TLS until shutdown is signalled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request},
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::http::handlers::{self, AppState};
use crate::http::middleware::{AccessLogStage, ContentTypeStage, CorsStage, PanicRecoveryStage};
use crate::http::pipeline::{route_stage, Pipeline, PipelineBuilder, Stage};
use crate::http::request::RequestIdStage;
use crate::http::response::ApiError;
use crate::observability;
use crate::security::abuse_guard::{AbuseGuard, AbuseLimits};
use crate::security::access_control::SessionStage;
use crate::security::handshake::HandshakeValidator;
use crate::security::session::{SessionCodec, SessionCookieSettings, SessionKeyError};
use crate::store::{InMemoryMessageStore, InMemoryUserStore, MessageStore, UserStore};

/// Time in-flight TLS connections get to finish after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid session key: {0}")]
    SessionKey(#[from] SessionKeyError),
}

/// HTTP server for the mini-app backend.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a server backed by in-memory stores.
    pub fn new(config: AppConfig) -> Result<Self, ServerError> {
        Self::with_stores(
            config,
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryMessageStore::new()),
        )
    }

    pub fn with_stores(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Result<Self, ServerError> {
        let codec = SessionCodec::new(config.session.cookie_key.as_bytes())?;
        let validator = HandshakeValidator::new(&config.auth.bot_token)
            .with_dev_bypass(config.auth.allow_dev_bypass);

        let state = AppState {
            users,
            messages,
            validator: Arc::new(validator),
            codec: codec.clone(),
            cookies: SessionCookieSettings {
                name: config.session.cookie_name.clone(),
                max_age_secs: config.session.max_age_secs,
            },
        };

        let pipeline = build_pipeline(&config, codec);
        tracing::debug!(stages = ?pipeline.stage_names(), "Pipeline assembled");

        let router = build_app(&config, state, &pipeline);
        Ok(Self { router, config })
    }

    /// The fully assembled application, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTPS server draining");
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// The stages every request runs through, outermost first.
pub fn build_pipeline(config: &AppConfig, codec: SessionCodec) -> Pipeline {
    PipelineBuilder::new()
        .stage(RequestIdStage)
        .stage(AccessLogStage)
        .stage(CorsStage::new(config.cors.allowed_origins.iter().cloned()))
        .stage(PanicRecoveryStage)
        .stage(ContentTypeStage)
        .stage(SessionStage::new(
            codec,
            config.session.cookie_name.clone(),
            config.session.accept_legacy_plaintext,
        ))
        .build()
}

/// Route table wrapped in `pipeline` and the per-request tracing span.
pub fn build_app(config: &AppConfig, state: AppState, pipeline: &Pipeline) -> Router {
    let guard: Arc<dyn Stage> = Arc::new(AbuseGuard::new(
        Arc::clone(&state.messages),
        AbuseLimits::from(&config.abuse),
        config.security.max_body_size,
    ));

    let routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/telegram", post(handlers::telegram_auth))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/user/me", get(handlers::current_user))
        .route(
            "/api/message/",
            route_stage(guard, post(handlers::create_message)).get(handlers::list_messages),
        )
        .fallback(|| async { ApiError::NotFound("Not found".to_string()) })
        .method_not_allowed_fallback(|| async { ApiError::MethodNotAllowed })
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.security.max_body_size));

    pipeline.wrap(routes).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &Request<Body>| observability::tracing::request_span(req)),
    )
}
