//! Webhook HTTP server.
//!
//! `POST /webhook` acknowledges a delivery right away and processes it in
//! the background, so slow platform calls never hit GitHub's delivery
//! timeout. `GET /health` answers `OK`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::adapters::webhook::payloads::{parse_event, WebhookEvent};
use crate::domain::models::ServerConfig;
use crate::domain::ports::{ProgressRepository, RepositoryPlatform};
use crate::services::command_router::CommandRouter;

/// Configuration for the webhook server.
#[derive(Debug, Clone)]
pub struct WebhookServerConfig {
    pub host: String,
    pub port: u16,
}

impl From<&ServerConfig> for WebhookServerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub delivery: String,
    pub event: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

struct AppState<R: ProgressRepository, P: RepositoryPlatform> {
    router: Arc<CommandRouter<R, P>>,
}

pub struct WebhookServer<R: ProgressRepository + 'static, P: RepositoryPlatform + 'static> {
    config: WebhookServerConfig,
    router: Arc<CommandRouter<R, P>>,
}

impl<R: ProgressRepository + 'static, P: RepositoryPlatform + 'static> WebhookServer<R, P> {
    pub fn new(router: Arc<CommandRouter<R, P>>, config: WebhookServerConfig) -> Self {
        Self { config, router }
    }

    fn build_router(self) -> Router {
        let state = Arc::new(AppState { router: self.router });

        Router::new()
            .route("/webhook", post(receive_webhook::<R, P>))
            .route("/health", get(health_check))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = self.build_router();

        tracing::info!("Webhook server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Route a decoded delivery to the command router.
pub async fn dispatch<R: ProgressRepository, P: RepositoryPlatform>(router: &CommandRouter<R, P>, event: WebhookEvent) {
    match event {
        WebhookEvent::IssueOpened { origin, sender } => {
            router.handle_issue_opened(&origin, &sender).await;
        }
        WebhookEvent::CommentCreated { origin, sender, body } => {
            router.handle_comment(&origin, &sender, &body).await;
        }
        WebhookEvent::Ignored(what) => tracing::debug!(event = %what, "ignoring delivery"),
    }
}

async fn health_check() -> &'static str {
    "OK"
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn receive_webhook<R: ProgressRepository + 'static, P: RepositoryPlatform + 'static>(
    State(state): State<Arc<AppState<R, P>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAck>), (StatusCode, Json<ErrorResponse>)> {
    let Some(event_name) = header(&headers, "X-GitHub-Event").map(str::to_string) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "missing X-GitHub-Event header".to_string(),
                code: "MISSING_EVENT".to_string(),
            }),
        ));
    };
    let delivery = header(&headers, "X-GitHub-Delivery")
        .and_then(|d| Uuid::parse_str(d).ok())
        .unwrap_or_else(Uuid::new_v4);

    let event = parse_event(&event_name, &body).map_err(|e| {
        tracing::warn!(%delivery, event = %event_name, error = %e, "malformed delivery");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
                code: "INVALID_PAYLOAD".to_string(),
            }),
        )
    })?;

    let span = tracing::info_span!("webhook", %delivery, event = %event_name);
    let router = Arc::clone(&state.router);
    tokio::spawn(async move { dispatch(&router, event).await }.instrument(span));

    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookAck {
            delivery: delivery.to_string(),
            event: event_name,
        }),
    ))
}
