mod handlers;
mod router;

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::core::config::AppConfig;
use crate::core::llm::ProviderFactory;

pub use router::build_api_router;

/// Shared by every handler. Holds no per-generation state.
#[derive(Clone)]
pub struct AppState {
    pub(crate) providers: Arc<dyn ProviderFactory>,
    pub(crate) config: Arc<AppConfig>,
    pub(crate) model: String,
    pub(crate) log_tx: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(
        providers: Arc<dyn ProviderFactory>,
        config: AppConfig,
        log_tx: broadcast::Sender<String>,
    ) -> Result<Self> {
        let model = config
            .llm
            .model
            .clone()
            .or_else(|| providers.default_model())
            .ok_or_else(|| {
                anyhow!(
                    "No model configured for provider '{}'; set llm.model",
                    config.llm.provider
                )
            })?;
        Ok(Self {
            providers,
            config: Arc::new(config),
            model,
            log_tx,
        })
    }
}

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(log) => Ok(Event::default().data(log)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Sse::new(stream)
}

/// Binds `server.host:server.port` and serves until `shutdown` resolves.
pub async fn serve<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    info!(
        "API Server running at http://{} (provider={}, model={})",
        addr, state.config.llm.provider, state.model
    );
    let app = build_api_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server stopped unexpectedly")?;
    info!("API Server shut down");
    Ok(())
}
