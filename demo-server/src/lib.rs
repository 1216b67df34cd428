//! A public and an internal HTTP server sharing one process, drained through a
//! [`finish::Finisher`].

pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::State, routing::get};
use finish::GracefulTask;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Settings for the public router.
#[derive(Debug, Clone)]
pub struct PublicState {
    /// How long `/hello` works before answering, to have requests in flight at shutdown.
    pub hello_delay: Duration,
}

impl Default for PublicState {
    fn default() -> Self {
        Self {
            hello_delay: Duration::from_secs(5),
        }
    }
}

async fn hello(State(state): State<Arc<PublicState>>) -> &'static str {
    tokio::time::sleep(state.hello_delay).await;
    "world\n"
}

fn trace_layer<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // turn requests into info level
    router.layer(
        TraceLayer::new_for_http()
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(tower_http::LatencyUnit::Millis),
            ),
    )
}

pub fn public_router(state: Arc<PublicState>) -> Router {
    trace_layer(Router::new().route("/hello", get(hello))).with_state(state)
}

pub fn internal_router() -> Router {
    trace_layer(Router::new().route("/status", get(|| async { "ok\n" })))
}

/// Serves `app` on `listener` until the returned task is shut down. In-flight requests
/// are allowed to finish.
pub fn serve(listener: TcpListener, app: Router) -> GracefulTask {
    GracefulTask::spawn(|token| async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
    })
}
