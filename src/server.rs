//! HTTP/WebSocket transport for the orchestrator.

use crate::orchestrator::Orchestrator;
use crate::protocol::Outbound;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::Request;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::future::ready;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::{debug, info, instrument, warn};

/// Builds the application router: `/ws` for play, `/health` for probes.
pub fn router(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
            debug!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
        .with_state(orchestrator)
}

/// Serves `router` on `listener` until `shutdown` fires.
///
/// # Errors
///
/// Returns the I/O error if the server fails.
#[instrument(skip_all)]
pub async fn serve(
    listener: TcpListener,
    orchestrator: Orchestrator,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Server ready");
    }
    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(orchestrator): State<Orchestrator>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(orchestrator, socket))
}

/// Splits the socket into a writer task draining the connection's channel
/// and a reader feeding text frames to the control loop.
async fn serve_socket(orchestrator: Orchestrator, socket: WebSocket) {
    let (mut sink, stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let writer = tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            let frame = match item {
                Outbound::Message(message) => match message.to_json() {
                    Ok(text) => Message::Text(text.into()),
                    Err(e) => {
                        warn!(error = %e, "Failed to encode message");
                        continue;
                    }
                },
                Outbound::Ping => Message::Ping(Bytes::new()),
            };
            if let Err(e) = sink.send(frame).await {
                debug!(error = %e, "WebSocket write failed, stopping writer");
                break;
            }
        }
    });

    let inbound = stream
        .take_while(|frame| {
            let open = match frame {
                Ok(Message::Close(_)) => false,
                Ok(_) => true,
                Err(e) => {
                    debug!(error = %e, "WebSocket read failed");
                    false
                }
            };
            ready(open)
        })
        .filter_map(|frame| {
            ready(match frame {
                Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                _ => None,
            })
        });

    orchestrator.run_connection(Box::pin(inbound), tx).await;
    writer.abort();
}
