//! MCP push and pull endpoint handlers.
//!
//! ## Endpoints
//!
//! - `GET /mcp` - Open the SSE push stream; creates a session
//! - `POST /mcp/messages?sessionId=<id>` - Send a JSON-RPC message
//! - `DELETE /mcp/messages?sessionId=<id>` - Close a session
//!
//! Both paths are configurable, see [`crate::state::TransportSettings`].

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use pizzaz_types::{ErrorResponse, JsonRpcMessage};
use serde::Deserialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::mcp::{heartbeat, PushChannel, PushFrame, SessionRegistry};
use crate::state::AppState;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Query string of the pull endpoint.
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

impl SessionQuery {
    /// The session id, treating an empty value as absent.
    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.is_empty())
    }
}

fn error_response(status: StatusCode, error: ErrorResponse) -> Response {
    (status, Json(error)).into_response()
}

/// Tears the session down when the push stream is dropped.
struct SessionGuard {
    id: String,
    sessions: SessionRegistry,
    heartbeat: JoinHandle<()>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.heartbeat.abort();
        if self.sessions.remove(&self.id) {
            info!("MCP: Push stream for session {} disconnected", self.id);
        }
    }
}

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// The SSE body of one session.
struct PushStream {
    inner: EventStream,
    _guard: SessionGuard,
}

impl Stream for PushStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

fn frame_event(frame: PushFrame) -> Event {
    match frame {
        PushFrame::Message(json) => Event::default().event("message").data(json),
        PushFrame::Heartbeat => Event::default().comment("keep-alive"),
    }
}

/// GET /mcp - Open the push stream.
///
/// Creates a session, then streams: a `: stream open` comment, an `endpoint`
/// event carrying the pull URL with the new session id, and from then on
/// `message` events with JSON-RPC responses interleaved with `: keep-alive`
/// comments. Closing the connection ends the session.
#[utoipa::path(
    get,
    path = "/mcp",
    tag = "mcp",
    responses(
        (status = 200, description = "Push stream opened", content_type = "text/event-stream", body = String)
    )
)]
pub async fn mcp_stream(State(state): State<AppState>) -> Response {
    let settings = state.settings();
    let (push, rx) = PushChannel::new(settings.channel_capacity);
    let session = state.sessions().create(push);
    let heartbeat = heartbeat::spawn(
        &session,
        state.sessions().clone(),
        settings.heartbeat_interval,
    );

    let endpoint = format!("{}?sessionId={}", settings.messages_path, session.id());
    info!("MCP: Push stream opened, endpoint {}", endpoint);

    let preamble = stream::iter([
        Event::default().comment("stream open"),
        Event::default().event("endpoint").data(endpoint),
    ]);
    let frames = ReceiverStream::new(rx)
        .map(frame_event)
        .take_until(session.cancellation().clone().cancelled_owned());

    let stream = PushStream {
        inner: Box::pin(preamble.chain(frames).map(Ok::<_, Infallible>)),
        _guard: SessionGuard {
            id: session.id().to_string(),
            sessions: state.sessions().clone(),
            heartbeat,
        },
    };

    (
        [
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (header::CONNECTION, "keep-alive"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Sse::new(stream),
    )
        .into_response()
}

/// POST /mcp/messages - Handle a JSON-RPC message.
///
/// The message is dispatched before this returns; its response, if any, is
/// delivered as a `message` event on the session's push stream.
#[utoipa::path(
    post,
    path = "/mcp/messages",
    tag = "mcp",
    params(
        ("sessionId" = String, Query, description = "Session id announced in the endpoint event")
    ),
    request_body = JsonRpcMessage,
    responses(
        (status = 202, description = "Accepted; the response follows on the push stream", body = String),
        (status = 400, description = "Missing session id or malformed message", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 500, description = "Push stream unavailable", body = ErrorResponse)
    )
)]
pub async fn mcp_message(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Response {
    let Some(session_id) = query.session_id() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("Missing sessionId query parameter"),
        );
    };

    let Some(session) = state.sessions().lookup(session_id) else {
        debug!("MCP: Message for unknown session {}", session_id);
        return error_response(StatusCode::NOT_FOUND, ErrorResponse::new("Unknown session"));
    };

    let message: JsonRpcMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!("MCP [{}]: Invalid message: {}", session_id, e);
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorResponse::with_details("Invalid message", e.to_string()),
            );
        }
    };

    if let Some(response) = session.server().handle_message(message).await {
        if let Err(e) = session.deliver(&response).await {
            error!("MCP [{}]: {}", session_id, e);
            if e.closes_session() {
                state.sessions().remove(session_id);
            }
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::with_details("Failed to process message", e.to_string()),
            );
        }
    }

    (StatusCode::ACCEPTED, "Accepted").into_response()
}

/// DELETE /mcp/messages - Close a session.
///
/// Ends the session's push stream. Later messages for the id get 404.
#[utoipa::path(
    delete,
    path = "/mcp/messages",
    tag = "mcp",
    params(
        ("sessionId" = String, Query, description = "Session to close")
    ),
    responses(
        (status = 204, description = "Session closed"),
        (status = 400, description = "Missing session id", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    )
)]
pub async fn mcp_close(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let Some(session_id) = query.session_id() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("Missing sessionId query parameter"),
        );
    };

    if state.sessions().remove(session_id) {
        info!("MCP: Session terminated by client: {}", session_id);
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, ErrorResponse::new("Unknown session"))
    }
}
