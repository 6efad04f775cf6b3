//! HTTP/SSE surface over the conversation tracker.
//!
//! Wires the terminal supervisor, tracker, and event emitter together behind
//! axum routes: status and message queries, user/raw message submission, and
//! two SSE streams (conversation events and raw screen updates).

pub mod emitter;
pub mod events;
pub mod middleware;
pub mod models;
pub mod submission;

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use agentapi_msgfmt::format_agent_message;
use agentapi_protocol::AgentType;
use agentapi_screentracker::{AgentIo, Conversation, ConversationConfig, SendMessageError};
use agentapi_term::AgentProcess;
use async_trait::async_trait;
use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{future, stream, Stream, StreamExt};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;

use crate::emitter::EventEmitter;
use crate::events::{convert_status, Event};
use crate::middleware::{cors_layer, host_authorization, parse_allowed_hosts, sse_headers};
use crate::models::{
    ApiError, MessageRequest, MessageResponse, MessageType, MessagesResponse, StatusResponse,
};
use crate::submission::user_message_parts;

/// About 40 frames per second; snapshotting itself takes a little time too.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(25);
pub const SCREEN_STABILITY_LENGTH: Duration = Duration::from_secs(2);

const SUBSCRIPTION_BUF_SIZE: usize = 1024;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server configuration error: {0}")]
    Configuration(String),
    #[error("server io error: {0}")]
    Io(String),
}

/// Adapts the terminal supervisor to the tracker's `AgentIo` capability.
/// The supervisor never learns about the tracker; the dependency stays
/// one-way.
pub struct TerminalAgentIo {
    process: Arc<AgentProcess>,
}

impl TerminalAgentIo {
    pub fn new(process: Arc<AgentProcess>) -> Self {
        Self { process }
    }
}

#[async_trait]
impl AgentIo for TerminalAgentIo {
    async fn write(&self, data: &[u8]) -> std::io::Result<usize> {
        self.process.write(data).map_err(std::io::Error::other)
    }

    async fn read_screen(&self) -> String {
        self.process.read_screen().await
    }
}

pub struct ServerConfig {
    pub agent_type: AgentType,
    pub process: Arc<AgentProcess>,
    pub port: u16,
    pub allowed_hosts: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub use_x_forwarded_host: bool,
}

#[derive(Clone)]
struct AppState {
    conversation: Arc<Conversation>,
    process: Arc<AgentProcess>,
    emitter: Arc<EventEmitter>,
    agent_type: AgentType,
}

pub struct Server {
    router: Router,
    port: u16,
    conversation: Arc<Conversation>,
    emitter: Arc<EventEmitter>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let allowlist = parse_allowed_hosts(&config.allowed_hosts, config.use_x_forwarded_host)?;
        tracing::info!(allowed_hosts = allowlist.display(), "host allowlist configured");
        let cors = cors_layer(&config.allowed_origins)?;
        tracing::info!(
            allowed_origins = %config.allowed_origins.join(", "),
            "allowed origins configured"
        );

        let agent_type = config.agent_type;
        let conversation = Arc::new(Conversation::new(ConversationConfig {
            agent_type,
            agent_io: Arc::new(TerminalAgentIo::new(Arc::clone(&config.process))),
            get_time: Arc::new(OffsetDateTime::now_utc),
            snapshot_interval: SNAPSHOT_INTERVAL,
            screen_stability_length: SCREEN_STABILITY_LENGTH,
            format_message: Arc::new(move |message, user_input| {
                format_agent_message(agent_type, message, user_input)
            }),
            skip_writing_message: false,
            skip_send_message_status_check: false,
        }));
        let emitter = Arc::new(EventEmitter::new(SUBSCRIPTION_BUF_SIZE));

        let state = AppState {
            conversation: Arc::clone(&conversation),
            process: config.process,
            emitter: Arc::clone(&emitter),
            agent_type,
        };

        let router = Router::new()
            .route("/status", get(get_status))
            .route("/messages", get(get_messages))
            .route("/message", post(post_message))
            .route("/events", get(subscribe_events))
            .route("/internal/screen", get(subscribe_screen))
            .with_state(state)
            .layer(cors)
            .layer(axum::middleware::from_fn_with_state(
                allowlist,
                host_authorization,
            ));

        Ok(Self {
            router,
            port: config.port,
            conversation,
            emitter,
        })
    }

    /// The sampler plus the emitter drive loop. Both run until aborted.
    pub fn start_event_loops(&self) -> Vec<JoinHandle<()>> {
        let sampler = Arc::clone(&self.conversation).start_snapshot_loop();

        let conversation = Arc::clone(&self.conversation);
        let emitter = Arc::clone(&self.emitter);
        let drive = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SNAPSHOT_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                emitter.update_status_and_emit_changes(conversation.status());
                emitter.update_messages_and_emit_changes(conversation.messages());
                emitter.update_screen_and_emit_changes(conversation.screen());
            }
        });

        vec![sampler, drive]
    }

    /// The router, for serving on an externally managed listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn serve_on(
        self,
        listener: tokio::net::TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|error| ServerError::Io(error.to_string()))
    }

    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", self.port))
            .await
            .map_err(|error| ServerError::Io(error.to_string()))?;
        self.serve_on(listener, shutdown).await
    }
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: convert_status(state.conversation.status()),
    })
}

async fn get_messages(State(state): State<AppState>) -> Json<MessagesResponse> {
    Json(MessagesResponse {
        messages: state.conversation.messages(),
    })
}

/// For `user` messages the agent must be `stable`; `raw` messages bypass the
/// check and the conversation history entirely, by design.
async fn post_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    match request.message_type {
        MessageType::User => {
            let parts = user_message_parts(state.agent_type, &request.content);
            state
                .conversation
                .send_message(parts)
                .await
                .map_err(|error| match error {
                    SendMessageError::Io(_) => {
                        ApiError::internal(format!("failed to send message: {error}"))
                    }
                    _ => ApiError::bad_request(format!("failed to send message: {error}")),
                })?;
        }
        MessageType::Raw => {
            state.process.write(request.content.as_bytes()).map_err(|error| {
                ApiError::internal(format!("failed to send message: {error}"))
            })?;
        }
    }
    Ok(Json(MessageResponse { ok: true }))
}

/// Unsubscribes on drop, exactly once, when the SSE stream ends or the
/// client disconnects.
struct SubscriptionGuard {
    emitter: Arc<EventEmitter>,
    id: usize,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.emitter.unsubscribe(self.id);
    }
}

fn to_sse_event(event: &Event) -> SseEvent {
    let sse_event = SseEvent::default().event(event.kind());
    match event.payload_json() {
        Ok(payload) => sse_event.data(payload),
        Err(error) => {
            tracing::error!(%error, kind = event.kind(), "failed to serialize event payload");
            sse_event
        }
    }
}

fn event_stream(
    emitter: &Arc<EventEmitter>,
    keep: fn(&Event) -> bool,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    let (id, receiver, bootstrap) = emitter.subscribe();
    tracing::info!(subscriber_id = id, "new event subscriber");
    let guard = SubscriptionGuard {
        emitter: Arc::clone(emitter),
        id,
    };

    let bootstrap = stream::iter(bootstrap);
    bootstrap
        .chain(ReceiverStream::new(receiver))
        .filter(move |event| future::ready(keep(event)))
        .map(move |event| {
            let _keep_alive_until_stream_drops = &guard;
            Ok(to_sse_event(&event))
        })
}

/// SSE stream of conversation events: a bootstrap prefix reconstructing the
/// current state, then live updates. Screen updates are left out; they have
/// their own endpoint.
async fn subscribe_events(State(state): State<AppState>) -> impl IntoResponse {
    let stream = event_stream(&state.emitter, |event| {
        !matches!(event, Event::ScreenUpdate(_))
    });
    (
        sse_headers(),
        Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(10))),
    )
}

/// SSE stream of screen updates only.
async fn subscribe_screen(State(state): State<AppState>) -> impl IntoResponse {
    let stream = event_stream(&state.emitter, |event| {
        matches!(event, Event::ScreenUpdate(_))
    });
    (
        sse_headers(),
        Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(10))),
    )
}
