//! In-process stand-in for the chat API that the load harness targets.
//! Counts what it sees and can inject faults, so tests can assert on both
//! sides of a run.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Token handed out by the login endpoint and expected on every other route.
pub const TEST_TOKEN: &str = "testserver-access-token";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    logins: Arc<AtomicU64>,
    messages_created: Arc<AtomicU64>,
    messages_listed: Arc<AtomicU64>,
    conversations_listed: Arc<AtomicU64>,
    conversations_fetched: Arc<AtomicU64>,
    unauthorized: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_logins(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    fn next_message_id(&self) -> u64 {
        self.messages_created.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn inc_messages_listed(&self) {
        self.messages_listed.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_conversations_listed(&self) {
        self.conversations_listed.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_conversations_fetched(&self) {
        self.conversations_fetched.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_unauthorized(&self) {
        self.unauthorized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn logins(&self) -> u64 {
        self.logins.load(Ordering::Relaxed)
    }

    pub fn messages_created(&self) -> u64 {
        self.messages_created.load(Ordering::Relaxed)
    }

    pub fn messages_listed(&self) -> u64 {
        self.messages_listed.load(Ordering::Relaxed)
    }

    pub fn conversations_listed(&self) -> u64 {
        self.conversations_listed.load(Ordering::Relaxed)
    }

    pub fn conversations_fetched(&self) -> u64 {
        self.conversations_fetched.load(Ordering::Relaxed)
    }

    pub fn unauthorized(&self) -> u64 {
        self.unauthorized.load(Ordering::Relaxed)
    }
}

/// Switches that make the server misbehave on demand.
#[derive(Debug, Clone, Default)]
pub struct FaultInjection {
    reject_logins: Arc<AtomicBool>,
    fail_message_creates: Arc<AtomicBool>,
}

impl FaultInjection {
    pub fn set_reject_logins(&self, on: bool) {
        self.reject_logins.store(on, Ordering::Relaxed);
    }

    pub fn set_fail_message_creates(&self, on: bool) {
        self.fail_message_creates.store(on, Ordering::Relaxed);
    }

    fn reject_logins(&self) -> bool {
        self.reject_logins.load(Ordering::Relaxed)
    }

    fn fail_message_creates(&self) -> bool {
        self.fail_message_creates.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
struct AppState {
    stats: TestServerStats,
    faults: FaultInjection,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(rename = "usernameOrEmail", default)]
    username_or_email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<LoginData>,
}

#[derive(Debug, Serialize)]
struct LoginData {
    #[serde(rename = "accessToken")]
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct CreateMessageRequest {
    #[serde(default)]
    content: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    id: String,
    #[serde(rename = "conversationId")]
    conversation_id: String,
    content: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<MessageBody>,
}

#[derive(Debug, Serialize)]
struct MessagePage {
    items: Vec<MessageBody>,
}

#[derive(Debug, Serialize)]
struct MessagePageResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<MessagePage>,
}

#[derive(Debug, Serialize)]
struct ConversationBody {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct ConversationResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<ConversationBody>,
}

#[derive(Debug, Serialize)]
struct ConversationPage {
    items: Vec<ConversationBody>,
}

#[derive(Debug, Serialize)]
struct ConversationPageResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<ConversationPage>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_limit() -> u64 {
    20
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TEST_TOKEN}"))
}

async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> (StatusCode, Json<LoginResponse>) {
    state.stats.inc_logins();

    if state.faults.reject_logins() || req.username_or_email.is_empty() || req.password.is_empty() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(LoginResponse {
                success: false,
                data: None,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            data: Some(LoginData {
                access_token: TEST_TOKEN.to_string(),
            }),
        }),
    )
}

async fn handle_create_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CreateMessageRequest>,
) -> (StatusCode, Json<MessageResponse>) {
    if !authorized(&headers) {
        state.stats.inc_unauthorized();
        return (
            StatusCode::UNAUTHORIZED,
            Json(MessageResponse {
                success: false,
                data: None,
            }),
        );
    }

    if state.faults.fail_message_creates() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(MessageResponse {
                success: false,
                data: None,
            }),
        );
    }

    let n = state.stats.next_message_id();
    (
        StatusCode::CREATED,
        Json(MessageResponse {
            success: true,
            data: Some(MessageBody {
                id: format!("msg-{n}"),
                conversation_id,
                content: req.content,
                kind: req.kind.unwrap_or_else(|| "TEXT".to_string()),
            }),
        }),
    )
}

async fn handle_list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> (StatusCode, Json<MessagePageResponse>) {
    if !authorized(&headers) {
        state.stats.inc_unauthorized();
        return (
            StatusCode::UNAUTHORIZED,
            Json(MessagePageResponse {
                success: false,
                data: None,
            }),
        );
    }

    state.stats.inc_messages_listed();

    let count = query.limit.min(100);
    let items = (1..=count)
        .map(|i| MessageBody {
            id: format!("msg-{i}"),
            conversation_id: conversation_id.clone(),
            content: format!("message {i}"),
            kind: "TEXT".to_string(),
        })
        .collect();

    (
        StatusCode::OK,
        Json(MessagePageResponse {
            success: true,
            data: Some(MessagePage { items }),
        }),
    )
}

async fn handle_list_conversations(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> (StatusCode, Json<ConversationPageResponse>) {
    if !authorized(&headers) {
        state.stats.inc_unauthorized();
        return (
            StatusCode::UNAUTHORIZED,
            Json(ConversationPageResponse {
                success: false,
                data: None,
            }),
        );
    }

    state.stats.inc_conversations_listed();

    let count = query.limit.min(100);
    let items = (1..=count)
        .map(|i| ConversationBody {
            id: i.to_string(),
            name: format!("conversation {i}"),
        })
        .collect();

    (
        StatusCode::OK,
        Json(ConversationPageResponse {
            success: true,
            data: Some(ConversationPage { items }),
        }),
    )
}

async fn handle_get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<ConversationResponse>) {
    if !authorized(&headers) {
        state.stats.inc_unauthorized();
        return (
            StatusCode::UNAUTHORIZED,
            Json(ConversationResponse {
                success: false,
                data: None,
            }),
        );
    }

    state.stats.inc_conversations_fetched();

    (
        StatusCode::OK,
        Json(ConversationResponse {
            success: true,
            data: Some(ConversationBody {
                name: format!("conversation {conversation_id}"),
                id: conversation_id,
            }),
        }),
    )
}

pub fn router(stats: TestServerStats, faults: FaultInjection) -> Router {
    let state = AppState { stats, faults };
    Router::new()
        .route("/api/v1/auth/login", post(handle_login))
        .route("/api/v1/conversations", get(handle_list_conversations))
        .route(
            "/api/v1/conversations/{conversation_id}",
            get(handle_get_conversation),
        )
        .route(
            "/api/v1/conversations/{conversation_id}/messages",
            get(handle_list_messages).post(handle_create_message),
        )
        .with_state(state)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    faults: FaultInjection,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let faults = FaultInjection::default();
        let app = router(stats.clone(), faults.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            faults,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub fn faults(&self) -> &FaultInjection {
        &self.faults
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
