// Shared mock server and wiring for integration tests.
// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Form, Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use flora_client::{ApiClient, ClientConfig, EventBus, KeyValueStore, MemoryStore};

pub const STALE_TOKEN: &str = "stale-access-token";
pub const FRESH_TOKEN: &str = "fresh-access-token";
pub const REFRESH_TOKEN: &str = "valid-refresh-token";
pub const ROTATED_REFRESH: &str = "rotated-refresh-token";
pub const GOOD_PASSWORD: &str = "correct-horse";

/// Knobs and counters for the mock Flora API.
pub struct ServerState {
    pub product_hits: AtomicUsize,
    pub refresh_hits: AtomicUsize,
    pub auth_hits: AtomicUsize,
    /// When set, /products answers 401 regardless of the token presented
    pub always_unauthorized: AtomicBool,
    /// When cleared, /auth/refresh answers 401
    pub refresh_ok: AtomicBool,
    /// When set, the refresh response omits the rotation fields
    pub omit_rotation: AtomicBool,
    /// When set, /products stalls on fresh-token requests instead of
    /// answering, long enough to outlast a short client timeout
    pub stall_fresh: AtomicBool,
}

pub struct TestApp {
    pub base_url: String,
    pub state: Arc<ServerState>,
}

/// Initialize test logging once. Use RUST_LOG to control verbosity.
fn init_tracing() {
    use std::sync::Once;
    static TRACING: Once = Once::new();
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

impl TestApp {
    pub async fn spawn() -> Self {
        init_tracing();
        let state = Arc::new(ServerState {
            product_hits: AtomicUsize::new(0),
            refresh_hits: AtomicUsize::new(0),
            auth_hits: AtomicUsize::new(0),
            always_unauthorized: AtomicBool::new(false),
            refresh_ok: AtomicBool::new(true),
            omit_rotation: AtomicBool::new(false),
            stall_fresh: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/products", get(products))
            .route("/auth/refresh", post(refresh))
            .route("/auth/token", post(token))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn product_hits(&self) -> usize {
        self.state.product_hits.load(Ordering::SeqCst)
    }

    pub fn refresh_hits(&self) -> usize {
        self.state.refresh_hits.load(Ordering::SeqCst)
    }

    pub fn auth_hits(&self) -> usize {
        self.state.auth_hits.load(Ordering::SeqCst)
    }
}

async fn products(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    state.product_hits.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Bearer {FRESH_TOKEN}");
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str());

    if authorized && state.stall_fresh.load(Ordering::SeqCst) {
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }

    if state.always_unauthorized.load(Ordering::SeqCst) || !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Not authenticated"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"data": {"items": ["rose", "tulip"]}})),
    )
}

#[derive(Deserialize)]
struct RefreshForm {
    refresh_token: String,
}

async fn refresh(
    State(state): State<Arc<ServerState>>,
    Form(form): Form<RefreshForm>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.refresh_hits.fetch_add(1, Ordering::SeqCst);

    if !state.refresh_ok.load(Ordering::SeqCst) || form.refresh_token != REFRESH_TOKEN {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid refresh token"})),
        );
    }

    if state.omit_rotation.load(Ordering::SeqCst) {
        (
            StatusCode::OK,
            Json(json!({"data": {"access_token": FRESH_TOKEN}})),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({"data": {
                "access_token": FRESH_TOKEN,
                "refresh_token": ROTATED_REFRESH,
                "expires_in": 1800,
                "refresh_expires_in": 604800
            }})),
        )
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn token(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<LoginRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.auth_hits.fetch_add(1, Ordering::SeqCst);

    if request.password != GOOD_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Incorrect email or password"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"data": {
            "access_token": FRESH_TOKEN,
            "refresh_token": REFRESH_TOKEN,
            "expires_in": 1800,
            "refresh_expires_in": 604800,
            "user": {"id": 1, "email": request.email, "name": "Ana"}
        }})),
    )
}

/// Wire a client and its collaborators against the given base URL.
pub fn wire(base_url: &str) -> (ApiClient, Arc<MemoryStore>, Arc<EventBus>) {
    wire_with_timeout(base_url, std::time::Duration::from_secs(30))
}

/// Like `wire`, but with a custom request timeout for tests that make the
/// server stall.
pub fn wire_with_timeout(
    base_url: &str,
    timeout: std::time::Duration,
) -> (ApiClient, Arc<MemoryStore>, Arc<EventBus>) {
    let storage = Arc::new(MemoryStore::new());
    let events = Arc::new(EventBus::new());
    let mut config = ClientConfig::new(base_url);
    config.request_timeout = timeout;
    let client = ApiClient::new(
        config,
        storage.clone() as Arc<dyn KeyValueStore>,
        Arc::clone(&events),
    )
    .expect("Failed to build client");
    (client, storage, events)
}

/// Seed storage with a stale access token and a valid refresh token, as
/// left behind by a login in a previous process.
pub async fn seed_stale_session(storage: &MemoryStore) {
    storage
        .multi_set(&[
            ("flora_token", STALE_TOKEN.to_string()),
            ("flora_token_expiry", "1700000000000".to_string()),
            ("flora_refresh_token", REFRESH_TOKEN.to_string()),
            ("flora_refresh_token_expiry", "1800000000000".to_string()),
            ("flora_user", r#"{"id":1,"email":"ana@example.com"}"#.to_string()),
        ])
        .await
        .unwrap();
}
