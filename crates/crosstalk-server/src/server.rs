//! HTTP server wiring: router, shared state, and startup.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crosstalk_accounts::{start_purge_task, AccountStore, SessionRegistry};
use crosstalk_relay::{OutboundPublisher, RelayState};

use crate::handlers;

/// HTTP surface settings. Session lifetime lives here because the
/// registry and cookie Max-Age must agree.
pub struct ServerConfig {
    pub port: u16,
    pub session_ttl_secs: u64,
    pub session_purge_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            session_ttl_secs: 86_400,
            session_purge_interval_secs: 600,
        }
    }
}

/// Everything a handler can reach, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayState,
    pub publisher: Arc<OutboundPublisher>,
    pub accounts: Arc<AccountStore>,
    pub sessions: SessionRegistry,
    pub topic: String,
    pub session_ttl_secs: u64,
}

/// Assemble the route table. Split from `start` so tests can drive the
/// router without binding a socket.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/iot/latest", get(handlers::iot_latest))
        .route("/iot/send", post(handlers::send_message))
        .route("/chat/messages", get(handlers::chat_messages))
        .route("/chat/send", post(handlers::send_message))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Bind the listener, spawn the serve loop and the session purge loop.
/// `config.port` may be 0 to let the OS pick; the bound port is on the
/// returned handle.
pub async fn start(
    config: ServerConfig,
    relay: RelayState,
    publisher: Arc<OutboundPublisher>,
    accounts: Arc<AccountStore>,
    topic: String,
) -> Result<ServerHandle, std::io::Error> {
    let sessions = SessionRegistry::new(Duration::from_secs(config.session_ttl_secs));

    let purge = start_purge_task(
        sessions.clone(),
        Duration::from_secs(config.session_purge_interval_secs),
        relay.metrics(),
    );

    let app_state = AppState {
        relay,
        publisher,
        accounts,
        sessions,
        topic,
        session_ttl_secs: config.session_ttl_secs,
    };

    let router = build_router(app_state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "crosstalk server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
        _purge: purge,
    })
}

/// Keeps the serve and purge tasks alive; dropping it detaches them.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _purge: tokio::task::JoinHandle<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosstalk_bus::MockBus;
    use crosstalk_core::BusPublisher;
    use crosstalk_telemetry::MetricsRecorder;
    use serde_json::{json, Value};

    // Bcrypt cost 4 keeps register/login fast in tests.
    const TEST_COST: u32 = 4;
    const TOPIC: &str = "iot/demo";

    struct TestServer {
        port: u16,
        bus: Arc<MockBus>,
        _handle: ServerHandle,
    }

    async fn start_test_server() -> TestServer {
        let metrics = Arc::new(MetricsRecorder::new());
        let relay = RelayState::new(100, metrics);
        let bus = Arc::new(MockBus::new());
        let publisher = Arc::new(OutboundPublisher::new(
            relay.clone(),
            Arc::clone(&bus) as Arc<dyn BusPublisher>,
            TOPIC,
        ));

        let users_path = std::env::temp_dir()
            .join(format!("crosstalk-test-server-{}", uuid::Uuid::now_v7()))
            .join("users.json");
        let accounts = Arc::new(AccountStore::open_with_cost(&users_path, TEST_COST).unwrap());

        let config = ServerConfig {
            port: 0, // OS-assigned
            ..Default::default()
        };
        let handle = start(config, relay, publisher, accounts, TOPIC.to_string())
            .await
            .unwrap();

        TestServer {
            port: handle.port,
            bus,
            _handle: handle,
        }
    }

    fn url(server: &TestServer, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", server.port)
    }

    /// Register a user and return the value of the session cookie.
    async fn register_user(
        client: &reqwest::Client,
        server: &TestServer,
        username: &str,
        password: &str,
    ) -> String {
        let resp = client
            .post(url(server, "/auth/register"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let set_cookie = resp
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        // "crosstalk_session=<token>; Path=/; ...": keep the name=value pair.
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_endpoint_reports_bus_state() {
        let server = start_test_server().await;
        assert!(server.port > 0);

        let resp = reqwest::get(url(&server, "/health")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["bus"], "disconnected");
    }

    #[tokio::test]
    async fn relay_routes_require_a_session() {
        let server = start_test_server().await;
        let client = reqwest::Client::new();

        for path in ["/iot/latest", "/chat/messages"] {
            let resp = client.get(url(&server, path)).send().await.unwrap();
            assert_eq!(resp.status(), 401, "{path}");
        }
        for path in ["/iot/send", "/chat/send"] {
            let resp = client
                .post(url(&server, path))
                .json(&json!({ "message": "hi" }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 401, "{path}");
        }
    }

    #[tokio::test]
    async fn register_send_and_read_back_flow() {
        let server = start_test_server().await;
        let client = reqwest::Client::new();
        let cookie = register_user(&client, &server, "alice", "secret99").await;

        let resp = client
            .get(url(&server, "/auth/me"))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["user"]["username"], "alice");

        // Send pads get trimmed; the bus sees the bare text.
        let resp = client
            .post(url(&server, "/iot/send"))
            .header("cookie", &cookie)
            .json(&json!({ "message": "  hello out there  " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["sent"], "hello out there");
        assert_eq!(
            server.bus.published(),
            vec![(TOPIC.to_string(), "hello out there".to_string())]
        );

        let resp = client
            .get(url(&server, "/chat/messages"))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["connected"], false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["from"], "user");
        assert_eq!(messages[0]["username"], "alice");
        assert_eq!(messages[0]["text"], "hello out there");

        // No device traffic yet.
        let resp = client
            .get(url(&server, "/iot/latest"))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["connected"], false);
        assert_eq!(body["topic"], TOPIC);
        assert!(body["last"].is_null());
    }

    #[tokio::test]
    async fn logout_revokes_the_session() {
        let server = start_test_server().await;
        let client = reqwest::Client::new();
        let cookie = register_user(&client, &server, "bob", "secret99").await;

        let resp = client
            .post(url(&server, "/auth/logout"))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let cleared = resp
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(cleared.contains("Max-Age=0"));

        // The old cookie no longer authenticates.
        let resp = client
            .get(url(&server, "/auth/me"))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert!(body["user"].is_null());

        let resp = client
            .get(url(&server, "/iot/latest"))
            .header("cookie", &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn login_round_trip_and_rejection() {
        let server = start_test_server().await;
        let client = reqwest::Client::new();
        register_user(&client, &server, "carol", "hunter22").await;

        let resp = client
            .post(url(&server, "/auth/login"))
            .json(&json!({ "username": "carol", "password": "wrong" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);

        let resp = client
            .post(url(&server, "/auth/login"))
            .json(&json!({ "username": "carol", "password": "hunter22" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.headers().get("set-cookie").is_some());
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["username"], "carol");
    }

    #[tokio::test]
    async fn register_validates_input_and_duplicates() {
        let server = start_test_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(url(&server, "/auth/register"))
            .json(&json!({ "username": "al", "password": "secret99" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(url(&server, "/auth/register"))
            .json(&json!({ "username": "dave", "password": "abc" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        register_user(&client, &server, "dave", "secret99").await;
        let resp = client
            .post(url(&server, "/auth/register"))
            .json(&json!({ "username": "DAVE", "password": "secret99" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
    }

    #[tokio::test]
    async fn send_rejects_blank_and_oversized_messages() {
        let server = start_test_server().await;
        let client = reqwest::Client::new();
        let cookie = register_user(&client, &server, "erin", "secret99").await;

        let resp = client
            .post(url(&server, "/chat/send"))
            .header("cookie", &cookie)
            .json(&json!({ "message": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(url(&server, "/chat/send"))
            .header("cookie", &cookie)
            .json(&json!({ "message": "x".repeat(501) }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        assert!(server.bus.published().is_empty());
    }

    #[test]
    fn router_assembles_without_a_listener() {
        let metrics = Arc::new(MetricsRecorder::new());
        let relay = RelayState::new(100, metrics);
        let bus = Arc::new(MockBus::new());
        let publisher = Arc::new(OutboundPublisher::new(
            relay.clone(),
            bus as Arc<dyn BusPublisher>,
            TOPIC,
        ));
        let users_path = std::env::temp_dir()
            .join(format!("crosstalk-test-server-{}", uuid::Uuid::now_v7()))
            .join("users.json");
        let accounts = Arc::new(AccountStore::open_with_cost(&users_path, TEST_COST).unwrap());

        let state = AppState {
            relay,
            publisher,
            accounts,
            sessions: SessionRegistry::new(Duration::from_secs(3600)),
            topic: TOPIC.to_string(),
            session_ttl_secs: 86_400,
        };

        let _router = build_router(state);
        // Construction exercises every route registration.
    }
}
