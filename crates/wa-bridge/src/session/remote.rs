//! Session daemon client.
//!
//! The daemon owns the protocol connection and exposes it as a small REST surface plus
//! a WebSocket event stream:
//!
//! - `GET  /status`          -> `{connected, logged_in, jid?}`
//! - `GET  /groups/{jid}`    -> `{name?}` (404 when unknown)
//! - `GET  /contacts/{jid}`  -> `{full_name?}` (404 when unknown)
//! - `POST /send`            -> `{success, message?, id?}`
//! - `POST /history-sync`    -> any 2xx
//! - `WS   /events`          -> JSON `SessionEvent` frames

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{EventHandler, SendReceipt, SessionClient, SessionError, SessionEvent, SessionResult};
use crate::address::ChatAddress;

/// Connection settings for [`RemoteSession`].
#[derive(Debug, Clone)]
pub struct RemoteSessionConfig {
    /// Daemon base URL, e.g. `http://127.0.0.1:8090`.
    pub base_url: String,
    pub request_timeout: Duration,
    /// Pause between event stream reconnect attempts.
    pub reconnect_delay: Duration,
}

impl Default for RemoteSessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".to_string(),
            request_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Daemon connection status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub logged_in: bool,
    #[serde(default)]
    pub jid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupInfo {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContactInfo {
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendBody<'a> {
    recipient: String,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct HistorySyncBody {
    count: u32,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// A protocol session accessed through the session daemon.
pub struct RemoteSession {
    client: Client,
    base_url: String,
    reconnect_delay: Duration,
    connected: AtomicBool,
    own_address: RwLock<Option<ChatAddress>>,
    handler: RwLock<Option<Arc<dyn EventHandler>>>,
}

impl RemoteSession {
    pub fn new(config: RemoteSessionConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("building session HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            reconnect_delay: config.reconnect_delay,
            connected: AtomicBool::new(false),
            own_address: RwLock::new(None),
            handler: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn events_url(&self) -> String {
        let ws_base = self
            .base_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!("{}/events", ws_base)
    }

    /// Fetch the daemon status and update the cached connection state.
    pub async fn refresh_status(&self) -> SessionResult<SessionStatus> {
        let response = self.client.get(self.url("/status")).send().await?;
        let status: SessionStatus = handle_response(response).await?;

        self.connected.store(status.connected, Ordering::SeqCst);
        let own = if status.logged_in {
            status
                .jid
                .as_deref()
                .and_then(|jid| jid.parse::<ChatAddress>().ok())
        } else {
            None
        };
        *write_lock(&self.own_address) = own;

        Ok(status)
    }

    async fn refresh_status_logged(&self) {
        if let Err(e) = self.refresh_status().await {
            warn!("Failed to fetch session status: {}", e);
        }
    }

    /// Run the event stream until the task is aborted, reconnecting after failures.
    ///
    /// The session reads as disconnected between a lost stream and the next status
    /// refresh.
    pub fn spawn_event_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match session.run_event_stream().await {
                    Ok(()) => info!("Session event stream closed, reconnecting..."),
                    Err(e) => warn!("Session event stream error: {:#}, reconnecting...", e),
                }
                session.connected.store(false, Ordering::SeqCst);
                tokio::time::sleep(session.reconnect_delay).await;
            }
        })
    }

    async fn run_event_stream(&self) -> anyhow::Result<()> {
        let url = self.events_url();
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("connecting to session events at {}", url))?;
        info!("Subscribed to session events at {}", url);

        self.refresh_status_logged().await;

        let (_, mut read) = ws_stream.split();
        while let Some(frame) = read.next().await {
            match frame.context("reading session event")? {
                Message::Text(text) => match serde_json::from_str::<SessionEvent>(&text) {
                    Ok(event) => {
                        let connected = matches!(event, SessionEvent::Connected);
                        self.dispatch(event);
                        if connected {
                            self.refresh_status_logged().await;
                        }
                    }
                    Err(e) => debug!("Ignoring unrecognized session event: {}", e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }

        Ok(())
    }

    /// Track connection state, then hand the event to the handler on its own task.
    fn dispatch(&self, event: SessionEvent) {
        self.track_state(&event);

        let Some(handler) = read_lock(&self.handler).clone() else {
            debug!("No event handler registered, dropping session event");
            return;
        };
        tokio::spawn(async move {
            handler.handle_event(event).await;
        });
    }

    fn track_state(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Connected => self.connected.store(true, Ordering::SeqCst),
            SessionEvent::Disconnected => self.connected.store(false, Ordering::SeqCst),
            SessionEvent::LoggedOut => {
                self.connected.store(false, Ordering::SeqCst);
                *write_lock(&self.own_address) = None;
            }
            SessionEvent::Message(_) | SessionEvent::HistorySync(_) => {}
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, path: String) -> SessionResult<Option<T>> {
        let response = self.client.get(self.url(&path)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        handle_response(response).await.map(Some)
    }
}

#[async_trait]
impl SessionClient for RemoteSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn own_address(&self) -> Option<ChatAddress> {
        read_lock(&self.own_address).clone()
    }

    async fn group_name(&self, group: &ChatAddress) -> SessionResult<Option<String>> {
        let path = format!("/groups/{}", urlencoding::encode(&group.to_string()));
        let info: Option<GroupInfo> = self.lookup(path).await?;
        Ok(info.and_then(|info| info.name))
    }

    async fn contact_name(&self, contact: &ChatAddress) -> SessionResult<Option<String>> {
        let path = format!("/contacts/{}", urlencoding::encode(&contact.to_string()));
        let info: Option<ContactInfo> = self.lookup(path).await?;
        Ok(info.and_then(|info| info.full_name))
    }

    async fn send_text(&self, recipient: &ChatAddress, text: &str) -> SessionResult<SendReceipt> {
        let body = SendBody {
            recipient: recipient.to_string(),
            message: text,
        };
        let response = self.client.post(self.url("/send")).json(&body).send().await?;
        let sent: SendResponse = handle_response(response).await?;

        if !sent.success {
            return Err(SessionError::Rejected(
                sent.message.unwrap_or_else(|| "send failed".to_string()),
            ));
        }
        Ok(SendReceipt { message_id: sent.id })
    }

    async fn request_history_sync(&self, count: u32) -> SessionResult<()> {
        let response = self
            .client
            .post(self.url("/history-sync"))
            .json(&HistorySyncBody { count })
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(error_from_response(response).await)
    }

    fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        *write_lock(&self.handler) = Some(handler);
    }
}

/// Parse a successful JSON response or map the failure status.
async fn handle_response<T: DeserializeOwned>(response: Response) -> SessionResult<T> {
    if response.status().is_success() {
        return response
            .json()
            .await
            .map_err(|e| SessionError::Decode(e.to_string()));
    }
    Err(error_from_response(response).await)
}

async fn error_from_response(response: Response) -> SessionError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .unwrap_or_else(|| format!("session daemon returned {}", status));

    match status {
        StatusCode::SERVICE_UNAVAILABLE => SessionError::NotConnected,
        StatusCode::UNAUTHORIZED => SessionError::NotLoggedIn,
        _ => SessionError::Rejected(detail),
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode as HttpStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    /// Serve a fake daemon on an ephemeral port and return its base URL.
    async fn spawn_daemon(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn session_for(base_url: String) -> RemoteSession {
        RemoteSession::new(RemoteSessionConfig {
            base_url,
            request_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_millis(10),
        })
        .unwrap()
    }

    #[test]
    fn test_events_url() {
        let session = session_for("http://127.0.0.1:8090/".to_string());
        assert_eq!(session.base_url(), "http://127.0.0.1:8090");
        assert_eq!(session.events_url(), "ws://127.0.0.1:8090/events");

        let session = session_for("https://daemon.local".to_string());
        assert_eq!(session.events_url(), "wss://daemon.local/events");
    }

    #[test]
    fn test_connection_events_update_state() {
        let session = session_for("http://127.0.0.1:1".to_string());
        assert!(!session.is_connected());

        session.track_state(&SessionEvent::Connected);
        assert!(session.is_connected());

        *write_lock(&session.own_address) = Some(ChatAddress::direct("100"));
        session.track_state(&SessionEvent::Disconnected);
        assert!(!session.is_connected());
        assert!(session.own_address().is_some());

        session.track_state(&SessionEvent::LoggedOut);
        assert!(session.own_address().is_none());
    }

    #[tokio::test]
    async fn test_refresh_status() {
        let router = Router::new().route(
            "/status",
            get(|| async {
                Json(json!({"connected": true, "logged_in": true, "jid": "100:2@s.whatsapp.net"}))
            }),
        );
        let session = session_for(spawn_daemon(router).await);

        let status = session.refresh_status().await.unwrap();
        assert!(status.logged_in);
        assert!(session.is_connected());
        assert_eq!(
            session.own_address().map(|a| a.to_string()).as_deref(),
            Some("100@s.whatsapp.net")
        );
    }

    #[tokio::test]
    async fn test_group_lookup_not_found_is_none() {
        let router = Router::new().route(
            "/groups/{jid}",
            get(|Path(jid): Path<String>| async move {
                if jid == "123@g.us" {
                    Ok(Json(json!({"name": "Trading Desk"})))
                } else {
                    Err(HttpStatus::NOT_FOUND)
                }
            }),
        );
        let session = session_for(spawn_daemon(router).await);

        let known: ChatAddress = "123@g.us".parse().unwrap();
        let unknown: ChatAddress = "999@g.us".parse().unwrap();
        assert_eq!(
            session.group_name(&known).await.unwrap().as_deref(),
            Some("Trading Desk")
        );
        assert_eq!(session.group_name(&unknown).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_contact_lookup_error_status() {
        let router = Router::new().route(
            "/contacts/{jid}",
            get(|| async { (HttpStatus::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"}))) }),
        );
        let session = session_for(spawn_daemon(router).await);

        let err = session
            .contact_name(&ChatAddress::direct("555"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Rejected(ref msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn test_send_text() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let router = Router::new().route(
            "/send",
            post(move |Json(body): Json<Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body.clone());
                    if body["message"] == "fail" {
                        Json(json!({"success": false, "message": "recipient blocked"}))
                    } else {
                        Json(json!({"success": true, "id": "3EB0"}))
                    }
                }
            }),
        );
        let session = session_for(spawn_daemon(router).await);
        let to = ChatAddress::direct("555");

        let receipt = session.send_text(&to, "hello").await.unwrap();
        assert_eq!(receipt.message_id.as_deref(), Some("3EB0"));
        let body = rx.recv().await.unwrap();
        assert_eq!(body["recipient"], "555@s.whatsapp.net");
        assert_eq!(body["message"], "hello");

        let err = session.send_text(&to, "fail").await.unwrap_err();
        assert_eq!(err.to_string(), "recipient blocked");
    }

    #[tokio::test]
    async fn test_send_when_daemon_offline() {
        let router = Router::new().route(
            "/send",
            post(|| async { HttpStatus::SERVICE_UNAVAILABLE }),
        );
        let session = session_for(spawn_daemon(router).await);

        let err = session
            .send_text(&ChatAddress::direct("555"), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[tokio::test]
    async fn test_unreachable_daemon_is_transport_error() {
        // Port 1 on loopback is never listening.
        let session = session_for("http://127.0.0.1:1".to_string());
        let err = session.request_history_sync(100).await.unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }

    #[tokio::test]
    async fn test_lost_event_stream_clears_connected() {
        let session = Arc::new(session_for("http://127.0.0.1:1".to_string()));
        session.track_state(&SessionEvent::Connected);
        assert!(session.is_connected());

        let task = session.spawn_event_loop();
        let cleared = tokio::time::timeout(Duration::from_secs(5), async {
            while session.is_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        task.abort();

        assert!(cleared.is_ok());
        assert!(!session.is_connected());
    }

    struct Forward(mpsc::UnboundedSender<SessionEvent>);

    #[async_trait]
    impl EventHandler for Forward {
        async fn handle_event(&self, event: SessionEvent) {
            let _ = self.0.send(event);
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_registered_handler() {
        let session = session_for("http://127.0.0.1:1".to_string());
        // Without a handler the event is dropped.
        session.dispatch(SessionEvent::Disconnected);

        let (tx, mut rx) = mpsc::unbounded_channel();
        session.register_handler(Arc::new(Forward(tx)));
        session.dispatch(SessionEvent::Connected);

        assert_eq!(rx.recv().await, Some(SessionEvent::Connected));
        assert!(session.is_connected());
    }
}
