//! Session bridge and its running handle.
//!
//! [`SessionBridge`] is the composition root: it owns the identity store,
//! the endpoint configuration and the connector. [`SessionBridge::start`]
//! moves it into a tokio task that drives the connection lifecycle and
//! returns a [`SessionHandle`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identity::{Identity, IdentityStore, KeyValueStore};
use crate::protocol::ReceiptClock;
use crate::transport::connection::{ConnectionCommand, Relay};
use crate::transport::{CloseReason, Connection, ConnectionState, Connector, TcpConnector};

use super::builder::SessionBridgeBuilder;
use super::events::{BridgeEvent, EventSink};
use super::options::BridgeOptions;
use super::ports::BridgePorts;

// ============================================================================
// SessionState
// ============================================================================

/// Connection instance number plus its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    /// Connection instance, numbered from 1.
    pub instance: u32,
    /// Lifecycle state of that instance.
    pub state: ConnectionState,
}

// ============================================================================
// SessionBridge
// ============================================================================

/// Owns the single server connection and relays it to the application core.
pub struct SessionBridge<C = TcpConnector> {
    options: BridgeOptions,
    identity: IdentityStore<Arc<dyn KeyValueStore>>,
    connector: C,
}

impl<C> fmt::Debug for SessionBridge<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBridge")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SessionBridge<TcpConnector> {
    /// Creates a new builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBridgeBuilder {
        SessionBridgeBuilder::new()
    }
}

impl<C> SessionBridge<C>
where
    C: Connector + 'static,
{
    pub(crate) fn new(
        options: BridgeOptions,
        storage: Arc<dyn KeyValueStore>,
        connector: C,
    ) -> Self {
        Self {
            options,
            identity: IdentityStore::new(storage),
            connector,
        }
    }

    /// Replaces the connector, e.g. with an in-memory transport.
    #[must_use]
    pub fn with_connector<D: Connector + 'static>(self, connector: D) -> SessionBridge<D> {
        SessionBridge {
            options: self.options,
            identity: self.identity,
            connector,
        }
    }

    /// Returns the bridge options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Returns the persisted identity, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the identity slot cannot be read or written.
    pub fn identity(&self) -> Result<Identity> {
        self.identity.get_identity()
    }

    /// Starts the session on the current tokio runtime.
    ///
    /// The identity is resolved before the task is spawned, so storage
    /// failures surface here. Dropping the returned handle shuts the session
    /// down.
    ///
    /// # Errors
    ///
    /// - Storage errors while reading or creating the identity
    /// - [`Error::Url`] or [`Error::Config`] if the endpoint URL is invalid
    pub fn start(self, ports: BridgePorts) -> Result<SessionHandle> {
        let identity = self.identity.get_identity()?;
        let url = self.options.endpoint.url(&identity)?;

        let (events, events_rx) = if self.options.error_channel {
            let (sink, rx) = EventSink::channel();
            (sink, Some(rx))
        } else {
            (EventSink::disabled(), None)
        };

        let relay = Relay {
            policy: self.options.endpoint.wire.wrap_policy(),
            clock: ReceiptClock::new(),
            events,
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState {
            instance: 1,
            state: ConnectionState::Connecting,
        });
        let (done_tx, done_rx) = oneshot::channel();

        info!(%url, wire = ?self.options.endpoint.wire, "Starting session bridge");

        tokio::spawn(self.run(
            ports,
            command_rx,
            state_tx,
            relay,
            Some(identity.clone()),
            done_tx,
        ));

        Ok(SessionHandle {
            identity,
            url,
            command_tx,
            state_rx,
            done_rx,
            events_rx,
        })
    }

    /// Drives connection instances until one closes for good.
    async fn run(
        self,
        mut ports: BridgePorts,
        mut commands: mpsc::UnboundedReceiver<ConnectionCommand>,
        state: watch::Sender<SessionState>,
        relay: Relay,
        mut first_identity: Option<Identity>,
        done: oneshot::Sender<CloseReason>,
    ) {
        let mut instance = 0u32;
        let mut retries_used = 0u32;

        let final_reason = loop {
            instance += 1;
            Self::publish(&state, &relay.events, instance, ConnectionState::Connecting);

            let connected = tokio::select! {
                result = self.open(instance, first_identity.take()) => result,
                _ = commands.recv() => {
                    debug!(instance, "Shutdown requested while connecting");
                    Self::publish(&state, &relay.events, instance, ConnectionState::Closed);
                    relay.events.emit(BridgeEvent::Closed { instance, reason: CloseReason::Shutdown });
                    break CloseReason::Shutdown;
                }
            };

            let mut recoverable = true;
            let reason = match connected {
                Ok(connection) => {
                    retries_used = 0;
                    Self::publish(&state, &relay.events, instance, ConnectionState::Open);
                    connection.run(&mut ports, &mut commands, &relay).await
                }
                Err(e) => {
                    warn!(instance, error = %e, "Connection attempt failed");
                    recoverable = e.is_recoverable();
                    relay.events.emit(BridgeEvent::ConnectFailed {
                        instance,
                        error: e.to_string(),
                    });
                    CloseReason::ConnectFailed(e.to_string())
                }
            };

            Self::publish(&state, &relay.events, instance, ConnectionState::Closed);
            relay.events.emit(BridgeEvent::Closed {
                instance,
                reason: reason.clone(),
            });

            if reason.is_local() {
                break reason;
            }
            if !recoverable {
                info!(instance, ?reason, "Connection failure is not recoverable, not retrying");
                break reason;
            }

            let Some(delay) = self.options.retry.next_delay(retries_used) else {
                info!(instance, ?reason, "Connection closed, not retrying");
                break reason;
            };
            retries_used += 1;

            info!(instance, retry = retries_used, ?delay, "Retrying connection");
            tokio::select! {
                () = sleep(delay) => {}
                _ = commands.recv() => {
                    debug!(instance, "Shutdown requested during retry delay");
                    break CloseReason::Shutdown;
                }
            }
        };

        // Closed is final: the core must observe dropped ports before `closed()` returns.
        drop(ports);
        let _ = done.send(final_reason);
    }

    /// Performs the handshake for one connection instance.
    ///
    /// The identity is read from storage on every attempt after the first.
    async fn open(
        &self,
        instance: u32,
        identity: Option<Identity>,
    ) -> Result<Connection<C::Stream>> {
        let identity = match identity {
            Some(identity) => identity,
            None => self.identity.get_identity()?,
        };
        let url = self.options.endpoint.url(&identity)?;

        debug!(instance, %url, "Connecting");
        let ws_stream = self.connector.connect(&url).await?;

        info!(instance, %url, "WebSocket connection established");
        Ok(Connection::new(instance, ws_stream))
    }

    fn publish(
        state: &watch::Sender<SessionState>,
        events: &EventSink,
        instance: u32,
        new_state: ConnectionState,
    ) {
        state.send_replace(SessionState {
            instance,
            state: new_state,
        });
        events.emit(BridgeEvent::StateChanged {
            instance,
            state: new_state,
        });
        debug!(instance, state = %new_state, "Connection state changed");
    }
}

// ============================================================================
// SessionHandle
// ============================================================================

/// Handle to a running session.
///
/// Dropping the handle shuts the session down, the same as page teardown.
#[derive(Debug)]
pub struct SessionHandle {
    identity: Identity,
    url: Url,
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    state_rx: watch::Receiver<SessionState>,
    done_rx: oneshot::Receiver<CloseReason>,
    events_rx: Option<mpsc::UnboundedReceiver<BridgeEvent>>,
}

impl SessionHandle {
    /// Identity used for the first connection attempt.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// URL of the first connection attempt.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Current instance and state.
    #[inline]
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Current state of the latest connection instance.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().state
    }

    /// Waits until the latest connection instance is in `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session ends first.
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<SessionState> {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(|s| s.state == target)
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(*state)
    }

    /// Takes the diagnostics stream, if it was enabled.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<BridgeEvent>> {
        self.events_rx.take()
    }

    /// Requests a graceful close. The session will not retry afterwards.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Waits for the session to end and returns why the last instance closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the session task panicked.
    pub async fn closed(self) -> Result<CloseReason> {
        let Self {
            command_tx,
            done_rx,
            ..
        } = self;
        let reason = done_rx.await?;
        drop(command_tx);
        Ok(reason)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures_util::{SinkExt, StreamExt};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::io::{DuplexStream, duplex};
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::protocol::Role;

    use crate::bridge::ports::{self, CorePorts};
    use crate::bridge::options::RetryPolicy;
    use crate::identity::{IDENTITY_KEY, MemoryStore};

    const WAIT: Duration = Duration::from_secs(5);

    /// In-memory connector; hands the server half of each connection to the test.
    struct MockConnector {
        failures_left: AtomicU32,
        failure: fn() -> Error,
        urls: Arc<Mutex<Vec<Url>>>,
        servers: mpsc::UnboundedSender<WebSocketStream<DuplexStream>>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Stream = DuplexStream;

        async fn connect(&self, url: &Url) -> Result<WebSocketStream<DuplexStream>> {
            self.urls.lock().push(url.clone());

            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err((self.failure)());
            }

            let (client, server) = duplex(64 * 1024);
            let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
            let _ = self.servers.send(server);
            Ok(WebSocketStream::from_raw_socket(client, Role::Client, None).await)
        }
    }

    struct Harness {
        core: CorePorts,
        handle: SessionHandle,
        servers: mpsc::UnboundedReceiver<WebSocketStream<DuplexStream>>,
        urls: Arc<Mutex<Vec<Url>>>,
        storage: Arc<MemoryStore>,
    }

    impl Harness {
        async fn next_server(&mut self) -> WebSocketStream<DuplexStream> {
            timeout(WAIT, self.servers.recv())
                .await
                .expect("connection within timeout")
                .expect("connector alive")
        }
    }

    fn refused() -> Error {
        Error::connection("connection refused")
    }

    fn start_mock(options: BridgeOptions, failures: u32) -> Harness {
        start_mock_failing_with(options, failures, refused)
    }

    fn start_mock_failing_with(
        options: BridgeOptions,
        failures: u32,
        failure: fn() -> Error,
    ) -> Harness {
        let storage = Arc::new(MemoryStore::new());
        let urls = Arc::new(Mutex::new(Vec::new()));
        let (servers_tx, servers) = mpsc::unbounded_channel();

        let connector = MockConnector {
            failures_left: AtomicU32::new(failures),
            failure,
            urls: Arc::clone(&urls),
            servers: servers_tx,
        };

        let bridge = SessionBridge::new(options, storage.clone(), connector);
        let (core, bridge_ports) = ports::pair();
        let handle = bridge.start(bridge_ports).expect("start");

        Harness {
            core,
            handle,
            servers,
            urls,
            storage,
        }
    }

    async fn next_text(server: &mut WebSocketStream<DuplexStream>) -> Value {
        loop {
            match timeout(WAIT, server.next()).await.expect("frame within timeout") {
                Some(Ok(WsMessage::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_end_to_end_over_tcp() {
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .expect("bind should succeed");
        let port = listener.local_addr().unwrap().port();

        let (uri_tx, uri_rx) = oneshot::channel::<String>();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |req: &Request,
                                 resp: Response|
                  -> std::result::Result<Response, ErrorResponse> {
                let _ = uri_tx.send(req.uri().to_string());
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();

            ws.send(WsMessage::Text(r#"{"count": 1, "private_count": 1}"#.into()))
                .await
                .unwrap();
            let received = loop {
                match ws.next().await {
                    Some(Ok(WsMessage::Text(text))) => break text.to_string(),
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected frame: {other:?}"),
                }
            };
            ws.close(None).await.unwrap();
            received
        });

        let storage = Arc::new(MemoryStore::new());
        let bridge = SessionBridge::builder()
            .port(port)
            .storage(Arc::clone(&storage))
            .build()
            .unwrap();
        let (mut core, bridge_ports) = ports::pair();
        let handle = bridge.start(bridge_ports).unwrap();

        let inbound = timeout(WAIT, core.recv()).await.unwrap().unwrap();
        assert_eq!(inbound["data"], json!({"count": 1, "private_count": 1}));
        assert!(inbound["timeStamp"].as_f64().unwrap() >= 0.0);

        core.send(json!("Increment")).unwrap();
        assert_eq!(server.await.unwrap(), "\"Increment\"");

        let uri = uri_rx.await.unwrap();
        let stored = storage.get(IDENTITY_KEY).unwrap().unwrap();
        assert_eq!(uri, format!("/ws?uuid={stored}"));
        assert_eq!(handle.identity().as_str(), stored);

        let reason = timeout(WAIT, handle.closed()).await.unwrap().unwrap();
        assert!(matches!(reason, CloseReason::Remote { .. }));
    }

    #[tokio::test]
    async fn test_messages_emitted_before_open_flush_in_order() {
        let storage = Arc::new(MemoryStore::new());
        let urls = Arc::new(Mutex::new(Vec::new()));
        let (servers_tx, mut servers) = mpsc::unbounded_channel();
        let connector = MockConnector {
            failures_left: AtomicU32::new(0),
            failure: refused,
            urls,
            servers: servers_tx,
        };

        let (core, bridge_ports) = ports::pair();
        for i in 0..3 {
            core.send(json!({"SetGuess": i})).unwrap();
        }

        let _handle = SessionBridge::new(BridgeOptions::new(), storage, connector)
            .start(bridge_ports)
            .unwrap();
        let mut server = servers.recv().await.unwrap();

        for i in 0..3 {
            assert_eq!(next_text(&mut server).await, json!({"SetGuess": i}));
        }
    }

    #[tokio::test]
    async fn test_state_transitions_and_events() {
        let mut h = start_mock(BridgeOptions::new().with_error_channel(), 0);
        let mut events = h.handle.take_events().expect("error channel enabled");
        let mut server = h.next_server().await;

        let open = timeout(WAIT, h.handle.wait_for_state(ConnectionState::Open))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(open.instance, 1);

        server.close(None).await.unwrap();
        let reason = timeout(WAIT, h.handle.closed()).await.unwrap().unwrap();
        assert!(matches!(reason, CloseReason::Remote { .. }));

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                BridgeEvent::StateChanged { instance: 1, state: ConnectionState::Connecting },
                BridgeEvent::StateChanged { instance: 1, state: ConnectionState::Open },
                BridgeEvent::StateChanged { instance: 1, state: ConnectionState::Closed },
                BridgeEvent::Closed { instance: 1, reason },
            ]
        );
    }

    #[tokio::test]
    async fn test_closed_without_retry_is_terminal() {
        let mut h = start_mock(BridgeOptions::new(), 0);
        let mut server = h.next_server().await;
        server.close(None).await.unwrap();

        let Harness { mut core, handle, .. } = h;
        timeout(WAIT, handle.closed()).await.unwrap().unwrap();

        // The bridge dropped its ports: nothing is consumed or delivered anymore.
        assert!(core.send(json!("Increment")).is_err());
        assert_eq!(core.recv().await, None);
    }

    #[tokio::test]
    async fn test_connect_failure_without_retry() {
        let mut h = start_mock(BridgeOptions::new().with_error_channel(), 1);
        let mut events = h.handle.take_events().unwrap();

        let reason = timeout(WAIT, h.handle.closed()).await.unwrap().unwrap();
        assert!(matches!(reason, CloseReason::ConnectFailed(_)));
        assert_eq!(h.urls.lock().len(), 1);

        let mut failed = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, BridgeEvent::ConnectFailed { instance: 1, .. }) {
                failed = true;
            }
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn test_retry_opens_new_instance_with_same_identity() {
        let options =
            BridgeOptions::new().with_retry(RetryPolicy::fixed(3, Duration::from_millis(10)));
        let mut h = start_mock(options, 1);

        // Attempt 1 fails, attempt 2 opens.
        let mut server = h.next_server().await;
        let open = timeout(WAIT, h.handle.wait_for_state(ConnectionState::Open))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(open.instance, 2);

        // Server drops instance 2; instance 3 opens.
        server.close(None).await.unwrap();
        let mut server = h.next_server().await;

        h.core.send(json!("after-reconnect")).unwrap();
        assert_eq!(next_text(&mut server).await, json!("after-reconnect"));

        let urls = h.urls.lock().clone();
        assert_eq!(urls.len(), 3);
        let stored = h.storage.get(IDENTITY_KEY).unwrap().unwrap();
        for url in &urls {
            assert_eq!(url.query(), Some(format!("uuid={stored}").as_str()));
        }
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let options =
            BridgeOptions::new().with_retry(RetryPolicy::fixed(2, Duration::from_millis(1)));
        let h = start_mock(options, 10);

        let reason = timeout(WAIT, h.handle.closed()).await.unwrap().unwrap();
        assert!(matches!(reason, CloseReason::ConnectFailed(_)));
        assert_eq!(h.urls.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_unrecoverable_failure_is_not_retried() {
        let options =
            BridgeOptions::new().with_retry(RetryPolicy::fixed(3, Duration::from_millis(1)));
        let h = start_mock_failing_with(options, 10, || {
            Error::storage("/tmp/storage.json", "permission denied")
        });

        let reason = timeout(WAIT, h.handle.closed()).await.unwrap().unwrap();
        assert!(matches!(reason, CloseReason::ConnectFailed(_)));
        assert_eq!(h.urls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_sends_close_and_does_not_retry() {
        let options =
            BridgeOptions::new().with_retry(RetryPolicy::fixed(3, Duration::from_millis(1)));
        let mut h = start_mock(options, 0);
        let mut server = h.next_server().await;
        timeout(WAIT, h.handle.wait_for_state(ConnectionState::Open))
            .await
            .unwrap()
            .unwrap();

        h.handle.shutdown();
        match timeout(WAIT, server.next()).await.unwrap() {
            Some(Ok(WsMessage::Close(_))) => {}
            other => panic!("expected close frame, got {other:?}"),
        }

        let Harness { handle, urls, .. } = h;
        assert_eq!(timeout(WAIT, handle.closed()).await.unwrap().unwrap(), CloseReason::Shutdown);
        assert_eq!(urls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_wire_is_anonymous_and_unwrapped() {
        let options = BridgeOptions::new().with_wire_version(crate::protocol::WireVersion::Legacy);
        let mut h = start_mock(options, 0);
        let mut server = h.next_server().await;

        server
            .send(WsMessage::Text(r#"{"count": 2}"#.into()))
            .await
            .unwrap();
        let inbound = timeout(WAIT, h.core.recv()).await.unwrap().unwrap();
        assert_eq!(inbound, json!({"count": 2}));

        let url = h.urls.lock()[0].clone();
        assert_eq!(url.path(), "/ws/");
        assert!(url.query().is_none());
        assert_eq!(h.handle.url(), &url);
    }

    #[tokio::test]
    async fn test_dropping_handle_shuts_down() {
        let mut h = start_mock(BridgeOptions::new(), 0);
        let mut server = h.next_server().await;
        timeout(WAIT, h.handle.wait_for_state(ConnectionState::Open))
            .await
            .unwrap()
            .unwrap();

        let Harness { handle, .. } = h;
        drop(handle);

        match timeout(WAIT, server.next()).await.unwrap() {
            Some(Ok(WsMessage::Close(_))) => {}
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}
