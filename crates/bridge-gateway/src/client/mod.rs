//! Gateway session manager
//!
//! Keeps one logical session alive over a churning WebSocket transport:
//! discovery, handshake or resume, heartbeat, and teardown into a fresh
//! reconnect. Application frames are handed to the message handler through a
//! queue so that a slow handler never stalls the read loop.

mod discovery;
mod handle;

pub use discovery::{connect_url, GatewayDiscovery, HttpDiscovery, StaticDiscovery};
pub use handle::{GatewayHandle, GatewayStatus};

use crate::connection::{
    sleep_until_deadline, ConnectionState, HeartbeatAction, HeartbeatScheduler, Session,
    SessionStore,
};
use crate::events::ApplicationFrame;
use crate::handlers::MessageHandler;
use crate::protocol::{self, CodecError, Envelope, Signal};
use bridge_common::GatewayConfig;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use handle::Control;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Upper bound on a graceful close of a torn-down transport
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a connection was torn down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Hello carried a non-zero code
    HandshakeRejected(i64),
    /// Signal 5
    ServerReconnect,
    /// Transport ended without an error
    TransportClosed,
    TransportError {
        during_handshake: bool,
        message: String,
    },
    /// Heartbeat retry ceiling exceeded
    HeartbeatTimeout,
    /// The periodic check found the transport closing
    LivenessCheckFailed,
    ConnectFailed(String),
    SendFailed(String),
    /// Requested through [`GatewayHandle::request_reconnect`]
    ReconnectRequested,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HandshakeRejected(code) => write!(f, "handshake rejected with code {code}"),
            Self::ServerReconnect => f.write_str("server requested reconnect"),
            Self::TransportClosed => f.write_str("transport closed"),
            Self::TransportError {
                during_handshake: true,
                message,
            } => write!(f, "transport error before handshake: {message}"),
            Self::TransportError { message, .. } => write!(f, "transport error: {message}"),
            Self::HeartbeatTimeout => f.write_str("heartbeat not acknowledged"),
            Self::LivenessCheckFailed => f.write_str("liveness check found transport closed"),
            Self::ConnectFailed(message) => write!(f, "connect failed: {message}"),
            Self::SendFailed(message) => write!(f, "send failed: {message}"),
            Self::ReconnectRequested => f.write_str("reconnect requested"),
        }
    }
}

/// How a connection ended
#[derive(Debug)]
enum Teardown {
    Shutdown,
    Reconnect(DisconnectReason),
}

/// Per-connection state, dropped with the transport
struct Link {
    heartbeat: HeartbeatScheduler,
    handshake_complete: bool,
    closing: bool,
}

impl Link {
    fn new(config: &GatewayConfig) -> Self {
        Self {
            heartbeat: HeartbeatScheduler::from_config(config),
            handshake_complete: false,
            closing: false,
        }
    }
}

/// Long-lived gateway client
pub struct GatewayClient {
    config: GatewayConfig,
    discovery: Arc<dyn GatewayDiscovery>,
    store: Arc<dyn SessionStore>,
    handler: Arc<dyn MessageHandler>,
    session: Session,
    control: Arc<Control>,
}

impl GatewayClient {
    /// Create a client, loading the persisted session from `store`
    pub async fn new(
        config: GatewayConfig,
        discovery: Arc<dyn GatewayDiscovery>,
        store: Arc<dyn SessionStore>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let session = store.load().await;
        if session.is_resumable() {
            tracing::info!(
                session_id = %session.session_id,
                sequence = session.sequence,
                "Loaded resumable session"
            );
        }

        Self {
            config,
            discovery,
            store,
            handler,
            control: Control::new(session.clone()),
            session,
        }
    }

    /// Handle for controlling the client once it runs
    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle::new(Arc::clone(&self.control))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run until [`GatewayHandle::shutdown`] is called.
    ///
    /// Every failure is recovered by reconnecting with a fresh session.
    pub async fn run(mut self) {
        let (frames, queue) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch_frames(Arc::clone(&self.handler), queue));

        while !self.control.is_shutdown() {
            let Some(endpoint) = self.discover().await else {
                break;
            };

            match self.connect_and_serve(&endpoint, &frames).await {
                Teardown::Shutdown => break,
                Teardown::Reconnect(reason) => {
                    tracing::warn!(
                        reason = %reason,
                        session_id = %self.session.session_id,
                        sequence = self.session.sequence,
                        "Gateway connection lost, reconnecting with a fresh session"
                    );
                    self.invalidate_session().await;
                    self.set_state(ConnectionState::Disconnected);

                    if self.pause(self.config.reconnect_delay).await {
                        break;
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);

        // Let the handler finish what was already received
        drop(frames);
        if let Err(e) = dispatcher.await {
            tracing::error!(error = %e, "Frame dispatcher failed");
        }

        tracing::info!(
            session_id = %self.session.session_id,
            sequence = self.session.sequence,
            "Gateway client stopped"
        );
    }

    /// Resolve an endpoint, retrying until it succeeds or shutdown is requested
    async fn discover(&self) -> Option<String> {
        self.set_state(ConnectionState::Connecting);

        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);

            let result = tokio::select! {
                result = self.discovery.resolve() => result,
                () = self.control.shutdown_requested() => return None,
            };

            match result {
                Ok(endpoint) => {
                    tracing::debug!(endpoint = %endpoint, attempt, "Gateway endpoint resolved");
                    return Some(endpoint);
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "Gateway discovery failed, retrying");
                    if self.pause(self.config.discovery_retry_delay).await {
                        return None;
                    }
                }
            }
        }
    }

    async fn connect_and_serve(
        &mut self,
        endpoint: &str,
        frames: &mpsc::UnboundedSender<ApplicationFrame>,
    ) -> Teardown {
        let url = match connect_url(endpoint, &self.session, self.config.compress) {
            Ok(url) => url,
            Err(e) => return Teardown::Reconnect(DisconnectReason::ConnectFailed(e.to_string())),
        };

        let resuming = self.session.is_resumable();
        tracing::info!(
            session_id = %self.session.session_id,
            sequence = self.session.sequence,
            resuming,
            "Connecting to gateway"
        );

        let control = Arc::clone(&self.control);
        let connected = tokio::select! {
            result = connect_async(url.as_str()) => result,
            () = control.shutdown_requested() => return Teardown::Shutdown,
        };
        let (socket, _) = match connected {
            Ok(pair) => pair,
            Err(e) => return Teardown::Reconnect(DisconnectReason::ConnectFailed(e.to_string())),
        };

        let (mut sink, mut stream) = socket.split();
        self.set_state(ConnectionState::Open);
        tracing::info!("Gateway transport open");

        // Requests made while this connection was being set up are merged into it
        if self.control.discard_pending_reconnect() {
            tracing::debug!("Reconnect request merged into the new connection");
        }

        if resuming {
            if let Err(e) = send(&mut sink, &Envelope::resume(self.session.sequence)).await {
                return Teardown::Reconnect(DisconnectReason::SendFailed(e.to_string()));
            }
        }

        let mut link = Link::new(&self.config);
        link.heartbeat.start();

        let period = self.config.liveness_check_interval;
        let mut liveness = tokio::time::interval_at(Instant::now() + period, period);
        let reconnect = Arc::clone(&self.control.reconnect);

        let teardown = loop {
            tokio::select! {
                () = control.shutdown_requested() => break Teardown::Shutdown,

                () = reconnect.notified() => {
                    break Teardown::Reconnect(DisconnectReason::ReconnectRequested);
                }

                message = stream.next() => match message {
                    Some(Ok(message)) => {
                        if let Some(reason) = self.on_message(message, &mut link, frames).await {
                            break Teardown::Reconnect(reason);
                        }
                    }
                    Some(Err(e)) => {
                        break Teardown::Reconnect(DisconnectReason::TransportError {
                            during_handshake: !link.handshake_complete,
                            message: e.to_string(),
                        });
                    }
                    None => break Teardown::Reconnect(DisconnectReason::TransportClosed),
                },

                () = sleep_until_deadline(link.heartbeat.deadline()) => {
                    if link.closing {
                        link.heartbeat.cancel();
                        continue;
                    }

                    match link.heartbeat.on_timer(Instant::now()) {
                        HeartbeatAction::SendPing => {
                            tracing::trace!(
                                sequence = self.session.sequence,
                                outstanding = link.heartbeat.outstanding_retries(),
                                "Sending heartbeat"
                            );
                            if let Err(e) = send(&mut sink, &Envelope::ping(self.session.sequence)).await {
                                break Teardown::Reconnect(DisconnectReason::SendFailed(e.to_string()));
                            }
                        }
                        HeartbeatAction::Reconnect => {
                            break Teardown::Reconnect(DisconnectReason::HeartbeatTimeout);
                        }
                    }
                }

                _ = liveness.tick() => {
                    if link.closing {
                        break Teardown::Reconnect(DisconnectReason::LivenessCheckFailed);
                    }
                }
            }
        };

        link.heartbeat.cancel();
        self.set_state(ConnectionState::Closing);
        match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Transport close failed"),
            Err(_) => tracing::debug!("Transport close timed out"),
        }

        teardown
    }

    async fn on_message(
        &mut self,
        message: Message,
        link: &mut Link,
        frames: &mpsc::UnboundedSender<ApplicationFrame>,
    ) -> Option<DisconnectReason> {
        if let Message::Close(frame) = &message {
            tracing::info!(frame = ?frame, "Gateway is closing the transport");
            link.closing = true;
            self.set_state(ConnectionState::Closing);
            return None;
        }

        match protocol::decode(&message) {
            Ok(Some(envelope)) => self.on_envelope(envelope, link, frames).await,
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable frame");
                None
            }
        }
    }

    async fn on_envelope(
        &mut self,
        envelope: Envelope,
        link: &mut Link,
        frames: &mpsc::UnboundedSender<ApplicationFrame>,
    ) -> Option<DisconnectReason> {
        if !self.session.accept_sequence(envelope.sn) {
            tracing::debug!(
                sequence = envelope.sn,
                stored = self.session.sequence,
                signal = %envelope.s,
                "Dropping replayed frame"
            );
            return None;
        }

        let outcome = match envelope.s {
            Signal::Hello => match envelope.as_hello() {
                Some(hello) if hello.is_accepted() => {
                    if let Some(session_id) = hello.session_id {
                        self.session.set_session_id(session_id);
                    }
                    link.handshake_complete = true;
                    tracing::info!(session_id = %self.session.session_id, "Handshake accepted");
                    None
                }
                Some(hello) => {
                    tracing::warn!(code = hello.code, "Handshake rejected");
                    Some(DisconnectReason::HandshakeRejected(hello.code))
                }
                None => {
                    tracing::warn!(body = %envelope.d, "Unparseable handshake result");
                    None
                }
            },
            Signal::ResumeAck => {
                if let Some(session_id) = envelope.as_resume_ack().and_then(|ack| ack.session_id) {
                    self.session.set_session_id(session_id);
                }
                link.handshake_complete = true;
                tracing::info!(
                    session_id = %self.session.session_id,
                    sequence = self.session.sequence,
                    "Session resumed"
                );
                None
            }
            Signal::Pong => {
                link.heartbeat.on_ack(Instant::now());
                tracing::trace!("Heartbeat acknowledged");
                None
            }
            Signal::Reconnect => {
                tracing::warn!(body = %envelope.d, "Gateway demanded a reconnect");
                Some(DisconnectReason::ServerReconnect)
            }
            Signal::Message => {
                if frames.send(ApplicationFrame::from_envelope(envelope)).is_err() {
                    tracing::error!("Frame dispatcher is gone, dropping frame");
                }
                None
            }
            Signal::Ping | Signal::Resume => {
                tracing::warn!(signal = %envelope.s, "Ignoring client-only signal");
                None
            }
        };

        if outcome.is_none() {
            self.persist_session().await;
        }
        outcome
    }

    /// Forget the session so the next connection performs a clean handshake
    async fn invalidate_session(&mut self) {
        self.session.reset();
        self.persist_session().await;
    }

    async fn persist_session(&self) {
        if let Err(e) = self.store.save(&self.session).await {
            tracing::warn!(error = %e, "Failed to persist session");
        }
        self.control
            .status
            .send_modify(|status| status.session.clone_from(&self.session));
    }

    fn set_state(&self, state: ConnectionState) {
        self.control.status.send_if_modified(|status| {
            let changed = status.state != state;
            status.state = state;
            changed
        });
    }

    /// Sleep for `delay`; returns `true` if shutdown was requested meanwhile
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => self.control.is_shutdown(),
            () = self.control.shutdown_requested() => true,
        }
    }
}

async fn send(sink: &mut WsSink, envelope: &Envelope) -> Result<(), SendError> {
    let message = protocol::encode(envelope)?;
    sink.send(message).await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum SendError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transport(#[from] tungstenite::Error),
}

/// Invoke the handler for each frame, one at a time, in arrival order
async fn dispatch_frames(
    handler: Arc<dyn MessageHandler>,
    mut frames: mpsc::UnboundedReceiver<ApplicationFrame>,
) {
    while let Some(frame) = frames.recv().await {
        let sequence = frame.sequence;
        let handler = Arc::clone(&handler);

        // A panicking handler must not take the dispatcher down with it
        if let Err(e) = tokio::spawn(async move { handler.handle(frame).await }).await {
            tracing::error!(sequence = ?sequence, error = %e, "Message handler panicked");
        }
    }
}
