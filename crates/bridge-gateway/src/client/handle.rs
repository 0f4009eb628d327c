//! Control handle for a running gateway client

use crate::connection::{ConnectionState, Session};
use futures_util::FutureExt;
use std::sync::Arc;
use tokio::sync::{watch, Notify};

/// Snapshot of the gateway client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayStatus {
    pub state: ConnectionState,
    pub session: Session,
}

/// Shared control channels between a client and its handles
#[derive(Debug)]
pub(crate) struct Control {
    pub(crate) reconnect: Arc<Notify>,
    pub(crate) shutdown: watch::Sender<bool>,
    pub(crate) status: watch::Sender<GatewayStatus>,
}

impl Control {
    pub(crate) fn new(session: Session) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        let (status, _) = watch::channel(GatewayStatus {
            state: ConnectionState::Disconnected,
            session,
        });

        Arc::new(Self {
            reconnect: Arc::new(Notify::new()),
            shutdown,
            status,
        })
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Consume a reconnect request left over from before the current
    /// connection; it was already satisfied by the connection being made.
    ///
    /// Returns `true` when a request was dropped.
    pub(crate) fn discard_pending_reconnect(&self) -> bool {
        self.reconnect.notified().now_or_never().is_some()
    }

    /// Resolves once shutdown has been requested
    pub(crate) async fn shutdown_requested(&self) {
        let mut rx = self.shutdown.subscribe();
        // The sender lives as long as `self`, so the wait never errors out
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

/// Cloneable handle to a running [`GatewayClient`](super::GatewayClient)
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    control: Arc<Control>,
}

impl GatewayHandle {
    pub(crate) fn new(control: Arc<Control>) -> Self {
        Self { control }
    }

    /// Tear down the current connection and start over with a fresh session.
    ///
    /// Requests made while one is still pending, or while a new connection is
    /// being set up, collapse into that reconnect.
    pub fn request_reconnect(&self) {
        self.control.reconnect.notify_one();
    }

    /// Stop the client; the persisted session is kept so a later start resumes
    pub fn shutdown(&self) {
        self.control.shutdown.send_replace(true);
    }

    /// Current connection state and session
    pub fn state(&self) -> GatewayStatus {
        self.control.status.borrow().clone()
    }

    /// Receiver that observes every status change
    pub fn subscribe(&self) -> watch::Receiver<GatewayStatus> {
        self.control.status.subscribe()
    }
}
