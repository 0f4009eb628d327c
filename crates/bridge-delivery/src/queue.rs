//! Outbound delivery queue
//!
//! Producers push onto an unbounded channel; a single worker task drains it in
//! FIFO order, so at most one request is ever in flight and a message's
//! retries finish before the next message's first attempt. The worker owns the
//! correlation map, so no lock guards it.

use crate::api::{MessageApi, SendAction, SendRequest};
use crate::classify::{classify, ResponseClass};
use crate::correlation::CorrelationMap;
use crate::error::{DeliveryError, DeliveryResult};
use crate::message::{MessageContent, OutboundMessage};
use crate::splitter::ContentSplitter;
use bridge_common::{ApiResponse, DeliveryConfig, PlatformError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Successful delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub action: SendAction,
    /// Target-side message id (returned by a create, or the updated message)
    pub target_message_id: Option<String>,
    /// Requests made, including retries and repaired re-sends
    pub attempts: u32,
}

/// Settlement of an enqueued message.
///
/// Dropping the ticket leaves the message in the queue (fire-and-forget).
#[derive(Debug)]
pub struct DeliveryTicket {
    rx: oneshot::Receiver<DeliveryResult<Delivered>>,
}

impl DeliveryTicket {
    /// Wait for the message to settle
    pub async fn outcome(self) -> DeliveryResult<Delivered> {
        self.rx.await.unwrap_or(Err(DeliveryError::QueueClosed))
    }
}

struct Job {
    message: OutboundMessage,
    settle: oneshot::Sender<DeliveryResult<Delivered>>,
}

/// Producer side of the queue; cheap to clone
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl DeliveryQueue {
    /// Create a queue and the worker that drains it
    pub fn new(config: DeliveryConfig, api: Arc<dyn MessageApi>) -> (Self, DeliveryWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = DeliveryWorker {
            rx,
            config,
            api,
            correlations: CorrelationMap::new(),
            splitter: ContentSplitter::default(),
        };
        (Self { tx }, worker)
    }

    /// Create a queue and spawn its worker on the current runtime
    pub fn spawn(config: DeliveryConfig, api: Arc<dyn MessageApi>) -> Self {
        let (queue, worker) = Self::new(config, api);
        tokio::spawn(worker.run());
        queue
    }

    /// Append a message to the queue
    pub fn enqueue(&self, message: OutboundMessage) -> DeliveryTicket {
        let (settle, rx) = oneshot::channel();
        if let Err(mpsc::error::SendError(job)) = self.tx.send(Job { message, settle }) {
            tracing::error!(target_id = %job.message.target_id, "Delivery queue closed, dropping message");
        }
        DeliveryTicket { rx }
    }
}

/// Consumer side of the queue
pub struct DeliveryWorker {
    rx: mpsc::UnboundedReceiver<Job>,
    config: DeliveryConfig,
    api: Arc<dyn MessageApi>,
    correlations: CorrelationMap,
    splitter: ContentSplitter,
}

impl DeliveryWorker {
    /// Start from known correlations
    #[must_use]
    pub fn with_correlations(mut self, correlations: CorrelationMap) -> Self {
        self.correlations = correlations;
        self
    }

    #[must_use]
    pub fn with_splitter(mut self, splitter: ContentSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Drain the queue until every producer is gone.
    ///
    /// Returns the correlation map built along the way.
    pub async fn run(mut self) -> CorrelationMap {
        while let Some(Job { message, settle }) = self.rx.recv().await {
            let outcome = self.deliver(message).await;
            // The producer may not care about the outcome
            let _ = settle.send(outcome);
        }

        tracing::debug!(correlations = self.correlations.len(), "Delivery worker stopped");
        self.correlations
    }

    async fn deliver(&mut self, mut message: OutboundMessage) -> DeliveryResult<Delivered> {
        if let Some(correlation_id) = &message.correlation_id {
            if let Some(target) = self.correlations.get(correlation_id) {
                message.target_message_id = Some(target.to_owned());
            }
        }

        let mut attempts: u32 = 0;
        let mut retries: u32 = 0;
        let mut repairs: u32 = 0;

        loop {
            tokio::time::sleep(self.config.pacing_delay).await;

            let request = message
                .to_request()
                .map_err(|e| DeliveryError::Encode(e.to_string()))?;
            attempts += 1;

            let result = self.send(&request).await;
            let class = classify(&self.config, &result);

            match class {
                ResponseClass::Success { ref data } => {
                    let target_message_id = class
                        .message_id()
                        .map(str::to_owned)
                        .or_else(|| message.target_message_id.clone());

                    if let (Some(correlation_id), Some(target)) =
                        (&message.correlation_id, &target_message_id)
                    {
                        self.correlations.insert(correlation_id.as_str(), target.as_str());
                    }

                    tracing::info!(
                        kind = "MSG_SENT",
                        action = %request.action,
                        target_id = %message.target_id,
                        correlation_id = message.correlation_id.as_deref(),
                        target_message_id = target_message_id.as_deref(),
                        attempts,
                        response = %data,
                        correlations = self.correlations.len(),
                        "MSG_SENT"
                    );

                    return Ok(Delivered {
                        action: request.action,
                        target_message_id,
                        attempts,
                    });
                }

                ResponseClass::Malformed { code, message: reason }
                | ResponseClass::NonRetryable { code, message: reason } => {
                    tracing::error!(
                        code,
                        reason = %reason,
                        message_type = %message.kind(),
                        body = %request.body,
                        "Message rejected, not retrying"
                    );
                    return Err(DeliveryError::Rejected {
                        code,
                        message: reason,
                    });
                }

                ResponseClass::ContentTooLong { code, .. } => {
                    let before = self.repair(&mut message, repairs).map_err(|e| {
                        tracing::error!(
                            code,
                            message_type = %message.kind(),
                            body = %request.body,
                            "Content too long and cannot be repaired"
                        );
                        e
                    })?;
                    repairs += 1;
                    tracing::warn!(
                        code,
                        repairs,
                        chars_before = before,
                        "Content too long, re-sending truncated card"
                    );
                }

                ResponseClass::Transient { reason } => {
                    if retries >= self.config.max_retries {
                        tracing::error!(
                            attempts,
                            reason = %reason,
                            target_id = %message.target_id,
                            "Delivery failed, giving up"
                        );
                        return Err(DeliveryError::RetriesExhausted { attempts, reason });
                    }
                    retries += 1;
                    tracing::warn!(attempt = attempts, retries, reason = %reason, "Delivery failed, retrying");
                }
            }
        }
    }

    /// Call the API on its own task; a panicking implementation counts as a
    /// transient failure instead of ending the worker
    async fn send(&self, request: &SendRequest) -> Result<ApiResponse, PlatformError> {
        let api = Arc::clone(&self.api);
        let owned = request.clone();

        match tokio::spawn(async move { api.send(&owned).await }).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(action = %request.action, error = %e, "Message API call panicked");
                Err(PlatformError::UnexpectedResponse(format!("send task failed: {e}")))
            }
        }
    }

    /// Shrink a card payload in place.
    ///
    /// The first repair cuts to the configured budget when the text exceeds it;
    /// every other repair halves the text as sent, notice included, so the
    /// payload strictly shrinks and repairs always end.
    /// Returns the measured length before the cut.
    fn repair(&self, message: &mut OutboundMessage, repairs: u32) -> DeliveryResult<usize> {
        let MessageContent::Card(cards) = &message.content else {
            return Err(DeliveryError::ContentTooLong {
                chars: message.content.to_wire().map_or(0, |s| s.chars().count()),
            });
        };

        let measured = self.splitter.measure(cards);
        let budget = if repairs == 0 && measured > self.config.content_max_chars {
            self.config.content_max_chars
        } else {
            measured / 2
        };

        let cut = self
            .splitter
            .split(cards, budget)
            .ok_or(DeliveryError::ContentTooLong { chars: measured })?;
        message.content = MessageContent::Card(cut);
        Ok(measured)
    }
}
