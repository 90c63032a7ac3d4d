//! Bridges one chat request to an upstream streaming completion.
//!
//! [`Relay::open`] validates the payload and opens the upstream call, then
//! spawns a task that forwards each text fragment into a bounded channel as
//! soon as it arrives. The returned [`RelayStream`] drains that channel; it
//! carries raw UTF-8 text deltas with no framing. A failure after the first
//! fragment is delivered as an `Err` item so the consumer can tell a cut-off
//! reply from a finished one.
//!
//! Each request owns a [`StreamSession`]. Its cancellation token is checked
//! before every fragment is forwarded, and dropping the `RelayStream` (for
//! example when the HTTP client disconnects) triggers it.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::errors::RelayError;
use crate::models::message::RelayRequest;
use crate::providers::base::{FragmentStream, StreamingProvider};

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Received,
    Validated,
    UpstreamOpened,
    Streaming,
    Closed,
    Errored,
    Cancelled,
    Rejected,
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RelayState::Closed | RelayState::Errored | RelayState::Cancelled | RelayState::Rejected
        )
    }
}

/// Bookkeeping for one in-flight relay operation.
pub struct StreamSession {
    id: Uuid,
    cancel: CancellationToken,
    started_at: Instant,
    bytes: Arc<AtomicUsize>,
    state: watch::Sender<RelayState>,
}

/// Observer and cancellation handle for a [`StreamSession`].
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    cancel: CancellationToken,
    bytes: Arc<AtomicUsize>,
    state: watch::Receiver<RelayState>,
}

impl StreamSession {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Build a session cancelled by `cancel`, e.g. a child of a wider token.
    pub fn with_token(cancel: CancellationToken) -> Self {
        let (state, _) = watch::channel(RelayState::Received);
        StreamSession {
            id: Uuid::new_v4(),
            cancel,
            started_at: Instant::now(),
            bytes: Arc::new(AtomicUsize::new(0)),
            state,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            cancel: self.cancel.clone(),
            bytes: self.bytes.clone(),
            state: self.state.subscribe(),
        }
    }

    fn transition(&self, next: RelayState) {
        tracing::debug!(session = %self.id, state = ?next, "relay state");
        self.state.send_replace(next);
    }

    fn record(&self, len: usize) {
        self.bytes.fetch_add(len, Ordering::SeqCst);
    }

    fn duration_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop forwarding. Safe to call any number of times, before or after the
    /// stream has ended.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn bytes_forwarded(&self) -> usize {
        self.bytes.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    /// Wait until the session reaches a terminal state.
    pub async fn finished(&mut self) -> RelayState {
        let reached = self
            .state
            .wait_for(RelayState::is_terminal)
            .await
            .map(|state| *state);
        match reached {
            Ok(state) => state,
            Err(_) => *self.state.borrow(),
        }
    }
}

/// Validate a raw chat payload.
pub fn parse_request(payload: Value) -> Result<RelayRequest, RelayError> {
    if !matches!(payload.get("messages"), Some(Value::Array(_))) {
        return Err(RelayError::BadRequest("messages must be an array".to_string()));
    }

    let request: RelayRequest = serde_json::from_value(payload)
        .map_err(|e| RelayError::BadRequest(format!("invalid chat payload: {}", e)))?;

    if request.messages.is_empty() && request.instruction().is_none() {
        return Err(RelayError::BadRequest("messages must not be empty".to_string()));
    }
    Ok(request)
}

#[derive(Clone)]
pub struct Relay {
    provider: Option<Arc<dyn StreamingProvider>>,
}

impl Relay {
    /// `None` leaves the relay unconfigured; every request is then refused.
    pub fn new(provider: Option<Arc<dyn StreamingProvider>>) -> Self {
        Relay { provider }
    }

    pub async fn open(
        &self,
        payload: Value,
        session: StreamSession,
    ) -> Result<RelayStream, RelayError> {
        let Some(provider) = self.provider.clone() else {
            tracing::error!(session = %session.id, "relay upstream credential is not set");
            session.transition(RelayState::Rejected);
            return Err(RelayError::Unconfigured);
        };

        let request = match parse_request(payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(session = %session.id, error = %e, "relay invalid payload");
                session.transition(RelayState::Rejected);
                return Err(e);
            }
        };
        session.transition(RelayState::Validated);

        tracing::info!(
            session = %session.id,
            messages = request.messages.len(),
            has_system_prompt = request.instruction().is_some(),
            "relay request start"
        );

        let opened = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => {
                session.transition(RelayState::Cancelled);
                return Err(RelayError::Stream("cancelled before the upstream responded".to_string()));
            }
            opened = provider.stream(&request) => opened,
        };

        let upstream = match opened {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::error!(session = %session.id, error = %e, "relay upstream open failed");
                session.transition(RelayState::Errored);
                return Err(e.into());
            }
        };
        session.transition(RelayState::UpstreamOpened);

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = session.handle();
        let guard = session.cancel.clone().drop_guard();
        tokio::spawn(forward(upstream, tx, session));

        Ok(RelayStream {
            rx: ReceiverStream::new(rx),
            handle,
            _guard: guard,
        })
    }
}

async fn forward(
    mut upstream: FragmentStream,
    tx: mpsc::Sender<Result<Bytes, RelayError>>,
    session: StreamSession,
) {
    tracing::info!(session = %session.id, "relay stream start");
    session.transition(RelayState::Streaming);

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => break RelayState::Cancelled,
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(text)) => {
                if text.is_empty() {
                    continue;
                }
                let payload = Bytes::from(text);
                let len = payload.len();
                let sent = tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => break RelayState::Cancelled,
                    sent = tx.send(Ok(payload)) => sent,
                };
                if sent.is_err() {
                    // receiver is gone; nobody is reading any more
                    break RelayState::Cancelled;
                }
                session.record(len);
            }
            Some(Err(e)) => {
                tracing::error!(session = %session.id, error = %e, "relay stream error");
                let error = RelayError::Stream(e.to_string());
                tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => {}
                    _ = tx.send(Err(error)) => {}
                }
                break RelayState::Errored;
            }
            None => break RelayState::Closed,
        }
    };

    drop(upstream);

    match outcome {
        RelayState::Closed => tracing::info!(
            session = %session.id,
            duration_ms = session.duration_ms() as u64,
            bytes = session.bytes.load(Ordering::SeqCst),
            "relay stream end"
        ),
        RelayState::Cancelled => tracing::info!(
            session = %session.id,
            duration_ms = session.duration_ms() as u64,
            bytes = session.bytes.load(Ordering::SeqCst),
            "relay stream cancelled"
        ),
        _ => {}
    }
    session.transition(outcome);
}

/// Text fragments of one relayed reply, in upstream order.
///
/// Dropping it cancels the session and releases the upstream connection.
pub struct RelayStream {
    rx: ReceiverStream<Result<Bytes, RelayError>>,
    handle: SessionHandle,
    _guard: DropGuard,
}

impl RelayStream {
    pub fn session(&self) -> &SessionHandle {
        &self.handle
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, RelayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}
