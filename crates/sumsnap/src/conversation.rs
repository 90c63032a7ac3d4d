//! Drives one chat turn from the caller's side of the relay.
//!
//! A [`Conversation`] owns the committed history and the cancellation slot for
//! its single in-flight request. Starting a new turn cancels whatever was in
//! flight before it. Fragments go to a transient buffer and only become an
//! assistant turn once the body ends cleanly.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::message::{ChatMessage, RelayRequest};
use crate::prompt::{compose, MAX_CONTEXT_RESULTS};
use crate::search::{SearchError, WebSearch};

pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Relay returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Sends a relay request and hands back the raw response body.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: &RelayRequest) -> Result<ByteStream, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Plain(String),
    WebAugmented { query: String },
}

impl ChatInput {
    pub const WEB_PREFIX: &'static str = "/web ";

    /// Resolve raw input text. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match raw.strip_prefix(Self::WEB_PREFIX) {
            Some(query) => ChatInput::WebAugmented {
                query: query.trim().to_string(),
            },
            None => ChatInput::Plain(raw.to_string()),
        })
    }

    /// The text recorded as the user turn.
    pub fn text(&self) -> &str {
        match self {
            ChatInput::Plain(text) => text,
            ChatInput::WebAugmented { query } => query,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("Web search failed: {0}")]
    Search(#[from] SearchError),

    #[error("Relay request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to build prompt: {0}")]
    Prompt(String),
}

impl ConversationError {
    /// Generic text for the user; details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            ConversationError::Search(_) => "Web search failed. Please try again in a moment.",
            _ => "Sorry, something went wrong while generating a reply. Please try again.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed { reply: String, bytes: usize },
    Cancelled,
}

#[derive(Default)]
struct Slot {
    next_turn: u64,
    current: Option<(u64, CancellationToken)>,
}

/// Cancels the in-flight turn of one conversation.
#[derive(Clone, Default)]
pub struct Canceller {
    slot: Arc<Mutex<Slot>>,
}

impl Canceller {
    /// Abort the current turn, if any. Returns whether something was cancelled.
    pub fn cancel(&self) -> bool {
        match self.lock().current.take() {
            Some((turn, token)) => {
                tracing::info!(turn, "stop requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().current.is_some()
    }

    /// Install a token for a new turn, cancelling the previous one.
    fn begin(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut slot = self.lock();
        slot.next_turn += 1;
        let turn = slot.next_turn;
        if let Some((_, previous)) = slot.current.replace((turn, token.clone())) {
            previous.cancel();
        }
        (turn, token)
    }

    /// Clear the slot if it still belongs to `turn`.
    fn end(&self, turn: u64) {
        let mut slot = self.lock();
        if slot.current.as_ref().is_some_and(|(current, _)| *current == turn) {
            slot.current = None;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct Conversation {
    transport: Arc<dyn ChatTransport>,
    search: Arc<dyn WebSearch>,
    system_prompt: Option<String>,
    history: Vec<ChatMessage>,
    in_progress: String,
    active: Canceller,
}

impl Conversation {
    pub fn new(transport: Arc<dyn ChatTransport>, search: Arc<dyn WebSearch>) -> Self {
        Conversation {
            transport,
            search,
            system_prompt: None,
            history: Vec::new(),
            in_progress: String::new(),
            active: Canceller::default(),
        }
    }

    pub fn with_system_prompt<S: Into<String>>(mut self, system_prompt: S) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Text received so far for the turn in flight.
    pub fn in_progress(&self) -> &str {
        &self.in_progress
    }

    pub fn canceller(&self) -> Canceller {
        self.active.clone()
    }

    /// Run one turn. `on_fragment` sees each decoded piece of the reply as it
    /// arrives.
    pub async fn send<F>(
        &mut self,
        input: ChatInput,
        mut on_fragment: F,
    ) -> Result<TurnOutcome, ConversationError>
    where
        F: FnMut(&str),
    {
        let (turn, token) = self.active.begin();
        let web_query = match &input {
            ChatInput::WebAugmented { query } => Some(query.clone()),
            ChatInput::Plain(_) => None,
        };

        let mark = self.history.len();
        self.history.push(ChatMessage::user(input.text()));
        self.in_progress.clear();
        tracing::info!(
            length = input.text().chars().count(),
            history = self.history.len(),
            web = web_query.is_some(),
            "send start"
        );

        let result = self.run_turn(web_query, &token, &mut on_fragment).await;
        self.active.end(turn);
        self.in_progress.clear();
        if !matches!(result, Ok(TurnOutcome::Completed { .. })) {
            // drop the unanswered user turn
            self.history.truncate(mark);
        }

        match &result {
            Ok(TurnOutcome::Completed { bytes, .. }) => {
                tracing::info!(bytes, "stream complete")
            }
            Ok(TurnOutcome::Cancelled) => tracing::info!("send cancelled"),
            Err(e) => tracing::error!(error = %e, "send error"),
        }
        result
    }

    async fn run_turn<F>(
        &mut self,
        web_query: Option<String>,
        token: &CancellationToken,
        on_fragment: &mut F,
    ) -> Result<TurnOutcome, ConversationError>
    where
        F: FnMut(&str),
    {
        let results = match web_query {
            Some(query) => {
                tracing::info!(qlen = query.chars().count(), "search start");
                let response = tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok(TurnOutcome::Cancelled),
                    response = self.search.search(&query) => response,
                };
                let response = response.inspect_err(|e| {
                    tracing::error!(kind = e.kind(), "search fail");
                })?;
                tracing::info!(
                    count = response.results.len().min(MAX_CONTEXT_RESULTS),
                    "search done"
                );
                response.results
            }
            None => Vec::new(),
        };

        let request = compose(&self.history, self.system_prompt.as_deref(), &results)
            .map_err(|e| ConversationError::Prompt(e.to_string()))?;

        let mut body = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(TurnOutcome::Cancelled),
            opened = self.transport.open(&request) => opened?,
        };

        let mut decoder = Utf8Decoder::default();
        let mut bytes = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(TurnOutcome::Cancelled),
                next = body.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    bytes += chunk.len();
                    let text = decoder.push(&chunk);
                    if token.is_cancelled() {
                        return Ok(TurnOutcome::Cancelled);
                    }
                    if !text.is_empty() {
                        self.in_progress.push_str(&text);
                        on_fragment(&text);
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            self.in_progress.push_str(&tail);
            on_fragment(&tail);
        }

        let reply = std::mem::take(&mut self.in_progress);
        self.history.push(ChatMessage::assistant(reply.clone()));
        Ok(TurnOutcome::Completed { reply, bytes })
    }
}

/// Decodes UTF-8 incrementally, holding back a character split across chunks.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
