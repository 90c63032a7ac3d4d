use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::errors::ProviderError;
use crate::models::message::RelayRequest;
use crate::providers::base::{FragmentStream, StreamingProvider};

/// A mock provider that replays a scripted sequence of fragments for testing
pub struct MockProvider {
    script: Vec<Result<String, ProviderError>>,
    open_error: Option<ProviderError>,
    hang: bool,
    calls: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl MockProvider {
    pub fn new<S: Into<String>>(fragments: Vec<S>) -> Self {
        Self {
            script: fragments.into_iter().map(|f| Ok(f.into())).collect(),
            open_error: None,
            hang: false,
            calls: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fail the stream with `error` after the scripted fragments.
    pub fn then_fail(mut self, error: ProviderError) -> Self {
        self.script.push(Err(error));
        self
    }

    /// Reject the request before any fragment.
    pub fn failing_open(error: ProviderError) -> Self {
        let mut provider = Self::new(Vec::<String>::new());
        provider.open_error = Some(error);
        provider
    }

    /// Keep the stream open after the scripted fragments instead of ending it.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Set once the returned stream has been dropped.
    pub fn released(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }
}

struct Tracked<S> {
    inner: S,
    released: Arc<AtomicBool>,
}

impl<S: Stream + Unpin> Stream for Tracked<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<S> Drop for Tracked<S> {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl StreamingProvider for MockProvider {
    async fn stream(&self, _request: &RelayRequest) -> Result<FragmentStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }

        let scripted = stream::iter(self.script.clone());
        let inner = if self.hang {
            scripted.chain(stream::pending()).boxed()
        } else {
            scripted.boxed()
        };

        Ok(Box::pin(Tracked {
            inner,
            released: self.released.clone(),
        }))
    }
}
