//! Scripted provider that replays canned outcomes in order.
//!
//! Used by tests and by `taleforge generate --replay` to push a stored response
//! through the whole pipeline without network access.

use super::{CompletionRequest, ProviderClient, RawText};
use crate::error::ProviderError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<RawText, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedProvider {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<RawText, ProviderError>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Every call succeeds with `content` and a `stop` finish reason.
    pub fn always(content: impl Into<String>, times: usize) -> Self {
        let content = content.into();
        Self::new((0..times).map(|_| Ok(RawText::new(content.clone()))))
    }

    /// Wait this long before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests seen so far, in call order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn call(
        &self,
        request: &CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<RawText, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancel.cancelled() => {
                    return Err(ProviderError::Timeout { after: self.delay });
                }
            }
        }

        self.replies.lock().pop_front().unwrap_or_else(|| {
            Err(ProviderError::InvalidResponse(
                "Scripted provider has no replies left".to_string(),
            ))
        })
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
