//! Per-run context: cooperative cancellation, the has-error latch and the
//! feedback channel.
//!
//! A [`RunContext`] is created once per conversion run and passed by
//! reference into every fetch, migration and execution step. Feedback is
//! fire-and-forget: a closed or missing channel never fails the run. Every
//! event is also mirrored to `tracing`.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Severity of a feedback event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackInfoType {
    Info,
    Error,
}

/// Progress or error event emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackInfo {
    /// Component that produced the event (usually the source database label).
    pub owner: String,
    pub info_type: FeedbackInfoType,
    pub message: String,
}

/// Sending half handed to a run; the caller keeps the receiver.
pub type FeedbackSender = mpsc::UnboundedSender<FeedbackInfo>;

/// Create a feedback channel.
pub fn feedback_channel() -> (FeedbackSender, mpsc::UnboundedReceiver<FeedbackInfo>) {
    mpsc::unbounded_channel()
}

/// Shared state for one conversion run.
#[derive(Debug)]
pub struct RunContext {
    owner: String,
    cancel: CancellationToken,
    has_error: AtomicBool,
    feedback: Option<FeedbackSender>,
    throw_on_error: bool,
}

impl RunContext {
    /// Create a context that never throws on recoverable errors.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            cancel: CancellationToken::new(),
            has_error: AtomicBool::new(false),
            feedback: None,
            throw_on_error: false,
        }
    }

    /// Route feedback events to `sender`.
    pub fn with_feedback(mut self, sender: FeedbackSender) -> Self {
        self.feedback = Some(sender);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fail fast instead of converting recoverable errors into feedback.
    pub fn with_throw_on_error(mut self, throw_on_error: bool) -> Self {
        self.throw_on_error = throw_on_error;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request cancellation; checked at page and table boundaries.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once an error has been reported through [`RunContext::feedback_error`].
    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    pub fn throw_on_error(&self) -> bool {
        self.throw_on_error
    }

    /// Emit an informational event.
    pub fn feedback(&self, message: impl Into<String>) {
        let message = message.into();
        info!(owner = %self.owner, "{}", message);
        self.send(FeedbackInfoType::Info, message);
    }

    /// Emit an error event and latch the has-error flag.
    pub fn feedback_error(&self, message: impl Into<String>) {
        self.feedback_error_with(message, false);
    }

    /// Emit an error event; `skip_latch` reports without latching.
    pub fn feedback_error_with(&self, message: impl Into<String>, skip_latch: bool) {
        let message = message.into();
        error!(owner = %self.owner, "{}", message);
        if !skip_latch {
            self.has_error.store(true, Ordering::SeqCst);
        }
        self.send(FeedbackInfoType::Error, message);
    }

    fn send(&self, info_type: FeedbackInfoType, message: String) {
        if let Some(sender) = &self.feedback {
            // A dropped receiver must not affect the run.
            let _ = sender.send(FeedbackInfo {
                owner: self.owner.clone(),
                info_type,
                message,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_reaches_channel() {
        let (tx, mut rx) = feedback_channel();
        let ctx = RunContext::new("SqlServer").with_feedback(tx);
        ctx.feedback("Got 2 table(s).");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.owner, "SqlServer");
        assert_eq!(event.info_type, FeedbackInfoType::Info);
        assert_eq!(event.message, "Got 2 table(s).");
        assert!(!ctx.has_error());
    }

    #[test]
    fn test_error_latches() {
        let ctx = RunContext::new("Postgres");
        ctx.feedback_error("boom");
        assert!(ctx.has_error());
    }

    #[test]
    fn test_error_without_latch() {
        let ctx = RunContext::new("Postgres");
        ctx.feedback_error_with("ignored", true);
        assert!(!ctx.has_error());
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (tx, rx) = feedback_channel();
        drop(rx);
        let ctx = RunContext::new("Sqlite").with_feedback(tx);
        ctx.feedback("still fine");
        ctx.feedback_error("still fine");
        assert!(ctx.has_error());
    }

    #[test]
    fn test_cancel_is_shared() {
        let token = CancellationToken::new();
        let ctx = RunContext::new("Sqlite").with_cancel(token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
