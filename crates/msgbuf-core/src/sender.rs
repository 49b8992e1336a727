//! Send orchestration: buffer ownership, retry policy, scoped auto-flush.
//!
//! A [`MessageBuffer`] owns one [`ElementBuffer`] and one conversion proxy.
//! Callers build the buffer (it derefs to [`ElementBuffer`], so every append
//! shorthand is available directly), then either `send`/`flush` explicitly
//! or run a [`scoped`](MessageBuffer::scoped) block that flushes on exit.
//!
//! The retry chain on a rejected send: consume the plain retry budget first,
//! then the fallback budget (degrading to one concatenated plain-text call),
//! then propagate the failure. Only [`ApiError::ActionFailed`] is
//! recoverable; every other error propagates immediately.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::buffer::ElementBuffer;
use crate::element::Element;
use crate::error::SendResult;
use crate::proxy::Proxy;
use crate::specs::SpecFlags;

// =============================================================================
// SendOptions
// =============================================================================

/// Construction-time policy for a [`MessageBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub struct SendOptions {
    /// Platform-behaviour flags handed to the proxy.
    pub specs: SpecFlags,
    /// Whether a scoped block flushes on exit at all.
    pub send: bool,
    /// Whether a scoped block still flushes when its body returned an error.
    pub send_incomplete: bool,
    /// Plain retry budget for rejected sends.
    pub retry: u32,
    /// Fallback (plain-text) retry budget, consumed after the plain budget.
    pub fallback: u32,
    /// Pause between attempts.
    pub cooldown: Duration,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            specs: SpecFlags::NONE,
            send: true,
            send_incomplete: false,
            retry: 0,
            fallback: 0,
            cooldown: Duration::from_secs(5),
        }
    }
}

impl SendOptions {
    /// Creates the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the platform-behaviour flags.
    pub fn specs(mut self, specs: SpecFlags) -> Self {
        self.specs = specs;
        self
    }

    /// Enables or disables auto-send on scope exit.
    pub fn send(mut self, send: bool) -> Self {
        self.send = send;
        self
    }

    /// Flush on scope exit even when the body returned an error.
    pub fn send_incomplete(mut self, send_incomplete: bool) -> Self {
        self.send_incomplete = send_incomplete;
        self
    }

    /// Sets the plain retry budget.
    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the fallback retry budget.
    pub fn fallback(mut self, fallback: u32) -> Self {
        self.fallback = fallback;
        self
    }

    /// Sets the cooldown between attempts.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the cooldown between attempts, in seconds.
    pub fn cooldown_secs(self, secs: f64) -> Self {
        self.cooldown(Duration::from_secs_f64(secs))
    }
}

// =============================================================================
// MessageBuffer
// =============================================================================

/// The send orchestrator: one buffer, one proxy, one retry policy.
///
/// Retry budgets are consumed over the orchestrator's lifetime, not per
/// call: a buffer configured with `retry = 2` has two plain retries in
/// total, however many sends it performs.
pub struct MessageBuffer {
    buf: ElementBuffer,
    proxy: Box<dyn Proxy>,
    send_enabled: bool,
    send_incomplete: bool,
    retry: u32,
    fallback: u32,
    cooldown: Duration,
}

impl MessageBuffer {
    /// Creates an orchestrator over a resolved proxy.
    pub fn new(proxy: Box<dyn Proxy>, options: SendOptions) -> Self {
        Self {
            buf: ElementBuffer::new(),
            proxy,
            send_enabled: options.send,
            send_incomplete: options.send_incomplete,
            retry: options.retry,
            fallback: options.fallback,
            cooldown: options.cooldown,
        }
    }

    /// Snapshot of the buffered elements, in send order.
    pub fn export(&self) -> Vec<Element> {
        self.buf.snapshot()
    }

    /// Converts every buffered element through the bound proxy, preserving
    /// order. Read-only: the buffer is not cleared.
    pub fn export_converted(&self) -> SendResult<Vec<Value>> {
        self.buf
            .elements()
            .iter()
            .map(|element| self.proxy.convert(element))
            .collect()
    }

    /// Sends the buffered elements through the proxy, driving the retry
    /// chain on rejected sends. The buffer is left intact.
    pub async fn send(&mut self) -> SendResult<Vec<Value>> {
        let mut use_fallback = false;
        loop {
            match self.proxy.send(self.buf.elements(), use_fallback).await {
                Ok(results) => {
                    info!(calls = results.len(), "message sent");
                    return Ok(results);
                }
                Err(err) if err.is_action_failed() && self.retry > 0 => {
                    warn!(remaining = self.retry, "send failed, retrying");
                    sleep(self.cooldown).await;
                    self.retry -= 1;
                }
                Err(err) if err.is_action_failed() && self.fallback > 0 => {
                    warn!(
                        remaining = self.fallback,
                        "send failed, retrying with plain-text fallback"
                    );
                    sleep(self.cooldown).await;
                    self.fallback -= 1;
                    use_fallback = true;
                }
                Err(err) => {
                    error!(error = %err, "message send failed");
                    return Err(err);
                }
            }
        }
    }

    /// Sends the buffered elements, then clears the buffer.
    ///
    /// A propagated failure leaves the buffer exactly as it was.
    pub async fn flush(&mut self) -> SendResult<Vec<Value>> {
        let results = self.send().await?;
        self.buf.clear();
        Ok(results)
    }

    /// Runs `body` with mutable access to this orchestrator, then performs
    /// the flush-or-skip decision on every exit path:
    ///
    /// - flush iff sending is enabled, the buffer is non-empty, and the body
    ///   succeeded (or `send_incomplete` is set);
    /// - a body error is always re-raised after the decision, never
    ///   swallowed — a flush failure on that path is only logged.
    pub async fn scoped<T, F>(mut self, body: F) -> SendResult<T>
    where
        F: for<'a> FnOnce(&'a mut MessageBuffer) -> BoxFuture<'a, SendResult<T>>,
    {
        let outcome = body(&mut self).await;
        let should_flush =
            self.send_enabled && !self.is_empty() && (outcome.is_ok() || self.send_incomplete);
        match outcome {
            Ok(value) => {
                if should_flush {
                    self.flush().await?;
                }
                Ok(value)
            }
            Err(err) => {
                if should_flush
                    && let Err(flush_err) = self.flush().await
                {
                    warn!(error = %flush_err, "flush after an incomplete scope also failed");
                }
                Err(err)
            }
        }
    }
}

impl Deref for MessageBuffer {
    type Target = ElementBuffer;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for MessageBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

// =============================================================================
// Tests
// =============================================================================
