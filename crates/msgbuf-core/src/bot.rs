//! Bot capability trait and session routing types.
//!
//! The msgbuf layer performs no network I/O of its own; every outbound call
//! is delegated to an injected [`Bot`] capability, normally backed by a
//! platform adapter. The trait mirrors the adapter model's surface: a raw
//! `call_api` plus a unified `send` that routes by [`Session`].

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

// =============================================================================
// Session
// =============================================================================

/// Routing information for outbound messages, extracted from the event that
/// triggered the current flow. Constructed explicitly by the caller; there is
/// no ambient current-event lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Counterpart user id, for direct conversations.
    pub user_id: Option<String>,
    /// Group/chat id, for group conversations.
    pub group_id: Option<String>,
    /// Guild id, for guild-scoped platforms.
    pub guild_id: Option<String>,
    /// Channel id within a guild.
    pub channel_id: Option<String>,
}

impl Session {
    /// Session for a direct conversation with one user.
    pub fn private(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Session for a group conversation.
    pub fn group(group_id: impl Into<String>) -> Self {
        Self {
            group_id: Some(group_id.into()),
            ..Self::default()
        }
    }

    /// Session for a guild channel.
    pub fn channel(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            guild_id: Some(guild_id.into()),
            channel_id: Some(channel_id.into()),
            ..Self::default()
        }
    }

    /// Sets the counterpart user id (builder style).
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

// =============================================================================
// Outgoing payloads
// =============================================================================

/// An outbound payload in the shape the adapter's wire layer expects.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Plain text, universally accepted.
    Text(String),
    /// Platform-native payload, already in wire shape.
    Native(Value),
}

impl Outgoing {
    /// Creates a plain-text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Serializes a native payload into wire shape.
    pub fn native<T: Serialize>(payload: &T) -> ApiResult<Self> {
        Ok(Self::Native(serde_json::to_value(payload)?))
    }
}

// =============================================================================
// Bot trait
// =============================================================================

/// The injected send/API capability.
///
/// Implemented by platform adapters. Proxies call [`Bot::send`] for ordinary
/// outbound messages and [`Bot::call_api`] for platform-specific actions
/// (file uploads, typed send endpoints). A rejected outbound call must
/// surface as [`ApiError::ActionFailed`] — that is the one error the send
/// orchestrator's retry loop recognizes.
#[async_trait]
pub trait Bot: Send + Sync {
    /// The bot's unique identifier.
    fn id(&self) -> &str;

    /// The adapter identity, e.g. `"onebot.v11"`.
    ///
    /// Proxy resolution matches registered platform prefixes against this.
    fn adapter_name(&self) -> &str;

    /// Calls a raw platform API action.
    async fn call_api(&self, action: &str, params: Value) -> ApiResult<Value>;

    /// Sends one outbound message to the session's conversation.
    async fn send(&self, session: &Session, message: Outgoing) -> ApiResult<Value>;

    /// Returns self as [`Any`] for downcasting to the concrete adapter type.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A shared bot capability handle.
pub type SharedBot = Arc<dyn Bot>;

/// Picks the upload target for file APIs: the group when present, else the
/// counterpart user.
pub fn upload_target(session: &Session) -> ApiResult<(&'static str, &str)> {
    if let Some(group_id) = session.group_id.as_deref() {
        Ok(("group_id", group_id))
    } else if let Some(user_id) = session.user_id.as_deref() {
        Ok(("user_id", user_id))
    } else {
        Err(ApiError::Other(
            "session has no upload target (neither group nor user)".to_string(),
        ))
    }
}
