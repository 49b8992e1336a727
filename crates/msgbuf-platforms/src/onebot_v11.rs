//! OneBot v11 conversion proxy.
//!
//! Translates abstract elements into OneBot v11 message segments (array
//! format, `{"type": …, "data": …}`) and drives the partitioned send.
//!
//! Platform quirks handled here:
//! - On QQ proper ([`SpecFlags::PLATFORM_QQ`]), a reply and an image cannot
//!   share one message; the conflict table splits them.
//! - On go-cqhttp ([`SpecFlags::GOCQHTTP_FILE`]), file elements route
//!   through the dedicated `upload_group_file` / `upload_private_file`
//!   APIs, which require a local filesystem path.
//! - Raw passthrough elements go straight to the bot's send capability,
//!   string or native payload alike.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use msgbuf_core::partition::Batch;
use msgbuf_core::{
    ApiError, ConflictTable, Element, ElementBuffer, ElementKind, FileSource, Outgoing, Proxy,
    RawPayload, SendResult, Session, SharedBot, SpecFlags, partition, send_fallback,
    upload_target,
};

/// Adapter-name prefix served by this proxy.
pub const ADAPTER_PREFIX: &str = "onebot.v11";

// =============================================================================
// Native segments
// =============================================================================

/// A OneBot v11 message segment in array format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text.
    Text { text: String },
    /// QQ face/emoji.
    Face { id: String },
    /// Image by file reference.
    Image { file: String },
    /// Voice record by file reference.
    Record { file: String },
    /// Video by file reference.
    Video { file: String },
    /// @mention (`qq` is a user id or `"all"`).
    At { qq: String },
    /// Link share card.
    Share {
        url: String,
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
    /// Location.
    Location {
        lat: String,
        lon: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// Reply to a message.
    Reply { id: String },
}

// =============================================================================
// Proxy
// =============================================================================

/// Conversion proxy for OneBot v11 adapters.
pub struct Ob11Proxy {
    bot: SharedBot,
    session: Session,
    specs: SpecFlags,
    conflicts: ConflictTable,
}

impl Ob11Proxy {
    /// Creates a new proxy bound to a bot and session.
    pub fn new(bot: SharedBot, session: Session, specs: SpecFlags) -> Self {
        let conflicts = ConflictTable::new().rule_when(
            ElementKind::Reply,
            ElementKind::Image,
            SpecFlags::PLATFORM_QQ,
        );
        Self {
            bot,
            session,
            specs,
            conflicts,
        }
    }

    /// Factory with the registry signature.
    pub fn factory(bot: SharedBot, session: Session, specs: SpecFlags) -> Box<dyn Proxy> {
        Box::new(Self::new(bot, session, specs))
    }

    /// Maps one element to its native segment.
    ///
    /// File and raw elements have dedicated dispatch in [`Self::send_solo`];
    /// here they degrade to their plain-text rendering.
    fn segment(&self, element: &Element) -> Segment {
        match element {
            Element::Text { text } => Segment::Text { text: text.clone() },
            Element::Image { source, .. } => Segment::Image {
                file: source.as_uri(),
            },
            Element::Mention { target, .. } => Segment::At { qq: target.clone() },
            Element::Face { face_id } => Segment::Face {
                id: face_id.clone(),
            },
            Element::Reply { message_id } => Segment::Reply {
                id: message_id.clone(),
            },
            Element::Voice { source, .. } => Segment::Record {
                file: source.as_uri(),
            },
            Element::Video { source, .. } => Segment::Video {
                file: source.as_uri(),
            },
            Element::Share {
                url,
                title,
                content,
                image,
            } => Segment::Share {
                url: url.clone(),
                title: title.clone(),
                content: content.clone(),
                image: image.clone(),
            },
            Element::Location {
                latitude,
                longitude,
                title,
                content,
            } => Segment::Location {
                lat: latitude.to_string(),
                lon: longitude.to_string(),
                title: title.clone(),
                content: content.clone(),
            },
            Element::File { .. } | Element::Raw { .. } => Segment::Text {
                text: element.alternative(),
            },
        }
    }

    async fn send_combined(&self, elements: &[&Element]) -> SendResult<Value> {
        let segments: Vec<Segment> = elements.iter().map(|e| self.segment(e)).collect();
        Ok(self
            .bot
            .send(&self.session, Outgoing::native(&segments)?)
            .await?)
    }

    async fn send_solo(&self, element: &Element) -> SendResult<Value> {
        match element {
            Element::File { source, name } if self.specs.contains(SpecFlags::GOCQHTTP_FILE) => {
                self.upload_file(source, name).await
            }
            Element::Raw { payload } => {
                let message = match payload {
                    RawPayload::Text(text) => Outgoing::text(text.clone()),
                    RawPayload::Native(value) => Outgoing::Native(value.clone()),
                };
                Ok(self.bot.send(&self.session, message).await?)
            }
            other => {
                let segments = [self.segment(other)];
                Ok(self
                    .bot
                    .send(&self.session, Outgoing::native(&segments)?)
                    .await?)
            }
        }
    }

    /// Routes a file through go-cqhttp's dedicated upload APIs.
    async fn upload_file(&self, source: &FileSource, name: &str) -> SendResult<Value> {
        let path = source.local_path()?;
        let (target_key, target_id) = upload_target(&self.session)?;
        let action = if target_key == "group_id" {
            "upload_group_file"
        } else {
            "upload_private_file"
        };
        let mut params = json!({
            "file": path.to_string_lossy(),
            "name": name,
        });
        params[target_key] = json!(target_id);
        debug!(action, name, "uploading file through dedicated API");
        Ok(self.bot.call_api(action, params).await?)
    }
}

#[async_trait]
impl Proxy for Ob11Proxy {
    fn convert(&self, element: &Element) -> SendResult<Value> {
        match element {
            Element::Raw {
                payload: RawPayload::Native(value),
            } => Ok(value.clone()),
            other => Ok(serde_json::to_value(self.segment(other)).map_err(ApiError::from)?),
        }
    }

    async fn send(&self, elements: &[Element], use_fallback: bool) -> SendResult<Vec<Value>> {
        if use_fallback {
            return send_fallback(&self.bot, &self.session, elements).await;
        }
        let mut results = Vec::new();
        for batch in partition(elements, &self.conflicts, self.specs) {
            let result = match batch {
                Batch::Solo(element) => self.send_solo(element).await?,
                Batch::Combined(batch) => self.send_combined(&batch).await?,
            };
            results.push(result);
        }
        Ok(results)
    }
}

// =============================================================================
// ForwardBuffer - merged-forward sending
// =============================================================================

/// Builder that sends its buffered elements as one merged-forward message.
///
/// Each partition batch becomes one forward node attributed to the bot
/// itself; the whole node list goes out in a single
/// `send_group_forward_msg` / `send_private_forward_msg` call. The node
/// author's nickname is fetched once through `get_stranger_info` when not
/// supplied.
pub struct ForwardBuffer {
    buf: ElementBuffer,
    proxy: Ob11Proxy,
    nickname: Option<String>,
}

impl ForwardBuffer {
    /// Creates a forward buffer bound to a bot and session.
    pub fn new(bot: SharedBot, session: Session, specs: SpecFlags) -> Self {
        Self {
            buf: ElementBuffer::new(),
            proxy: Ob11Proxy::new(bot, session, specs),
            nickname: None,
        }
    }

    /// Sets the nickname shown on the forward nodes, skipping the lookup.
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    /// The nickname for the node author: explicit, else looked up once via
    /// `get_stranger_info`, else the bot id.
    async fn resolve_nickname(&mut self) -> String {
        if let Some(nickname) = &self.nickname {
            return nickname.clone();
        }
        let bot_id = self.proxy.bot.id().to_string();
        let params = json!({ "user_id": bot_id, "no_cache": false });
        let nickname = match self.proxy.bot.call_api("get_stranger_info", params).await {
            Ok(info) => info
                .get("nickname")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| bot_id.clone()),
            Err(_) => bot_id.clone(),
        };
        self.nickname = Some(nickname.clone());
        nickname
    }

    /// One forward node wrapping a batch of converted segments.
    fn node(&self, nickname: &str, content: Vec<Value>) -> Value {
        json!({
            "type": "node",
            "data": {
                "user_id": self.proxy.bot.id(),
                "nickname": nickname,
                "content": content,
            }
        })
    }

    /// Sends the buffered elements as one forward message, then clears the
    /// buffer. A propagated failure leaves the buffer intact.
    pub async fn flush(&mut self) -> SendResult<Value> {
        let nickname = self.resolve_nickname().await;

        let mut nodes = Vec::new();
        for batch in partition(
            self.buf.elements(),
            &self.proxy.conflicts,
            self.proxy.specs,
        ) {
            let content = match batch {
                Batch::Solo(element) => vec![self.proxy.convert(element)?],
                Batch::Combined(batch) => batch
                    .iter()
                    .map(|element| self.proxy.convert(element))
                    .collect::<SendResult<Vec<Value>>>()?,
            };
            nodes.push(self.node(&nickname, content));
        }

        debug!(nodes = nodes.len(), "sending forward message");
        let session = &self.proxy.session;
        let (action, params) = if let Some(group_id) = &session.group_id {
            (
                "send_group_forward_msg",
                json!({ "group_id": group_id, "messages": nodes }),
            )
        } else if let Some(user_id) = &session.user_id {
            (
                "send_private_forward_msg",
                json!({ "user_id": user_id, "messages": nodes }),
            )
        } else {
            return Err(ApiError::Other(
                "session has no forward target (neither group nor user)".to_string(),
            )
            .into());
        };
        let result = self.proxy.bot.call_api(action, params).await?;
        self.buf.clear();
        Ok(result)
    }
}

impl std::ops::Deref for ForwardBuffer {
    type Target = ElementBuffer;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl std::ops::DerefMut for ForwardBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

// =============================================================================
// Tests
// =============================================================================
