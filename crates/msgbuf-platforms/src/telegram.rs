//! Telegram conversion proxy.
//!
//! Telegram has no segment arrays; every message goes through a typed send
//! endpoint. A combined batch becomes one `send_message` call, or one
//! `send_photo` call with the body text as caption when an image is present
//! (one photo per message, expressed as an `(Image, Image)` conflict rule).
//! A reply occupant turns into the `reply_to_message_id` parameter.
//!
//! Mutex kinds map to their own endpoints: `send_voice`, `send_video`,
//! `send_document`, `send_location`/`send_venue`. Share cards degrade to a
//! formatted text message; file payloads are passed by value or URL — no
//! upload round-trip.

use async_trait::async_trait;
use serde_json::{Value, json};

use msgbuf_core::partition::Batch;
use msgbuf_core::{
    ApiError, ConflictTable, Element, ElementKind, Outgoing, Proxy, RawPayload, SendResult,
    Session, SharedBot, SpecFlags, partition, send_fallback,
};

/// Adapter-name prefix served by this proxy.
pub const ADAPTER_PREFIX: &str = "telegram";

/// Conversion proxy for Telegram adapters.
pub struct TelegramProxy {
    bot: SharedBot,
    session: Session,
    specs: SpecFlags,
    conflicts: ConflictTable,
}

impl TelegramProxy {
    /// Creates a new proxy bound to a bot and session.
    pub fn new(bot: SharedBot, session: Session, specs: SpecFlags) -> Self {
        // One photo per Telegram message.
        let conflicts = ConflictTable::new().rule(ElementKind::Image, ElementKind::Image);
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

    /// The chat id every typed endpoint addresses.
    fn chat_id(&self) -> SendResult<&str> {
        self.session
            .group_id
            .as_deref()
            .or(self.session.user_id.as_deref())
            .or(self.session.channel_id.as_deref())
            .ok_or_else(|| ApiError::Other("session has no chat target".to_string()).into())
    }

    /// Inline text rendering of a body element.
    fn body_text(element: &Element) -> String {
        match element {
            Element::Text { text } => text.clone(),
            Element::Mention { target, .. } => format!("@{target} "),
            other => other.alternative(),
        }
    }

    async fn send_combined(&self, elements: &[&Element]) -> SendResult<Value> {
        let mut text = String::new();
        let mut photo: Option<String> = None;
        let mut reply_to: Option<String> = None;

        for element in elements {
            match element {
                Element::Image { source, .. } => photo = Some(source.as_uri()),
                Element::Reply { message_id } => reply_to = Some(message_id.clone()),
                other => text.push_str(&Self::body_text(other)),
            }
        }

        let chat_id = self.chat_id()?;
        let (action, mut params) = match photo {
            Some(photo) => {
                let mut params = json!({ "chat_id": chat_id, "photo": photo });
                if !text.is_empty() {
                    params["caption"] = json!(text);
                }
                ("send_photo", params)
            }
            None => ("send_message", json!({ "chat_id": chat_id, "text": text })),
        };
        if let Some(message_id) = reply_to {
            params["reply_to_message_id"] = json!(message_id);
        }
        Ok(self.bot.call_api(action, params).await?)
    }

    async fn send_solo(&self, element: &Element) -> SendResult<Value> {
        match element {
            Element::Voice { source, .. } => {
                let params = json!({ "chat_id": self.chat_id()?, "voice": source.as_uri() });
                Ok(self.bot.call_api("send_voice", params).await?)
            }
            Element::Video { source, .. } => {
                let params = json!({ "chat_id": self.chat_id()?, "video": source.as_uri() });
                Ok(self.bot.call_api("send_video", params).await?)
            }
            Element::File { source, name } => {
                let params = json!({
                    "chat_id": self.chat_id()?,
                    "document": source.as_uri(),
                    "file_name": name,
                });
                Ok(self.bot.call_api("send_document", params).await?)
            }
            Element::Location {
                latitude,
                longitude,
                title,
                content,
            } => match title {
                Some(title) => {
                    let params = json!({
                        "chat_id": self.chat_id()?,
                        "latitude": latitude,
                        "longitude": longitude,
                        "title": title,
                        "address": content.clone().unwrap_or_default(),
                    });
                    Ok(self.bot.call_api("send_venue", params).await?)
                }
                None => {
                    let params = json!({
                        "chat_id": self.chat_id()?,
                        "latitude": latitude,
                        "longitude": longitude,
                    });
                    Ok(self.bot.call_api("send_location", params).await?)
                }
            },
            Element::Share {
                url,
                title,
                content,
                ..
            } => {
                let mut text = format!("{title}\n");
                if let Some(content) = content {
                    text.push_str(content);
                    text.push('\n');
                }
                text.push_str(url);
                Ok(self.bot.send(&self.session, Outgoing::Text(text)).await?)
            }
            Element::Raw { payload } => {
                let message = match payload {
                    RawPayload::Text(text) => Outgoing::text(text.clone()),
                    RawPayload::Native(value) => Outgoing::Native(value.clone()),
                };
                Ok(self.bot.send(&self.session, message).await?)
            }
            other => Ok(self
                .bot
                .send(&self.session, Outgoing::Text(other.alternative()))
                .await?),
        }
    }
}

#[async_trait]
impl Proxy for TelegramProxy {
    fn convert(&self, element: &Element) -> SendResult<Value> {
        let value = match element {
            Element::Image { source, .. } => json!({ "photo": source.as_uri() }),
            Element::Reply { message_id } => json!({ "reply_to_message_id": message_id }),
            Element::Raw {
                payload: RawPayload::Native(value),
            } => value.clone(),
            Element::Text { .. } | Element::Mention { .. } | Element::Face { .. } => {
                Value::String(Self::body_text(element))
            }
            other => Value::String(other.alternative()),
        };
        Ok(value)
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
// Tests
// =============================================================================
