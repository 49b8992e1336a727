//! QQ Guild conversion proxy.
//!
//! Guild messages are not segment arrays: one outbound call is a single
//! payload object carrying markup text plus at most one image and one reply
//! reference:
//!
//! ```text
//! { "content": "...", "image"?, "file_image"?, "message_reference"? }
//! ```
//!
//! Mentions render as inline markup (`<@!id>`, `<#id>`, `@everyone`). The
//! one-image-per-message limit is expressed as an `(Image, Image)` conflict
//! rule, so a second image starts a new message. Voice, video, files, share
//! cards and locations have no native form and are sent as their plain-text
//! rendering, one call each.

use async_trait::async_trait;
use serde_json::{Value, json};

use msgbuf_core::partition::Batch;
use msgbuf_core::{
    ConflictTable, Element, ElementKind, FileSource, Outgoing, Proxy, RawPayload, SendResult,
    Session, SharedBot, SpecFlags, partition, send_fallback,
};

/// Adapter-name prefix served by this proxy.
pub const ADAPTER_PREFIX: &str = "qqguild";

/// Renders one mention as guild markup.
fn mention_markup(target: &str, domain: Option<&str>) -> String {
    if domain == Some("channel") {
        format!("<#{target}>")
    } else if target == "all" {
        "@everyone".to_string()
    } else {
        format!("<@!{target}>")
    }
}

/// True if the reference can be passed to the guild API as a plain URL.
fn is_remote_url(source: &FileSource) -> bool {
    matches!(source, FileSource::Url(url) if url.starts_with("http://") || url.starts_with("https://"))
}

/// Conversion proxy for QQ Guild adapters.
pub struct GuildProxy {
    bot: SharedBot,
    session: Session,
    specs: SpecFlags,
    conflicts: ConflictTable,
}

impl GuildProxy {
    /// Creates a new proxy bound to a bot and session.
    pub fn new(bot: SharedBot, session: Session, specs: SpecFlags) -> Self {
        // One image per guild message.
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

    /// Assembles one payload object from a combined batch.
    fn payload(elements: &[&Element]) -> Value {
        let mut content = String::new();
        let mut image: Option<String> = None;
        let mut file_image: Option<String> = None;
        let mut reference: Option<String> = None;

        for element in elements {
            match element {
                Element::Text { text } => content.push_str(text),
                Element::Mention { target, domain } => {
                    content.push_str(&mention_markup(target, domain.as_deref()));
                }
                Element::Image { source, .. } => {
                    if is_remote_url(source) {
                        image = Some(source.as_uri());
                    } else {
                        file_image = Some(source.as_uri());
                    }
                }
                Element::Reply { message_id } => reference = Some(message_id.clone()),
                other => content.push_str(&other.alternative()),
            }
        }

        let mut payload = json!({ "content": content });
        if let Some(url) = image {
            payload["image"] = json!(url);
        }
        if let Some(data) = file_image {
            payload["file_image"] = json!(data);
        }
        if let Some(message_id) = reference {
            payload["message_reference"] = json!({ "message_id": message_id });
        }
        payload
    }

    async fn send_combined(&self, elements: &[&Element]) -> SendResult<Value> {
        Ok(self
            .bot
            .send(&self.session, Outgoing::Native(Self::payload(elements)))
            .await?)
    }

    async fn send_solo(&self, element: &Element) -> SendResult<Value> {
        match element {
            Element::Raw { payload } => {
                let message = match payload {
                    RawPayload::Text(text) => Outgoing::text(text.clone()),
                    RawPayload::Native(value) => Outgoing::Native(value.clone()),
                };
                Ok(self.bot.send(&self.session, message).await?)
            }
            // No native form for the remaining mutex kinds.
            other => Ok(self
                .bot
                .send(&self.session, Outgoing::Text(other.alternative()))
                .await?),
        }
    }
}

#[async_trait]
impl Proxy for GuildProxy {
    fn convert(&self, element: &Element) -> SendResult<Value> {
        let value = match element {
            Element::Text { text } => Value::String(text.clone()),
            Element::Mention { target, domain } => {
                Value::String(mention_markup(target, domain.as_deref()))
            }
            Element::Image { source, .. } => {
                if is_remote_url(source) {
                    json!({ "image": source.as_uri() })
                } else {
                    json!({ "file_image": source.as_uri() })
                }
            }
            Element::Reply { message_id } => {
                json!({ "message_reference": { "message_id": message_id } })
            }
            Element::Raw {
                payload: RawPayload::Native(value),
            } => value.clone(),
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::testing::MockBot;

    fn proxy_with(bot: &Arc<MockBot>) -> GuildProxy {
        GuildProxy::new(bot.clone(), Session::channel("guild1", "chan1"), SpecFlags::NONE)
    }

    #[test]
    fn test_convert_renderings() {
        let bot = MockBot::shared("qqguild");
        let proxy = proxy_with(&bot);

        assert_eq!(
            proxy.convert(&Element::mention_all()).unwrap(),
            json!("@everyone")
        );
        assert_eq!(
            proxy.convert(&Element::image("https://e.com/p.png")).unwrap(),
            json!({ "image": "https://e.com/p.png" })
        );
        assert_eq!(
            proxy.convert(&Element::reply("m1")).unwrap(),
            json!({ "message_reference": { "message_id": "m1" } })
        );
        assert_eq!(
            proxy
                .convert(&Element::voice(FileSource::bytes(vec![0])))
                .unwrap(),
            json!("[语音]")
        );
    }

    #[test]
    fn test_mention_markup() {
        assert_eq!(mention_markup("42", None), "<@!42>");
        assert_eq!(mention_markup("all", None), "@everyone");
        assert_eq!(mention_markup("chan9", Some("channel")), "<#chan9>");
    }

    #[tokio::test]
    async fn test_combined_payload_with_markup_reply_and_image() {
        let bot = MockBot::shared("qqguild");
        let proxy = proxy_with(&bot);

        let elements = vec![
            Element::reply("m100"),
            Element::text("hello "),
            Element::mention("42"),
            Element::image("https://e.com/p.png"),
        ];
        let results = proxy.send(&elements, false).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            bot.sends(),
            vec![Outgoing::Native(json!({
                "content": "hello <@!42>",
                "image": "https://e.com/p.png",
                "message_reference": { "message_id": "m100" },
            }))]
        );
    }

    #[tokio::test]
    async fn test_local_image_uses_file_image() {
        let bot = MockBot::shared("qqguild");
        let proxy = proxy_with(&bot);

        let elements = vec![Element::image(FileSource::bytes(vec![1, 2, 3]))];
        proxy.send(&elements, false).await.unwrap();
        assert_eq!(
            bot.sends(),
            vec![Outgoing::Native(json!({
                "content": "",
                "file_image": "base64://AQID",
            }))]
        );
    }

    #[tokio::test]
    async fn test_second_image_starts_a_new_message() {
        let bot = MockBot::shared("qqguild");
        let proxy = proxy_with(&bot);

        let elements = vec![
            Element::image("https://e.com/a.png"),
            Element::text("between"),
            Element::image("https://e.com/b.png"),
        ];
        let results = proxy.send(&elements, false).await.unwrap();
        assert_eq!(results.len(), 2);

        let sends = bot.sends();
        assert_eq!(
            sends[0],
            Outgoing::Native(json!({
                "content": "between",
                "image": "https://e.com/a.png",
            }))
        );
        assert_eq!(
            sends[1],
            Outgoing::Native(json!({
                "content": "",
                "image": "https://e.com/b.png",
            }))
        );
    }

    #[tokio::test]
    async fn test_unsupported_mutex_kinds_fall_back_to_text() {
        let bot = MockBot::shared("qqguild");
        let proxy = proxy_with(&bot);

        let elements = vec![
            Element::voice(FileSource::bytes(vec![0])),
            Element::location(30.5, 114.3, None, None),
        ];
        let results = proxy.send(&elements, false).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            bot.sends(),
            vec![
                Outgoing::Text("[语音]".to_string()),
                Outgoing::Text("[纬度：30.5，经度：114.3]".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_face_renders_inline() {
        let bot = MockBot::shared("qqguild");
        let proxy = proxy_with(&bot);

        let elements = vec![Element::text("a"), Element::face("7"), Element::text("b")];
        proxy.send(&elements, false).await.unwrap();
        assert_eq!(
            bot.sends(),
            vec![Outgoing::Native(json!({ "content": "a[表情]b" }))]
        );
    }
}
