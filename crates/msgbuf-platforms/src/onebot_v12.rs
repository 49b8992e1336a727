//! OneBot v12 conversion proxy.
//!
//! OneBot v12 references every media payload (image, voice, video, file) by
//! an opaque `file_id` obtained from the `upload_file` action, so sending
//! media is a two-step dance: upload, then build the segment around the
//! returned handle. Uploads of the same payload are memoized through a
//! process-wide [`ShelfCache`] keyed by the upload parameters.
//!
//! Share cards have no native form in v12 and degrade to their plain-text
//! rendering; locations and replies are native.

use std::sync::OnceLock;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use msgbuf_core::partition::Batch;
use msgbuf_core::{
    ApiError, ConflictTable, Element, FileSource, Outgoing, Proxy, RawPayload, SendResult,
    Session, SharedBot, ShelfCache, SpecFlags, media_name, partition, send_fallback,
};

/// Adapter-name prefix served by this proxy.
pub const ADAPTER_PREFIX: &str = "onebot.v12";

fn upload_cache() -> &'static ShelfCache {
    static CACHE: OnceLock<ShelfCache> = OnceLock::new();
    CACHE.get_or_init(ShelfCache::default)
}

// =============================================================================
// Native segments
// =============================================================================

/// A OneBot v12 message segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text.
    Text { text: String },
    /// @mention of one user.
    Mention { user_id: String },
    /// @mention of everyone.
    MentionAll {},
    /// Image by upload handle.
    Image { file_id: String },
    /// Voice by upload handle.
    Voice { file_id: String },
    /// Video by upload handle.
    Video { file_id: String },
    /// File attachment by upload handle.
    File { file_id: String },
    /// Reply to a message.
    Reply { message_id: String },
    /// Location.
    Location {
        latitude: f64,
        longitude: f64,
        title: String,
        content: String,
    },
}

// =============================================================================
// Proxy
// =============================================================================

/// Conversion proxy for OneBot v12 adapters.
pub struct Ob12Proxy {
    bot: SharedBot,
    session: Session,
    specs: SpecFlags,
    conflicts: ConflictTable,
}

impl Ob12Proxy {
    /// Creates a new proxy bound to a bot and session.
    pub fn new(bot: SharedBot, session: Session, specs: SpecFlags) -> Self {
        Self {
            bot,
            session,
            specs,
            conflicts: ConflictTable::new(),
        }
    }

    /// Factory with the registry signature.
    pub fn factory(bot: SharedBot, session: Session, specs: SpecFlags) -> Box<dyn Proxy> {
        Box::new(Self::new(bot, session, specs))
    }

    /// `upload_file` parameters for a file reference.
    fn upload_params(source: &FileSource, name: &str) -> Value {
        match source {
            FileSource::Url(url) => json!({ "type": "url", "name": name, "url": url }),
            FileSource::Path(path) => {
                json!({ "type": "path", "name": name, "path": path.to_string_lossy() })
            }
            FileSource::Bytes(bytes) => {
                json!({ "type": "data", "name": name, "data": BASE64.encode(bytes) })
            }
        }
    }

    fn file_id_from(result: &Value) -> SendResult<String> {
        result
            .get("file_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::Serialization("upload_file response missing file_id".to_string()).into()
            })
    }

    /// Resolves an already-uploaded payload's `file_id` from the cache.
    fn cached_file_id(&self, source: &FileSource, name: &str) -> SendResult<String> {
        let params = Self::upload_params(source, name);
        let result = upload_cache().lookup(&params).ok_or_else(|| {
            ApiError::Other(
                "media payload not uploaded yet; send() performs the upload".to_string(),
            )
        })?;
        Self::file_id_from(&result)
    }

    /// Uploads a payload (memoized) and returns its `file_id`.
    async fn upload(&self, source: &FileSource, name: &str) -> SendResult<String> {
        let params = Self::upload_params(source, name);
        let key = params.clone();
        debug!(name, "resolving upload handle");
        let result = upload_cache()
            .get_or_try_insert_with(key, || async {
                self.bot.call_api("upload_file", params).await
            })
            .await?;
        Self::file_id_from(&result)
    }

    /// Maps an element with no upload requirement to its native segment.
    ///
    /// Returns `None` for media kinds, which need an upload handle first.
    fn plain_segment(element: &Element) -> Option<Segment> {
        match element {
            Element::Text { text } => Some(Segment::Text { text: text.clone() }),
            Element::Mention { target, .. } if target == "all" => Some(Segment::MentionAll {}),
            Element::Mention { target, .. } => Some(Segment::Mention {
                user_id: target.clone(),
            }),
            Element::Reply { message_id } => Some(Segment::Reply {
                message_id: message_id.clone(),
            }),
            Element::Location {
                latitude,
                longitude,
                title,
                content,
            } => Some(Segment::Location {
                latitude: *latitude,
                longitude: *longitude,
                title: title.clone().unwrap_or_default(),
                content: content.clone().unwrap_or_default(),
            }),
            // No native form: stickers and share cards degrade to text.
            Element::Face { .. } | Element::Share { .. } | Element::Raw { .. } => {
                Some(Segment::Text {
                    text: element.alternative(),
                })
            }
            Element::Image { .. }
            | Element::Voice { .. }
            | Element::Video { .. }
            | Element::File { .. } => None,
        }
    }

    /// Maps any element to its native segment, uploading media on demand.
    async fn segment_for(&self, element: &Element) -> SendResult<Segment> {
        let segment = match element {
            Element::Image { source, name } => Segment::Image {
                file_id: self
                    .upload(source, &media_name(source, name.as_deref()))
                    .await?,
            },
            Element::Voice { source, name } => Segment::Voice {
                file_id: self
                    .upload(source, &media_name(source, name.as_deref()))
                    .await?,
            },
            Element::Video { source, name } => Segment::Video {
                file_id: self
                    .upload(source, &media_name(source, name.as_deref()))
                    .await?,
            },
            Element::File { source, name } => Segment::File {
                file_id: self.upload(source, name).await?,
            },
            other => Self::plain_segment(other).unwrap_or_else(|| Segment::Text {
                text: other.alternative(),
            }),
        };
        Ok(segment)
    }

    async fn send_combined(&self, elements: &[&Element]) -> SendResult<Value> {
        let mut segments = Vec::with_capacity(elements.len());
        for element in elements {
            segments.push(self.segment_for(element).await?);
        }
        Ok(self
            .bot
            .send(&self.session, Outgoing::native(&segments)?)
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
            Element::Share { .. } => Ok(self
                .bot
                .send(&self.session, Outgoing::Text(element.alternative()))
                .await?),
            other => {
                let segments = [self.segment_for(other).await?];
                Ok(self
                    .bot
                    .send(&self.session, Outgoing::native(&segments)?)
                    .await?)
            }
        }
    }
}

#[async_trait]
impl Proxy for Ob12Proxy {
    fn convert(&self, element: &Element) -> SendResult<Value> {
        if let Element::Raw {
            payload: RawPayload::Native(value),
        } = element
        {
            return Ok(value.clone());
        }
        // Media can only convert synchronously once its upload handle is in
        // the shelf cache; send() performs the upload itself.
        let segment = match element {
            Element::Image { source, name } => Segment::Image {
                file_id: self.cached_file_id(source, &media_name(source, name.as_deref()))?,
            },
            Element::Voice { source, name } => Segment::Voice {
                file_id: self.cached_file_id(source, &media_name(source, name.as_deref()))?,
            },
            Element::Video { source, name } => Segment::Video {
                file_id: self.cached_file_id(source, &media_name(source, name.as_deref()))?,
            },
            Element::File { source, name } => Segment::File {
                file_id: self.cached_file_id(source, name)?,
            },
            other => Self::plain_segment(other).unwrap_or_else(|| Segment::Text {
                text: other.alternative(),
            }),
        };
        Ok(serde_json::to_value(segment).map_err(ApiError::from)?)
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

    fn proxy_with(bot: &Arc<MockBot>, session: Session) -> Ob12Proxy {
        Ob12Proxy::new(bot.clone(), session, SpecFlags::NONE)
    }

    fn bot_with_upload(file_id: &str) -> Arc<MockBot> {
        Arc::new(
            MockBot::new("onebot.v12")
                .with_api_result("upload_file", json!({ "file_id": file_id })),
        )
    }

    #[test]
    fn test_plain_segment_wire_shapes() {
        let bot = MockBot::shared("onebot.v12");
        let proxy = proxy_with(&bot, Session::private("42"));

        assert_eq!(
            proxy.convert(&Element::mention("u1")).unwrap(),
            json!({ "type": "mention", "data": { "user_id": "u1" } })
        );
        assert_eq!(
            proxy.convert(&Element::mention_all()).unwrap(),
            json!({ "type": "mention_all", "data": {} })
        );
        assert_eq!(
            proxy.convert(&Element::reply("m9")).unwrap(),
            json!({ "type": "reply", "data": { "message_id": "m9" } })
        );
        assert_eq!(
            proxy
                .convert(&Element::location(30.5, 114.3, None, None))
                .unwrap(),
            json!({
                "type": "location",
                "data": { "latitude": 30.5, "longitude": 114.3, "title": "", "content": "" }
            })
        );
        // No native share in v12: degrades to text.
        assert_eq!(
            proxy
                .convert(&Element::share("https://e.com", "标题", None, None))
                .unwrap(),
            json!({ "type": "text", "data": { "text": "[分享] 《标题》 https://e.com" } })
        );
    }

    #[test]
    fn test_convert_fails_before_upload() {
        let bot = MockBot::shared("onebot.v12");
        let proxy = proxy_with(&bot, Session::private("42"));
        let err = proxy
            .convert(&Element::image("https://e.com/not-uploaded-yet.png"))
            .unwrap_err();
        assert!(matches!(err, msgbuf_core::SendError::Api(ApiError::Other(_))));
    }

    #[tokio::test]
    async fn test_combined_media_uploads_then_sends() {
        let bot = bot_with_upload("F1");
        let proxy = proxy_with(&bot, Session::group("g1"));

        let elements = vec![
            Element::text("see: "),
            Element::image("https://e.com/ob12-combined.png"),
        ];
        let results = proxy.send(&elements, false).await.unwrap();
        assert_eq!(results.len(), 1);

        let (action, params) = &bot.api_calls()[0];
        assert_eq!(action, "upload_file");
        assert_eq!(
            params,
            &json!({ "type": "url", "name": "ob12-combined.png", "url": "https://e.com/ob12-combined.png" })
        );
        assert_eq!(
            bot.sends(),
            vec![Outgoing::Native(json!([
                { "type": "text", "data": { "text": "see: " } },
                { "type": "image", "data": { "file_id": "F1" } },
            ]))]
        );
    }

    #[tokio::test]
    async fn test_upload_is_memoized_across_sends() {
        let bot = bot_with_upload("F2");
        let proxy = proxy_with(&bot, Session::private("42"));

        let elements = vec![Element::image("https://e.com/ob12-memoized.png")];
        proxy.send(&elements, false).await.unwrap();
        proxy.send(&elements, false).await.unwrap();

        // Two sends, one upload.
        assert_eq!(bot.api_calls().len(), 1);
        assert_eq!(bot.sends().len(), 2);

        // And convert now resolves synchronously from the cache.
        assert_eq!(
            proxy
                .convert(&Element::image("https://e.com/ob12-memoized.png"))
                .unwrap(),
            json!({ "type": "image", "data": { "file_id": "F2" } })
        );
    }

    #[tokio::test]
    async fn test_voice_solo_uploads_bytes() {
        let bot = bot_with_upload("F3");
        let proxy = proxy_with(&bot, Session::private("42"));

        let elements = vec![
            Element::text("before"),
            Element::voice(FileSource::bytes(vec![0xCA, 0xFE])),
        ];
        let results = proxy.send(&elements, false).await.unwrap();
        assert_eq!(results.len(), 2);

        let (action, params) = &bot.api_calls()[0];
        assert_eq!(action, "upload_file");
        assert_eq!(
            params,
            &json!({ "type": "data", "name": "unnamed", "data": "yv4=" })
        );
        assert_eq!(
            bot.sends()[1],
            Outgoing::Native(json!([{ "type": "voice", "data": { "file_id": "F3" } }]))
        );
    }

    #[tokio::test]
    async fn test_share_solo_degrades_to_text() {
        let bot = MockBot::shared("onebot.v12");
        let proxy = proxy_with(&bot, Session::private("42"));
        let elements = vec![Element::share("https://e.com", "题", None, None)];
        proxy.send(&elements, false).await.unwrap();
        assert_eq!(
            bot.sends(),
            vec![Outgoing::Text("[分享] 《题》 https://e.com".to_string())]
        );
    }

    #[tokio::test]
    async fn test_upload_failure_propagates() {
        // The scripted bot returns `{}` for unknown actions, which is
        // missing `file_id`.
        let bot = MockBot::shared("onebot.v12");
        let proxy = proxy_with(&bot, Session::private("42"));
        let elements = vec![Element::file(
            FileSource::url("https://e.com/ob12-bad-upload.bin"),
            "bad.bin",
        )];
        let err = proxy.send(&elements, false).await.unwrap_err();
        assert!(matches!(
            err,
            msgbuf_core::SendError::Api(ApiError::Serialization(_))
        ));
        assert!(bot.sends().is_empty());
    }
}
