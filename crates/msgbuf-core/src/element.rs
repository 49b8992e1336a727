//! Abstract message elements and their exclusivity classes.
//!
//! An [`Element`] is one unit of outbound content. Elements are collected in
//! an [`ElementBuffer`](crate::buffer::ElementBuffer) and later translated to
//! platform-native payloads by a conversion proxy. Each variant belongs to an
//! [`Exclusivity`] class that drives the partitioning rules:
//!
//! - `Body`: freely combinable with other body elements in one message.
//! - `Single`: body-compatible, but capped at one occurrence per message.
//! - `Mutex`: always sent as its own dedicated message.
//!
//! Every variant also carries a plain-text degradation ([`Element::alternative`])
//! used when a platform has no native representation for it, and by the
//! fallback send path.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use crate::error::ElementError;

/// Display name used when a byte payload carries no name and none was given.
pub const UNNAMED: &str = "unnamed";

// =============================================================================
// FileSource - file reference payloads
// =============================================================================

/// A reference to file content: a local path, a URL, or raw in-memory bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Local filesystem path.
    Path(PathBuf),
    /// URL or URI reference (`http://…`, `file://…`, `base64://…`, …).
    Url(String),
    /// Raw bytes held in memory.
    Bytes(Vec<u8>),
}

impl FileSource {
    /// Creates a path-backed source.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Creates a URL-backed source.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Creates an in-memory source.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Derives a display name from the reference.
    ///
    /// Path references use their basename; URL references use the last path
    /// component with any query string stripped. Raw bytes and `base64://`
    /// URIs carry no inferable name and fail with
    /// [`ElementError::MissingName`].
    pub fn file_name(&self) -> Result<String, ElementError> {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or(ElementError::MissingName {
                    source_kind: "extensionless path",
                }),
            Self::Url(url) => {
                if url.starts_with("base64://") {
                    return Err(ElementError::MissingName {
                        source_kind: "base64 URI",
                    });
                }
                let tail = url.rsplit('/').next().unwrap_or(url);
                let tail = tail.split('?').next().unwrap_or(tail);
                if tail.is_empty() {
                    Err(ElementError::MissingName { source_kind: "URL" })
                } else {
                    Ok(tail.to_string())
                }
            }
            Self::Bytes(_) => Err(ElementError::MissingName {
                source_kind: "raw bytes",
            }),
        }
    }

    /// Resolves the reference to a local filesystem path.
    ///
    /// Only path references and `file://` URLs resolve; anything else fails
    /// with [`ElementError::NotLocalFile`].
    pub fn local_path(&self) -> Result<PathBuf, ElementError> {
        match self {
            Self::Path(path) => Ok(path.clone()),
            Self::Url(url) => match url.strip_prefix("file://") {
                Some(rest) => Ok(PathBuf::from(rest)),
                None => Err(ElementError::NotLocalFile {
                    reference: url.clone(),
                }),
            },
            Self::Bytes(bytes) => Err(ElementError::NotLocalFile {
                reference: format!("<{} bytes in memory>", bytes.len()),
            }),
        }
    }

    /// Renders the reference as a URI string for platforms that take file
    /// payloads by value: paths become `file://…`, URLs pass through, and
    /// raw bytes are embedded as `base64://…`.
    pub fn as_uri(&self) -> String {
        match self {
            Self::Path(path) => format!("file://{}", path.display()),
            Self::Url(url) => url.clone(),
            Self::Bytes(bytes) => format!("base64://{}", BASE64.encode(bytes)),
        }
    }
}

impl From<PathBuf> for FileSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for FileSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for FileSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

// String-ish inputs are treated as URI references, not paths.
impl From<String> for FileSource {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<&str> for FileSource {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

// =============================================================================
// Raw payloads
// =============================================================================

/// Payload of a [`Element::Raw`] passthrough element.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// A plain string, sent as-is.
    Text(String),
    /// An already-platform-native payload, passed through opaquely.
    Native(Value),
}

// =============================================================================
// Exclusivity classes and element kinds
// =============================================================================

/// How an element may share an outbound message with its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exclusivity {
    /// Freely combinable with other body elements.
    Body,
    /// Body-compatible, but at most one occurrence per outbound message.
    Single,
    /// Always occupies its own outbound message.
    Mutex,
}

/// Fieldless discriminant of an [`Element`], used by the conflict tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Text,
    Image,
    Mention,
    Face,
    Reply,
    Raw,
    Voice,
    Video,
    File,
    Share,
    Location,
}

// =============================================================================
// Element
// =============================================================================

/// One unit of outbound message content.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// Image.
    Image {
        /// File reference.
        source: FileSource,
        /// Optional display name.
        name: Option<String>,
    },
    /// @mention of a user, a channel, or everyone.
    Mention {
        /// Target id, or `"all"` to mention everyone.
        target: String,
        /// Optional mention domain (e.g. `"channel"`).
        domain: Option<String>,
    },
    /// Platform sticker/emote by id.
    Face {
        /// Sticker id.
        face_id: String,
    },
    /// Reply referencing an earlier message.
    Reply {
        /// Referenced message id.
        message_id: String,
    },
    /// Opaque passthrough of a string or native payload.
    Raw {
        /// The payload to pass through.
        payload: RawPayload,
    },
    /// Voice recording.
    Voice {
        /// File reference.
        source: FileSource,
        /// Optional display name.
        name: Option<String>,
    },
    /// Video.
    Video {
        /// File reference.
        source: FileSource,
        /// Optional display name.
        name: Option<String>,
    },
    /// File attachment.
    File {
        /// File reference.
        source: FileSource,
        /// Display name, always present (derived or supplied).
        name: String,
    },
    /// Link share card.
    Share {
        /// Target URL.
        url: String,
        /// Card title.
        title: String,
        /// Optional body text.
        content: Option<String>,
        /// Optional preview image URL.
        image: Option<String>,
    },
    /// Geolocation.
    Location {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
        /// Optional title.
        title: Option<String>,
        /// Optional description.
        content: Option<String>,
    },
}

impl Element {
    /// Creates a text element.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an image element.
    pub fn image(source: impl Into<FileSource>) -> Self {
        Self::Image {
            source: source.into(),
            name: None,
        }
    }

    /// Creates an image element with an explicit display name.
    pub fn image_named(source: impl Into<FileSource>, name: impl Into<String>) -> Self {
        Self::Image {
            source: source.into(),
            name: Some(name.into()),
        }
    }

    /// Creates a mention of a user id.
    pub fn mention(target: impl Into<String>) -> Self {
        Self::Mention {
            target: target.into(),
            domain: None,
        }
    }

    /// Creates a mention within a specific domain (e.g. a channel mention).
    pub fn mention_in(target: impl Into<String>, domain: impl Into<String>) -> Self {
        Self::Mention {
            target: target.into(),
            domain: Some(domain.into()),
        }
    }

    /// Creates a mention of everyone.
    pub fn mention_all() -> Self {
        Self::Mention {
            target: "all".to_string(),
            domain: None,
        }
    }

    /// Creates a sticker element.
    pub fn face(face_id: impl Into<String>) -> Self {
        Self::Face {
            face_id: face_id.into(),
        }
    }

    /// Creates a reply element.
    pub fn reply(message_id: impl Into<String>) -> Self {
        Self::Reply {
            message_id: message_id.into(),
        }
    }

    /// Creates a raw passthrough of a plain string.
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw {
            payload: RawPayload::Text(text.into()),
        }
    }

    /// Creates a raw passthrough of a platform-native payload.
    pub fn raw_native(payload: Value) -> Self {
        Self::Raw {
            payload: RawPayload::Native(payload),
        }
    }

    /// Creates a voice element.
    pub fn voice(source: impl Into<FileSource>) -> Self {
        Self::Voice {
            source: source.into(),
            name: None,
        }
    }

    /// Creates a video element.
    pub fn video(source: impl Into<FileSource>) -> Self {
        Self::Video {
            source: source.into(),
            name: None,
        }
    }

    /// Creates a file element with an explicit display name.
    pub fn file(source: impl Into<FileSource>, name: impl Into<String>) -> Self {
        Self::File {
            source: source.into(),
            name: name.into(),
        }
    }

    /// Creates a file element, deriving the display name from the reference.
    ///
    /// Fails with [`ElementError::MissingName`] when the reference is raw
    /// bytes or a `base64://` URI.
    pub fn file_auto(source: impl Into<FileSource>) -> Result<Self, ElementError> {
        let source = source.into();
        let name = source.file_name()?;
        Ok(Self::File { source, name })
    }

    /// Creates a link share element.
    pub fn share(
        url: impl Into<String>,
        title: impl Into<String>,
        content: Option<String>,
        image: Option<String>,
    ) -> Self {
        Self::Share {
            url: url.into(),
            title: title.into(),
            content,
            image,
        }
    }

    /// Creates a geolocation element.
    pub fn location(
        latitude: f64,
        longitude: f64,
        title: Option<String>,
        content: Option<String>,
    ) -> Self {
        Self::Location {
            latitude,
            longitude,
            title,
            content,
        }
    }

    /// Returns the fieldless discriminant of this element.
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Text { .. } => ElementKind::Text,
            Self::Image { .. } => ElementKind::Image,
            Self::Mention { .. } => ElementKind::Mention,
            Self::Face { .. } => ElementKind::Face,
            Self::Reply { .. } => ElementKind::Reply,
            Self::Raw { .. } => ElementKind::Raw,
            Self::Voice { .. } => ElementKind::Voice,
            Self::Video { .. } => ElementKind::Video,
            Self::File { .. } => ElementKind::File,
            Self::Share { .. } => ElementKind::Share,
            Self::Location { .. } => ElementKind::Location,
        }
    }

    /// Returns the exclusivity class driving the partitioning rules.
    pub fn exclusivity(&self) -> Exclusivity {
        match self {
            Self::Text { .. } | Self::Image { .. } | Self::Mention { .. } | Self::Face { .. } => {
                Exclusivity::Body
            }
            Self::Reply { .. } => Exclusivity::Single,
            Self::Raw { .. }
            | Self::Voice { .. }
            | Self::Video { .. }
            | Self::File { .. }
            | Self::Share { .. }
            | Self::Location { .. } => Exclusivity::Mutex,
        }
    }

    /// Plain-text degradation of this element.
    ///
    /// Pure and total: every variant renders, regardless of payload.
    pub fn alternative(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Image { .. } => "[图片]".to_string(),
            Self::Mention { target, .. } => format!("@{target} "),
            Self::Face { .. } => "[表情]".to_string(),
            Self::Reply { .. } => "[回复]".to_string(),
            Self::Raw { .. } => "[不支持的消息类型]".to_string(),
            Self::Voice { .. } => "[语音]".to_string(),
            Self::Video { .. } => "[视频]".to_string(),
            Self::File { .. } => "[文件]".to_string(),
            Self::Share { url, title, .. } => format!("[分享] 《{title}》 {url}"),
            Self::Location {
                latitude,
                longitude,
                ..
            } => {
                format!("[纬度：{latitude}，经度：{longitude}]")
            }
        }
    }
}

/// Resolves the display name of a media payload: the explicit name if given,
/// else the derived file name, else the generic placeholder.
pub fn media_name(source: &FileSource, name: Option<&str>) -> String {
    match name {
        Some(name) => name.to_string(),
        None => source
            .file_name()
            .unwrap_or_else(|_| UNNAMED.to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================
