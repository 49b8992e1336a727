//! # msgbuf Core
//!
//! Element model, partitioning and send orchestration for the msgbuf
//! message-construction layer.
//!
//! ## Architecture
//!
//! The crate is organized leaf-first:
//!
//! - **Element model** ([`element`]): a closed tagged union of message
//!   content, each variant with an exclusivity class and a plain-text
//!   degradation.
//! - **Buffer** ([`buffer`]): the ordered element sequence with
//!   append/extend/revert.
//! - **Partitioning** ([`partition`]): the state machine that splits an
//!   element sequence into outbound batches under a platform's conflict
//!   table.
//! - **Proxy** ([`proxy`]): the per-platform translation/dispatch trait,
//!   the plain-text base proxy, and prefix-based proxy resolution.
//! - **Orchestrator** ([`sender`]): buffer ownership, the retry → fallback
//!   → propagate chain, and scoped auto-flush.
//! - **Cache** ([`cache`]): shelf-life memoization for upload round-trips.
//!
//! ## Data Flow
//!
//! ```text
//! ┌────────┐ append ┌───────────────┐ flush ┌─────────┐ partition ┌─────┐
//! │ Caller │───────▶│ MessageBuffer │──────▶│  Proxy  │──────────▶│ Bot │
//! └────────┘        └───────────────┘       └─────────┘  N calls  └─────┘
//! ```
//!
//! Platform proxies live in `msgbuf-platforms`; this crate only knows the
//! [`Proxy`] trait and the generic [`TextProxy`] fallback.

pub mod bot;
pub mod buffer;
pub mod cache;
pub mod element;
pub mod error;
pub mod partition;
pub mod proxy;
pub mod sender;
pub mod specs;

pub use bot::{Bot, Outgoing, Session, SharedBot, upload_target};
pub use buffer::ElementBuffer;
pub use cache::ShelfCache;
pub use element::{Element, ElementKind, Exclusivity, FileSource, RawPayload, media_name};
pub use error::{ApiError, ApiResult, ElementError, SendError, SendResult};
pub use partition::{Batch, ConflictTable, partition};
pub use proxy::{Proxy, ProxyFactory, ProxyRegistry, TextProxy, fallback_text, send_fallback};
pub use sender::{MessageBuffer, SendOptions};
pub use specs::SpecFlags;
