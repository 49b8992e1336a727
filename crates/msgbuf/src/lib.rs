//! # msgbuf
//!
//! Passive message construction and dispatch on top of a chat-bot adapter
//! model: accumulate a heterogeneous sequence of message elements, then let
//! the platform proxy split and translate it into however many native send
//! calls the target platform needs.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use msgbuf::{Session, SendOptions, SpecFlags, attach};
//!
//! async fn greet(bot: msgbuf::SharedBot) -> msgbuf::SendResult<()> {
//!     let mb = attach(
//!         &bot,
//!         Session::group("777"),
//!         SendOptions::new().specs(SpecFlags::PLATFORM_QQ).retry(2),
//!     );
//!     mb.scoped(|mb| {
//!         Box::pin(async move {
//!             mb.text("hello ").mention("42").image("https://example.com/cat.png");
//!             Ok(())
//!         })
//!     })
//!     .await?; // flushed on scope exit
//!     Ok(())
//! }
//! ```
//!
//! The element sequence is split automatically: mutually exclusive elements
//! (voice, video, files, share cards, locations, raw passthrough) each get
//! their own outbound call, and per-platform conflict rules (one reply per
//! message, reply/image clashes on QQ, one image per message on guild-style
//! platforms) start new messages where needed — all in append order.

pub use msgbuf_core::*;
pub use msgbuf_platforms::{builtin_registry, proxy_for, registry};

#[cfg(feature = "onebot-v11")]
pub use msgbuf_platforms::onebot_v11;
#[cfg(feature = "onebot-v12")]
pub use msgbuf_platforms::onebot_v12;
#[cfg(feature = "qqguild")]
pub use msgbuf_platforms::qqguild;
#[cfg(feature = "telegram")]
pub use msgbuf_platforms::telegram;

/// Creates a [`MessageBuffer`] for the given bot and session, resolving the
/// platform proxy from the built-in registry.
pub fn attach(bot: &SharedBot, session: Session, options: SendOptions) -> MessageBuffer {
    let proxy = proxy_for(bot, session, options.specs);
    MessageBuffer::new(proxy, options)
}
