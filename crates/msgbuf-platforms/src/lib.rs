//! # msgbuf Platforms
//!
//! Platform conversion proxies for the msgbuf message layer.
//!
//! Every proxy implements the same contract ([`msgbuf_core::Proxy`]): it
//! partitions a buffered element sequence under its own conflict table and
//! translates each batch into that platform's native payloads. The
//! platform-specific surface is deliberately small:
//!
//! | Platform | Prefix | Peculiarities |
//! |----------|--------|---------------|
//! | OneBot v11 | `onebot.v11` | reply/image clash on QQ; go-cqhttp file upload APIs |
//! | OneBot v12 | `onebot.v12` | media referenced by `file_id` from an `upload_file` round-trip |
//! | QQ Guild | `qqguild` | single content object; mention markup; one image per message |
//! | Telegram | `telegram` | typed send endpoints; caption/photo; one photo per message |
//!
//! Each platform sits behind a cargo feature of the same name; disabling a
//! feature removes the proxy and its registry entry entirely, the way an
//! absent adapter would. The built-in registry is assembled once, at first
//! use, from the statically known platform list.

use std::sync::OnceLock;

use msgbuf_core::{ProxyRegistry, Session, SharedBot, SpecFlags};

#[cfg(feature = "onebot-v11")]
pub mod onebot_v11;
#[cfg(feature = "onebot-v12")]
pub mod onebot_v12;
#[cfg(feature = "qqguild")]
pub mod qqguild;
#[cfg(feature = "telegram")]
pub mod telegram;

#[cfg(test)]
pub(crate) mod testing;

/// Builds a fresh registry holding every enabled platform proxy.
pub fn builtin_registry() -> ProxyRegistry {
    let mut registry = ProxyRegistry::new();
    #[cfg(feature = "onebot-v11")]
    registry.register(onebot_v11::ADAPTER_PREFIX, onebot_v11::Ob11Proxy::factory);
    #[cfg(feature = "onebot-v12")]
    registry.register(onebot_v12::ADAPTER_PREFIX, onebot_v12::Ob12Proxy::factory);
    #[cfg(feature = "qqguild")]
    registry.register(qqguild::ADAPTER_PREFIX, qqguild::GuildProxy::factory);
    #[cfg(feature = "telegram")]
    registry.register(telegram::ADAPTER_PREFIX, telegram::TelegramProxy::factory);
    registry
}

/// The process-wide proxy registry, populated once at first use.
pub fn registry() -> &'static ProxyRegistry {
    static REGISTRY: OnceLock<ProxyRegistry> = OnceLock::new();
    REGISTRY.get_or_init(builtin_registry)
}

/// Resolves the conversion proxy for the given bot from the built-in
/// registry. Bots of unknown adapters get the generic plain-text proxy.
pub fn proxy_for(
    bot: &SharedBot,
    session: Session,
    specs: SpecFlags,
) -> Box<dyn msgbuf_core::Proxy> {
    registry().resolve(bot, session, specs)
}
