//! Conversion proxy trait, the plain-text base proxy, and proxy resolution.
//!
//! A proxy translates abstract [`Element`]s into one platform's native
//! payloads and drives the partitioned send. Proxies are stateless with
//! respect to the buffer: one is constructed per orchestrator from the
//! active bot, the session, and the spec flags, and discarded with it.

use serde_json::Value;
use tracing::debug;

use crate::bot::{Outgoing, Session, SharedBot};
use crate::element::Element;
use crate::error::SendResult;
use crate::specs::SpecFlags;

// =============================================================================
// Proxy trait
// =============================================================================

/// Per-platform element translation and partitioned dispatch.
#[async_trait::async_trait]
pub trait Proxy: Send + Sync {
    /// Translates one element into its platform-native payload (or a
    /// plain-text rendering where no native form exists).
    ///
    /// May fail when required external data is unavailable — e.g. a media
    /// payload whose upload handle has not been obtained yet.
    fn convert(&self, element: &Element) -> SendResult<Value>;

    /// Partitions the sequence and performs one outbound call per batch,
    /// returning the per-call results in send order.
    ///
    /// With `use_fallback` set, partitioning is skipped entirely: the whole
    /// sequence degrades to one plain-text call of concatenated
    /// [`Element::alternative`] renderings.
    async fn send(&self, elements: &[Element], use_fallback: bool) -> SendResult<Vec<Value>>;
}

// =============================================================================
// Fallback helpers
// =============================================================================

/// Concatenates the plain-text degradation of every element.
pub fn fallback_text(elements: &[Element]) -> String {
    elements.iter().map(Element::alternative).collect()
}

/// The degraded, always-safe path: one plain-text call for the whole
/// sequence.
pub async fn send_fallback(
    bot: &SharedBot,
    session: &Session,
    elements: &[Element],
) -> SendResult<Vec<Value>> {
    let result = bot
        .send(session, Outgoing::Text(fallback_text(elements)))
        .await?;
    Ok(vec![result])
}

// =============================================================================
// TextProxy - the generic base proxy
// =============================================================================

/// Fallback proxy for adapters without a registered platform proxy.
///
/// Converts every element to its plain-text rendering and sends the whole
/// buffer as a single combined text message.
pub struct TextProxy {
    bot: SharedBot,
    session: Session,
}

impl TextProxy {
    /// Creates a new plain-text proxy.
    pub fn new(bot: SharedBot, session: Session) -> Self {
        Self { bot, session }
    }

    /// Factory with the [`ProxyFactory`] signature.
    pub fn factory(bot: SharedBot, session: Session, _specs: SpecFlags) -> Box<dyn Proxy> {
        Box::new(Self::new(bot, session))
    }
}

#[async_trait::async_trait]
impl Proxy for TextProxy {
    fn convert(&self, element: &Element) -> SendResult<Value> {
        Ok(Value::String(element.alternative()))
    }

    async fn send(&self, elements: &[Element], _use_fallback: bool) -> SendResult<Vec<Value>> {
        send_fallback(&self.bot, &self.session, elements).await
    }
}

// =============================================================================
// Proxy resolution
// =============================================================================

/// Constructor signature every platform proxy exposes.
pub type ProxyFactory = fn(SharedBot, Session, SpecFlags) -> Box<dyn Proxy>;

/// Ordered table mapping adapter-name prefixes to proxy factories.
///
/// Resolution picks the first registered entry whose prefix is a prefix of
/// the bot's [`adapter_name`](crate::bot::Bot::adapter_name); with no match,
/// the generic [`TextProxy`] serves as the universal fallback.
#[derive(Default)]
pub struct ProxyRegistry {
    entries: Vec<(&'static str, ProxyFactory)>,
}

impl ProxyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a platform proxy under its adapter-name prefix.
    ///
    /// Registration order is match order.
    pub fn register(&mut self, prefix: &'static str, factory: ProxyFactory) {
        self.entries.push((prefix, factory));
    }

    /// Number of registered platform proxies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no platform proxy is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves the proxy for the given bot.
    pub fn resolve(&self, bot: &SharedBot, session: Session, specs: SpecFlags) -> Box<dyn Proxy> {
        let adapter = bot.adapter_name();
        for (prefix, factory) in &self.entries {
            if adapter.starts_with(prefix) {
                debug!(adapter = %adapter, proxy = %prefix, "resolved platform proxy");
                return factory(bot.clone(), session, specs);
            }
        }
        debug!(adapter = %adapter, "no platform proxy matched; using plain-text fallback");
        Box::new(TextProxy::new(bot.clone(), session))
    }
}

// =============================================================================
// Tests
// =============================================================================
