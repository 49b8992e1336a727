//! Loopback demonstration of the msgbuf message layer.
//!
//! A `LoopbackBot` stands in for a real OneBot v11 adapter: every send and
//! API call is logged instead of hitting the network. The demo builds one
//! mixed element sequence and lets the scoped buffer split it into native
//! calls on exit.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-send
//! ```

use std::any::Any;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

use msgbuf::{
    ApiResult, Bot, FileSource, Outgoing, SendOptions, Session, SharedBot, SpecFlags, attach,
};

/// A bot capability that logs outbound traffic instead of delivering it.
struct LoopbackBot;

#[async_trait]
impl Bot for LoopbackBot {
    fn id(&self) -> &str {
        "10001000"
    }

    fn adapter_name(&self) -> &str {
        "onebot.v11"
    }

    async fn call_api(&self, action: &str, params: Value) -> ApiResult<Value> {
        info!(action, %params, "API call");
        Ok(json!({}))
    }

    async fn send(&self, session: &Session, message: Outgoing) -> ApiResult<Value> {
        match &message {
            Outgoing::Text(text) => info!(?session, text, "outbound text"),
            Outgoing::Native(payload) => info!(?session, %payload, "outbound native message"),
        }
        Ok(json!({ "message_id": 1 }))
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bot: SharedBot = Arc::new(LoopbackBot);
    let session = Session::group("777").with_user("42");

    // The QQ flag makes the reply/image pair below split into two calls;
    // the voice element always takes a call of its own.
    let mb = attach(
        &bot,
        session,
        SendOptions::new()
            .specs(SpecFlags::PLATFORM_QQ)
            .retry(2)
            .cooldown_secs(1.0),
    );

    mb.scoped(|mb| {
        Box::pin(async move {
            mb.reply("9000")
                .text("hello ")
                .mention("42")
                .image("https://example.com/cat.png")
                .voice(FileSource::bytes(vec![0x02, 0x28]))
                .text("bye");
            info!(buffered = mb.len(), "assembled message");
            Ok(())
        })
    })
    .await?;

    Ok(())
}
