//! hearth-replay - runs a JSON Lines file of classified events through the
//! event pipeline and prints one decision per event.
//!
//! # Usage
//!
//! ```text
//! hearth-replay <events.jsonl> [config.toml|.json|.yaml]
//! ```
//!
//! Without a config file, settings come from `HEARTH_*` environment
//! variables (a `.env` file is honoured). Outbound messages are logged, not
//! delivered.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use hearth_core::{
    ClassifiedEvent, EventPipeline, HearthConfig, HearthResult, MessageSender, OutboundMessage,
};
use hearth_stores::StoreFactory;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sender that only logs what would have been delivered.
struct LoggingSender;

#[async_trait]
impl MessageSender for LoggingSender {
    async fn send(&self, message: &OutboundMessage) -> HearthResult<()> {
        info!(
            destination = %message.destination,
            conversation_id = %message.conversation_id,
            recipient_id = %message.recipient_id,
            text = %message.text,
            "Outbound message"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the decisions.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("hearth=debug".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(events_path) = args.next() else {
        bail!("usage: hearth-replay <events.jsonl> [config]");
    };

    let config = match args.next() {
        Some(path) => HearthConfig::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => HearthConfig::from_env().context("loading config from environment")?,
    };

    let store = StoreFactory::create(&config.store).context("creating store")?;
    let pipeline = EventPipeline::builder(config, store)
        .sender(Arc::new(LoggingSender))
        .tracked_preferences()
        .build()?;

    let file = tokio::fs::File::open(&events_path)
        .await
        .with_context(|| format!("opening {}", events_path))?;
    let mut lines = BufReader::new(file).lines();

    let (mut processed, mut skipped, mut sent) = (0usize, 0usize, 0usize);
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event: ClassifiedEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed event");
                skipped += 1;
                continue;
            }
        };

        match pipeline.handle_classified(&event).await {
            Ok(result) => {
                processed += 1;
                if matches!(result.delivery, hearth_core::Delivery::Sent(_)) {
                    sent += 1;
                }
                println!("{}", serde_json::to_string(&result)?);
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "Event failed");
                skipped += 1;
            }
        }
    }

    info!(processed, skipped, sent, "Replay finished");
    Ok(())
}
