//! courier-producer
//!
//! Publishes a single message to an exchange. With `--event` the message is
//! wrapped in an event envelope and published through a dispatcher, the way
//! an application externalizes its own events.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use courier_cli::{ConnectionArgs, init_tracing};
use courier_events::{Envelope, EventDispatcher, SharedHandler};
use courier_messaging::{BrokerChannel, PublishingHandler, rabbitmq};
use serde_json::Value;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "courier-producer")]
#[command(author, version, about = "Publish a message to a RabbitMQ exchange")]
struct Cli {
    /// Message body
    #[arg(default_value = "Hello World")]
    message: String,

    /// Routing key (events are routed by their name instead)
    #[arg(short = 'k', long, default_value = "", conflicts_with = "event")]
    routing_key: String,

    /// Publish as an event envelope with this name instead of a raw body
    #[arg(short, long, value_name = "NAME")]
    event: Option<String>,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.connection.json_logs);

    let config = cli.connection.load().context("invalid broker configuration")?;
    let channel = Arc::new(
        rabbitmq::open_channel(&config)
            .await
            .context("failed to open channel")?,
    );

    match &cli.event {
        Some(name) => {
            let dispatcher: EventDispatcher<Envelope<Value>> = EventDispatcher::new();
            let publisher: SharedHandler<Envelope<Value>> =
                Arc::new(PublishingHandler::new(channel.clone(), config.exchange.clone()));
            dispatcher.register(name.clone(), publisher)?;

            // Non-JSON input is carried as a string payload.
            let payload = serde_json::from_str(&cli.message)
                .unwrap_or_else(|_| Value::String(cli.message.clone()));
            let event = Envelope::new(name.clone(), payload);
            let id = event.id();

            let report = dispatcher.dispatch_with_report(event).await?;
            if !report.is_success() {
                anyhow::bail!("failed to publish event {name}: {:?}", report.failures);
            }
            info!(event = %name, id = %id, exchange = %config.exchange, "Event published");
        }
        None => {
            channel
                .publish(&config.exchange, &cli.routing_key, cli.message.as_bytes())
                .await
                .context("failed to publish message")?;
            info!(
                exchange = %config.exchange,
                routing_key = %cli.routing_key,
                "Message published"
            );
        }
    }

    channel.close().await?;
    Ok(())
}
