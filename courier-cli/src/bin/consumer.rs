//! courier-consumer
//!
//! Consumes a queue until interrupted. By default every body is printed and
//! acknowledged. With `--event` deliveries are decoded into events and routed
//! through a dispatcher.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use courier_cli::{ConnectionArgs, init_tracing};
use courier_events::{Completion, Envelope, Event, EventDispatcher, handler_fn};
use courier_messaging::{
    BrokerChannel, Delivery, DeliveryStream, EventBridge, MessagingError, rabbitmq,
};
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "courier-consumer")]
#[command(author, version, about = "Consume messages from a RabbitMQ queue")]
struct Cli {
    /// Declare the queue and bind it to the exchange with this routing key
    #[arg(short, long, value_name = "ROUTING_KEY")]
    bind: Option<String>,

    /// Route deliveries with this event name through the dispatcher (repeatable)
    #[arg(short, long = "event", value_name = "NAME")]
    events: Vec<String>,

    /// How to decode bodies when dispatching
    #[arg(long, value_enum, default_value_t = BodyFormat::Text)]
    format: BodyFormat,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BodyFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.connection.json_logs);

    let config = cli.connection.load().context("invalid broker configuration")?;
    let channel = rabbitmq::open_channel(&config)
        .await
        .context("failed to open channel")?;

    if let Some(routing_key) = &cli.bind {
        channel.declare_queue(&config.queue).await?;
        channel
            .bind_queue(&config.queue, &config.exchange, routing_key)
            .await?;
    }

    let deliveries = channel
        .consume(&config.queue)
        .await
        .context("failed to start consumer")?;

    let consuming = async {
        if cli.events.is_empty() {
            print_deliveries(deliveries).await
        } else {
            dispatch_deliveries(deliveries, &cli.events, cli.format).await
        }
    };

    tokio::select! {
        result = consuming => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    channel.close().await?;
    Ok(())
}

async fn print_deliveries(mut deliveries: DeliveryStream) -> anyhow::Result<()> {
    while let Some(item) = deliveries.next().await {
        let delivery = item?;
        println!("{}", String::from_utf8_lossy(&delivery.body));
        delivery.ack().await?;
    }
    Ok(())
}

async fn dispatch_deliveries(
    deliveries: DeliveryStream,
    events: &[String],
    format: BodyFormat,
) -> anyhow::Result<()> {
    let dispatcher: EventDispatcher<Envelope<Value>> = EventDispatcher::new();
    for name in events {
        dispatcher.register(
            name.clone(),
            handler_fn(|event: Arc<Envelope<Value>>, done: Completion| async move {
                println!("{} {}", event.name(), event.payload());
                done.complete();
            }),
        )?;
    }

    let bridge = match format {
        BodyFormat::Json => EventBridge::json(dispatcher),
        BodyFormat::Text => EventBridge::new(dispatcher, decode_text_value),
    };

    let stats = bridge.run(deliveries).await?;
    if stats.rejected > 0 {
        warn!(rejected = stats.rejected, "Some deliveries could not be decoded");
    }
    Ok(())
}

fn decode_text_value(delivery: &Delivery) -> Result<Envelope<Value>, MessagingError> {
    Ok(Envelope::new(
        delivery.routing_key.clone(),
        Value::String(delivery.body_str()?.to_string()),
    ))
}
