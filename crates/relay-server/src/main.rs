//! CDC notification relay daemon.
//!
//! Wires the Kafka source, Postgres subscriber store, MySQL enrichment
//! store and Telegram transport into the relay pipeline, then runs
//! until SIGINT.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_connectors::kafka::{KafkaSource, KafkaSourceConfig};
use relay_connectors::mysql::MySqlEnrichmentStore;
use relay_connectors::postgres::PgSubscriberStore;
use relay_connectors::telegram::TelegramTransport;
use relay_core::config::PipelineConfig;
use relay_core::pipeline::Pipeline;

/// Relays Debezium change events to Telegram chats.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Kafka bootstrap servers
    #[arg(long, env = "KAFKA_BROKERS", default_value = "localhost:9092")]
    kafka_brokers: String,

    /// Kafka consumer group id
    #[arg(long, env = "KAFKA_GROUP_ID", default_value = "tg-notify-bot")]
    kafka_group_id: String,

    /// Debezium topic for the notification table
    #[arg(long, env = "NOTIFY_TOPIC", default_value = "debezium.chii.bangumi.chii_notify")]
    notify_topic: String,

    /// Debezium topic for the direct-message table
    #[arg(long, env = "PM_TOPIC", default_value = "debezium.chii.bangumi.chii_pms")]
    pm_topic: String,

    /// Postgres DSN for the subscription table
    #[arg(long, env = "PG_DSN")]
    pg_dsn: String,

    /// MySQL URL for the application database
    #[arg(long, env = "MYSQL_DSN")]
    mysql_dsn: String,

    /// Telegram bot token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    bot_token: String,

    /// Dispatch queue capacity
    #[arg(long, env = "QUEUE_SIZE", default_value_t = 1)]
    queue_size: usize,

    /// Directory refresh interval in seconds, 0 to disable
    #[arg(long, env = "DIRECTORY_REFRESH_SECS", default_value_t = 0)]
    directory_refresh_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    format!(
                        "relay_core={0},relay_connectors={0},relay_server={0}",
                        args.log_level
                    )
                    .into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting notification relay");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let subscribers = Arc::new(
        PgSubscriberStore::connect(&args.pg_dsn)
            .await
            .context("connecting subscriber store")?,
    );
    let enrichment =
        Arc::new(MySqlEnrichmentStore::connect(&args.mysql_dsn).context("creating mysql pool")?);
    let transport =
        Arc::new(TelegramTransport::new(&args.bot_token).context("building telegram client")?);

    let source = KafkaSource::connect(KafkaSourceConfig {
        brokers: args.kafka_brokers,
        group_id: args.kafka_group_id,
        topics: vec![args.notify_topic.clone(), args.pm_topic.clone()],
        ..KafkaSourceConfig::default()
    })
    .context("connecting kafka source")?;

    let config = PipelineConfig {
        dispatch_queue_size: args.queue_size,
        directory_refresh_interval: (args.directory_refresh_secs > 0)
            .then(|| Duration::from_secs(args.directory_refresh_secs)),
        ..PipelineConfig::default()
    };

    let pipeline = Pipeline::new(config, subscribers, enrichment, transport);
    let handle = pipeline
        .start(Box::new(source), &args.notify_topic, &args.pm_topic)
        .await
        .context("starting pipeline")?;

    tokio::signal::ctrl_c().await.context("waiting for SIGINT")?;
    info!("SIGINT received, draining pipeline");
    handle.shutdown().await;

    Ok(())
}
