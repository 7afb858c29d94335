use anyhow::Context;
use clap::Parser;
use kafka_output::input::ship_lines;
use kafka_output::{KafkaOutput, OutputConfig};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "kafka-output")]
#[command(about = "Ships newline-delimited JSON events from stdin to Kafka", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,

    #[arg(short, long, default_value_t = 125, help = "Events handed to the output per batch")]
    batch_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting kafka-output");
    info!("Loading configuration from {:?}", args.config);

    let config = OutputConfig::from_file(&args.config)
        .with_context(|| format!("failed to load configuration from {:?}", args.config))?;

    info!(
        bootstrap_servers = %config.bootstrap_servers,
        topic_id = %config.topic_id,
        message_key = ?config.message_key,
        retries = ?config.retries,
        security_protocol = %config.security_protocol,
        "Configuration summary"
    );

    let output = KafkaOutput::register(config).context("failed to register Kafka output")?;

    let result = ship_lines(
        &output,
        BufReader::new(tokio::io::stdin()),
        args.batch_size,
        shutdown_signal(),
    )
    .await;

    // close runs on every exit path of the input loop
    output.close().await.context("failed to flush Kafka producer")?;

    match result {
        Ok(summary) => {
            info!(
                read = summary.read,
                malformed = summary.malformed,
                delivered = summary.delivered,
                dropped = summary.dropped,
                interrupted = summary.interrupted,
                "kafka-output stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!("Input loop failed: {}", e);
            Err(e.into())
        }
    }
}

/// Resolves on Ctrl+C. Never resolves when the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("kafka_output=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("kafka_output=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
