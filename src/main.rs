use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eli5bot::config::Config;
use eli5bot::deliver::DiscordWebhook;
use eli5bot::generate::{DatasetTemplate, Generate, GeneratorStack, RemoteLlm};
use eli5bot::listener::{Ingestor, TriggerFilter, TwitterMentionSource};
use eli5bot::persistence::{CursorStore, InteractionLog, Ledger, PipelineLock, WorkQueue};
use eli5bot::pipeline::{BatchConfig, Engine, LoopConfig, TopicExtractor, process_loop};
use eli5bot::server;

/// Mention bot CLI
#[derive(Parser, Debug)]
#[command(name = "eli5bot", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run everything: mention ingestion, reply processing, health server
    Run,

    /// Fetch new mentions once and append them to the work queue
    Fetch,

    /// Process queued mentions: one batch, or forever with --loop
    Process {
        /// Keep processing batches on a fixed interval
        #[arg(long = "loop")]
        repeat: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eli5bot=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("invalid configuration")?;

    match args.command {
        Command::Run => run(config).await,
        Command::Fetch => fetch_once(config).await,
        Command::Process { repeat } => process(config, repeat).await,
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let mut engine = build_engine(&config)?;

    let health = tokio::spawn(server::serve(config.health_port));

    // The listener is optional: without fetch credentials the processor
    // still drains whatever another instance appends to the queue.
    let ingest = match config.require_twitter() {
        Ok((token, user_id)) => {
            let mut ingestor = build_ingestor(&config, token, user_id);
            let interval = config.fetch_interval;
            Some(tokio::spawn(async move {
                ingestor.run_forever(interval).await;
            }))
        }
        Err(err) => {
            warn!(error = %err, "running without the mention listener");
            None
        }
    };

    let loop_config = LoopConfig {
        interval: config.process_interval,
        error_delay: config.error_delay,
    };

    tokio::select! {
        _ = process_loop(&mut engine, loop_config) => {}
        result = health => {
            result.context("health server task panicked")??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    if let Some(task) = ingest {
        task.abort();
    }
    Ok(())
}

async fn fetch_once(config: Config) -> anyhow::Result<()> {
    let (token, user_id) = config.require_twitter().context("fetch needs credentials")?;
    let mut ingestor = build_ingestor(&config, token, user_id);

    let report = ingestor.run_once().await?;
    info!(
        fetched = report.fetched,
        queued = report.queued,
        rate_limited = report.rate_limited,
        "fetch complete"
    );
    Ok(())
}

async fn process(config: Config, repeat: bool) -> anyhow::Result<()> {
    let mut engine = build_engine(&config)?;

    if repeat {
        let loop_config = LoopConfig {
            interval: config.process_interval,
            error_delay: config.error_delay,
        };
        tokio::select! {
            _ = process_loop(&mut engine, loop_config) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
            }
        }
    } else {
        let outcome = engine.run_batch().await?;
        info!(?outcome, "batch complete");
    }
    Ok(())
}

fn build_engine(config: &Config) -> anyhow::Result<Engine<GeneratorStack, DiscordWebhook>> {
    let webhook_url = config
        .require_webhook_url()
        .context("delivery needs the webhook")?;

    let mut strategies: Vec<Box<dyn Generate>> = Vec::new();
    if let Some(url) = config.explain_api_url.as_deref() {
        strategies.push(Box::new(RemoteLlm::new(url)));
    } else {
        warn!("no explanation API configured, using the dataset/template only");
    }
    strategies.push(Box::new(DatasetTemplate::load(&config.dataset_csv)));

    Ok(Engine::new(
        WorkQueue::new(&config.mentions_csv),
        Ledger::open(&config.ledger_file)?,
        PipelineLock::new(&config.lock_file),
        TopicExtractor::new(config.bot_handle.as_str(), config.trigger_tag.as_str()),
        GeneratorStack::new(strategies),
        DiscordWebhook::new(webhook_url, config.bot_handle.as_str()),
        InteractionLog::new(&config.interactions_csv),
        config.backoff_policy(),
        BatchConfig {
            max_items: config.batch_size,
            max_reply_length: config.max_reply_length,
        },
    ))
}

fn build_ingestor(
    config: &Config,
    bearer_token: &str,
    user_id: &str,
) -> Ingestor<TwitterMentionSource> {
    Ingestor::new(
        TwitterMentionSource::new(bearer_token, user_id),
        WorkQueue::new(&config.mentions_csv),
        CursorStore::new(&config.last_seen_file),
        TriggerFilter::new(config.bot_handle.as_str(), config.trigger_tag.as_str()),
        config.seen_cache_cap,
        config.backoff_policy(),
    )
}
