//! Vantage Monitor - follow the dashboard's real-time feed from a terminal.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use vantage_realtime::{
    channels, init_logging, Channel, ConnectionState, MergedView, RealtimeClient, RealtimeConfig,
    SubscriptionHandle,
};

/// Vantage Monitor - log real-time dashboard events
#[derive(Parser, Debug)]
#[command(name = "vantage-monitor")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, YAML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Streaming endpoint, overrides the configuration
    #[arg(long)]
    url: Option<String>,

    /// Channel to follow (repeatable); defaults to all dashboard channels
    #[arg(short, long = "channel")]
    channels: Vec<String>,

    /// Market symbol to follow as market_data_<SYMBOL> (repeatable)
    #[arg(long = "symbol")]
    symbols: Vec<String>,

    /// Log the merged view revision instead of each envelope
    #[arg(long)]
    merged: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        match self.verbose {
            0 => configured,
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    fn selected_channels(&self) -> Vec<Channel> {
        let mut selected: Vec<Channel> = if self.channels.is_empty() && self.symbols.is_empty() {
            channels::DASHBOARD.iter().map(|c| Channel::from(*c)).collect()
        } else {
            self.channels.iter().map(Channel::from).collect()
        };
        selected.extend(self.symbols.iter().map(|s| channels::market_data(s)));
        selected.sort();
        selected.dedup();
        selected
    }
}

enum Consumers {
    Each(Vec<SubscriptionHandle>),
    Merged(MergedView),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config =
        RealtimeConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(url) = &args.url {
        config.url = url.clone();
        config.validate().context("invalid --url")?;
    }

    init_logging(args.log_level(&config.log_level), config.log_format());

    let client = RealtimeClient::from_config(&config);
    let selected = args.selected_channels();
    tracing::info!(
        url = %config.url,
        channels = selected.len(),
        merged = args.merged,
        "Starting Vantage monitor"
    );

    let consumers = if args.merged {
        let view = MergedView::new(&client, selected.iter());
        let mut revisions = view.watch();
        let followed = view.channels();
        tokio::spawn(async move {
            while revisions.changed().await.is_ok() {
                let revision = *revisions.borrow_and_update();
                tracing::info!(revision, channels = followed.len(), "Merged view updated");
            }
        });
        Consumers::Merged(view)
    } else {
        Consumers::Each(
            selected
                .iter()
                .map(|channel| {
                    client.subscribe(channel, |envelope| {
                        tracing::info!(
                            channel = %envelope.channel,
                            timestamp = envelope.timestamp_f64(),
                            data = %envelope.data,
                            "Envelope"
                        );
                    })
                })
                .collect(),
        )
    };

    let mut status = client.watch_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let state: ConnectionState = *status.borrow_and_update();
            tracing::info!(state = %state, "Connection status");
        }
    });

    client.connect(&config.url);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    tracing::info!(stats = ?client.stats(), "Shutting down");
    match consumers {
        Consumers::Each(handles) => handles.iter().for_each(SubscriptionHandle::unsubscribe),
        Consumers::Merged(view) => drop(view),
    }
    client.disconnect();

    Ok(())
}
