use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use canvas_watch::canvas::CanvasClient;
use canvas_watch::config::{self, NotifierKind};
use canvas_watch::notify::{CommandNotifier, LogNotifier, NotifierSink};
use canvas_watch::store::OverrideStore;
use canvas_watch::{Engine, EngineSettings};

#[derive(Debug, Parser)]
#[command(author, version, about = "Track upcoming Canvas deadlines and send reminders")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let source = CanvasClient::from_config(&cfg).context("failed to build Canvas client")?;
    let sink: Arc<dyn NotifierSink> = match cfg.app.notifier {
        NotifierKind::Log => Arc::new(LogNotifier),
        NotifierKind::Command => {
            let notifier = CommandNotifier::default();
            if let Err(err) = notifier.ensure_available().await {
                warn!(%err, "desktop notifier unavailable; reminders will be retried each scan");
            }
            Arc::new(notifier)
        }
    };
    let store = OverrideStore::open(&cfg.app.data_dir);

    let engine = Engine::new(EngineSettings::from(&cfg), Arc::new(source), sink, store);
    engine.start().await?;

    // Stand-in for a panel: log the label whenever it changes.
    let mut ticker =
        tokio::time::interval(cfg.rotation_interval().min(std::time::Duration::from_secs(5)));
    let mut last_label = String::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl-C, shutting down");
                break;
            }
            _ = ticker.tick() => {
                let label = engine.panel_text(Utc::now()).await;
                if label != last_label {
                    info!(%label, "panel");
                    last_label = label;
                }
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}
