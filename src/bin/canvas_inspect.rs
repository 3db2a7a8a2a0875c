use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use canvas_watch::canvas::CanvasClient;
use canvas_watch::config;
use canvas_watch::display;
use canvas_watch::notify::LogNotifier;
use canvas_watch::store::OverrideStore;
use canvas_watch::{Engine, EngineSettings};

#[derive(Parser, Debug)]
#[command(about = "Fetch assignments once and print the active and dismissed lists")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override the look-ahead window in days
    #[arg(long)]
    days: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let mut settings = EngineSettings::from(&cfg);
    if let Some(days) = args.days {
        settings.horizon_days = days;
    }

    let client = CanvasClient::from_config(&cfg)?;
    let store = OverrideStore::open(&cfg.app.data_dir);
    let engine = Engine::new(settings, Arc::new(client), Arc::new(LogNotifier), store);

    let now = Utc::now();
    let count = engine
        .refresh_at(now)
        .await
        .context("failed to fetch assignments")?;
    let snapshot = engine.snapshot().await;

    println!("{} assignment(s) in window", count);
    println!("Active:");
    if snapshot.active.is_empty() {
        println!("  (none)");
    }
    for (a, name) in &snapshot.active {
        println!(
            "  [{}] {} | due {} | {}",
            a.id,
            name,
            display::format_due(&a.due_at.with_timezone(&Local)),
            a.url
        );
    }
    if !snapshot.dismissed.is_empty() {
        println!("Dismissed:");
        for (a, name) in &snapshot.dismissed {
            println!(
                "  [{}] {} | due {}",
                a.id,
                name,
                display::format_due(&a.due_at.with_timezone(&Local))
            );
        }
    }
    println!("Panel: {}", engine.panel_text(now).await);
    Ok(())
}
