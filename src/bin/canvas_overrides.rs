use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use canvas_watch::config;
use canvas_watch::store::OverrideStore;

#[derive(Debug, Parser)]
#[command(author, version, about = "Edit dismissed assignments and custom names on disk")]
struct Args {
    /// Path to YAML config file (only `app.data_dir` is used)
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print all stored overrides
    List,
    /// Hide an assignment from the panel
    Dismiss { id: String },
    /// Show a dismissed assignment again
    Restore { id: String },
    /// Set a custom display name; omit NAME to reset to the default
    Rename { id: String, name: Option<String> },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;
    let mut store = OverrideStore::open(&cfg.app.data_dir);

    match args.command {
        Command::List => {
            let map = store.map();
            println!("Dismissed:");
            for id in map.dismissed_ids() {
                println!("  {}", id);
            }
            println!("Custom names:");
            for (id, name) in map.custom_names() {
                println!("  {} -> {}", id, name);
            }
        }
        Command::Dismiss { id } => {
            let changed = store.set_dismissed(&id, true)?;
            println!("{} {}", if changed { "dismissed" } else { "already dismissed" }, id);
        }
        Command::Restore { id } => {
            let changed = store.set_dismissed(&id, false)?;
            println!("{} {}", if changed { "restored" } else { "not dismissed" }, id);
        }
        Command::Rename { id, name } => {
            store.set_custom_name(&id, name.as_deref())?;
            match store.map().custom_name(&id) {
                Some(name) => println!("{} -> {}", id, name),
                None => println!("{} reset to default name", id),
            }
        }
    }
    Ok(())
}
