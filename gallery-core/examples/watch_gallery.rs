//! Watch a directory and print the gallery as it changes
//!
//! cargo run -p gallery-core --example watch_gallery -- ~/Pictures/captures -v

use anyhow::Result;
use clap::Parser;
use gallery_core::{GalleryConfig, GalleryEvent, GalleryState, WatcherHub};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "watch_gallery", about = "Print a live media gallery for a directory")]
struct Args {
    /// Directory to watch
    directory: PathBuf,

    /// Quiet period before a burst of changes triggers a rescan
    #[arg(long, default_value_t = 100)]
    debounce_ms: u64,

    /// Skip reading video container headers
    #[arg(long)]
    no_durations: bool,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn print_state(state: &GalleryState) {
    let now = chrono::Utc::now();
    println!("-- generation {} ({} items)", state.generation(), state.len());
    for entry in state.iter() {
        println!(
            "  {:<40} {:>9}  {} ago",
            entry.file_name().unwrap_or("?"),
            entry.duration_label().unwrap_or_default(),
            entry.age_label(now)
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = GalleryConfig {
        debounce_ms: args.debounce_ms,
        probe_durations: !args.no_durations,
        ..Default::default()
    };
    let hub = WatcherHub::new(config);
    let controller = hub.controller(&args.directory);
    let mut events = controller.subscribe();

    if let Err(e) = controller.start().await {
        warn!("Continuing without live updates: {}", e);
    }
    print_state(&controller.state());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(GalleryEvent::Refreshed { .. }) => print_state(&controller.state()),
                Ok(other) => info!("{:?}", other),
                Err(e) => warn!("Event stream interrupted: {}", e),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.destroy();
    hub.release(&args.directory);
    Ok(())
}
