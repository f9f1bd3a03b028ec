//! CLI subcommand handlers.

use crate::{CacheAction, Commands};
use litreview_core::ResponseCache;
use litreview_core::config::ReviewConfig;
use std::time::Duration;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, config: &ReviewConfig) -> anyhow::Result<()> {
    match command {
        Commands::Cache { action } => handle_cache(action, config),
    }
}

fn handle_cache(action: CacheAction, config: &ReviewConfig) -> anyhow::Result<()> {
    // Maintenance works on the configured directory even when caching is disabled.
    let cache = ResponseCache::new(
        config.cache.dir.clone(),
        Duration::from_secs(config.cache.ttl_hours * 3600),
    );

    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            if stats.namespaces.is_empty() {
                println!("Cache at {} is empty.", cache.root().display());
                return Ok(());
            }
            println!("Cache: {}", cache.root().display());
            println!("{:<16} {:>8} {:>8} {:>12}", "namespace", "entries", "expired", "bytes");
            for (name, ns) in &stats.namespaces {
                println!(
                    "{:<16} {:>8} {:>8} {:>12}",
                    name, ns.entries, ns.expired, ns.bytes
                );
            }
            println!(
                "{:<16} {:>8} {:>8} {:>12}",
                "total",
                stats.total_entries(),
                "",
                stats.total_bytes()
            );
            Ok(())
        }
        CacheAction::Clear { namespace } => {
            let removed = cache.clear(namespace.as_deref())?;
            match namespace {
                Some(ns) => println!("Removed {} entries from '{}'.", removed, ns),
                None => println!("Removed {} cache entries.", removed),
            }
            Ok(())
        }
    }
}
