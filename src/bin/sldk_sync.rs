use std::process::ExitCode;

use anyhow::{Context, Result};

use superliga_sync::api::ApiClient;
use superliga_sync::config::{SyncConfig, parse_db_path_arg};
use superliga_sync::http_cache::{CachedApi, DiskCache};
use superliga_sync::http_client::http_client_with_timeout;
use superliga_sync::logging::init_logging;
use superliga_sync::store::TableStore;
use superliga_sync::sync::{SeasonSkipMode, SyncSummary, sync_all};

const EXIT_PARTIAL: u8 = 2;

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_logging();

    match run() {
        Ok(summary) if summary.is_complete() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_PARTIAL),
        Err(err) => {
            eprintln!("sync failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<SyncSummary> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut config = SyncConfig::from_env().context("load configuration")?;
    if let Some(db_path) = parse_db_path_arg(&args) {
        config.db_path = db_path;
    }
    if args.iter().any(|arg| arg == "--resync") {
        config.sync.skip_mode = SeasonSkipMode::Never;
    }

    let client = http_client_with_timeout(config.request_timeout_secs)?;
    let cache = DiskCache::open(&config.cache_path, config.cache_policy)
        .with_context(|| format!("open response cache {}", config.cache_path.display()))?;
    let api = CachedApi::new(ApiClient::new(client, config.api.clone()), cache);
    let mut store = TableStore::open(&config.db_path)
        .with_context(|| format!("open sqlite db {}", config.db_path.display()))?;

    let summary = sync_all(&api, &mut store, config.sync).context("sync seasons")?;
    let cached = api.cache().len().context("count cached responses")?;

    println!("Sync complete");
    println!("DB: {}", config.db_path.display());
    println!(
        "Cache: {} ({} entries, {:?})",
        config.cache_path.display(),
        cached,
        api.cache().policy()
    );
    println!(
        "Seasons: {} total, {} new, {} synced, {} skipped, {} failed",
        summary.seasons_total,
        summary.seasons_inserted,
        summary.seasons_synced,
        summary.seasons_skipped,
        summary.seasons_failed
    );
    println!(
        "Matches upserted: {} ({} finished processed)",
        summary.matches_upserted, summary.matches_finished
    );
    println!(
        "Rows: stats={} xg={} momentum={}",
        summary.stat_rows, summary.xg_rows, summary.momentum_rows
    );
    if !summary.errors.is_empty() {
        println!("Errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(8) {
            println!(" - {err}");
        }
    }

    Ok(summary)
}
