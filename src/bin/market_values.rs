use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Utc};

use superliga_sync::config::{MarketValuesConfig, parse_db_path_arg, parse_flag};
use superliga_sync::http_client::http_client_with_timeout;
use superliga_sync::logging::init_logging;
use superliga_sync::market_values::{
    ScrapeSummary, WebHtmlFetcher, scrape_all_values, scrape_values,
};
use superliga_sync::store::TableStore;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut config = MarketValuesConfig::from_env().context("load configuration")?;
    if let Some(db_path) = parse_db_path_arg(&args) {
        config.db_path = db_path;
    }

    let client = http_client_with_timeout(config.request_timeout_secs)?;
    let fetcher = WebHtmlFetcher::new(client);

    let summary = match parse_flag(&args, "--year") {
        Some(raw) => {
            let year = raw
                .parse::<i32>()
                .map_err(|_| anyhow!("invalid --year value `{raw}`"))?;
            let values = scrape_values(&fetcher, year)?;
            ScrapeSummary {
                values,
                years_total: 1,
                years_succeeded: 1,
                errors: Vec::new(),
            }
        }
        None => scrape_all_values(&fetcher, Utc::now().year(), config.first_year),
    };

    let mut store = TableStore::open(&config.db_path)
        .with_context(|| format!("open sqlite db {}", config.db_path.display()))?;
    let inserted = store
        .upsert_ignore(&summary.values)
        .context("store market values")?;

    println!("Market value scrape complete");
    println!("DB: {}", config.db_path.display());
    println!("Years: {}/{}", summary.years_succeeded, summary.years_total);
    println!(
        "Rows parsed: {} (new: {})",
        summary.values.len(),
        inserted
    );
    if !summary.errors.is_empty() {
        println!("Errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(8) {
            println!(" - {err}");
        }
    }
    Ok(())
}
