use std::fs;
use std::path::PathBuf;

use superliga_sync::error::ScrapeError;
use superliga_sync::market_values::{
    HtmlFetcher, parse_market_values_html, scrape_all_values, season_url,
};
use superliga_sync::store::{Table, TableStore};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

/// Serves the fixture page for 2021 and fails every other year.
struct FixtureFetcher {
    page: String,
}

impl HtmlFetcher for FixtureFetcher {
    fn fetch_html(&self, url: &str) -> Result<String, ScrapeError> {
        if url == season_url(2021) {
            Ok(self.page.clone())
        } else {
            Err(ScrapeError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }
}

#[test]
fn parses_transfermarkt_fixture() {
    let values = parse_market_values_html(&read_fixture("transfermarkt_2021.html"), 2021)
        .expect("fixture should parse");
    assert_eq!(values.len(), 3);

    let teams = values.iter().map(|v| v.team.as_str()).collect::<Vec<_>>();
    assert_eq!(teams, vec!["FC København", "Randers FC", "AGF"]);

    let randers = &values[1];
    assert_eq!(randers.num_players, 27);
    assert!((randers.mean_age - 25.8).abs() < 1e-9);
    assert!((randers.mean_value - 650_000.0).abs() < 1e-6);
    assert!((randers.total_value - 17_550_000.0).abs() < 1e-3);
    assert!(values.iter().all(|v| v.season == "2021/2022"));
}

#[test]
fn scraped_years_land_in_the_store_once() {
    let fetcher = FixtureFetcher {
        page: read_fixture("transfermarkt_2021.html"),
    };
    let summary = scrape_all_values(&fetcher, 2022, 2020);
    assert_eq!(summary.years_total, 3);
    assert_eq!(summary.years_succeeded, 1);
    assert_eq!(summary.errors.len(), 2);

    let mut store = TableStore::open_in_memory().unwrap();
    assert_eq!(store.upsert_ignore(&summary.values).unwrap(), 3);
    assert_eq!(store.upsert_ignore(&summary.values).unwrap(), 0);
    assert_eq!(store.count(Table::MarketValues).unwrap(), 3);
}
