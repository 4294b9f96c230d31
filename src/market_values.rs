//! Squad market values scraped from the transfermarkt league overview.
//!
//! Best effort: each table row's text is matched against one fixed pattern
//! and rows that do not match are skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::error::ScrapeError;

pub const TRANSFERMARKT_SEASON_URL: &str =
    "https://www.transfermarkt.com/superligaen/startseite/wettbewerb/DK1/plus/?saison_id=";
pub const DEFAULT_FIRST_YEAR: i32 = 2002;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_10_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/39.0.2171.95 Safari/537.36";
const ROW_SELECTOR: &str = "div > table > tbody > tr";

// team name (at most one separator), squad size (two digits), mean age,
// then mean and total value after a euro sign with a k/m suffix.
static ROW_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-zA-Zøæåö]*?.[\[a-zA-Zøæåö]+).??(\d\d)(\d+\.*\d+)€(\d+\.*\d*.)€(\d+\.*\d*.)")
        .expect("market value row pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub struct MarketValue {
    pub team: String,
    pub num_players: i64,
    pub mean_age: f64,
    pub mean_value: f64,
    pub total_value: f64,
    pub season: String,
}

/// The five tokens captured from one table row, before conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub team: String,
    pub num_players: String,
    pub mean_age: String,
    pub mean_value: String,
    pub total_value: String,
}

pub trait HtmlFetcher {
    fn fetch_html(&self, url: &str) -> Result<String, ScrapeError>;
}

pub struct WebHtmlFetcher {
    client: Client,
}

impl WebHtmlFetcher {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.clone(),
        }
    }
}

impl HtmlFetcher for WebHtmlFetcher {
    fn fetch_html(&self, url: &str) -> Result<String, ScrapeError> {
        let request_err = |source| ScrapeError::Request {
            url: url.to_string(),
            source,
        };
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .map_err(request_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().map_err(request_err)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrapeSummary {
    pub values: Vec<MarketValue>,
    pub years_total: usize,
    pub years_succeeded: usize,
    pub errors: Vec<String>,
}

pub fn season_url(year: i32) -> String {
    format!("{TRANSFERMARKT_SEASON_URL}{year}")
}

pub fn season_label(year: i32) -> String {
    format!("{}/{}", year, year + 1)
}

pub fn scrape_values<F: HtmlFetcher>(
    fetcher: &F,
    year: i32,
) -> Result<Vec<MarketValue>, ScrapeError> {
    let html = fetcher.fetch_html(&season_url(year))?;
    let values = parse_market_values_html(&html, year)?;
    if values.is_empty() {
        warn!(year, "no market values parsed");
    } else {
        info!(year, teams = values.len(), "market values parsed");
    }
    Ok(values)
}

/// Scrapes every season from `current_year` down to `first_year`. A failing
/// year is recorded and skipped.
pub fn scrape_all_values<F: HtmlFetcher>(
    fetcher: &F,
    current_year: i32,
    first_year: i32,
) -> ScrapeSummary {
    let mut summary = ScrapeSummary::default();
    for year in (first_year..=current_year).rev() {
        summary.years_total += 1;
        match scrape_values(fetcher, year) {
            Ok(values) => {
                summary.years_succeeded += 1;
                summary.values.extend(values);
            }
            Err(err) => {
                warn!(year, error = %err, "market value scrape failed");
                summary.errors.push(format!("year {year}: {err}"));
            }
        }
    }
    summary
}

pub fn parse_market_values_html(html: &str, year: i32) -> Result<Vec<MarketValue>, ScrapeError> {
    let document = Html::parse_document(html);
    let rows = Selector::parse(ROW_SELECTOR)
        .map_err(|_| ScrapeError::Selector(ROW_SELECTOR.to_string()))?;

    let mut out = Vec::new();
    for row in document.select(&rows) {
        let text = row.text().collect::<String>();
        let Some(raw) = parse_row_text(&text) else {
            continue;
        };
        match to_market_value(&raw, year) {
            Some(value) => out.push(value),
            None => debug!(year, row = ?raw, "unconvertible market value row skipped"),
        }
    }
    Ok(out)
}

pub fn parse_row_text(text: &str) -> Option<RawRow> {
    let text = text.replace(['\n', '\t'], "");
    let caps = ROW_PATTERN.captures(&text)?;
    Some(RawRow {
        team: caps[1].to_string(),
        num_players: caps[2].to_string(),
        mean_age: caps[3].to_string(),
        mean_value: caps[4].to_string(),
        total_value: caps[5].to_string(),
    })
}

pub fn to_market_value(raw: &RawRow, year: i32) -> Option<MarketValue> {
    Some(MarketValue {
        team: fix_team_name(&raw.team),
        num_players: raw.num_players.parse().ok()?,
        mean_age: raw.mean_age.parse().ok()?,
        mean_value: convert_to_number(&raw.mean_value)?,
        total_value: convert_to_number(&raw.total_value)?,
        season: season_label(year),
    })
}

/// `"1.2m"` → 1 200 000, `"500k"` → 500 000, bare numbers unchanged.
pub fn convert_to_number(token: &str) -> Option<f64> {
    let token = token.trim();
    let digits = token.trim_end_matches(['k', 'm']);
    let multiplier = match &token[digits.len()..] {
        "" => 1.0,
        "k" => 1e3,
        "m" => 1e6,
        _ => return None,
    };
    let value = digits.parse::<f64>().ok()?;
    Some(value * multiplier)
}

/// Row text often repeats the club name; keep the first two words, or one
/// word when both are the same.
pub fn fix_team_name(raw: &str) -> String {
    let name = raw.replace('ö', "ø");
    if !name.contains(' ') {
        return name;
    }
    let words = name.split_whitespace().collect::<Vec<_>>();
    match words.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [first, second, ..] if first == second => (*first).to_string(),
        [first, second, ..] => format!("{first} {second}"),
    }
}
