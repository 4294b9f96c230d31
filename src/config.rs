use std::env;
use std::path::PathBuf;

use crate::api::{ApiSettings, DEFAULT_BASE_URL, DEFAULT_ENV, DEFAULT_LOCALE};
use crate::error::ConfigError;
use crate::http_cache::{CachePolicy, app_cache_dir, default_cache_path};
use crate::http_client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::market_values::DEFAULT_FIRST_YEAR;
use crate::sync::{DEFAULT_PROGRESS_EVERY, SeasonSkipMode, SyncOptions};

const DB_FILE: &str = "superliga.sqlite";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api: ApiSettings,
    pub db_path: PathBuf,
    pub cache_path: PathBuf,
    pub cache_policy: CachePolicy,
    pub sync: SyncOptions,
    pub request_timeout_secs: u64,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token =
            opt_env("SLDK_ACCESS_TOKEN").ok_or(ConfigError::Missing("SLDK_ACCESS_TOKEN"))?;
        let api = ApiSettings {
            base_url: opt_env("SLDK_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            access_token,
            env: opt_env("SLDK_ENV").unwrap_or_else(|| DEFAULT_ENV.to_string()),
            locale: opt_env("SLDK_LOCALE").unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        };

        let db_path = db_path_from_env()?;
        let cache_path = match opt_env("SLDK_CACHE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_cache_path().ok_or(ConfigError::NoCacheDir)?,
        };

        let cache_policy = if env_bool("SLDK_CACHE_FAILURES", false) {
            CachePolicy::Everything
        } else {
            CachePolicy::SuccessOnly
        };
        let skip_mode = if env_bool("SLDK_SKIP_SYNCED_SEASONS", true) {
            SeasonSkipMode::AnyMatch
        } else {
            SeasonSkipMode::Never
        };
        let progress_every = env_parse("SLDK_PROGRESS_EVERY", DEFAULT_PROGRESS_EVERY)?.max(1);

        Ok(Self {
            api,
            db_path,
            cache_path,
            cache_policy,
            sync: SyncOptions {
                skip_mode,
                progress_every,
            },
            request_timeout_secs: env_parse(
                "SLDK_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
        })
    }
}

/// Settings for the market value scraper, which needs no API credentials.
#[derive(Debug, Clone)]
pub struct MarketValuesConfig {
    pub db_path: PathBuf,
    pub first_year: i32,
    pub request_timeout_secs: u64,
}

impl MarketValuesConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            db_path: db_path_from_env()?,
            first_year: env_parse("MARKET_VALUES_FIRST_YEAR", DEFAULT_FIRST_YEAR)?,
            request_timeout_secs: env_parse(
                "SLDK_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
        })
    }
}

fn db_path_from_env() -> Result<PathBuf, ConfigError> {
    match opt_env("SLDK_DB_PATH") {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(app_cache_dir().ok_or(ConfigError::NoCacheDir)?.join(DB_FILE)),
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match opt_env(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

/// `--db <path>` or `--db=<path>` from the command line.
pub fn parse_db_path_arg(args: &[String]) -> Option<PathBuf> {
    parse_flag(args, "--db").map(PathBuf::from)
}

pub fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}
