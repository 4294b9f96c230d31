use std::fmt;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::RemoteError;

pub const DEFAULT_BASE_URL: &str = "https://api.superliga.dk/";
pub const DEFAULT_ENV: &str = "production";
pub const DEFAULT_LOCALE: &str = "da";

// 46 is the football sport id on the tournaments endpoint.
const FOOTBALL_TOURNAMENT_PATH: &str = "tournaments/46";
const APP_NAME: &str = "superligadk";
const LIVECENTER_APP_NAME: &str = "dk.releaze.livecenter.spdk";

/// One remote call, with the arguments that make it unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Seasons,
    Matches { season_id: i64 },
    MatchStats { event_id: i64 },
    XgTime { event_id: i64 },
    Momentum { event_id: i64 },
}

impl Endpoint {
    pub fn call_name(&self) -> &'static str {
        match self {
            Endpoint::Seasons => "seasons",
            Endpoint::Matches { .. } => "matches",
            Endpoint::MatchStats { .. } => "match_stats",
            Endpoint::XgTime { .. } => "xg_time",
            Endpoint::Momentum { .. } => "momentum",
        }
    }

    pub fn args(&self) -> Vec<i64> {
        match self {
            Endpoint::Seasons => Vec::new(),
            Endpoint::Matches { season_id } => vec![*season_id],
            Endpoint::MatchStats { event_id }
            | Endpoint::XgTime { event_id }
            | Endpoint::Momentum { event_id } => vec![*event_id],
        }
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::Seasons => FOOTBALL_TOURNAMENT_PATH.to_string(),
            Endpoint::Matches { .. } => "events-v2".to_string(),
            Endpoint::MatchStats { event_id } => format!("opta-stats/events/{event_id}/teams"),
            Endpoint::XgTime { event_id } => {
                format!("opta-stats/event/{event_id}/detail-expected-goals")
            }
            Endpoint::Momentum { event_id } => format!("opta-stats/events/{event_id}/momentum"),
        }
    }

    pub fn app_name(&self) -> &'static str {
        match self {
            Endpoint::Matches { .. } => LIVECENTER_APP_NAME,
            _ => APP_NAME,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self
            .args()
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}({})", self.call_name(), args)
    }
}

/// Anything that can answer an [`Endpoint`] with parsed JSON.
pub trait SportsApi {
    fn fetch(&self, endpoint: &Endpoint) -> Result<Value, RemoteError>;
}

impl<T: SportsApi + ?Sized> SportsApi for &T {
    fn fetch(&self, endpoint: &Endpoint) -> Result<Value, RemoteError> {
        (**self).fetch(endpoint)
    }
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub access_token: String,
    pub env: String,
    pub locale: String,
}

impl ApiSettings {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            env: DEFAULT_ENV.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

pub struct ApiClient {
    client: Client,
    settings: ApiSettings,
}

impl ApiClient {
    pub fn new(client: &Client, settings: ApiSettings) -> Self {
        Self {
            client: client.clone(),
            settings,
        }
    }

    pub fn endpoint_url(&self, endpoint: &Endpoint) -> String {
        format!(
            "{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            endpoint.path()
        )
    }

    pub fn query_params(&self, endpoint: &Endpoint) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("appName", endpoint.app_name().to_string()),
            ("access_token", self.settings.access_token.clone()),
            ("env", self.settings.env.clone()),
            ("locale", self.settings.locale.clone()),
        ];
        if let Endpoint::Matches { season_id } = endpoint {
            params.push(("seasonId", season_id.to_string()));
        }
        params
    }
}

impl SportsApi for ApiClient {
    fn fetch(&self, endpoint: &Endpoint) -> Result<Value, RemoteError> {
        let call = endpoint.to_string();
        debug!(%call, "requesting");
        let resp = self
            .client
            .get(self.endpoint_url(endpoint))
            .query(&self.query_params(endpoint))
            .send()
            .map_err(|source| RemoteError::Transport {
                call: call.clone(),
                source,
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(RemoteError::Status {
                call,
                status: status.as_u16(),
            });
        }

        let body = resp.text().map_err(|source| RemoteError::Transport {
            call: call.clone(),
            source,
        })?;
        serde_json::from_str::<Value>(body.trim())
            .map_err(|source| RemoteError::InvalidBody { call, source })
    }
}
