//! Flattens the nested API payloads into fixed-shape records.
//!
//! Every function here is deterministic. A payload missing one of its top-level keys
//! yields a [`NormalizationError`]; a malformed element inside an otherwise
//! valid payload is dropped and logged instead.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::NormalizationError;

pub const POSSESSION_SUFFIX: &str = "PossessionValue";
pub const MINUTES_WITH_MOMENTUM_SUFFIX: &str = "MinutesWithMomentum";
pub const SPECTATORS_VARIABLE: &str = "spectators";

// Columns that identify a stats row rather than hold a statistic.
const STAT_INDEX_COLUMNS: [&str; 2] = ["eventId", "teamId"];

#[derive(Debug, Clone, PartialEq)]
pub struct Season {
    pub id: i64,
    pub year: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStatus {
    Scheduled,
    Finished,
    Other(String),
}

impl MatchStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scheduled" => MatchStatus::Scheduled,
            "finished" => MatchStatus::Finished,
            _ => MatchStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Finished => "finished",
            MatchStatus::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Season the match list was requested for.
    pub season_id: i64,
    pub tournament_id: Option<i64>,
    pub event_id: i64,
    pub round_nr: Option<i64>,
    pub home_id: Option<i64>,
    pub away_id: Option<i64>,
    pub home_name: Option<String>,
    pub away_name: Option<String>,
    pub detailed_score: Option<String>,
    pub stoppage_time_ht: Option<i64>,
    pub stoppage_time_ft: Option<i64>,
    pub has_opta: Option<bool>,
    pub has_opta_momentum: Option<bool>,
    pub status_type: Option<MatchStatus>,
}

impl Match {
    pub fn is_finished(&self) -> bool {
        self.status_type == Some(MatchStatus::Finished)
    }

    /// Absent flag counts as "no Opta data".
    pub fn has_opta_stats(&self) -> bool {
        self.has_opta.unwrap_or(false)
    }

    pub fn has_momentum(&self) -> bool {
        self.has_opta_momentum.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchStat {
    pub event_id: i64,
    pub team_id: i64,
    pub variable: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchXgEvent {
    pub event_id: i64,
    pub team_id: i64,
    pub min: Option<i64>,
    pub sec: Option<i64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub period_id: Option<i64>,
    pub expected_goals_value: Option<f64>,
    pub situation: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchMomentum {
    pub event_id: i64,
    pub minute: Option<f64>,
    pub end_record_min: Option<f64>,
    pub momentum_value: Option<f64>,
    pub home_possession_value: Option<f64>,
    pub away_possession_value: Option<f64>,
    pub home_minutes_with_momentum: Option<f64>,
    pub away_minutes_with_momentum: Option<f64>,
}

pub fn normalize_seasons(json: &Value) -> Result<Vec<Season>, NormalizationError> {
    const CONTEXT: &str = "seasons";
    let root = root_object(json, CONTEXT)?;
    if let Some(current) = root.get("seasonId").and_then(as_text_any) {
        info!(current_season = %current, "seasons downloaded");
    }
    let seasons = require_array(root, CONTEXT, "seasons")?;

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(seasons.len());
    for item in seasons {
        let Some(id) = item.get("id").and_then(as_i64_any) else {
            warn!(season = %item, "season without id dropped");
            continue;
        };
        if !seen.insert(id) {
            debug!(season_id = id, "duplicate season id dropped");
            continue;
        }
        out.push(Season {
            id,
            year: item.get("year").and_then(as_text_any),
        });
    }
    Ok(out)
}

pub fn normalize_matches(json: &Value, season_id: i64) -> Result<Vec<Match>, NormalizationError> {
    const CONTEXT: &str = "matches";
    let root = root_object(json, CONTEXT)?;
    let events = require_array(root, CONTEXT, "events")?;

    let mut out = Vec::with_capacity(events.len());
    for event in events {
        let Some(ev) = event.as_object() else {
            warn!(season_id, "non-object event dropped");
            continue;
        };
        let Some(event_id) = ev.get("eventId").and_then(as_i64_any) else {
            warn!(season_id, "event without eventId dropped");
            continue;
        };
        out.push(Match {
            season_id,
            tournament_id: ev.get("tournamentId").and_then(as_i64_any),
            event_id,
            round_nr: ev.get("roundNr").and_then(as_i64_any),
            home_id: ev.get("homeId").and_then(as_i64_any),
            away_id: ev.get("awayId").and_then(as_i64_any),
            home_name: ev.get("homeName").and_then(as_text_any),
            away_name: ev.get("awayName").and_then(as_text_any),
            detailed_score: ev.get("detailedScore").and_then(as_text_any),
            stoppage_time_ht: ev.get("stoppageTimeHT").and_then(as_i64_any),
            stoppage_time_ft: ev.get("stoppageTimeFT").and_then(as_i64_any),
            has_opta: ev.get("hasOpta").and_then(as_bool_any),
            has_opta_momentum: ev.get("hasOptaMomentum").and_then(as_bool_any),
            status_type: ev
                .get("statusType")
                .and_then(|v| v.as_str())
                .map(MatchStatus::parse),
        });
    }
    Ok(out)
}

/// Pivots `homeStats` / `awayStats` from one-column-per-statistic into one
/// row per (team, statistic). The two teams' key sets are independent.
pub fn normalize_match_stats(
    json: &Value,
    event_id: i64,
) -> Result<Vec<MatchStat>, NormalizationError> {
    const CONTEXT: &str = "match stats";
    let root = root_object(json, CONTEXT)?;
    let home_id = require_id(root, CONTEXT, "homeId")?;
    let away_id = require_id(root, CONTEXT, "awayId")?;
    let home_stats = require_object(root, CONTEXT, "homeStats")?;
    let away_stats = require_object(root, CONTEXT, "awayStats")?;
    let spectators = root.get(SPECTATORS_VARIABLE).and_then(as_f64_any);

    let mut out = Vec::with_capacity(home_stats.len() + away_stats.len() + 2);
    for (team_id, stats) in [(home_id, home_stats), (away_id, away_stats)] {
        for (variable, raw) in stats {
            if STAT_INDEX_COLUMNS.contains(&variable.as_str()) {
                continue;
            }
            // The match-level spectator count overrides a per-team one.
            if spectators.is_some() && variable == SPECTATORS_VARIABLE {
                continue;
            }
            let Some(value) = as_f64_any(raw) else {
                debug!(event_id, team_id, %variable, "non-numeric stat skipped");
                continue;
            };
            out.push(MatchStat {
                event_id,
                team_id,
                variable: variable.clone(),
                value,
            });
        }
        if let Some(value) = spectators {
            out.push(MatchStat {
                event_id,
                team_id,
                variable: SPECTATORS_VARIABLE.to_string(),
                value,
            });
        }
    }
    Ok(out)
}

pub fn normalize_xg(json: &Value, event_id: i64) -> Result<Vec<MatchXgEvent>, NormalizationError> {
    const CONTEXT: &str = "expected goals";
    let root = root_object(json, CONTEXT)?;
    let home_id = require_id(root, CONTEXT, "homeId")?;
    let away_id = require_id(root, CONTEXT, "awayId")?;
    let data = require_object(root, CONTEXT, "expectedGoalsData")?;
    let home = require_array(data, CONTEXT, "home")?;
    let away = require_array(data, CONTEXT, "away")?;

    let mut out = Vec::with_capacity(home.len() + away.len());
    for (team_id, shots) in [(home_id, home), (away_id, away)] {
        for shot in shots {
            let Some(shot) = shot.as_object() else {
                debug!(event_id, team_id, "non-object shot skipped");
                continue;
            };
            out.push(MatchXgEvent {
                event_id,
                team_id,
                min: shot.get("min").and_then(as_i64_any),
                sec: shot.get("sec").and_then(as_i64_any),
                x: shot.get("x").and_then(as_f64_any),
                y: shot.get("y").and_then(as_f64_any),
                period_id: shot.get("period_id").and_then(as_i64_any),
                expected_goals_value: shot.get("expectedGoalsValue").and_then(as_f64_any),
                situation: shot.get("situation").and_then(as_text_any),
                kind: shot.get("type").and_then(as_text_any),
            });
        }
    }
    Ok(out)
}

pub fn normalize_momentum(
    json: &Value,
    event_id: i64,
) -> Result<Vec<MatchMomentum>, NormalizationError> {
    const CONTEXT: &str = "momentum";
    let root = root_object(json, CONTEXT)?;
    let buckets = require_array(root, CONTEXT, "momentum")?;

    let mut out = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        let Some(bucket) = bucket.as_object() else {
            debug!(event_id, "non-object momentum bucket skipped");
            continue;
        };
        let mut columns = flatten_with_suffix(bucket.get("scores"), POSSESSION_SUFFIX);
        columns.extend(flatten_with_suffix(
            bucket.get("minutesWithMomentum"),
            MINUTES_WITH_MOMENTUM_SUFFIX,
        ));
        let column = |name: String| columns.get(&name).and_then(as_f64_any);

        out.push(MatchMomentum {
            event_id,
            minute: bucket.get("minute").and_then(as_f64_any),
            end_record_min: bucket.get("endRecordMin").and_then(as_f64_any),
            momentum_value: bucket.get("momentumValue").and_then(as_f64_any),
            home_possession_value: column(format!("home{POSSESSION_SUFFIX}")),
            away_possession_value: column(format!("away{POSSESSION_SUFFIX}")),
            home_minutes_with_momentum: column(format!("home{MINUTES_WITH_MOMENTUM_SUFFIX}")),
            away_minutes_with_momentum: column(format!("away{MINUTES_WITH_MOMENTUM_SUFFIX}")),
        });
    }
    Ok(out)
}

/// Lifts the keys of a nested object to top-level column names by appending
/// `suffix`: `{home: 1}` + `"X"` becomes `homeX`. Anything but an object
/// contributes no columns.
pub fn flatten_with_suffix(nested: Option<&Value>, suffix: &str) -> BTreeMap<String, Value> {
    nested
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (format!("{k}{suffix}"), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn root_object<'a>(
    json: &'a Value,
    context: &'static str,
) -> Result<&'a Map<String, Value>, NormalizationError> {
    json.as_object()
        .ok_or(NormalizationError::UnexpectedShape {
            context,
            key: "$",
            expected: "object",
        })
}

fn require<'a>(
    obj: &'a Map<String, Value>,
    context: &'static str,
    key: &'static str,
) -> Result<&'a Value, NormalizationError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(NormalizationError::MissingKey { context, key }),
        Some(v) => Ok(v),
    }
}

fn require_array<'a>(
    obj: &'a Map<String, Value>,
    context: &'static str,
    key: &'static str,
) -> Result<&'a Vec<Value>, NormalizationError> {
    require(obj, context, key)?
        .as_array()
        .ok_or(NormalizationError::UnexpectedShape {
            context,
            key,
            expected: "array",
        })
}

fn require_object<'a>(
    obj: &'a Map<String, Value>,
    context: &'static str,
    key: &'static str,
) -> Result<&'a Map<String, Value>, NormalizationError> {
    require(obj, context, key)?
        .as_object()
        .ok_or(NormalizationError::UnexpectedShape {
            context,
            key,
            expected: "object",
        })
}

fn require_id(
    obj: &Map<String, Value>,
    context: &'static str,
    key: &'static str,
) -> Result<i64, NormalizationError> {
    as_i64_any(require(obj, context, key)?).ok_or(NormalizationError::UnexpectedShape {
        context,
        key,
        expected: "integer id",
    })
}

pub fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64()
        && f.fract() == 0.0
        && f.is_finite()
    {
        return Some(f as i64);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}

pub fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    if let Some(b) = v.as_bool() {
        return Some(if b { 1.0 } else { 0.0 });
    }
    v.as_str()?.trim().parse::<f64>().ok()
}

pub fn as_bool_any(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Strings pass through; other non-null values keep their JSON text.
pub fn as_text_any(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
