//! Season-major, match-minor sync of the remote API into the table store.
//!
//! Only fetching the season list can fail a run. Everything below it is a
//! unit of work that is logged, recorded in the summary and skipped.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{Endpoint, SportsApi};
use crate::error::{NormalizationError, SyncError};
use crate::normalize::{
    Match, Season, normalize_match_stats, normalize_matches, normalize_momentum,
    normalize_seasons, normalize_xg,
};
use crate::store::{Record, RunTotals, TableStore};

pub const DEFAULT_PROGRESS_EVERY: usize = 10;

/// When a season counts as already synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeasonSkipMode {
    /// Any stored match for the season skips it, even if its per-match
    /// data was never fetched.
    #[default]
    AnyMatch,
    /// Always refetch every season.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub skip_mode: SeasonSkipMode,
    pub progress_every: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            skip_mode: SeasonSkipMode::AnyMatch,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub run_id: Option<i64>,
    pub seasons_total: usize,
    pub seasons_inserted: usize,
    pub seasons_synced: usize,
    pub seasons_skipped: usize,
    pub seasons_failed: usize,
    pub matches_upserted: usize,
    pub matches_finished: usize,
    pub stat_rows: usize,
    pub xg_rows: usize,
    pub momentum_rows: usize,
    pub errors: Vec<String>,
}

impl SyncSummary {
    /// False when any season or match was skipped because of an error.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn totals(&self) -> RunTotals {
        RunTotals {
            seasons_total: self.seasons_total,
            seasons_synced: self.seasons_synced,
            seasons_skipped: self.seasons_skipped,
            matches_upserted: self.matches_upserted,
            stat_rows: self.stat_rows,
            xg_rows: self.xg_rows,
            momentum_rows: self.momentum_rows,
        }
    }
}

type Normalizer<R> = fn(&Value, i64) -> Result<Vec<R>, NormalizationError>;

pub struct Syncer<'a, A> {
    api: &'a A,
    store: &'a mut TableStore,
    options: SyncOptions,
}

pub fn sync_all<A: SportsApi>(
    api: &A,
    store: &mut TableStore,
    options: SyncOptions,
) -> Result<SyncSummary, SyncError> {
    Syncer::new(api, store, options).run()
}

impl<'a, A: SportsApi> Syncer<'a, A> {
    pub fn new(api: &'a A, store: &'a mut TableStore, options: SyncOptions) -> Self {
        Self {
            api,
            store,
            options,
        }
    }

    pub fn run(&mut self) -> Result<SyncSummary, SyncError> {
        let started_at = Utc::now().to_rfc3339();
        let (seasons, inserted) = self.sync_seasons()?;
        info!(seasons = seasons.len(), inserted, "season list stored");

        let run_id = self.store.begin_run(&started_at)?;
        let mut summary = SyncSummary {
            run_id: Some(run_id),
            seasons_total: seasons.len(),
            seasons_inserted: inserted,
            ..SyncSummary::default()
        };

        for (idx, season) in seasons.iter().enumerate() {
            info!(
                season_id = season.id,
                year = season.year.as_deref().unwrap_or("?"),
                "season {}/{}",
                idx + 1,
                seasons.len()
            );
            self.sync_season(season, &mut summary);
        }

        let finished_at = Utc::now().to_rfc3339();
        self.store
            .finish_run(run_id, &finished_at, &summary.totals(), &summary.errors)?;
        info!(
            synced = summary.seasons_synced,
            skipped = summary.seasons_skipped,
            failed = summary.seasons_failed,
            matches = summary.matches_upserted,
            errors = summary.errors.len(),
            "sync finished"
        );
        Ok(summary)
    }

    fn sync_seasons(&mut self) -> Result<(Vec<Season>, usize), SyncError> {
        let raw = self.api.fetch(&Endpoint::Seasons)?;
        let seasons = normalize_seasons(&raw)?;
        let inserted = self.store.upsert_ignore(&seasons)?;
        Ok((seasons, inserted))
    }

    fn sync_season(&mut self, season: &Season, summary: &mut SyncSummary) {
        let season_id = season.id;
        if self.options.skip_mode == SeasonSkipMode::AnyMatch {
            match self.store.season_has_matches(season_id) {
                Ok(true) => {
                    info!(season_id, "season already has matches, skipping");
                    summary.seasons_skipped += 1;
                    return;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(season_id, error = %err, "season lookup failed");
                    summary.errors.push(format!("season {season_id}: {err}"));
                    summary.seasons_failed += 1;
                    return;
                }
            }
        }

        let matches = match self.sync_matches(season_id) {
            Ok((matches, inserted)) => {
                info!(season_id, matches = matches.len(), inserted, "season matches stored");
                summary.matches_upserted += inserted;
                matches
            }
            Err(err) => {
                warn!(season_id, error = %err, "season matches failed");
                summary.errors.push(format!("season {season_id}: {err}"));
                summary.seasons_failed += 1;
                return;
            }
        };

        let every = self.options.progress_every.max(1);
        let mut seen = HashSet::with_capacity(matches.len());
        for (idx, m) in matches.iter().enumerate() {
            if idx > 0 && idx % every == 0 {
                info!(season_id, "processed {}/{} matches", idx, matches.len());
            }
            if !seen.insert(m.event_id) {
                warn!(season_id, event_id = m.event_id, "duplicate event in match list, skipping");
                continue;
            }
            if m.is_finished() {
                summary.matches_finished += 1;
                self.sync_match(season_id, m, summary);
            }
        }
        summary.seasons_synced += 1;
    }

    fn sync_matches(&mut self, season_id: i64) -> Result<(Vec<Match>, usize), SyncError> {
        let raw = self.api.fetch(&Endpoint::Matches { season_id })?;
        let matches = normalize_matches(&raw, season_id)?;
        let inserted = self.store.upsert_ignore(&matches)?;
        Ok((matches, inserted))
    }

    fn sync_match(&mut self, season_id: i64, m: &Match, summary: &mut SyncSummary) {
        let event_id = m.event_id;
        if m.has_opta_stats() {
            let stats = self.sync_resource(
                season_id,
                event_id,
                Endpoint::MatchStats { event_id },
                normalize_match_stats,
                summary,
            );
            summary.stat_rows += stats;
            let xg = self.sync_resource(
                season_id,
                event_id,
                Endpoint::XgTime { event_id },
                normalize_xg,
                summary,
            );
            summary.xg_rows += xg;
        }
        if m.has_momentum() {
            let momentum = self.sync_resource(
                season_id,
                event_id,
                Endpoint::Momentum { event_id },
                normalize_momentum,
                summary,
            );
            summary.momentum_rows += momentum;
        }
    }

    /// Fetches, normalizes and appends one per-match resource. Returns the
    /// number of stored rows; failures are recorded and yield zero.
    fn sync_resource<R: Record>(
        &mut self,
        season_id: i64,
        event_id: i64,
        endpoint: Endpoint,
        normalize: Normalizer<R>,
        summary: &mut SyncSummary,
    ) -> usize {
        match self.fetch_and_append(&endpoint, event_id, normalize) {
            Ok(0) => {
                warn!(season_id, event_id, call = %endpoint, "empty result, skipping");
                0
            }
            Ok(rows) => rows,
            Err(err) => {
                warn!(season_id, event_id, call = %endpoint, error = %err, "skipping");
                summary
                    .errors
                    .push(format!("season {season_id} event {event_id} {endpoint}: {err}"));
                0
            }
        }
    }

    fn fetch_and_append<R: Record>(
        &mut self,
        endpoint: &Endpoint,
        event_id: i64,
        normalize: Normalizer<R>,
    ) -> Result<usize, SyncError> {
        let raw = self.api.fetch(endpoint)?;
        let rows = normalize(&raw, event_id)?;
        Ok(self.store.append(&rows)?)
    }
}
