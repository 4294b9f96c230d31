use std::collections::BTreeSet;
use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ToSql, params, params_from_iter};
use tracing::debug;

use crate::error::StoreError;
use crate::market_values::MarketValue;
use crate::normalize::{Match, MatchMomentum, MatchStat, MatchXgEvent, Season};

pub struct TableSchema {
    pub name: &'static str,
    pub schema: &'static str,
    pub indices: &'static [&'static str],
}

const SEASONS_TABLE: TableSchema = TableSchema {
    name: "seasons",
    schema: "CREATE TABLE IF NOT EXISTS seasons (
        id INTEGER PRIMARY KEY,
        year TEXT NULL
    );",
    indices: &[],
};

const MATCHES_TABLE: TableSchema = TableSchema {
    name: "matches",
    schema: "CREATE TABLE IF NOT EXISTS matches (
        event_id INTEGER PRIMARY KEY,
        season_id INTEGER NOT NULL,
        tournament_id INTEGER NULL,
        round_nr INTEGER NULL,
        home_id INTEGER NULL,
        away_id INTEGER NULL,
        home_name TEXT NULL,
        away_name TEXT NULL,
        detailed_score TEXT NULL,
        stoppage_time_ht INTEGER NULL,
        stoppage_time_ft INTEGER NULL,
        has_opta INTEGER NULL,
        has_opta_momentum INTEGER NULL,
        status_type TEXT NULL,
        CONSTRAINT season_id FOREIGN KEY (season_id) REFERENCES seasons (id)
    );",
    indices: &["CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season_id);"],
};

const MATCH_STATS_TABLE: TableSchema = TableSchema {
    name: "match_stats",
    schema: "CREATE TABLE IF NOT EXISTS match_stats (
        event_id INTEGER NOT NULL,
        team_id INTEGER NOT NULL,
        variable TEXT NOT NULL,
        value REAL NOT NULL,
        CONSTRAINT event_id FOREIGN KEY (event_id) REFERENCES matches (event_id)
    );",
    indices: &["CREATE INDEX IF NOT EXISTS idx_match_stats_event ON match_stats(event_id);"],
};

const MATCH_XG_TABLE: TableSchema = TableSchema {
    name: "match_xg",
    schema: "CREATE TABLE IF NOT EXISTS match_xg (
        event_id INTEGER NOT NULL,
        team_id INTEGER NOT NULL,
        min INTEGER NULL,
        sec INTEGER NULL,
        x REAL NULL,
        y REAL NULL,
        period_id INTEGER NULL,
        expected_goals_value REAL NULL,
        situation TEXT NULL,
        type TEXT NULL,
        CONSTRAINT event_id FOREIGN KEY (event_id) REFERENCES matches (event_id)
    );",
    indices: &["CREATE INDEX IF NOT EXISTS idx_match_xg_event ON match_xg(event_id);"],
};

const MATCH_MOMENTUM_TABLE: TableSchema = TableSchema {
    name: "match_momentum",
    schema: "CREATE TABLE IF NOT EXISTS match_momentum (
        event_id INTEGER NOT NULL,
        minute REAL NULL,
        end_record_min REAL NULL,
        momentum_value REAL NULL,
        home_possession_value REAL NULL,
        away_possession_value REAL NULL,
        home_minutes_with_momentum REAL NULL,
        away_minutes_with_momentum REAL NULL,
        CONSTRAINT event_id FOREIGN KEY (event_id) REFERENCES matches (event_id)
    );",
    indices: &["CREATE INDEX IF NOT EXISTS idx_match_momentum_event ON match_momentum(event_id);"],
};

const MARKET_VALUES_TABLE: TableSchema = TableSchema {
    name: "market_values",
    schema: "CREATE TABLE IF NOT EXISTS market_values (
        team TEXT NOT NULL,
        num_players INTEGER NOT NULL,
        mean_age REAL NOT NULL,
        mean_value REAL NOT NULL,
        total_value REAL NOT NULL,
        season TEXT NOT NULL,
        PRIMARY KEY (team, season)
    );",
    indices: &[],
};

const SYNC_RUNS_TABLE: TableSchema = TableSchema {
    name: "sync_runs",
    schema: "CREATE TABLE IF NOT EXISTS sync_runs (
        run_id INTEGER PRIMARY KEY AUTOINCREMENT,
        started_at TEXT NOT NULL,
        finished_at TEXT NULL,
        seasons_total INTEGER NOT NULL,
        seasons_synced INTEGER NOT NULL,
        seasons_skipped INTEGER NOT NULL,
        matches_upserted INTEGER NOT NULL,
        stat_rows INTEGER NOT NULL,
        xg_rows INTEGER NOT NULL,
        momentum_rows INTEGER NOT NULL,
        errors_json TEXT NOT NULL
    );",
    indices: &[],
};

const ALL_TABLES: &[TableSchema] = &[
    SEASONS_TABLE,
    MATCHES_TABLE,
    MATCH_STATS_TABLE,
    MATCH_XG_TABLE,
    MATCH_MOMENTUM_TABLE,
    MARKET_VALUES_TABLE,
    SYNC_RUNS_TABLE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Seasons,
    Matches,
    MatchStats,
    MatchXg,
    MatchMomentum,
    MarketValues,
    SyncRuns,
}

impl Table {
    pub fn name(&self) -> &'static str {
        self.schema().name
    }

    fn schema(&self) -> &'static TableSchema {
        match self {
            Table::Seasons => &SEASONS_TABLE,
            Table::Matches => &MATCHES_TABLE,
            Table::MatchStats => &MATCH_STATS_TABLE,
            Table::MatchXg => &MATCH_XG_TABLE,
            Table::MatchMomentum => &MATCH_MOMENTUM_TABLE,
            Table::MarketValues => &MARKET_VALUES_TABLE,
            Table::SyncRuns => &SYNC_RUNS_TABLE,
        }
    }

    /// Writable columns, in insert order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Seasons => &["id", "year"],
            Table::Matches => &[
                "event_id",
                "season_id",
                "tournament_id",
                "round_nr",
                "home_id",
                "away_id",
                "home_name",
                "away_name",
                "detailed_score",
                "stoppage_time_ht",
                "stoppage_time_ft",
                "has_opta",
                "has_opta_momentum",
                "status_type",
            ],
            Table::MatchStats => &["event_id", "team_id", "variable", "value"],
            Table::MatchXg => &[
                "event_id",
                "team_id",
                "min",
                "sec",
                "x",
                "y",
                "period_id",
                "expected_goals_value",
                "situation",
                "type",
            ],
            Table::MatchMomentum => &[
                "event_id",
                "minute",
                "end_record_min",
                "momentum_value",
                "home_possession_value",
                "away_possession_value",
                "home_minutes_with_momentum",
                "away_minutes_with_momentum",
            ],
            Table::MarketValues => &[
                "team",
                "num_players",
                "mean_age",
                "mean_value",
                "total_value",
                "season",
            ],
            Table::SyncRuns => &[
                "run_id",
                "started_at",
                "finished_at",
                "seasons_total",
                "seasons_synced",
                "seasons_skipped",
                "matches_upserted",
                "stat_rows",
                "xg_rows",
                "momentum_rows",
                "errors_json",
            ],
        }
    }

    /// Column other tables reference this one by.
    fn key_column(&self) -> Option<&'static str> {
        match self {
            Table::Seasons => Some("id"),
            Table::Matches => Some("event_id"),
            _ => None,
        }
    }
}

/// A row type with a fixed home table.
pub trait Record {
    const TABLE: Table;

    /// Values in `TABLE.columns()` order.
    fn values(&self) -> Vec<SqlValue>;

    /// The row this one refers to, checked before insert.
    fn parent(&self) -> Option<(Table, i64)> {
        None
    }
}

impl Record for Season {
    const TABLE: Table = Table::Seasons;

    fn values(&self) -> Vec<SqlValue> {
        vec![self.id.into(), self.year.clone().into()]
    }
}

impl Record for Match {
    const TABLE: Table = Table::Matches;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.event_id.into(),
            self.season_id.into(),
            self.tournament_id.into(),
            self.round_nr.into(),
            self.home_id.into(),
            self.away_id.into(),
            self.home_name.clone().into(),
            self.away_name.clone().into(),
            self.detailed_score.clone().into(),
            self.stoppage_time_ht.into(),
            self.stoppage_time_ft.into(),
            self.has_opta.into(),
            self.has_opta_momentum.into(),
            self.status_type
                .as_ref()
                .map(|s| s.as_str().to_string())
                .into(),
        ]
    }

    fn parent(&self) -> Option<(Table, i64)> {
        Some((Table::Seasons, self.season_id))
    }
}

impl Record for MatchStat {
    const TABLE: Table = Table::MatchStats;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.event_id.into(),
            self.team_id.into(),
            self.variable.clone().into(),
            self.value.into(),
        ]
    }

    fn parent(&self) -> Option<(Table, i64)> {
        Some((Table::Matches, self.event_id))
    }
}

impl Record for MatchXgEvent {
    const TABLE: Table = Table::MatchXg;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.event_id.into(),
            self.team_id.into(),
            self.min.into(),
            self.sec.into(),
            self.x.into(),
            self.y.into(),
            self.period_id.into(),
            self.expected_goals_value.into(),
            self.situation.clone().into(),
            self.kind.clone().into(),
        ]
    }

    fn parent(&self) -> Option<(Table, i64)> {
        Some((Table::Matches, self.event_id))
    }
}

impl Record for MatchMomentum {
    const TABLE: Table = Table::MatchMomentum;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.event_id.into(),
            self.minute.into(),
            self.end_record_min.into(),
            self.momentum_value.into(),
            self.home_possession_value.into(),
            self.away_possession_value.into(),
            self.home_minutes_with_momentum.into(),
            self.away_minutes_with_momentum.into(),
        ]
    }

    fn parent(&self) -> Option<(Table, i64)> {
        Some((Table::Matches, self.event_id))
    }
}

impl Record for MarketValue {
    const TABLE: Table = Table::MarketValues;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.team.clone().into(),
            self.num_players.into(),
            self.mean_age.into(),
            self.mean_value.into(),
            self.total_value.into(),
            self.season.clone().into(),
        ]
    }
}

/// Counters written to `sync_runs` when a run finishes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunTotals {
    pub seasons_total: usize,
    pub seasons_synced: usize,
    pub seasons_skipped: usize,
    pub matches_upserted: usize,
    pub stat_rows: usize,
    pub xg_rows: usize,
    pub momentum_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertMode {
    IgnoreExisting,
    Append,
}

pub struct TableStore {
    conn: Connection,
}

impl TableStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates every table and index that does not exist yet.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        for table in ALL_TABLES {
            self.conn.execute_batch(table.schema)?;
            for index in table.indices {
                self.conn.execute_batch(index)?;
            }
        }
        Ok(())
    }

    /// Inserts rows whose key is not stored yet; existing rows are left
    /// untouched. Returns the number of rows actually inserted.
    pub fn upsert_ignore<R: Record>(&mut self, rows: &[R]) -> Result<usize, StoreError> {
        self.insert_rows(rows, InsertMode::IgnoreExisting)
    }

    /// Inserts every row unconditionally.
    pub fn append<R: Record>(&mut self, rows: &[R]) -> Result<usize, StoreError> {
        self.insert_rows(rows, InsertMode::Append)
    }

    pub fn exists(&self, table: Table, column: &str, value: impl ToSql) -> Result<bool, StoreError> {
        exists_in(&self.conn, table, column, value)
    }

    pub fn season_has_matches(&self, season_id: i64) -> Result<bool, StoreError> {
        self.exists(Table::Matches, "season_id", season_id)
    }

    pub fn match_exists(&self, event_id: i64) -> Result<bool, StoreError> {
        self.exists(Table::Matches, "event_id", event_id)
    }

    pub fn count(&self, table: Table) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let n = self.conn.query_row(&sql, [], |row| row.get::<_, i64>(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    pub fn begin_run(&self, started_at: &str) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO sync_runs(started_at, finished_at, seasons_total, seasons_synced, seasons_skipped,
                matches_upserted, stat_rows, xg_rows, momentum_rows, errors_json)
             VALUES (?1, NULL, 0, 0, 0, 0, 0, 0, 0, '[]')",
            params![started_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn finish_run(
        &self,
        run_id: i64,
        finished_at: &str,
        totals: &RunTotals,
        errors: &[String],
    ) -> Result<(), StoreError> {
        let errors_json = serde_json::to_string(errors).unwrap_or_else(|_| "[]".to_string());
        self.conn.execute(
            "UPDATE sync_runs
             SET finished_at = ?1, seasons_total = ?2, seasons_synced = ?3, seasons_skipped = ?4,
                 matches_upserted = ?5, stat_rows = ?6, xg_rows = ?7, momentum_rows = ?8,
                 errors_json = ?9
             WHERE run_id = ?10",
            params![
                finished_at,
                totals.seasons_total as i64,
                totals.seasons_synced as i64,
                totals.seasons_skipped as i64,
                totals.matches_upserted as i64,
                totals.stat_rows as i64,
                totals.xg_rows as i64,
                totals.momentum_rows as i64,
                errors_json,
                run_id
            ],
        )?;
        Ok(())
    }

    fn insert_rows<R: Record>(&mut self, rows: &[R], mode: InsertMode) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let table = R::TABLE;
        let columns = table.columns();
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let verb = match mode {
            InsertMode::IgnoreExisting => "INSERT OR IGNORE",
            InsertMode::Append => "INSERT",
        };
        let sql = format!(
            "{verb} INTO {} ({}) VALUES ({placeholders})",
            table.name(),
            columns.join(", ")
        );

        let tx = self.conn.transaction()?;
        let parents = rows
            .iter()
            .filter_map(|row| row.parent())
            .collect::<BTreeSet<_>>();
        for (parent, id) in parents {
            let Some(key) = parent.key_column() else {
                continue;
            };
            if !exists_in(&tx, parent, key, id)? {
                return Err(StoreError::MissingParent {
                    table: table.name(),
                    parent: parent.name(),
                    id,
                });
            }
        }

        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in rows {
                inserted += stmt.execute(params_from_iter(row.values()))?;
            }
        }
        tx.commit()?;
        debug!(table = table.name(), rows = rows.len(), inserted, "stored rows");
        Ok(inserted)
    }
}

fn exists_in(
    conn: &Connection,
    table: Table,
    column: &str,
    value: impl ToSql,
) -> Result<bool, StoreError> {
    if !table.columns().contains(&column) {
        return Err(StoreError::UnknownColumn {
            table: table.name(),
            column: column.to_string(),
        });
    }
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {column} = ?1)",
        table.name()
    );
    let found = conn.query_row(&sql, params![value], |row| row.get::<_, i64>(0))?;
    Ok(found != 0)
}
