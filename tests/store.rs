use superliga_sync::error::StoreError;
use superliga_sync::market_values::MarketValue;
use superliga_sync::normalize::{Match, MatchMomentum, MatchStat, MatchStatus, Season};
use superliga_sync::store::{RunTotals, Table, TableStore};

fn season(id: i64) -> Season {
    Season {
        id,
        year: Some(format!("{}/{}", 2000 + id, 2001 + id)),
    }
}

fn bare_match(season_id: i64, event_id: i64) -> Match {
    Match {
        season_id,
        tournament_id: None,
        event_id,
        round_nr: None,
        home_id: None,
        away_id: None,
        home_name: None,
        away_name: None,
        detailed_score: None,
        stoppage_time_ht: None,
        stoppage_time_ft: None,
        has_opta: None,
        has_opta_momentum: None,
        status_type: None,
    }
}

fn stat(event_id: i64, team_id: i64, variable: &str, value: f64) -> MatchStat {
    MatchStat {
        event_id,
        team_id,
        variable: variable.to_string(),
        value,
    }
}

#[test]
fn upsert_ignore_skips_existing_keys() {
    let mut store = TableStore::open_in_memory().unwrap();
    assert_eq!(store.upsert_ignore(&[season(1), season(2)]).unwrap(), 2);
    assert_eq!(store.upsert_ignore(&[season(2), season(3)]).unwrap(), 1);
    assert_eq!(store.count(Table::Seasons).unwrap(), 3);

    // the stored row is left untouched
    let changed = Season {
        id: 1,
        year: Some("changed".to_string()),
    };
    assert_eq!(store.upsert_ignore(&[changed]).unwrap(), 0);
    let year: String = store
        .connection()
        .query_row("SELECT year FROM seasons WHERE id = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(year, "2001/2002");
}

#[test]
fn matches_require_a_stored_season() {
    let mut store = TableStore::open_in_memory().unwrap();
    let err = store.upsert_ignore(&[bare_match(9, 100)]).unwrap_err();
    assert!(matches!(
        err,
        StoreError::MissingParent {
            table: "matches",
            parent: "seasons",
            id: 9
        }
    ));
    assert_eq!(store.count(Table::Matches).unwrap(), 0);
}

#[test]
fn failed_batch_inserts_nothing() {
    let mut store = TableStore::open_in_memory().unwrap();
    store.upsert_ignore(&[season(1)]).unwrap();
    let batch = [bare_match(1, 100), bare_match(2, 101)];
    assert!(store.upsert_ignore(&batch).is_err());
    assert!(!store.match_exists(100).unwrap());
}

#[test]
fn append_keeps_duplicates() {
    let mut store = TableStore::open_in_memory().unwrap();
    store.upsert_ignore(&[season(1)]).unwrap();
    store.upsert_ignore(&[bare_match(1, 100)]).unwrap();

    let rows = [stat(100, 10, "a", 1.0), stat(100, 20, "a", 3.0)];
    assert_eq!(store.append(&rows).unwrap(), 2);
    assert_eq!(store.append(&rows).unwrap(), 2);
    assert_eq!(store.count(Table::MatchStats).unwrap(), 4);
}

#[test]
fn sub_resources_require_a_stored_match() {
    let mut store = TableStore::open_in_memory().unwrap();
    let momentum = MatchMomentum {
        event_id: 555,
        minute: Some(1.0),
        end_record_min: None,
        momentum_value: None,
        home_possession_value: None,
        away_possession_value: None,
        home_minutes_with_momentum: None,
        away_minutes_with_momentum: None,
    };
    let err = store.append(&[momentum]).unwrap_err();
    assert!(matches!(err, StoreError::MissingParent { id: 555, .. }));
}

#[test]
fn absent_match_fields_are_stored_as_null() {
    let mut store = TableStore::open_in_memory().unwrap();
    store.upsert_ignore(&[season(1), season(2)]).unwrap();

    let mut full = bare_match(1, 200);
    full.home_name = Some("AGF".to_string());
    full.has_opta = Some(true);
    full.status_type = Some(MatchStatus::Finished);
    store
        .upsert_ignore(&[full, bare_match(1, 100), bare_match(2, 300)])
        .unwrap();

    let stored = |event_id: i64| -> (Option<String>, Option<bool>, Option<String>) {
        store
            .connection()
            .query_row(
                "SELECT home_name, has_opta, status_type FROM matches WHERE event_id = ?1",
                [event_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap()
    };
    assert_eq!(
        stored(200),
        (Some("AGF".to_string()), Some(true), Some("finished".to_string()))
    );
    assert_eq!(stored(100), (None, None, None));
    assert!(store.season_has_matches(2).unwrap());
    assert!(!store.season_has_matches(3).unwrap());
}

#[test]
fn exists_validates_column_names() {
    let store = TableStore::open_in_memory().unwrap();
    let err = store
        .exists(Table::Matches, "season_id; DROP TABLE matches", 1)
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownColumn { table: "matches", .. }));
    assert!(!store.exists(Table::Matches, "season_id", 1).unwrap());
}

#[test]
fn market_values_are_keyed_by_team_and_season() {
    let mut store = TableStore::open_in_memory().unwrap();
    let value = |team: &str, season: &str, total: f64| MarketValue {
        team: team.to_string(),
        num_players: 25,
        mean_age: 25.5,
        mean_value: total / 25.0,
        total_value: total,
        season: season.to_string(),
    };
    let first = [
        value("AGF", "2021/2022", 28.5e6),
        value("AGF", "2020/2021", 20.0e6),
        value("Randers FC", "2021/2022", 17.55e6),
    ];
    assert_eq!(store.upsert_ignore(&first).unwrap(), 3);
    assert_eq!(
        store
            .upsert_ignore(&[value("AGF", "2021/2022", 1.0)])
            .unwrap(),
        0
    );
    assert_eq!(store.count(Table::MarketValues).unwrap(), 3);
}

#[test]
fn sync_runs_record_totals_and_errors() {
    let store = TableStore::open_in_memory().unwrap();
    let run_id = store.begin_run("2026-01-01T00:00:00Z").unwrap();
    let totals = RunTotals {
        seasons_total: 3,
        seasons_synced: 2,
        seasons_skipped: 1,
        matches_upserted: 10,
        stat_rows: 40,
        xg_rows: 12,
        momentum_rows: 90,
    };
    store
        .finish_run(
            run_id,
            "2026-01-01T00:05:00Z",
            &totals,
            &["season 4: boom".to_string()],
        )
        .unwrap();

    let (finished, synced, errors): (Option<String>, i64, String) = store
        .connection()
        .query_row(
            "SELECT finished_at, seasons_synced, errors_json FROM sync_runs WHERE run_id = ?1",
            [run_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(finished.as_deref(), Some("2026-01-01T00:05:00Z"));
    assert_eq!(synced, 2);
    assert_eq!(errors, r#"["season 4: boom"]"#);
}

#[test]
fn file_store_keeps_rows_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("superliga.sqlite");
    {
        let mut store = TableStore::open(&path).unwrap();
        store.upsert_ignore(&[season(1)]).unwrap();
    }
    let store = TableStore::open(&path).unwrap();
    assert_eq!(store.count(Table::Seasons).unwrap(), 1);
}
