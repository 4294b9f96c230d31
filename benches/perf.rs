use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use std::hint::black_box;

use superliga_sync::market_values::parse_market_values_html;
use superliga_sync::normalize::{normalize_match_stats, normalize_matches, normalize_momentum};

fn season_payload(events: usize) -> Value {
    let events = (0..events)
        .map(|i| {
            json!({
                "tournamentId": 46,
                "roundNr": i / 6 + 1,
                "eventId": 10_000 + i,
                "homeId": i % 12,
                "awayId": (i + 1) % 12,
                "homeName": "Home FC",
                "awayName": "Away IF",
                "detailedScore": "{\"home\":1,\"away\":0}",
                "hasOpta": true,
                "hasOptaMomentum": i % 2 == 0,
                "statusType": "finished"
            })
        })
        .collect::<Vec<_>>();
    json!({ "events": events })
}

fn stats_payload(vars: usize) -> Value {
    let side = |offset: usize| {
        (0..vars)
            .map(|i| (format!("stat{i}"), json!((i + offset) as f64 * 0.5)))
            .collect::<serde_json::Map<_, _>>()
    };
    json!({
        "homeId": 10,
        "awayId": 20,
        "spectators": 12000,
        "homeStats": side(0),
        "awayStats": side(3),
    })
}

fn momentum_payload(buckets: usize) -> Value {
    let buckets = (0..buckets)
        .map(|i| {
            json!({
                "minute": i,
                "endRecordMin": i + 1,
                "momentumValue": (i as f64 * 7.0) % 100.0 - 50.0,
                "scores": {"home": 0.4, "away": 0.6},
                "minutesWithMomentum": {"home": i / 2, "away": i / 3}
            })
        })
        .collect::<Vec<_>>();
    json!({ "momentum": buckets })
}

fn market_values_page(rows: usize) -> String {
    let body = (0..rows)
        .map(|i| {
            let club = char::from(b'A' + (i % 26) as u8);
            let d = i % 10;
            format!(
                "<tr><td>FC {club}lub</td><td>2{d}</td><td>25.{d}</td><td>€1.{d}m</td><td>€2{d}.5m</td></tr>"
            )
        })
        .collect::<String>();
    format!("<html><body><div><table><tbody>{body}</tbody></table></div></body></html>")
}

fn bench_normalize_matches(c: &mut Criterion) {
    let payload = season_payload(198);
    c.bench_function("normalize_matches", |b| {
        b.iter(|| {
            let rows = normalize_matches(black_box(&payload), 21).unwrap();
            black_box(rows.len());
        })
    });
}

fn bench_normalize_match_stats(c: &mut Criterion) {
    let payload = stats_payload(120);
    c.bench_function("normalize_match_stats", |b| {
        b.iter(|| {
            let rows = normalize_match_stats(black_box(&payload), 1001).unwrap();
            black_box(rows.len());
        })
    });
}

fn bench_normalize_momentum(c: &mut Criterion) {
    let payload = momentum_payload(96);
    c.bench_function("normalize_momentum", |b| {
        b.iter(|| {
            let rows = normalize_momentum(black_box(&payload), 1001).unwrap();
            black_box(rows.len());
        })
    });
}

fn bench_market_values_parse(c: &mut Criterion) {
    let page = market_values_page(14);
    c.bench_function("market_values_parse", |b| {
        b.iter(|| {
            let rows = parse_market_values_html(black_box(&page), 2021).unwrap();
            black_box(rows.len());
        })
    });
}

criterion_group!(
    benches,
    bench_normalize_matches,
    bench_normalize_match_stats,
    bench_normalize_momentum,
    bench_market_values_parse
);
criterion_main!(benches);
