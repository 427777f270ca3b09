//! Integration tests for the upsert and insert-if-absent contracts

use chrono::NaiveDate;
use stex::services::SqliteStore;
use stex::types::{Bar, Direction, PatternSignalRow, PatternType, SignalRow, SignalType, Verdict};

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn row(verdict: Verdict) -> SignalRow {
    SignalRow::from_verdict("600000", date(1), SignalType::MaCross, verdict, "stock")
}

#[test]
fn test_signal_upsert_converges_to_last_write() {
    let store = SqliteStore::new_in_memory().unwrap();
    store.upsert_signal(&row(Verdict::bullish("均线金叉"))).unwrap();
    store.upsert_signal(&row(Verdict::neutral("无金叉死叉"))).unwrap();
    store.upsert_signal(&row(Verdict::bearish("均线死叉"))).unwrap();

    let rows = store.signals_on("600000", date(1)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value.direction(), Some(Direction::Bearish));
    assert_eq!(rows[0].reason, "均线死叉");
    assert_eq!(store.signal_count().unwrap(), 1);
}

#[test]
fn test_batch_write_repeats_without_duplicates() {
    let store = SqliteStore::new_in_memory().unwrap();
    let rows: Vec<SignalRow> = [SignalType::MaCross, SignalType::MaAlignment, SignalType::Turnover]
        .into_iter()
        .map(|t| SignalRow::from_verdict("600000", date(4), t, Verdict::neutral("x"), "stock"))
        .collect();

    assert_eq!(store.write_signals(&rows).unwrap(), 3);
    assert_eq!(store.write_signals(&rows).unwrap(), 3);
    assert_eq!(store.signal_count().unwrap(), 3);
}

#[test]
fn test_pattern_rows_are_never_overwritten() {
    let store = SqliteStore::new_in_memory().unwrap();
    let first = PatternSignalRow {
        code: "600000".into(),
        pattern_type: PatternType::CupHandle,
        ref_date: date(5),
        reason: "first detection".into(),
    };
    let second = PatternSignalRow {
        reason: "second detection".into(),
        ..first.clone()
    };

    assert!(store.insert_pattern(&first).unwrap());
    assert!(!store.insert_pattern(&second).unwrap());

    let stored = store.patterns(Some(PatternType::CupHandle), Some("600000"), None, 10).unwrap();
    assert_eq!(stored, vec![first]);
}

#[test]
fn test_bar_upsert_keeps_turnover_when_absent() {
    let store = SqliteStore::new_in_memory().unwrap();
    let bar = Bar::new(date(6), 10.0, 10.5, 9.8, 10.2, 5000.0);
    store.upsert_stock_bars("600000", &[bar.clone().with_turnover(4.2)]).unwrap();
    store.upsert_stock_bars("600000", &[Bar { close: 10.3, ..bar }]).unwrap();

    let stored = store.stock_bars("600000", None, 5).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].close, 10.3);
    assert_eq!(stored[0].turnover_rate, Some(4.2));
}
