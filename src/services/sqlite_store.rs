//! SQLite persistence for market data, signals and pattern detections.
//!
//! Market data tables (`stock_day`, `index_day`, `technicals`, `moneyflow`,
//! `fundamentals`) are written by ingestion and read by the engine.
//! `signals` and `pattern_signal` are written by the engine and read by
//! consumers:
//! - signals: one row per (code, ref_date, signal_type), last write wins
//! - pattern_signal: one row per (code, pattern_type, ref_date), first write wins

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::types::{
    Bar, FlowBucket, Fundamentals, IndicatorRow, MoneyFlow, MovingAverages, PatternCounts,
    PatternSignalRow, PatternType, SignalRow, SignalType, SignalValue, WatchlistEntry,
};

/// Bar table for one universe.
#[derive(Debug, Clone, Copy)]
enum BarTable {
    Stock,
    Index,
}

impl BarTable {
    fn name(&self) -> &'static str {
        match self {
            BarTable::Stock => "stock_day",
            BarTable::Index => "index_day",
        }
    }
}

/// SQLite store shared by ingestion, the engines and the HTTP layer.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("SQLite connection lock poisoned".to_string()))
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS watchlist (
                code TEXT PRIMARY KEY,
                name TEXT,
                added_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS stock_day (
                code TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL,
                amount REAL,
                turnover_rate REAL,
                PRIMARY KEY (code, trade_date)
            );

            CREATE TABLE IF NOT EXISTS index_day (
                code TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL,
                amount REAL,
                turnover_rate REAL,
                PRIMARY KEY (code, trade_date)
            );

            CREATE TABLE IF NOT EXISTS technicals (
                code TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                ma5 REAL,
                ma10 REAL,
                ma20 REAL,
                macd REAL,
                macd_signal REAL,
                macd_hist REAL,
                rsi REAL,
                kdj_k REAL,
                kdj_d REAL,
                kdj_j REAL,
                PRIMARY KEY (code, trade_date)
            );

            CREATE TABLE IF NOT EXISTS moneyflow (
                code TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                net_mf_amount REAL,
                net_mf_vol REAL,
                buy_sm_amount REAL, sell_sm_amount REAL, buy_sm_vol REAL, sell_sm_vol REAL,
                buy_md_amount REAL, sell_md_amount REAL, buy_md_vol REAL, sell_md_vol REAL,
                buy_lg_amount REAL, sell_lg_amount REAL, buy_lg_vol REAL, sell_lg_vol REAL,
                buy_elg_amount REAL, sell_elg_amount REAL, buy_elg_vol REAL, sell_elg_vol REAL,
                PRIMARY KEY (code, trade_date)
            );

            CREATE TABLE IF NOT EXISTS fundamentals (
                code TEXT NOT NULL,
                report_date TEXT NOT NULL,
                pe REAL,
                pb REAL,
                ps REAL,
                market_cap REAL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (code, report_date)
            );

            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL,
                ref_date TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                direction TEXT NOT NULL,
                reason TEXT NOT NULL,
                source TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (code, ref_date, signal_type)
            );

            CREATE INDEX IF NOT EXISTS idx_signals_ref_date ON signals(ref_date DESC);

            CREATE TABLE IF NOT EXISTS pattern_signal (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL,
                pattern_type TEXT NOT NULL,
                ref_date TEXT NOT NULL,
                reason TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                UNIQUE (code, pattern_type, ref_date)
            );

            CREATE INDEX IF NOT EXISTS idx_pattern_signal_ref_date ON pattern_signal(ref_date DESC);",
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    // ========== Watchlist Methods ==========

    /// Add or rename a tracked security.
    pub fn add_watchlist(&self, entry: &WatchlistEntry) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO watchlist (code, name, added_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(code) DO UPDATE SET name = COALESCE(excluded.name, watchlist.name)",
            params![entry.code, entry.name, chrono::Utc::now().timestamp_millis()],
        )?;
        debug!("Watchlist add {}", entry.code);
        Ok(())
    }

    /// Remove a tracked security. Returns whether it was present.
    pub fn remove_watchlist(&self, code: &str) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM watchlist WHERE code = ?1", params![code])?;
        Ok(n > 0)
    }

    pub fn watchlist(&self) -> Result<Vec<WatchlistEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT code, name FROM watchlist ORDER BY code")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(WatchlistEntry {
                    code: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn watchlist_codes(&self) -> Result<Vec<String>> {
        Ok(self.watchlist()?.into_iter().map(|e| e.code).collect())
    }

    // ========== Bar Methods ==========

    pub fn upsert_stock_bars(&self, code: &str, bars: &[Bar]) -> Result<usize> {
        self.upsert_bars(BarTable::Stock, code, bars)
    }

    pub fn upsert_index_bars(&self, code: &str, bars: &[Bar]) -> Result<usize> {
        self.upsert_bars(BarTable::Index, code, bars)
    }

    fn upsert_bars(&self, table: BarTable, code: &str, bars: &[Bar]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let sql = format!(
                "INSERT INTO {t} (code, trade_date, open, high, low, close, volume, amount, turnover_rate)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(code, trade_date) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume,
                    amount = COALESCE(excluded.amount, {t}.amount),
                    turnover_rate = COALESCE(excluded.turnover_rate, {t}.turnover_rate)",
                t = table.name()
            );
            let mut stmt = tx.prepare(&sql)?;
            for bar in bars {
                stmt.execute(params![
                    code,
                    bar.trade_date,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    bar.amount,
                    bar.turnover_rate,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Upserted {} {} bars for {}", bars.len(), table.name(), code);
        Ok(bars.len())
    }

    /// Write a turnover rate onto an existing stock bar. Returns whether the
    /// bar exists.
    pub fn update_turnover(&self, code: &str, trade_date: NaiveDate, rate: f64) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE stock_day SET turnover_rate = ?1 WHERE code = ?2 AND trade_date = ?3",
            params![rate, code, trade_date],
        )?;
        Ok(n > 0)
    }

    pub fn stock_bars(&self, code: &str, as_of: Option<NaiveDate>, limit: usize) -> Result<Vec<Bar>> {
        self.bars(BarTable::Stock, code, as_of, limit)
    }

    pub fn index_bars(&self, code: &str, as_of: Option<NaiveDate>, limit: usize) -> Result<Vec<Bar>> {
        self.bars(BarTable::Index, code, as_of, limit)
    }

    /// Most recent `limit` bars up to `as_of`, ascending by date.
    fn bars(&self, table: BarTable, code: &str, as_of: Option<NaiveDate>, limit: usize) -> Result<Vec<Bar>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT trade_date, open, high, low, close, volume, amount, turnover_rate
             FROM {} WHERE code = ?1 AND (?2 IS NULL OR trade_date <= ?2)
             ORDER BY trade_date DESC LIMIT ?3",
            table.name()
        );
        let mut stmt = conn.prepare(&sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut bars = stmt
            .query_map(params![code, as_of, limit], |row| {
                Ok(Bar {
                    trade_date: row.get(0)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                    amount: row.get(6)?,
                    turnover_rate: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        bars.reverse();
        Ok(bars)
    }

    /// Stock codes with at least `min_bars` bars, optionally restricted to `codes`.
    pub fn codes_with_history(&self, min_bars: usize, codes: Option<&[String]>) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT code FROM stock_day GROUP BY code HAVING COUNT(*) >= ?1 ORDER BY code",
        )?;
        let all = stmt
            .query_map(params![min_bars as i64], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(match codes {
            Some(wanted) => all.into_iter().filter(|c| wanted.contains(c)).collect(),
            None => all,
        })
    }

    // ========== Indicator Methods ==========

    /// Upsert indicator rows. Null values never erase stored ones.
    pub fn upsert_indicators(&self, code: &str, rows: &[IndicatorRow]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO technicals
                    (code, trade_date, ma5, ma10, ma20, macd, macd_signal, macd_hist, rsi, kdj_k, kdj_d, kdj_j)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(code, trade_date) DO UPDATE SET
                    ma5 = COALESCE(excluded.ma5, technicals.ma5),
                    ma10 = COALESCE(excluded.ma10, technicals.ma10),
                    ma20 = COALESCE(excluded.ma20, technicals.ma20),
                    macd = COALESCE(excluded.macd, technicals.macd),
                    macd_signal = COALESCE(excluded.macd_signal, technicals.macd_signal),
                    macd_hist = COALESCE(excluded.macd_hist, technicals.macd_hist),
                    rsi = COALESCE(excluded.rsi, technicals.rsi),
                    kdj_k = COALESCE(excluded.kdj_k, technicals.kdj_k),
                    kdj_d = COALESCE(excluded.kdj_d, technicals.kdj_d),
                    kdj_j = COALESCE(excluded.kdj_j, technicals.kdj_j)",
            )?;
            for r in rows {
                stmt.execute(params![
                    code,
                    r.trade_date,
                    r.ma.ma5,
                    r.ma.ma10,
                    r.ma.ma20,
                    r.macd,
                    r.macd_signal,
                    r.macd_hist,
                    r.rsi,
                    r.kdj_k,
                    r.kdj_d,
                    r.kdj_j,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Stored moving averages between two dates inclusive, keyed by date.
    pub fn moving_averages(
        &self,
        code: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<NaiveDate, MovingAverages>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT trade_date, ma5, ma10, ma20 FROM technicals
             WHERE code = ?1 AND trade_date BETWEEN ?2 AND ?3",
        )?;
        let rows = stmt
            .query_map(params![code, from, to], |row| {
                Ok((
                    row.get::<_, NaiveDate>(0)?,
                    MovingAverages::new(row.get(1)?, row.get(2)?, row.get(3)?),
                ))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(rows)
    }

    // ========== Money Flow Methods ==========

    pub fn upsert_money_flows(&self, code: &str, flows: &[MoneyFlow]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO moneyflow (code, trade_date, net_mf_amount, net_mf_vol,
                    buy_sm_amount, sell_sm_amount, buy_sm_vol, sell_sm_vol,
                    buy_md_amount, sell_md_amount, buy_md_vol, sell_md_vol,
                    buy_lg_amount, sell_lg_amount, buy_lg_vol, sell_lg_vol,
                    buy_elg_amount, sell_elg_amount, buy_elg_vol, sell_elg_vol)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
                 ON CONFLICT(code, trade_date) DO UPDATE SET
                    net_mf_amount = excluded.net_mf_amount, net_mf_vol = excluded.net_mf_vol,
                    buy_sm_amount = excluded.buy_sm_amount, sell_sm_amount = excluded.sell_sm_amount,
                    buy_sm_vol = excluded.buy_sm_vol, sell_sm_vol = excluded.sell_sm_vol,
                    buy_md_amount = excluded.buy_md_amount, sell_md_amount = excluded.sell_md_amount,
                    buy_md_vol = excluded.buy_md_vol, sell_md_vol = excluded.sell_md_vol,
                    buy_lg_amount = excluded.buy_lg_amount, sell_lg_amount = excluded.sell_lg_amount,
                    buy_lg_vol = excluded.buy_lg_vol, sell_lg_vol = excluded.sell_lg_vol,
                    buy_elg_amount = excluded.buy_elg_amount, sell_elg_amount = excluded.sell_elg_amount,
                    buy_elg_vol = excluded.buy_elg_vol, sell_elg_vol = excluded.sell_elg_vol",
            )?;
            for f in flows {
                let (s, m, l, e) = (&f.small, &f.medium, &f.large, &f.extra_large);
                stmt.execute(params![
                    code,
                    f.trade_date,
                    f.net_amount,
                    f.net_vol,
                    s.buy_amount, s.sell_amount, s.buy_vol, s.sell_vol,
                    m.buy_amount, m.sell_amount, m.buy_vol, m.sell_vol,
                    l.buy_amount, l.sell_amount, l.buy_vol, l.sell_vol,
                    e.buy_amount, e.sell_amount, e.buy_vol, e.sell_vol,
                ])?;
            }
        }
        tx.commit()?;
        Ok(flows.len())
    }

    /// Money-flow rows between two dates inclusive, keyed by date.
    pub fn money_flows(&self, code: &str, from: NaiveDate, to: NaiveDate) -> Result<HashMap<NaiveDate, MoneyFlow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT trade_date, net_mf_amount, net_mf_vol,
                    buy_sm_amount, sell_sm_amount, buy_sm_vol, sell_sm_vol,
                    buy_md_amount, sell_md_amount, buy_md_vol, sell_md_vol,
                    buy_lg_amount, sell_lg_amount, buy_lg_vol, sell_lg_vol,
                    buy_elg_amount, sell_elg_amount, buy_elg_vol, sell_elg_vol
             FROM moneyflow WHERE code = ?1 AND trade_date BETWEEN ?2 AND ?3",
        )?;
        let rows = stmt
            .query_map(params![code, from, to], |row| {
                let flow = MoneyFlow {
                    trade_date: row.get(0)?,
                    net_amount: row.get(1)?,
                    net_vol: row.get(2)?,
                    small: flow_bucket(row, 3)?,
                    medium: flow_bucket(row, 7)?,
                    large: flow_bucket(row, 11)?,
                    extra_large: flow_bucket(row, 15)?,
                };
                Ok((flow.trade_date, flow))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(rows)
    }

    // ========== Fundamentals Methods ==========

    /// Upsert a valuation snapshot. Null values never erase stored ones.
    pub fn upsert_fundamentals(&self, code: &str, f: &Fundamentals) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO fundamentals (code, report_date, pe, pb, ps, market_cap, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(code, report_date) DO UPDATE SET
                pe = COALESCE(excluded.pe, fundamentals.pe),
                pb = COALESCE(excluded.pb, fundamentals.pb),
                ps = COALESCE(excluded.ps, fundamentals.ps),
                market_cap = COALESCE(excluded.market_cap, fundamentals.market_cap),
                updated_at = excluded.updated_at",
            params![
                code,
                f.report_date,
                f.pe,
                f.pb,
                f.ps,
                f.market_cap,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn fundamentals(&self, code: &str, report_date: NaiveDate) -> Result<Option<Fundamentals>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT report_date, pe, pb, ps, market_cap FROM fundamentals
                 WHERE code = ?1 AND report_date = ?2",
                params![code, report_date],
                |row| {
                    Ok(Fundamentals {
                        report_date: row.get(0)?,
                        pe: row.get(1)?,
                        pb: row.get(2)?,
                        ps: row.get(3)?,
                        market_cap: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ========== Signal Methods ==========

    /// Insert or overwrite one signal row.
    pub fn upsert_signal(&self, row: &SignalRow) -> Result<()> {
        let conn = self.conn()?;
        upsert_signal_on(&conn, row, chrono::Utc::now().timestamp_millis())?;
        Ok(())
    }

    /// Write a batch of signal rows in one transaction.
    pub fn write_signals(&self, rows: &[SignalRow]) -> Result<usize> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().timestamp_millis();
        let tx = conn.transaction()?;
        for row in rows {
            upsert_signal_on(&tx, row, now)?;
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Signals for a security, optionally bounded by date and type.
    pub fn signals_for(
        &self,
        code: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        signal_type: Option<SignalType>,
    ) -> Result<Vec<SignalRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT code, ref_date, signal_type, direction, reason, source FROM signals
             WHERE code = ?1
               AND (?2 IS NULL OR ref_date >= ?2)
               AND (?3 IS NULL OR ref_date <= ?3)
               AND (?4 IS NULL OR signal_type = ?4)
             ORDER BY ref_date, signal_type",
        )?;
        let rows = stmt
            .query_map(
                params![code, from, to, signal_type.map(|t| t.as_str())],
                signal_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().flatten().collect())
    }

    /// Signals for a security on one reference date.
    pub fn signals_on(&self, code: &str, ref_date: NaiveDate) -> Result<Vec<SignalRow>> {
        self.signals_for(code, Some(ref_date), Some(ref_date), None)
    }

    /// Signals at the latest reference date of every watchlist security.
    pub fn latest_board(&self) -> Result<Vec<SignalRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.code, s.ref_date, s.signal_type, s.direction, s.reason, s.source
             FROM signals s
             JOIN watchlist w ON w.code = s.code
             WHERE s.ref_date = (SELECT MAX(ref_date) FROM signals WHERE code = s.code)
             ORDER BY s.code, s.signal_type",
        )?;
        let rows = stmt
            .query_map([], signal_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().flatten().collect())
    }

    pub fn signal_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM signals", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    // ========== Pattern Methods ==========

    /// Insert a detection unless one exists for the key. Returns whether a
    /// row was inserted.
    pub fn insert_pattern(&self, row: &PatternSignalRow) -> Result<bool> {
        let conn = self.conn()?;
        let inserted = insert_pattern_on(&conn, row, chrono::Utc::now().timestamp_millis())?;
        Ok(inserted)
    }

    /// Insert detections in one transaction. Returns per-pattern inserted counts.
    pub fn insert_patterns(&self, rows: &[PatternSignalRow]) -> Result<PatternCounts> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().timestamp_millis();
        let tx = conn.transaction()?;
        let mut counts = PatternCounts::default();
        for row in rows {
            if insert_pattern_on(&tx, row, now)? {
                counts.add(row.pattern_type, 1);
            }
        }
        tx.commit()?;
        Ok(counts)
    }

    /// Pattern detections, newest first.
    pub fn patterns(
        &self,
        pattern_type: Option<PatternType>,
        code: Option<&str>,
        since: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<PatternSignalRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT code, pattern_type, ref_date, reason FROM pattern_signal
             WHERE (?1 IS NULL OR pattern_type = ?1)
               AND (?2 IS NULL OR code = ?2)
               AND (?3 IS NULL OR ref_date >= ?3)
             ORDER BY ref_date DESC, code
             LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(
                params![
                    pattern_type.map(|p| p.as_str()),
                    code,
                    since,
                    i64::try_from(limit).unwrap_or(i64::MAX)
                ],
                |row| {
                    let code: String = row.get(0)?;
                    let raw: String = row.get(1)?;
                    let ref_date: NaiveDate = row.get(2)?;
                    let reason: String = row.get(3)?;
                    Ok(PatternType::from_str(&raw).map(|pattern_type| PatternSignalRow {
                        code,
                        pattern_type,
                        ref_date,
                        reason,
                    }))
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().flatten().collect())
    }

    /// Per-pattern row counts with a reference date on or after `since`.
    pub fn pattern_totals_since(&self, since: NaiveDate) -> Result<PatternCounts> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT pattern_type, COUNT(*) FROM pattern_signal WHERE ref_date >= ?1 GROUP BY pattern_type",
        )?;
        let mut counts = PatternCounts::default();
        let rows = stmt
            .query_map(params![since], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (raw, n) in rows {
            if let Some(p) = PatternType::from_str(&raw) {
                counts.add(p, n as usize);
            }
        }
        Ok(counts)
    }
}

fn flow_bucket(row: &Row<'_>, start: usize) -> rusqlite::Result<FlowBucket> {
    Ok(FlowBucket {
        buy_amount: row.get(start)?,
        sell_amount: row.get(start + 1)?,
        buy_vol: row.get(start + 2)?,
        sell_vol: row.get(start + 3)?,
    })
}

/// Map a `signals` row; rows with unknown type or value are skipped.
fn signal_row(row: &Row<'_>) -> rusqlite::Result<Option<SignalRow>> {
    let raw_type: String = row.get(2)?;
    let raw_value: String = row.get(3)?;
    let (Some(signal_type), Some(value)) = (SignalType::from_str(&raw_type), SignalValue::from_str(&raw_value)) else {
        warn!("Skipping signal row with unknown type/value {}/{}", raw_type, raw_value);
        return Ok(None);
    };
    Ok(Some(SignalRow {
        code: row.get(0)?,
        ref_date: row.get(1)?,
        signal_type,
        value,
        reason: row.get(4)?,
        source: row.get(5)?,
    }))
}

fn upsert_signal_on(conn: &Connection, row: &SignalRow, now: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO signals (code, ref_date, signal_type, direction, reason, source, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT(code, ref_date, signal_type) DO UPDATE SET
            direction = excluded.direction,
            reason = excluded.reason,
            source = excluded.source,
            updated_at = excluded.updated_at",
        params![
            row.code,
            row.ref_date,
            row.signal_type.as_str(),
            row.value.as_str(),
            row.reason,
            row.source,
            now,
        ],
    )
}

fn insert_pattern_on(conn: &Connection, row: &PatternSignalRow, now: i64) -> rusqlite::Result<bool> {
    let n = conn.execute(
        "INSERT INTO pattern_signal (code, pattern_type, ref_date, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(code, pattern_type, ref_date) DO NOTHING",
        params![row.code, row.pattern_type.as_str(), row.ref_date, row.reason, now],
    )?;
    Ok(n > 0)
}
