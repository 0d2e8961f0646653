use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use common::{CycleFailure, CycleStage, Error, Result, TradeAction, TradeRecord};

/// Append-only SQLite store of trading cycles.
///
/// The public API can add rows and read them back; there is no way to
/// update or delete a [`TradeRecord`] once written.
#[derive(Clone)]
pub struct TradeLedger {
    pool: SqlitePool,
}

impl TradeLedger {
    /// Open (creating if needed) the database at `database_url` and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to ":memory:" is its own database, so keep exactly one alive.
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;

        sqlx::migrate!("../../migrations").run(&pool).await?;
        info!(url = %database_url, "Trade ledger ready");

        Ok(Self { pool })
    }

    /// Fresh in-memory ledger, mainly for tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Persist one cycle outcome and return its row id.
    pub async fn append(&self, record: &TradeRecord) -> Result<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO trades (
                timestamp, action, size_percent, rationale, base_balance,
                quote_balance, avg_cost_basis, market_price, reflection
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(format_ts(&record.timestamp))
        .bind(record.action)
        .bind(record.size_percent as i64)
        .bind(&record.rationale)
        .bind(record.base_balance)
        .bind(record.quote_balance)
        .bind(record.avg_cost_basis)
        .bind(record.market_price)
        .bind(&record.reflection)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id = id, action = %record.action, size = record.size_percent, "Trade record appended");
        Ok(id)
    }

    /// Records from the last `window`, oldest first.
    pub async fn recent_window(&self, window: chrono::Duration) -> Result<Vec<TradeRecord>> {
        let since = Utc::now()
            .checked_sub_signed(window)
            .ok_or_else(|| Error::Other(format!("trade window of {window} reaches past the calendar")))?;
        self.since(since).await
    }

    /// Records at or after `since`, oldest first (insertion order breaks ties).
    pub async fn since(&self, since: DateTime<Utc>) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query(
            r"
            SELECT timestamp, action, size_percent, rationale, base_balance,
                   quote_balance, avg_cost_basis, market_price, reflection
            FROM trades
            WHERE timestamp >= ?1
            ORDER BY timestamp ASC, id ASC
            ",
        )
        .bind(format_ts(&since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(trade_from_row).collect()
    }

    /// One page of records, newest first, with the total row count.
    pub async fn page(&self, limit: i64, offset: i64) -> Result<(Vec<TradeRecord>, i64)> {
        let rows = sqlx::query(
            r"
            SELECT timestamp, action, size_percent, rationale, base_balance,
                   quote_balance, avg_cost_basis, market_price, reflection
            FROM trades
            ORDER BY timestamp DESC, id DESC
            LIMIT ?1 OFFSET ?2
            ",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trades")
            .fetch_one(&self.pool)
            .await?;

        let records = rows.iter().map(trade_from_row).collect::<Result<Vec<_>>>()?;
        Ok((records, total))
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM trades")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Audit an aborted cycle. Kept out of `trades`.
    pub async fn record_failure(&self, failure: &CycleFailure) -> Result<()> {
        sqlx::query("INSERT INTO cycle_failures (timestamp, stage, detail) VALUES (?1, ?2, ?3)")
            .bind(format_ts(&failure.timestamp))
            .bind(failure.stage.to_string())
            .bind(&failure.detail)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Most recent aborted cycles, newest first.
    pub async fn failures(&self, limit: i64) -> Result<Vec<CycleFailure>> {
        let rows = sqlx::query(
            "SELECT timestamp, stage, detail FROM cycle_failures ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let stage: String = row.try_get("stage")?;
                Ok(CycleFailure {
                    timestamp: parse_ts(&row.try_get::<String, _>("timestamp")?)?,
                    stage: parse_stage(&stage)?,
                    detail: row.try_get("detail")?,
                })
            })
            .collect()
    }

    /// Close the pool; later calls fail with a database error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn trade_from_row(row: &SqliteRow) -> Result<TradeRecord> {
    let size: i64 = row.try_get("size_percent")?;
    Ok(TradeRecord {
        timestamp: parse_ts(&row.try_get::<String, _>("timestamp")?)?,
        action: row.try_get::<TradeAction, _>("action")?,
        size_percent: u8::try_from(size)
            .map_err(|_| Error::Other(format!("stored size_percent out of range: {size}")))?,
        rationale: row.try_get("rationale")?,
        base_balance: row.try_get("base_balance")?,
        quote_balance: row.try_get("quote_balance")?,
        avg_cost_basis: row.try_get("avg_cost_basis")?,
        market_price: row.try_get("market_price")?,
        reflection: row.try_get("reflection")?,
    })
}

/// Fixed-width UTC form so lexical order in SQLite equals time order.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("bad stored timestamp '{s}': {e}")))
}

fn parse_stage(s: &str) -> Result<CycleStage> {
    match s {
        "snapshot" => Ok(CycleStage::Snapshot),
        "history" => Ok(CycleStage::History),
        "decision" => Ok(CycleStage::Decision),
        "settlement" => Ok(CycleStage::Settlement),
        "persistence" => Ok(CycleStage::Persistence),
        other => Err(Error::Other(format!("unknown cycle stage '{other}'"))),
    }
}
