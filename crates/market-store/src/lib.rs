//! Read-only SQLite access to the platform's factor and price tables.
//!
//! Query contracts the engine relies on:
//! - `factor_snapshots` performs the as-of fundamentals join in SQL: each
//!   technical row is matched to the latest fundamentals row with effective
//!   date on or before the evaluation date, never an exact-date join.
//! - `coverage` counts distinct tickers per trading day whose core technical
//!   signals are present, with excluded tickers filtered out.
//! - `prices_from` returns ascending bars with strictly positive adjusted
//!   closes, capped at the requested count.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use research_core::{
    DateCoverage, FactorSnapshot, FactorStore, PriceBar, PriceStore, ResearchError,
    ResearchResult,
};

pub struct MarketDb {
    pool: SqlitePool,
}

impl MarketDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the factor/price tables if they don't exist. Production runs
    /// point at the ingestion service's database; this exists for tests and
    /// local bootstrapping.
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS factors_technical (
                ticker TEXT NOT NULL,
                date TEXT NOT NULL,
                momentum_1m REAL,
                momentum_3m REAL,
                momentum_6m REAL,
                momentum_12m REAL,
                momentum_24m REAL,
                reversal_1w REAL,
                volatility_1m REAL,
                volatility_3m REAL,
                volatility_6m REAL,
                volatility_12m REAL,
                beta REAL,
                idio_volatility REAL,
                january_dummy REAL,
                PRIMARY KEY (ticker, date)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS fundamentals (
                ticker TEXT NOT NULL,
                effective_date TEXT NOT NULL,
                book_to_market REAL,
                earnings_to_price REAL,
                dividend_yield REAL,
                sales_to_price REAL,
                sales_growth REAL,
                market_cap REAL,
                turnover REAL,
                PRIMARY KEY (ticker, effective_date)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS prices (
                ticker TEXT NOT NULL,
                date TEXT NOT NULL,
                adj_close REAL NOT NULL,
                PRIMARY KEY (ticker, date)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl FactorStore for MarketDb {
    async fn coverage(&self, excluded: &[String]) -> ResearchResult<Vec<DateCoverage>> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT date, COUNT(DISTINCT ticker) AS n_tickers
             FROM factors_technical
             WHERE momentum_1m IS NOT NULL AND volatility_1m IS NOT NULL",
        );
        if !excluded.is_empty() {
            qb.push(" AND ticker NOT IN (");
            let mut separated = qb.separated(", ");
            for ticker in excluded {
                separated.push_bind(ticker);
            }
            qb.push(")");
        }
        qb.push(" GROUP BY date ORDER BY date");

        let rows: Vec<CoverageRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ResearchError::Coverage(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| DateCoverage {
                date: r.date,
                n_tickers: r.n_tickers as usize,
            })
            .collect())
    }

    async fn factor_snapshots(&self, date: NaiveDate) -> ResearchResult<Vec<FactorSnapshot>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            "SELECT t.ticker, t.date,
                    t.momentum_1m, t.momentum_3m, t.momentum_6m, t.momentum_12m,
                    t.momentum_24m, t.reversal_1w,
                    t.volatility_1m, t.volatility_3m, t.volatility_6m, t.volatility_12m,
                    t.beta, t.idio_volatility, t.january_dummy,
                    f.book_to_market, f.earnings_to_price, f.dividend_yield,
                    f.sales_to_price, f.sales_growth, f.market_cap, f.turnover
             FROM factors_technical t
             LEFT JOIN fundamentals f
                    ON f.ticker = t.ticker
                   AND f.effective_date = (
                        SELECT MAX(f2.effective_date)
                          FROM fundamentals f2
                         WHERE f2.ticker = t.ticker
                           AND f2.effective_date <= t.date)
             WHERE t.date = ?
             ORDER BY t.ticker",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ResearchError::FactorLoad {
            date,
            detail: e.to_string(),
        })?;

        Ok(rows.into_iter().map(SnapshotRow::into_snapshot).collect())
    }
}

#[async_trait]
impl PriceStore for MarketDb {
    async fn prices_from(
        &self,
        ticker: &str,
        start: NaiveDate,
        limit: usize,
    ) -> ResearchResult<Vec<PriceBar>> {
        let rows: Vec<PriceRow> = sqlx::query_as(
            "SELECT date, adj_close
             FROM prices
             WHERE ticker = ? AND date >= ? AND adj_close > 0
             ORDER BY date ASC
             LIMIT ?",
        )
        .bind(ticker)
        .bind(start)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ResearchError::PriceLoad {
            ticker: ticker.to_string(),
            date: start,
            detail: e.to_string(),
        })?;

        Ok(rows
            .into_iter()
            .map(|r| PriceBar {
                date: r.date,
                adj_close: r.adj_close,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct CoverageRow {
    date: NaiveDate,
    n_tickers: i64,
}

#[derive(sqlx::FromRow)]
struct PriceRow {
    date: NaiveDate,
    adj_close: f64,
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    ticker: String,
    date: NaiveDate,
    momentum_1m: Option<f64>,
    momentum_3m: Option<f64>,
    momentum_6m: Option<f64>,
    momentum_12m: Option<f64>,
    momentum_24m: Option<f64>,
    reversal_1w: Option<f64>,
    volatility_1m: Option<f64>,
    volatility_3m: Option<f64>,
    volatility_6m: Option<f64>,
    volatility_12m: Option<f64>,
    beta: Option<f64>,
    idio_volatility: Option<f64>,
    january_dummy: Option<f64>,
    book_to_market: Option<f64>,
    earnings_to_price: Option<f64>,
    dividend_yield: Option<f64>,
    sales_to_price: Option<f64>,
    sales_growth: Option<f64>,
    market_cap: Option<f64>,
    turnover: Option<f64>,
}

impl SnapshotRow {
    fn into_snapshot(self) -> FactorSnapshot {
        FactorSnapshot {
            ticker: self.ticker,
            date: self.date,
            momentum_1m: self.momentum_1m,
            momentum_3m: self.momentum_3m,
            momentum_6m: self.momentum_6m,
            momentum_12m: self.momentum_12m,
            momentum_24m: self.momentum_24m,
            reversal_1w: self.reversal_1w,
            volatility_1m: self.volatility_1m,
            volatility_3m: self.volatility_3m,
            volatility_6m: self.volatility_6m,
            volatility_12m: self.volatility_12m,
            beta: self.beta,
            idio_volatility: self.idio_volatility,
            january_dummy: self.january_dummy,
            book_to_market: self.book_to_market,
            earnings_to_price: self.earnings_to_price,
            dividend_yield: self.dividend_yield,
            sales_to_price: self.sales_to_price,
            sales_growth: self.sales_growth,
            market_cap: self.market_cap,
            turnover: self.turnover,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_db() -> MarketDb {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = MarketDb::new(pool);
        db.init_schema().await.unwrap();
        db
    }

    async fn insert_technical(db: &MarketDb, ticker: &str, date: &str, momentum: Option<f64>) {
        sqlx::query(
            "INSERT INTO factors_technical (ticker, date, momentum_1m, volatility_1m)
             VALUES (?, ?, ?, 0.2)",
        )
        .bind(ticker)
        .bind(date.parse::<NaiveDate>().unwrap())
        .bind(momentum)
        .execute(&db.pool)
        .await
        .unwrap();
    }

    async fn insert_fundamentals(db: &MarketDb, ticker: &str, effective: &str, market_cap: f64) {
        sqlx::query(
            "INSERT INTO fundamentals (ticker, effective_date, market_cap, turnover)
             VALUES (?, ?, ?, 0.005)",
        )
        .bind(ticker)
        .bind(effective.parse::<NaiveDate>().unwrap())
        .bind(market_cap)
        .execute(&db.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_as_of_join_picks_latest_not_later_row() {
        let db = test_db().await;
        insert_technical(&db, "EQNR", "2023-06-30", Some(0.03)).await;
        insert_fundamentals(&db, "EQNR", "2023-03-31", 1.0e9).await;
        insert_fundamentals(&db, "EQNR", "2023-06-15", 2.0e9).await;
        insert_fundamentals(&db, "EQNR", "2023-07-15", 3.0e9).await; // in the future

        let snapshots = db
            .factor_snapshots("2023-06-30".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].market_cap, Some(2.0e9));
    }

    #[tokio::test]
    async fn test_missing_fundamentals_stay_null() {
        let db = test_db().await;
        insert_technical(&db, "DNB", "2023-06-30", Some(0.01)).await;

        let snapshots = db
            .factor_snapshots("2023-06-30".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].market_cap, None);
        assert!(!snapshots[0].has_core_signals());
    }

    #[tokio::test]
    async fn test_coverage_applies_exclusions_and_core_signal_filter() {
        let db = test_db().await;
        insert_technical(&db, "EQNR", "2023-06-30", Some(0.03)).await;
        insert_technical(&db, "DNB", "2023-06-30", Some(0.01)).await;
        insert_technical(&db, "OBX", "2023-06-30", Some(0.02)).await;
        insert_technical(&db, "TEL", "2023-06-30", None).await; // no core momentum

        let coverage = db.coverage(&["OBX".to_string()]).await.unwrap();
        assert_eq!(coverage.len(), 1);
        assert_eq!(coverage[0].n_tickers, 2);
    }

    #[tokio::test]
    async fn test_prices_ascending_positive_and_limited() {
        let db = test_db().await;
        for (date, close) in [
            ("2023-06-30", 100.0),
            ("2023-07-03", -1.0), // bad row, filtered
            ("2023-07-04", 101.0),
            ("2023-07-05", 102.0),
        ] {
            sqlx::query("INSERT INTO prices (ticker, date, adj_close) VALUES ('EQNR', ?, ?)")
                .bind(date.parse::<NaiveDate>().unwrap())
                .bind(close)
                .execute(&db.pool)
                .await
                .unwrap();
        }

        let bars = db
            .prices_from("EQNR", "2023-06-30".parse().unwrap(), 2)
            .await
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].adj_close, 100.0);
        assert_eq!(bars[1].adj_close, 101.0);
    }
}
