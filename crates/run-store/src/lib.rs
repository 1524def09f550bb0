//! Append-only run persistence with conflict-skip idempotency.
//!
//! Outcomes are keyed by (run id, ticker, evaluation date), monthly rows by
//! (run id, month), the summary by run id. Every write is `ON CONFLICT DO
//! NOTHING` — first write wins, so a partially-completed run can be retried
//! safely. Outcome writes go out in fixed-size multi-row batches to stay
//! under the backend's bind-parameter limit; each batch commits on its own,
//! so a rejected batch never corrupts the ones before it.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use research_core::{
    MonthlyMetrics, Outcome, ResearchError, ResearchResult, RunStore, RunSummary,
};

/// Rows per outcome insert statement.
const OUTCOME_BATCH: usize = 100;

pub struct RunDb {
    pool: SqlitePool,
}

impl RunDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the run tables if they don't exist.
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS wf_runs (
                run_id TEXT PRIMARY KEY,
                model_version TEXT NOT NULL,
                config_json TEXT NOT NULL,
                start_month TEXT,
                end_month TEXT,
                n_months INTEGER NOT NULL,
                n_outcomes INTEGER NOT NULL,
                ic_mean REAL NOT NULL,
                ic_std REAL NOT NULL,
                icir REAL NOT NULL,
                ic_positive_share REAL NOT NULL,
                total_long_short_return REAL NOT NULL,
                annualized_long_short_return REAL NOT NULL,
                sharpe REAL NOT NULL,
                max_drawdown REAL NOT NULL,
                calibration_90 REAL NOT NULL,
                calibration_50 REAL NOT NULL,
                regimes_json TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS wf_monthly (
                run_id TEXT NOT NULL,
                month TEXT NOT NULL,
                n_tickers INTEGER NOT NULL,
                hit_rate REAL NOT NULL,
                mae REAL NOT NULL,
                ic REAL NOT NULL,
                long_short_return REAL NOT NULL,
                calibration_90 REAL NOT NULL,
                calibration_50 REAL NOT NULL,
                PRIMARY KEY (run_id, month)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS wf_outcomes (
                run_id TEXT NOT NULL,
                ticker TEXT NOT NULL,
                eval_date TEXT NOT NULL,
                predicted_return REAL NOT NULL,
                p05 REAL NOT NULL,
                p25 REAL NOT NULL,
                p50 REAL NOT NULL,
                p75 REAL NOT NULL,
                p95 REAL NOT NULL,
                confidence REAL NOT NULL,
                size_regime TEXT,
                turnover_regime TEXT,
                actual_return REAL,
                target_date TEXT,
                quintile INTEGER,
                direction_correct INTEGER,
                PRIMARY KEY (run_id, ticker, eval_date)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RunStore for RunDb {
    async fn save_outcomes(&self, run_id: &str, outcomes: &[Outcome]) -> ResearchResult<()> {
        for (batch, chunk) in outcomes.chunks(OUTCOME_BATCH).enumerate() {
            let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
                "INSERT INTO wf_outcomes (
                    run_id, ticker, eval_date, predicted_return,
                    p05, p25, p50, p75, p95, confidence,
                    size_regime, turnover_regime,
                    actual_return, target_date, quintile, direction_correct
                ) ",
            );
            qb.push_values(chunk.iter(), |mut b, o| {
                let band = o.prediction.percentiles;
                b.push_bind(run_id)
                    .push_bind(&o.ticker)
                    .push_bind(o.date)
                    .push_bind(o.prediction.point_estimate)
                    .push_bind(band.p05)
                    .push_bind(band.p25)
                    .push_bind(band.p50)
                    .push_bind(band.p75)
                    .push_bind(band.p95)
                    .push_bind(o.prediction.confidence)
                    .push_bind(o.prediction.size_regime.map(|r| r.as_str()))
                    .push_bind(o.prediction.turnover_regime.map(|r| r.as_str()))
                    .push_bind(o.actual_return)
                    .push_bind(o.target_date)
                    .push_bind(o.quintile.map(i64::from))
                    .push_bind(o.direction_correct);
            });
            qb.push(" ON CONFLICT(run_id, ticker, eval_date) DO NOTHING");

            qb.build()
                .execute(&self.pool)
                .await
                .map_err(|e| ResearchError::Persistence {
                    batch,
                    detail: e.to_string(),
                })?;
            debug!(run_id, batch, rows = chunk.len(), "outcome batch written");
        }
        Ok(())
    }

    async fn save_monthly(&self, run_id: &str, monthly: &[MonthlyMetrics]) -> ResearchResult<()> {
        for (batch, m) in monthly.iter().enumerate() {
            sqlx::query(
                "INSERT INTO wf_monthly (
                    run_id, month, n_tickers, hit_rate, mae, ic,
                    long_short_return, calibration_90, calibration_50
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(run_id, month) DO NOTHING",
            )
            .bind(run_id)
            .bind(m.month)
            .bind(m.n_tickers as i64)
            .bind(m.hit_rate)
            .bind(m.mae)
            .bind(m.ic)
            .bind(m.long_short_return)
            .bind(m.calibration_90)
            .bind(m.calibration_50)
            .execute(&self.pool)
            .await
            .map_err(|e| ResearchError::Persistence {
                batch,
                detail: e.to_string(),
            })?;
        }
        Ok(())
    }

    async fn save_summary(&self, summary: &RunSummary) -> ResearchResult<()> {
        let config_json =
            serde_json::to_string(&summary.config).map_err(|e| ResearchError::Persistence {
                batch: 0,
                detail: e.to_string(),
            })?;
        let regimes_json =
            serde_json::to_string(&summary.regimes).map_err(|e| ResearchError::Persistence {
                batch: 0,
                detail: e.to_string(),
            })?;

        sqlx::query(
            "INSERT INTO wf_runs (
                run_id, model_version, config_json, start_month, end_month,
                n_months, n_outcomes, ic_mean, ic_std, icir, ic_positive_share,
                total_long_short_return, annualized_long_short_return,
                sharpe, max_drawdown, calibration_90, calibration_50, regimes_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(run_id) DO NOTHING",
        )
        .bind(&summary.run_id)
        .bind(&summary.model_version)
        .bind(config_json)
        .bind(summary.start_month)
        .bind(summary.end_month)
        .bind(summary.n_months as i64)
        .bind(summary.n_outcomes as i64)
        .bind(summary.ic_mean)
        .bind(summary.ic_std)
        .bind(summary.icir)
        .bind(summary.ic_positive_share)
        .bind(summary.total_long_short_return)
        .bind(summary.annualized_long_short_return)
        .bind(summary.sharpe)
        .bind(summary.max_drawdown)
        .bind(summary.calibration_90)
        .bind(summary.calibration_50)
        .bind(regimes_json)
        .execute(&self.pool)
        .await
        .map_err(|e| ResearchError::Persistence {
            batch: 0,
            detail: e.to_string(),
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use research_core::{BacktestConfig, PercentileBand, Prediction};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_db() -> RunDb {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = RunDb::new(pool);
        db.init_schema().await.unwrap();
        db
    }

    fn outcome(ticker: &str, point: f64) -> Outcome {
        let mut o = Outcome::unresolved(
            ticker.to_string(),
            "2023-01-31".parse::<NaiveDate>().unwrap(),
            Prediction {
                point_estimate: point,
                percentiles: PercentileBand {
                    p05: point - 0.1,
                    p25: point - 0.05,
                    p50: point,
                    p75: point + 0.05,
                    p95: point + 0.1,
                },
                confidence: 0.7,
                size_regime: None,
                turnover_regime: None,
            },
        );
        o.resolve(point, "2023-03-01".parse().unwrap());
        o
    }

    async fn outcome_count(db: &RunDb, run_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM wf_outcomes WHERE run_id = ?")
            .bind(run_id)
            .fetch_one(&db.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_double_write_is_idempotent() {
        let db = test_db().await;
        let outcomes = vec![outcome("EQNR", 0.02)];

        db.save_outcomes("run-1", &outcomes).await.unwrap();
        db.save_outcomes("run-1", &outcomes).await.unwrap();

        assert_eq!(outcome_count(&db, "run-1").await, 1);
    }

    #[tokio::test]
    async fn test_batches_cross_the_chunk_boundary() {
        let db = test_db().await;
        // 250 rows → 3 chunks (100 + 100 + 50)
        let outcomes: Vec<Outcome> = (0..250).map(|i| outcome(&format!("T{i:03}"), 0.01)).collect();

        db.save_outcomes("run-1", &outcomes).await.unwrap();

        assert_eq!(outcome_count(&db, "run-1").await, 250);
    }

    #[tokio::test]
    async fn test_distinct_runs_do_not_collide() {
        let db = test_db().await;
        let outcomes = vec![outcome("EQNR", 0.02)];

        db.save_outcomes("run-1", &outcomes).await.unwrap();
        db.save_outcomes("run-2", &outcomes).await.unwrap();

        assert_eq!(outcome_count(&db, "run-1").await, 1);
        assert_eq!(outcome_count(&db, "run-2").await, 1);
    }

    #[tokio::test]
    async fn test_monthly_and_summary_first_write_wins() {
        let db = test_db().await;
        let month: NaiveDate = "2023-01-31".parse().unwrap();
        let row = MonthlyMetrics {
            month,
            n_tickers: 12,
            hit_rate: 0.6,
            mae: 0.05,
            ic: 0.2,
            long_short_return: 0.01,
            calibration_90: 0.9,
            calibration_50: 0.5,
        };
        let mut changed = row.clone();
        changed.ic = -0.5;

        db.save_monthly("run-1", &[row]).await.unwrap();
        db.save_monthly("run-1", &[changed]).await.unwrap();

        let ic: f64 =
            sqlx::query_scalar("SELECT ic FROM wf_monthly WHERE run_id = 'run-1' AND month = ?")
                .bind(month)
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(ic, 0.2);

        let summary = RunSummary {
            run_id: "run-1".to_string(),
            model_version: "v1".to_string(),
            config: BacktestConfig::default(),
            start_month: Some(month),
            end_month: Some(month),
            n_months: 1,
            n_outcomes: 12,
            ic_mean: 0.2,
            ic_std: 0.0,
            icir: 0.0,
            ic_positive_share: 1.0,
            total_long_short_return: 0.01,
            annualized_long_short_return: 0.12,
            sharpe: 0.0,
            max_drawdown: 0.0,
            calibration_90: 0.9,
            calibration_50: 0.5,
            regimes: Vec::new(),
        };
        db.save_summary(&summary).await.unwrap();
        db.save_summary(&summary).await.unwrap();

        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wf_runs")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(n, 1);
    }
}
