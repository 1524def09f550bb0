use chrono::NaiveDate;
use thiserror::Error;

/// Fatal engine errors. Data insufficiency (thin months, unresolvable forward
/// windows) is never an error — those units are skipped upstream.
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("coverage query failed: {0}")]
    Coverage(String),

    #[error("factor load failed for {date}: {detail}")]
    FactorLoad { date: NaiveDate, detail: String },

    #[error("price load failed for {ticker} as of {date}: {detail}")]
    PriceLoad {
        ticker: String,
        date: NaiveDate,
        detail: String,
    },

    #[error("model call failed for {ticker} as of {date}: {detail}")]
    Model {
        ticker: String,
        date: NaiveDate,
        detail: String,
    },

    #[error("persistence failed at batch {batch}: {detail}")]
    Persistence { batch: usize, detail: String },

    #[error("no rebalance dates with at least {min_tickers} eligible tickers")]
    NoRebalanceDates { min_tickers: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type ResearchResult<T> = Result<T, ResearchError>;
