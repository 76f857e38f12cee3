use crate::domain::bar::DailyBar;
use crate::domain::ticker::Ticker;
use serde::{Deserialize, Serialize};

/// Number of most recent bars a metric is derived from.
pub const METRIC_WINDOW: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetric {
    pub symbol: Ticker,
    pub close_price: f64,
    pub daily_change_pct: f64,
    pub intraday_range_pct: f64,
}

/// Result of deriving a metric from fetched bars. Only `Computed` reaches the report.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricOutcome {
    Computed(DailyMetric),
    /// Fewer than two bars came back; the ticker is skipped.
    InsufficientHistory { symbol: Ticker, bars: usize },
    /// A zero or negative close would divide by zero; the ticker is skipped.
    UnusablePrices { symbol: Ticker },
}

impl MetricOutcome {
    pub fn into_metric(self) -> Option<DailyMetric> {
        match self {
            MetricOutcome::Computed(m) => Some(m),
            MetricOutcome::InsufficientHistory { .. } | MetricOutcome::UnusablePrices { .. } => None,
        }
    }
}

impl DailyMetric {
    /// `bars` must be ascending by date. The last two bars are today and yesterday.
    pub fn from_bars(symbol: Ticker, bars: &[DailyBar]) -> MetricOutcome {
        if bars.len() < METRIC_WINDOW {
            return MetricOutcome::InsufficientHistory {
                symbol,
                bars: bars.len(),
            };
        }

        let today = &bars[bars.len() - 1];
        let yesterday = &bars[bars.len() - 2];

        if !(today.close > 0.0 && yesterday.close > 0.0) {
            return MetricOutcome::UnusablePrices { symbol };
        }

        let change_pct = (today.close - yesterday.close) / yesterday.close * 100.0;
        let range_pct = (today.high - today.low) / today.close * 100.0;

        MetricOutcome::Computed(DailyMetric {
            symbol,
            close_price: round2(today.close),
            daily_change_pct: round2(change_pct),
            intraday_range_pct: round2(range_pct),
        })
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
