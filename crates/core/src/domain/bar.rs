use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily price bar. Only the fields the report consumes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: f64,
    pub high: f64,
    pub low: f64,
}
