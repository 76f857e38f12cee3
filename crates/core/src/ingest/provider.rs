use crate::config::{MarketDataSettings, MAX_MARKET_DATA_RETRIES};
use crate::domain::bar::DailyBar;
use crate::domain::ticker::Ticker;
use crate::ingest::types::{ChartResponse, ChartResult, HistoryRange};
use anyhow::{Context, Result};
use chrono::DateTime;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

const CHART_PATH: &str = "/v8/finance/chart";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";
const MAX_BACKOFF_SECS: u64 = 8;

#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Daily bars for `ticker`, ascending by date.
    async fn fetch_daily_bars(&self, ticker: &Ticker, range: HistoryRange) -> Result<Vec<DailyBar>>;
}

#[derive(Debug, Clone)]
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl YahooChartClient {
    pub fn from_settings(settings: &MarketDataSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            retries: settings.retries.clamp(1, MAX_MARKET_DATA_RETRIES),
        })
    }

    fn url(&self, ticker: &Ticker) -> String {
        format!(
            "{}{}/{}",
            self.base_url.trim_end_matches('/'),
            CHART_PATH,
            ticker.as_str()
        )
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers
    }

    async fn fetch_once(&self, ticker: &Ticker, range: HistoryRange) -> Result<Vec<DailyBar>> {
        let res = self
            .http
            .get(self.url(ticker))
            .headers(Self::headers())
            .query(&[("range", range.as_query()), ("interval", "1d")])
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;

        // Yahoo reports unknown symbols as 404 with a JSON error body, so decode before the status check.
        let parsed = serde_json::from_str::<ChartResponse>(&text);
        if !status.is_success() {
            let detail = parsed
                .ok()
                .and_then(|r| r.chart.error)
                .map(|e| format!("{}: {}", e.code, e.description.unwrap_or_default()))
                .unwrap_or(text);
            anyhow::bail!("market data HTTP {status} for {ticker}: {detail}");
        }

        let parsed = parsed
            .with_context(|| format!("failed to parse chart response for {ticker}"))?;
        bars_from_chart(parsed).with_context(|| format!("invalid chart payload for {ticker}"))
    }
}

#[async_trait::async_trait]
impl MarketDataClient for YahooChartClient {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_daily_bars(&self, ticker: &Ticker, range: HistoryRange) -> Result<Vec<DailyBar>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(ticker, range).await {
                Ok(bars) => return Ok(bars),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = backoff_after(attempt);
                    tracing::warn!(attempt, %ticker, ?backoff, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn backoff_after(attempt: u32) -> Duration {
    let secs = 1u64 << attempt.saturating_sub(1).min(8);
    Duration::from_secs(secs.min(MAX_BACKOFF_SECS))
}

/// Flattens the column-oriented chart payload into bars, dropping rows with
/// missing close/high/low and any duplicate dates (the later row wins).
pub fn bars_from_chart(resp: ChartResponse) -> Result<Vec<DailyBar>> {
    if let Some(err) = resp.chart.error {
        anyhow::bail!(
            "provider error {}: {}",
            err.code,
            err.description.unwrap_or_default()
        );
    }

    let Some(result) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    collect_bars(result)
}

fn collect_bars(result: ChartResult) -> Result<Vec<DailyBar>> {
    let offset = result.meta.gmtoffset;
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };

    let mut bars: Vec<DailyBar> = Vec::with_capacity(result.timestamp.len());
    for (idx, ts) in result.timestamp.iter().enumerate() {
        let close = quote.close.get(idx).copied().flatten();
        let high = quote.high.get(idx).copied().flatten();
        let low = quote.low.get(idx).copied().flatten();
        let (Some(close), Some(high), Some(low)) = (close, high, low) else {
            continue;
        };

        let date = DateTime::from_timestamp(ts + offset, 0)
            .with_context(|| format!("timestamp out of range: {ts}"))?
            .date_naive();
        bars.push(DailyBar {
            date,
            close,
            high,
            low,
        });
    }

    bars.sort_by_key(|b| b.date);
    let mut deduped: Vec<DailyBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match deduped.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => deduped.push(bar),
        }
    }
    Ok(deduped)
}
