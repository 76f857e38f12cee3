use crate::domain::bar::DailyBar;
use crate::domain::metric::{DailyMetric, MetricOutcome};
use crate::domain::ticker::Ticker;
use crate::ingest::provider::MarketDataClient;
use crate::ingest::types::HistoryRange;
use crate::report::chart::render_chart_pdf;
use crate::report::html::{build_report_html, ReportHtml};
use crate::report::pdf::{render_pdf, PdfConverter};
use anyhow::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub metrics: Vec<DailyMetric>,
    pub html: ReportHtml,
    pub pdf_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ChartArtifact {
    pub ticker: Ticker,
    pub bars: Vec<DailyBar>,
    pub pdf_path: PathBuf,
}

/// Metrics for `tickers` in input order. Tickers without two usable bars are left out.
pub async fn compute_metrics(client: &dyn MarketDataClient, tickers: &[Ticker]) -> Vec<DailyMetric> {
    let mut out = Vec::with_capacity(tickers.len());

    for ticker in tickers {
        let bars = match client.fetch_daily_bars(ticker, HistoryRange::TwoDays).await {
            Ok(bars) => bars,
            Err(err) => {
                tracing::warn!(
                    %ticker,
                    provider = client.provider_name(),
                    error = %format!("{err:#}"),
                    "quote fetch failed; skipping ticker"
                );
                continue;
            }
        };

        match DailyMetric::from_bars(ticker.clone(), &bars) {
            MetricOutcome::Computed(metric) => out.push(metric),
            MetricOutcome::InsufficientHistory { symbol, bars } => {
                tracing::debug!(ticker = %symbol, bars, "insufficient history; skipping ticker");
            }
            MetricOutcome::UnusablePrices { symbol } => {
                tracing::debug!(ticker = %symbol, "non-positive close; skipping ticker");
            }
        }
    }

    out
}

/// Fetches live quotes and renders `reporte.html`/`reporte.pdf` under `dir`.
pub async fn generate_report(
    client: &dyn MarketDataClient,
    converter: &dyn PdfConverter,
    tickers: &[Ticker],
    dir: &Path,
) -> Result<GeneratedReport> {
    tracing::info!(tickers = tickers.len(), provider = client.provider_name(), "fetching quotes");
    let metrics = compute_metrics(client, tickers).await;
    tracing::info!(computed = metrics.len(), skipped = tickers.len() - metrics.len(), "metrics computed");

    let html = build_report_html(&metrics);
    let pdf_path = render_pdf(converter, &html, dir).await?;

    Ok(GeneratedReport {
        metrics,
        html,
        pdf_path,
    })
}

/// Fetches a month of closes for `ticker` and renders `grafico_<TICKER>.pdf` under `dir`.
pub async fn generate_chart(
    client: &dyn MarketDataClient,
    converter: &dyn PdfConverter,
    ticker: &Ticker,
    dir: &Path,
) -> Result<ChartArtifact> {
    let bars = client.fetch_daily_bars(ticker, HistoryRange::OneMonth).await?;
    let pdf_path = render_chart_pdf(converter, ticker, &bars, dir).await?;
    Ok(ChartArtifact {
        ticker: ticker.clone(),
        bars,
        pdf_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::compose::compose_email;
    use crate::testing::{StaticMarketData, StubConverter};
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64, high: f64, low: f64) -> DailyBar {
        DailyBar {
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            close,
            high,
            low,
        }
    }

    fn market() -> StaticMarketData {
        StaticMarketData::default()
            .with_bars("AAPL", vec![bar(2, 100.0, 101.0, 99.0), bar(3, 150.0, 153.0, 147.0)])
            .with_bars("GOOGL", vec![bar(3, 170.0, 171.0, 169.0)])
            .with_bars("MSFT", vec![bar(2, 400.0, 402.0, 398.0), bar(3, 404.0, 406.0, 400.0)])
    }

    #[tokio::test]
    async fn skips_short_history_and_keeps_input_order() {
        let client = market();
        let metrics = compute_metrics(&client, &Ticker::watchlist()).await;

        let symbols: Vec<&str> = metrics.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(metrics[0].daily_change_pct, 50.00);
        assert_eq!(metrics[1].daily_change_pct, 1.00);
        assert!(client
            .requests()
            .iter()
            .all(|(_, range)| *range == HistoryRange::TwoDays));
    }

    #[tokio::test]
    async fn fetch_failure_is_skipped_not_raised() {
        let client = market().failing_for("AAPL");
        let metrics = compute_metrics(&client, &Ticker::watchlist()).await;
        let symbols: Vec<&str> = metrics.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["MSFT"]);
    }

    #[tokio::test]
    async fn end_to_end_report_and_email() {
        let dir = tempfile::tempdir().unwrap();
        let client = market();
        let converter = StubConverter::default();
        let tickers = Ticker::watchlist();

        let report = generate_report(&client, &converter, &tickers, dir.path()).await.unwrap();
        assert_eq!(report.pdf_path, dir.path().join("reporte.pdf"));
        assert_eq!(report.metrics.len(), 2);

        let chart = generate_chart(&client, &converter, &tickers[2], dir.path()).await.unwrap();
        assert_eq!(chart.pdf_path, dir.path().join("grafico_MSFT.pdf"));

        let email = compose_email("Q1 update", Some("Q1 update"), &report.html, &tickers, dir.path())
            .await
            .unwrap();
        assert!(email.html_body.contains("<h3>Q1 update</h3>"));
        assert!(email.html_body.contains("<td>AAPL</td>"));
        assert!(email.html_body.contains("150.0"));
        assert_eq!(email.attachment_names(), vec!["reporte.pdf", "grafico_MSFT.pdf"]);
    }

    #[tokio::test]
    async fn chart_uses_one_month_range() {
        let dir = tempfile::tempdir().unwrap();
        let client = market();
        let ticker = Ticker::parse("AAPL").unwrap();
        generate_chart(&client, &StubConverter::default(), &ticker, dir.path())
            .await
            .unwrap();
        assert_eq!(client.requests(), vec![("AAPL".to_string(), HistoryRange::OneMonth)]);
    }

    #[tokio::test]
    async fn chart_without_history_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ticker = Ticker::parse("TSLA").unwrap();
        let res = generate_chart(&market(), &StubConverter::default(), &ticker, dir.path()).await;
        assert!(res.is_err());
        assert!(!dir.path().join("grafico_TSLA.pdf").exists());
    }
}
