use crate::domain::bar::DailyBar;
use crate::domain::ticker::Ticker;
use crate::report::pdf::{convert_document, PdfConverter};
use crate::report::{chart_html_file_name, chart_pdf_path, escape_html};
use anyhow::{ensure, Result};
use std::path::{Path, PathBuf};

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 60.0;
const Y_TICKS: usize = 5;
const MAX_X_LABELS: usize = 8;
const LINE_COLOR: &str = "#1f4fd1";

struct Frame {
    min: f64,
    max: f64,
    count: usize,
}

impl Frame {
    fn new(bars: &[DailyBar]) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for b in bars {
            min = min.min(b.close);
            max = max.max(b.close);
        }
        let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
        Self {
            min: min - pad,
            max: max + pad,
            count: bars.len(),
        }
    }

    fn plot_width(&self) -> f64 {
        WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height(&self) -> f64 {
        HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn x(&self, idx: usize) -> f64 {
        if self.count <= 1 {
            return MARGIN_LEFT + self.plot_width() / 2.0;
        }
        MARGIN_LEFT + self.plot_width() * (idx as f64) / ((self.count - 1) as f64)
    }

    fn y(&self, price: f64) -> f64 {
        MARGIN_TOP + self.plot_height() * (self.max - price) / (self.max - self.min)
    }
}

/// Line chart of closing prices, one point per bar.
pub fn render_chart_svg(ticker: &Ticker, bars: &[DailyBar]) -> Result<String> {
    ensure!(!bars.is_empty(), "no price history to chart for {ticker}");

    let frame = Frame::new(bars);
    let bottom = MARGIN_TOP + frame.plot_height();
    let right = MARGIN_LEFT + frame.plot_width();
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" viewBox=\"0 0 {WIDTH} {HEIGHT}\" font-family=\"Helvetica, Arial, sans-serif\">\n"
    ));
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"24\" font-size=\"16\" text-anchor=\"middle\">Closing Price - {}</text>\n",
        WIDTH / 2.0,
        escape_html(ticker.as_str())
    ));

    // Horizontal grid with price labels.
    for i in 0..=Y_TICKS {
        let price = frame.min + (frame.max - frame.min) * (i as f64) / (Y_TICKS as f64);
        let y = frame.y(price);
        svg.push_str(&format!(
            "<line x1=\"{MARGIN_LEFT:.1}\" y1=\"{y:.1}\" x2=\"{right:.1}\" y2=\"{y:.1}\" stroke=\"#ddd\"/>\n"
        ));
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"10\" text-anchor=\"end\">{price:.2}</text>\n",
            MARGIN_LEFT - 6.0,
            y + 3.0
        ));
    }

    // Vertical grid with thinned date labels.
    let step = bars.len().div_ceil(MAX_X_LABELS).max(1);
    for (idx, bar) in bars.iter().enumerate() {
        let x = frame.x(idx);
        svg.push_str(&format!(
            "<line x1=\"{x:.1}\" y1=\"{MARGIN_TOP:.1}\" x2=\"{x:.1}\" y2=\"{bottom:.1}\" stroke=\"#eee\"/>\n"
        ));
        if idx % step == 0 || idx + 1 == bars.len() {
            svg.push_str(&format!(
                "<text x=\"{x:.1}\" y=\"{:.1}\" font-size=\"10\" text-anchor=\"middle\">{}</text>\n",
                bottom + 14.0,
                bar.date.format("%Y-%m-%d")
            ));
        }
    }

    svg.push_str(&format!(
        "<rect x=\"{MARGIN_LEFT:.1}\" y=\"{MARGIN_TOP:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"none\" stroke=\"#333\"/>\n",
        frame.plot_width(),
        frame.plot_height()
    ));

    let points: Vec<String> = bars
        .iter()
        .enumerate()
        .map(|(idx, b)| format!("{:.1},{:.1}", frame.x(idx), frame.y(b.close)))
        .collect();
    svg.push_str(&format!(
        "<polyline points=\"{}\" fill=\"none\" stroke=\"{LINE_COLOR}\" stroke-width=\"2\"/>\n",
        points.join(" ")
    ));
    for (idx, b) in bars.iter().enumerate() {
        svg.push_str(&format!(
            "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"{LINE_COLOR}\"/>\n",
            frame.x(idx),
            frame.y(b.close)
        ));
    }

    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"12\" text-anchor=\"middle\">Date</text>\n",
        MARGIN_LEFT + frame.plot_width() / 2.0,
        HEIGHT - 12.0
    ));
    svg.push_str(&format!(
        "<text x=\"16\" y=\"{:.1}\" font-size=\"12\" text-anchor=\"middle\" transform=\"rotate(-90 16 {:.1})\">USD</text>\n",
        MARGIN_TOP + frame.plot_height() / 2.0,
        MARGIN_TOP + frame.plot_height() / 2.0
    ));
    svg.push_str("</svg>");
    Ok(svg)
}

pub fn chart_document(ticker: &Ticker, svg: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{svg}\n</body>\n</html>\n",
        escape_html(ticker.as_str())
    )
}

/// Renders `<dir>/grafico_<TICKER>.pdf`, overwriting any previous chart for that ticker.
pub async fn render_chart_pdf(
    converter: &dyn PdfConverter,
    ticker: &Ticker,
    bars: &[DailyBar],
    dir: &Path,
) -> Result<PathBuf> {
    let svg = render_chart_svg(ticker, bars)?;
    let html_path = dir.join(chart_html_file_name(ticker));
    let pdf_path = chart_pdf_path(dir, ticker);
    convert_document(converter, &chart_document(ticker, &svg), &html_path, &pdf_path).await?;
    tracing::info!(%ticker, bars = bars.len(), path = %pdf_path.display(), "chart pdf rendered");
    Ok(pdf_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubConverter;
    use chrono::NaiveDate;

    fn bars(closes: &[f64]) -> Vec<DailyBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| DailyBar {
                date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap() + chrono::Days::new(i as u64),
                close: c,
                high: c + 1.0,
                low: c - 1.0,
            })
            .collect()
    }

    #[test]
    fn svg_has_title_axes_and_one_marker_per_bar() {
        let t = Ticker::parse("MSFT").unwrap();
        let svg = render_chart_svg(&t, &bars(&[400.0, 405.5, 398.2, 410.0])).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Closing Price - MSFT"));
        assert!(svg.contains(">Date</text>"));
        assert!(svg.contains(">USD</text>"));
        assert_eq!(svg.matches("<circle").count(), 4);
        assert!(svg.contains("2026-02-01"));
        assert!(svg.contains("2026-02-04"));
    }

    #[test]
    fn highest_close_is_plotted_above_lowest() {
        let f = Frame::new(&bars(&[100.0, 120.0]));
        assert!(f.y(120.0) < f.y(100.0));
        assert!(f.y(120.0) > MARGIN_TOP);
        assert!(f.y(100.0) < HEIGHT - MARGIN_BOTTOM);
    }

    #[test]
    fn flat_series_and_single_bar_stay_finite() {
        let t = Ticker::parse("AAPL").unwrap();
        let svg = render_chart_svg(&t, &bars(&[150.0])).unwrap();
        assert!(!svg.contains("NaN"));
        assert!(!svg.contains("inf"));
        assert_eq!(svg.matches("<circle").count(), 1);
    }

    #[test]
    fn empty_history_is_an_error() {
        let t = Ticker::parse("AAPL").unwrap();
        assert!(render_chart_svg(&t, &[]).is_err());
    }

    #[tokio::test]
    async fn writes_chart_pdf_keyed_by_ticker() {
        let dir = tempfile::tempdir().unwrap();
        let t = Ticker::parse("GOOGL").unwrap();
        let path = render_chart_pdf(&StubConverter::default(), &t, &bars(&[170.0, 172.5]), dir.path())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("grafico_GOOGL.pdf"));
        assert!(path.exists());
        assert!(dir.path().join("grafico_GOOGL.html").exists());
    }
}
