use crate::domain::metric::DailyMetric;
use crate::report::escape_html;

pub const COLUMNS: [&str; 4] = ["Ticker", "Close Price", "Daily Change (%)", "Daily Range (%)"];

const DOCUMENT_STYLE: &str = "body { font-family: Helvetica, Arial, sans-serif; font-size: 12px; }\n\
table.dataframe { border-collapse: collapse; width: 100%; }\n\
table.dataframe th, table.dataframe td { border: 1px solid #999; padding: 4px 8px; text-align: right; }\n\
table.dataframe th { background: #2c3e50; color: #fff; }\n\
table.dataframe td:first-child { text-align: left; font-weight: bold; }";

/// Rendered report table. Used as-is in the email body and wrapped by
/// [`report_document`] for PDF conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHtml(String);

impl ReportHtml {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

pub fn build_report_html(metrics: &[DailyMetric]) -> ReportHtml {
    let mut out = String::new();
    out.push_str("<table border=\"1\" class=\"dataframe\">\n");
    out.push_str("  <thead>\n    <tr style=\"text-align: right;\">\n");
    for col in COLUMNS {
        out.push_str(&format!("      <th>{}</th>\n", escape_html(col)));
    }
    out.push_str("    </tr>\n  </thead>\n  <tbody>\n");
    for m in metrics {
        out.push_str("    <tr>\n");
        out.push_str(&format!("      <td>{}</td>\n", escape_html(m.symbol.as_str())));
        out.push_str(&format!("      <td>{:.2}</td>\n", m.close_price));
        out.push_str(&format!("      <td>{:.2}</td>\n", m.daily_change_pct));
        out.push_str(&format!("      <td>{:.2}</td>\n", m.intraday_range_pct));
        out.push_str("    </tr>\n");
    }
    out.push_str("  </tbody>\n</table>");
    ReportHtml(out)
}

/// Standalone UTF-8 page around the table; this is what lands in `reporte.html`.
pub fn report_document(report: &ReportHtml) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Stock Report</title>\n<style>\n{DOCUMENT_STYLE}\n</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        report.as_str()
    )
}

/// Fixed-width text rendering of the table for terminal output.
pub fn render_text_table(metrics: &[DailyMetric]) -> String {
    let rows: Vec<[String; 4]> = metrics
        .iter()
        .map(|m| {
            [
                m.symbol.to_string(),
                format!("{:.2}", m.close_price),
                format!("{:.2}", m.daily_change_pct),
                format!("{:.2}", m.intraday_range_pct),
            ]
        })
        .collect();

    let mut widths = COLUMNS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        COLUMNS
            .iter()
            .zip(widths.iter())
            .map(|(c, &w)| format!("{c:>w$}"))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &rows {
        lines.push(
            row.iter()
                .zip(widths.iter())
                .map(|(c, &w)| format!("{c:>w$}"))
                .collect::<Vec<_>>()
                .join("  "),
        );
    }
    lines.join("\n")
}
