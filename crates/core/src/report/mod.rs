use crate::domain::ticker::Ticker;
use std::path::{Path, PathBuf};

pub mod chart;
pub mod html;
pub mod pdf;

pub const REPORT_HTML_FILE: &str = "reporte.html";
pub const REPORT_PDF_FILE: &str = "reporte.pdf";

pub fn chart_pdf_file_name(ticker: &Ticker) -> String {
    format!("grafico_{ticker}.pdf")
}

pub fn chart_html_file_name(ticker: &Ticker) -> String {
    format!("grafico_{ticker}.html")
}

pub fn report_pdf_path(dir: &Path) -> PathBuf {
    dir.join(REPORT_PDF_FILE)
}

pub fn chart_pdf_path(dir: &Path, ticker: &Ticker) -> PathBuf {
    dir.join(chart_pdf_file_name(ticker))
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_files_are_keyed_by_ticker() {
        let t = Ticker::parse("googl").unwrap();
        assert_eq!(chart_pdf_file_name(&t), "grafico_GOOGL.pdf");
        assert_eq!(chart_html_file_name(&t), "grafico_GOOGL.html");
        assert_eq!(
            chart_pdf_path(Path::new("/tmp/out"), &t),
            PathBuf::from("/tmp/out/grafico_GOOGL.pdf")
        );
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<b>"Q1" & 'Q2'</b>"#),
            "&lt;b&gt;&quot;Q1&quot; &amp; &#39;Q2&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain text"), "plain text");
    }
}
