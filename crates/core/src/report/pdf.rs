use crate::config::ConverterSettings;
use crate::report::html::{report_document, ReportHtml};
use crate::report::{report_pdf_path, REPORT_HTML_FILE};
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    pub encoding: &'static str,
    pub page_size: &'static str,
    pub margin_mm: u32,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            encoding: "UTF-8",
            page_size: "A4",
            margin_mm: 10,
        }
    }
}

impl PageOptions {
    pub fn to_args(&self) -> Vec<String> {
        let margin = format!("{}mm", self.margin_mm);
        let mut args = vec![
            "--quiet".to_string(),
            "--encoding".to_string(),
            self.encoding.to_string(),
            "--page-size".to_string(),
            self.page_size.to_string(),
        ];
        for side in ["top", "bottom", "left", "right"] {
            args.push(format!("--margin-{side}"));
            args.push(margin.clone());
        }
        args
    }
}

#[async_trait::async_trait]
pub trait PdfConverter: Send + Sync {
    fn converter_name(&self) -> &'static str;

    async fn convert(&self, html_path: &Path, pdf_path: &Path, options: &PageOptions) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct Wkhtmltopdf {
    binary: PathBuf,
}

impl Wkhtmltopdf {
    pub fn from_settings(settings: &ConverterSettings) -> Self {
        Self {
            binary: settings.wkhtmltopdf_path.clone(),
        }
    }
}

#[async_trait::async_trait]
impl PdfConverter for Wkhtmltopdf {
    fn converter_name(&self) -> &'static str {
        "wkhtmltopdf"
    }

    async fn convert(&self, html_path: &Path, pdf_path: &Path, options: &PageOptions) -> Result<()> {
        let output = tokio::process::Command::new(&self.binary)
            .args(options.to_args())
            .arg(html_path)
            .arg(pdf_path)
            .output()
            .await
            .with_context(|| {
                format!(
                    "failed to run {} (set WKHTMLTOPDF_PATH to the converter binary)",
                    self.binary.display()
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

/// Writes `document` to `html_path`, overwriting it, and converts it to `pdf_path`.
/// Any previous `pdf_path` is removed first so only a fresh conversion passes the final check.
pub async fn convert_document(
    converter: &dyn PdfConverter,
    document: &str,
    html_path: &Path,
    pdf_path: &Path,
) -> Result<()> {
    tokio::fs::write(html_path, document)
        .await
        .with_context(|| format!("failed to write {}", html_path.display()))?;

    match tokio::fs::remove_file(pdf_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("failed to remove stale {}", pdf_path.display()))
        }
    }

    converter
        .convert(html_path, pdf_path, &PageOptions::default())
        .await
        .with_context(|| format!("PDF conversion failed for {}", html_path.display()))?;

    anyhow::ensure!(
        tokio::fs::try_exists(pdf_path).await.unwrap_or(false),
        "{} reported success but {} was not written",
        converter.converter_name(),
        pdf_path.display()
    );
    Ok(())
}

/// Renders the report to `<dir>/reporte.pdf` via `<dir>/reporte.html`.
pub async fn render_pdf(
    converter: &dyn PdfConverter,
    report: &ReportHtml,
    dir: &Path,
) -> Result<PathBuf> {
    let html_path = dir.join(REPORT_HTML_FILE);
    let pdf_path = report_pdf_path(dir);
    convert_document(converter, &report_document(report), &html_path, &pdf_path).await?;
    tracing::info!(path = %pdf_path.display(), converter = converter.converter_name(), "report pdf rendered");
    Ok(pdf_path)
}
