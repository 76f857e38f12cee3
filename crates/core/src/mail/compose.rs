use crate::domain::ticker::Ticker;
use crate::mail::error::{MailError, MailErrorKind};
use crate::report::html::ReportHtml;
use crate::report::{chart_pdf_file_name, escape_html, report_pdf_path, REPORT_PDF_FILE};
use anyhow::Result;
use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Outcome of looking up a ticker's chart file. A missing chart is skipped, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartAttachment {
    Attached(EmailAttachment),
    Missing { ticker: Ticker, path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ReportEmail {
    pub subject: String,
    pub html_body: String,
    /// Report PDF first, then charts in ticker order.
    pub attachments: Vec<EmailAttachment>,
}

pub fn default_subject(date: NaiveDate) -> String {
    format!("Automated Stock Report - {}", date.format("%d/%m/%Y"))
}

/// Commentary (under a subject heading) followed by the report table, or
/// the table alone when there is no commentary.
pub fn email_body(subject: &str, commentary: Option<&str>, report: &ReportHtml) -> String {
    match commentary.map(str::trim).filter(|c| !c.is_empty()) {
        Some(commentary) => format!(
            "<h3>{}</h3><p>{}</p><hr>{}",
            escape_html(subject),
            escape_html(commentary).replace('\n', "<br>"),
            report.as_str()
        ),
        None => report.as_str().to_string(),
    }
}

pub async fn compose_email(
    subject: &str,
    commentary: Option<&str>,
    report: &ReportHtml,
    tickers: &[Ticker],
    dir: &Path,
) -> Result<ReportEmail> {
    let report_path = report_pdf_path(dir);
    let content = tokio::fs::read(&report_path).await.map_err(|e| {
        MailError::new(
            MailErrorKind::Attachment,
            format!("failed to read report {}: {e}", report_path.display()),
        )
    })?;

    let mut attachments = vec![EmailAttachment {
        file_name: REPORT_PDF_FILE.to_string(),
        content,
    }];

    for ticker in tickers {
        match chart_attachment(dir, ticker).await? {
            ChartAttachment::Attached(att) => attachments.push(att),
            ChartAttachment::Missing { ticker, path } => {
                tracing::debug!(%ticker, path = %path.display(), "chart not generated; not attaching");
            }
        }
    }

    Ok(ReportEmail {
        subject: subject.to_string(),
        html_body: email_body(subject, commentary, report),
        attachments,
    })
}

pub async fn chart_attachment(dir: &Path, ticker: &Ticker) -> Result<ChartAttachment> {
    let file_name = chart_pdf_file_name(ticker);
    let path = dir.join(&file_name);
    match tokio::fs::read(&path).await {
        Ok(content) => Ok(ChartAttachment::Attached(EmailAttachment { file_name, content })),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(ChartAttachment::Missing {
            ticker: ticker.clone(),
            path,
        }),
        Err(e) => Err(MailError::new(
            MailErrorKind::Attachment,
            format!("failed to read chart {}: {e}", path.display()),
        )
        .into()),
    }
}

fn parse_mailbox(raw: &str) -> Result<Mailbox> {
    raw.trim().parse::<Mailbox>().map_err(|e| {
        MailError::new(MailErrorKind::InvalidAddress, format!("{raw:?}: {e}")).into()
    })
}

impl ReportEmail {
    pub fn attachment_names(&self) -> Vec<&str> {
        self.attachments.iter().map(|a| a.file_name.as_str()).collect()
    }

    /// Builds the multipart/mixed message. `to` may hold several comma-separated addresses.
    pub fn into_message(self, from: &str, to: &str) -> Result<Message> {
        let mut builder = Message::builder()
            .from(parse_mailbox(from)?)
            .subject(self.subject);

        let mut recipients = 0;
        for addr in to.split(',').filter(|s| !s.trim().is_empty()) {
            builder = builder.to(parse_mailbox(addr)?);
            recipients += 1;
        }
        if recipients == 0 {
            return Err(MailError::new(MailErrorKind::MissingSettings, "no recipient address").into());
        }

        let pdf = ContentType::parse(PDF_MIME)
            .map_err(|e| MailError::new(MailErrorKind::Build, format!("bad content type: {e}")))?;

        let mut body = MultiPart::mixed().singlepart(SinglePart::html(self.html_body));
        for att in self.attachments {
            body = body.singlepart(Attachment::new(att.file_name).body(att.content, pdf.clone()));
        }

        builder
            .multipart(body)
            .map_err(|e| MailError::new(MailErrorKind::Build, e.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::DailyMetric;
    use crate::report::html::build_report_html;

    fn report() -> ReportHtml {
        build_report_html(&[DailyMetric {
            symbol: Ticker::parse("AAPL").unwrap(),
            close_price: 150.00,
            daily_change_pct: 5.00,
            intraday_range_pct: 2.00,
        }])
    }

    fn write_report_pdf(dir: &Path) {
        std::fs::write(dir.join("reporte.pdf"), b"%PDF-1.4 report").unwrap();
    }

    #[test]
    fn body_with_commentary_has_heading_and_table() {
        let body = email_body("Q1 update", Some("Strong quarter for tech."), &report());
        assert!(body.starts_with("<h3>Q1 update</h3><p>Strong quarter for tech.</p><hr>"));
        assert!(body.contains("<td>AAPL</td>"));
        assert!(body.contains("150.0"));
    }

    #[test]
    fn blank_commentary_means_table_only() {
        let r = report();
        assert_eq!(email_body("Subject", None, &r), r.as_str());
        assert_eq!(email_body("Subject", Some("   \n"), &r), r.as_str());
    }

    #[test]
    fn commentary_is_escaped() {
        let body = email_body("<Q1>", Some("a < b\nnext line"), &report());
        assert!(body.contains("<h3>&lt;Q1&gt;</h3>"));
        assert!(body.contains("<p>a &lt; b<br>next line</p>"));
    }

    #[test]
    fn default_subject_uses_day_month_year() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(default_subject(d), "Automated Stock Report - 09/03/2026");
    }

    #[tokio::test]
    async fn attaches_report_and_only_existing_charts() {
        let dir = tempfile::tempdir().unwrap();
        write_report_pdf(dir.path());
        std::fs::write(dir.path().join("grafico_MSFT.pdf"), b"%PDF-1.4 msft").unwrap();

        let email = compose_email("Q1 update", Some("Q1 update"), &report(), &Ticker::watchlist(), dir.path())
            .await
            .unwrap();

        assert_eq!(email.attachment_names(), vec!["reporte.pdf", "grafico_MSFT.pdf"]);
        assert_eq!(email.attachments[1].content, b"%PDF-1.4 msft".to_vec());
        assert!(email.html_body.contains("<h3>Q1 update</h3>"));
        assert!(email.html_body.contains("<td>AAPL</td>"));
        assert!(email.html_body.contains("<td>150.00</td>"));
    }

    #[tokio::test]
    async fn no_charts_on_disk_attaches_report_alone() {
        let dir = tempfile::tempdir().unwrap();
        write_report_pdf(dir.path());

        let email = compose_email("s", None, &report(), &Ticker::watchlist(), dir.path())
            .await
            .unwrap();
        assert_eq!(email.attachment_names(), vec!["reporte.pdf"]);
    }

    #[tokio::test]
    async fn missing_report_pdf_is_an_attachment_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = compose_email("s", None, &report(), &[], dir.path())
            .await
            .unwrap_err();
        let mail = err.downcast_ref::<MailError>().unwrap();
        assert_eq!(mail.kind, MailErrorKind::Attachment);
    }

    #[tokio::test]
    async fn missing_chart_is_a_named_branch() {
        let dir = tempfile::tempdir().unwrap();
        let t = Ticker::parse("GOOGL").unwrap();
        let outcome = chart_attachment(dir.path(), &t).await.unwrap();
        assert_eq!(
            outcome,
            ChartAttachment::Missing {
                ticker: t,
                path: dir.path().join("grafico_GOOGL.pdf"),
            }
        );
    }

    #[test]
    fn builds_multipart_message() {
        let email = ReportEmail {
            subject: "Q1 update".to_string(),
            html_body: email_body("Q1 update", Some("hello"), &report()),
            attachments: vec![EmailAttachment {
                file_name: "reporte.pdf".to_string(),
                content: b"%PDF-1.4".to_vec(),
            }],
        };

        let msg = email
            .into_message("me@example.com", "a@example.com, b@example.com")
            .unwrap();
        let raw = String::from_utf8_lossy(&msg.formatted()).to_string();
        assert!(raw.contains("Subject: Q1 update"));
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("reporte.pdf"));
        assert!(raw.contains("a@example.com"));
        assert!(raw.contains("b@example.com"));
    }

    #[test]
    fn bad_addresses_are_rejected() {
        let email = ReportEmail {
            subject: "s".to_string(),
            html_body: String::new(),
            attachments: vec![],
        };
        let err = email.clone().into_message("not an address", "a@example.com").unwrap_err();
        assert_eq!(err.downcast_ref::<MailError>().unwrap().kind, MailErrorKind::InvalidAddress);

        let err = email.into_message("me@example.com", " , ").unwrap_err();
        assert_eq!(err.downcast_ref::<MailError>().unwrap().kind, MailErrorKind::MissingSettings);
    }
}
