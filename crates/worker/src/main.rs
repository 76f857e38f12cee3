use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quote_report_core::config::{MailOverrides, Settings, SmtpSecurity};
use quote_report_core::domain::ticker::Ticker;
use quote_report_core::ingest::provider::YahooChartClient;
use quote_report_core::mail::compose::default_subject;
use quote_report_core::mail::send::{deliver_report, DeliveryRequest, SmtpMailSender};
use quote_report_core::pipeline;
use quote_report_core::report::html::render_text_table;
use quote_report_core::report::pdf::Wkhtmltopdf;

#[derive(Debug, Parser)]
#[command(name = "quote_report")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch quotes, render reporte.pdf and print the table. Default.
    Report,
    /// Fetch quotes and print the table without rendering.
    Table,
    /// Render grafico_<TICKER>.pdf from one month of closes.
    Chart {
        /// One of the watchlist tickers (AAPL, GOOGL, MSFT).
        ticker: String,
    },
    /// Regenerate the report and email it with any chart PDFs on disk.
    Send(SendArgs),
}

#[derive(Debug, clap::Args)]
struct SendArgs {
    /// Defaults to "Automated Stock Report - dd/mm/YYYY".
    #[arg(long)]
    subject: Option<String>,

    /// Shown above the table under a subject heading.
    #[arg(long)]
    commentary: Option<String>,

    /// Regenerate every watchlist chart before sending. Without it, any
    /// grafico_<TICKER>.pdf already on disk is attached as-is, even if an earlier run left it.
    #[arg(long)]
    charts: bool,

    #[arg(long)]
    from: Option<String>,

    /// Comma-separated recipients. Overrides EMAIL_TO.
    #[arg(long)]
    to: Option<String>,

    /// SMTP login. Overrides EMAIL_USER.
    #[arg(long)]
    user: Option<String>,

    /// SMTP password. Overrides EMAIL_PASS.
    #[arg(long)]
    password: Option<String>,

    #[arg(long)]
    smtp_host: Option<String>,

    #[arg(long)]
    smtp_port: Option<u16>,

    /// ssl, starttls or none.
    #[arg(long)]
    security: Option<SmtpSecurity>,
}

impl SendArgs {
    fn overrides(&self) -> MailOverrides {
        MailOverrides {
            smtp_host: self.smtp_host.clone(),
            smtp_port: self.smtp_port,
            security: self.security,
            username: self.user.clone(),
            password: self.password.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let dir = PathBuf::from(".");

    let res = run(args.command.unwrap_or(Command::Report), &settings, &dir).await;
    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
    }
    res
}

async fn run(command: Command, settings: &Settings, dir: &Path) -> anyhow::Result<ExitCode> {
    let client = YahooChartClient::from_settings(&settings.market_data)?;
    let converter = Wkhtmltopdf::from_settings(&settings.converter);
    let tickers = Ticker::watchlist();

    match command {
        Command::Report => {
            let report = pipeline::generate_report(&client, &converter, &tickers, dir).await?;
            println!("{}", render_text_table(&report.metrics));
            println!("\nreport written to {}", report.pdf_path.display());
        }
        Command::Table => {
            let metrics = pipeline::compute_metrics(&client, &tickers).await;
            println!("{}", render_text_table(&metrics));
        }
        Command::Chart { ticker } => {
            let ticker = Ticker::parse(&ticker)?;
            anyhow::ensure!(
                ticker.is_in_watchlist(),
                "{ticker} is not in the watchlist ({})",
                tickers.iter().map(Ticker::as_str).collect::<Vec<_>>().join(", ")
            );
            let chart = pipeline::generate_chart(&client, &converter, &ticker, dir)
                .await
                .with_context(|| format!("chart for {ticker} failed"))?;
            println!(
                "chart for {} ({} closes) written to {}",
                chart.ticker,
                chart.bars.len(),
                chart.pdf_path.display()
            );
        }
        Command::Send(send) => {
            let mail = settings.mail.clone().with_overrides(send.overrides());

            let report = pipeline::generate_report(&client, &converter, &tickers, dir).await?;
            if send.charts {
                for ticker in &tickers {
                    // Chart failures only drop that attachment.
                    if let Err(err) = pipeline::generate_chart(&client, &converter, ticker, dir).await {
                        tracing::warn!(%ticker, error = %format!("{err:#}"), "chart generation failed");
                    }
                }
            }

            let subject = send
                .subject
                .clone()
                .unwrap_or_else(|| default_subject(chrono::Local::now().date_naive()));

            let status = deliver_report(
                &SmtpMailSender,
                &mail,
                DeliveryRequest {
                    subject: &subject,
                    commentary: send.commentary.as_deref(),
                    report: &report.html,
                    tickers: &tickers,
                    dir,
                },
            )
            .await;

            if !status.is_sent() {
                eprintln!("{}", status.status_line());
                return Ok(ExitCode::FAILURE);
            }
            println!("{}", status.status_line());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
