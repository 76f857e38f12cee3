//! In-memory doubles for the external collaborators.

use crate::config::MailSettings;
use crate::domain::bar::DailyBar;
use crate::domain::ticker::Ticker;
use crate::ingest::provider::MarketDataClient;
use crate::ingest::types::HistoryRange;
use crate::mail::error::{MailError, MailErrorKind};
use crate::mail::send::MailSender;
use crate::report::pdf::{PageOptions, PdfConverter};
use anyhow::Result;
use lettre::Message;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct StaticMarketData {
    bars: HashMap<String, Vec<DailyBar>>,
    failing: Vec<String>,
    requests: Mutex<Vec<(String, HistoryRange)>>,
}

impl StaticMarketData {
    pub fn with_bars(mut self, symbol: &str, bars: Vec<DailyBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn failing_for(mut self, symbol: &str) -> Self {
        self.failing.push(symbol.to_string());
        self
    }

    pub fn requests(&self) -> Vec<(String, HistoryRange)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MarketDataClient for StaticMarketData {
    fn provider_name(&self) -> &'static str {
        "static"
    }

    async fn fetch_daily_bars(&self, ticker: &Ticker, range: HistoryRange) -> Result<Vec<DailyBar>> {
        self.requests
            .lock()
            .unwrap()
            .push((ticker.to_string(), range));
        if self.failing.iter().any(|s| s == ticker.as_str()) {
            anyhow::bail!("upstream unavailable for {ticker}");
        }
        Ok(self.bars.get(ticker.as_str()).cloned().unwrap_or_default())
    }
}

/// Copies the HTML input to the PDF path so tests can inspect what was "rendered".
#[derive(Debug, Default)]
pub struct StubConverter {
    calls: Mutex<Vec<(PathBuf, PageOptions)>>,
}

impl StubConverter {
    pub fn calls(&self) -> Vec<(PathBuf, PageOptions)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PdfConverter for StubConverter {
    fn converter_name(&self) -> &'static str {
        "stub"
    }

    async fn convert(&self, html_path: &Path, pdf_path: &Path, options: &PageOptions) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((pdf_path.to_path_buf(), options.clone()));
        tokio::fs::copy(html_path, pdf_path).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FailingConverter;

#[async_trait::async_trait]
impl PdfConverter for FailingConverter {
    fn converter_name(&self) -> &'static str {
        "failing"
    }

    async fn convert(&self, _html_path: &Path, _pdf_path: &Path, _options: &PageOptions) -> Result<()> {
        anyhow::bail!("converter not installed")
    }
}

/// Reports success without writing any output.
#[derive(Debug, Default)]
pub struct SilentConverter;

#[async_trait::async_trait]
impl PdfConverter for SilentConverter {
    fn converter_name(&self) -> &'static str {
        "silent"
    }

    async fn convert(&self, _html_path: &Path, _pdf_path: &Path, _options: &PageOptions) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<String>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MailSender for RecordingSender {
    fn transport_name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, _settings: &MailSettings, message: Message) -> Result<()> {
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();
        self.sent.lock().unwrap().push(raw);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FailingSender;

#[async_trait::async_trait]
impl MailSender for FailingSender {
    fn transport_name(&self) -> &'static str {
        "failing"
    }

    async fn send(&self, _settings: &MailSettings, _message: Message) -> Result<()> {
        Err(MailError::new(MailErrorKind::Transport, "connection refused").into())
    }
}
