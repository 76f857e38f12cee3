pub mod domain;
pub mod ingest;
pub mod mail;
pub mod pipeline;
pub mod report;

#[cfg(test)]
mod testing;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;
    use std::str::FromStr;

    pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
    pub const LOCAL_RELAY_HOST: &str = "localhost";
    pub const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://query1.finance.yahoo.com";
    pub const DEFAULT_WKHTMLTOPDF: &str = "wkhtmltopdf";
    pub const MAX_MARKET_DATA_RETRIES: u32 = 5;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub market_data: MarketDataSettings,
        pub converter: ConverterSettings,
        pub mail: MailSettings,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                market_data: MarketDataSettings::from_env()?,
                converter: ConverterSettings::from_env(),
                mail: MailSettings::from_env()?,
                sentry_dsn: env_opt("SENTRY_DSN"),
            })
        }
    }

    #[derive(Debug, Clone)]
    pub struct MarketDataSettings {
        pub base_url: String,
        pub timeout_secs: u64,
        /// Total attempts per request. 1 means no retry.
        pub retries: u32,
    }

    impl Default for MarketDataSettings {
        fn default() -> Self {
            Self {
                base_url: DEFAULT_MARKET_DATA_BASE_URL.to_string(),
                timeout_secs: 30,
                retries: 1,
            }
        }
    }

    impl MarketDataSettings {
        pub fn from_env() -> anyhow::Result<Self> {
            let mut out = Self::default();
            if let Some(url) = env_opt("MARKET_DATA_BASE_URL") {
                out.base_url = url;
            }
            if let Some(s) = env_opt("MARKET_DATA_TIMEOUT_SECS") {
                out.timeout_secs = s
                    .parse()
                    .with_context(|| format!("MARKET_DATA_TIMEOUT_SECS is not a number: {s}"))?;
            }
            if let Some(s) = env_opt("MARKET_DATA_RETRIES") {
                out.retries = parse_retries(&s)?;
            }
            Ok(out)
        }
    }

    fn parse_retries(raw: &str) -> anyhow::Result<u32> {
        let retries: u32 = raw
            .trim()
            .parse()
            .with_context(|| format!("MARKET_DATA_RETRIES is not a number: {raw}"))?;
        anyhow::ensure!(
            (1..=MAX_MARKET_DATA_RETRIES).contains(&retries),
            "MARKET_DATA_RETRIES must be between 1 and {MAX_MARKET_DATA_RETRIES}, got {retries}"
        );
        Ok(retries)
    }

    #[derive(Debug, Clone)]
    pub struct ConverterSettings {
        pub wkhtmltopdf_path: PathBuf,
    }

    impl ConverterSettings {
        pub fn from_env() -> Self {
            let path = env_opt("WKHTMLTOPDF_PATH").unwrap_or_else(|| DEFAULT_WKHTMLTOPDF.to_string());
            Self {
                wkhtmltopdf_path: PathBuf::from(path),
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SmtpSecurity {
        /// Implicit TLS (SMTPS).
        Ssl,
        StartTls,
        /// Plain, unauthenticated relay such as a local MTA.
        None,
    }

    impl SmtpSecurity {
        pub fn default_port(self) -> u16 {
            match self {
                SmtpSecurity::Ssl => 465,
                SmtpSecurity::StartTls => 587,
                SmtpSecurity::None => 25,
            }
        }

        pub fn requires_credentials(self) -> bool {
            !matches!(self, SmtpSecurity::None)
        }
    }

    impl FromStr for SmtpSecurity {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "ssl" | "tls" | "smtps" => Ok(SmtpSecurity::Ssl),
                "starttls" => Ok(SmtpSecurity::StartTls),
                "none" | "plain" | "local" => Ok(SmtpSecurity::None),
                other => anyhow::bail!("unknown SMTP security mode: {other}"),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct MailSettings {
        pub smtp_host: String,
        pub smtp_port: u16,
        pub security: SmtpSecurity,
        pub username: Option<String>,
        pub password: Option<String>,
        pub from: Option<String>,
        pub to: Option<String>,
    }

    impl Default for MailSettings {
        fn default() -> Self {
            let security = SmtpSecurity::Ssl;
            Self {
                smtp_host: DEFAULT_SMTP_HOST.to_string(),
                smtp_port: security.default_port(),
                security,
                username: None,
                password: None,
                from: None,
                to: None,
            }
        }
    }

    /// Explicit values entered by the caller. `None` keeps the startup default.
    #[derive(Debug, Clone, Default)]
    pub struct MailOverrides {
        pub smtp_host: Option<String>,
        pub smtp_port: Option<u16>,
        pub security: Option<SmtpSecurity>,
        pub username: Option<String>,
        pub password: Option<String>,
        pub from: Option<String>,
        pub to: Option<String>,
    }

    impl MailSettings {
        pub fn from_env() -> anyhow::Result<Self> {
            let security = match env_opt("SMTP_SECURITY") {
                Some(s) => s.parse::<SmtpSecurity>()?,
                None => SmtpSecurity::Ssl,
            };
            Self::from_parts(
                security,
                env_opt("SMTP_HOST"),
                env_opt("SMTP_PORT"),
                env_opt("EMAIL_USER"),
                env_opt("EMAIL_PASS"),
                env_opt("EMAIL_FROM"),
                env_opt("EMAIL_TO"),
            )
        }

        fn from_parts(
            security: SmtpSecurity,
            host: Option<String>,
            port: Option<String>,
            username: Option<String>,
            password: Option<String>,
            from: Option<String>,
            to: Option<String>,
        ) -> anyhow::Result<Self> {
            let smtp_host = host.unwrap_or_else(|| default_host(security).to_string());
            let smtp_port = match port {
                Some(p) => p
                    .parse()
                    .with_context(|| format!("SMTP_PORT is not a valid port: {p}"))?,
                None => security.default_port(),
            };
            let from = from.or_else(|| username.clone());

            Ok(Self {
                smtp_host,
                smtp_port,
                security,
                username,
                password,
                from,
                to,
            })
        }

        pub fn with_overrides(mut self, overrides: MailOverrides) -> Self {
            if let Some(security) = overrides.security {
                // Switching mode without an explicit host/port moves to that mode's defaults.
                if security != self.security {
                    if overrides.smtp_host.is_none() && self.smtp_host == default_host(self.security) {
                        self.smtp_host = default_host(security).to_string();
                    }
                    if overrides.smtp_port.is_none() && self.smtp_port == self.security.default_port() {
                        self.smtp_port = security.default_port();
                    }
                }
                self.security = security;
            }
            if let Some(host) = overrides.smtp_host {
                self.smtp_host = host;
            }
            if let Some(port) = overrides.smtp_port {
                self.smtp_port = port;
            }
            if let Some(username) = overrides.username {
                if self.from.is_none() || self.from == self.username {
                    self.from = Some(username.clone());
                }
                self.username = Some(username);
            }
            if let Some(password) = overrides.password {
                self.password = Some(password);
            }
            if let Some(from) = overrides.from {
                self.from = Some(from);
            }
            if let Some(to) = overrides.to {
                self.to = Some(to);
            }
            self
        }

        pub fn require_from(&self) -> anyhow::Result<&str> {
            self.from
                .as_deref()
                .context("sender address is required (EMAIL_FROM or EMAIL_USER)")
        }

        pub fn require_to(&self) -> anyhow::Result<&str> {
            self.to.as_deref().context("EMAIL_TO is required")
        }
    }

    fn default_host(security: SmtpSecurity) -> &'static str {
        match security {
            SmtpSecurity::None => LOCAL_RELAY_HOST,
            _ => DEFAULT_SMTP_HOST,
        }
    }

    fn env_opt(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

}
