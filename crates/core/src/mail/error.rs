use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailErrorKind {
    /// Sender, recipient or login not configured.
    MissingSettings,
    InvalidAddress,
    Attachment,
    Build,
    Transport,
}

impl MailErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MailErrorKind::MissingSettings => "MissingSettings",
            MailErrorKind::InvalidAddress => "InvalidAddress",
            MailErrorKind::Attachment => "Attachment",
            MailErrorKind::Build => "Build",
            MailErrorKind::Transport => "Transport",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailError {
    pub kind: MailErrorKind,
    pub detail: String,
}

impl MailError {
    pub fn new(kind: MailErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mail error (kind={}): {}", self.kind.as_str(), self.detail)
    }
}

impl std::error::Error for MailError {}
