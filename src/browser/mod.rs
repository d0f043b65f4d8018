//! Browser capability used by the download driver.
//!
//! The driver only needs a handful of operations from a browser engine, so
//! they live behind [`BrowserSession`]. The Chrome implementation is in
//! [`chrome`]; tests script their own.

#[cfg(feature = "browser")]
pub mod chrome;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::RegexBuilder;

#[cfg(feature = "browser")]
pub use chrome::{ChromeOptions, ChromeSession};

/// Errors surfaced by a [`BrowserSession`].
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    /// A bounded wait expired. Callers treat this as "try something else".
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    /// The engine itself failed; not recoverable within a run.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

impl AutomationError {
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            timeout,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// How to find a clickable element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Element with an ARIA role whose accessible name contains `name`.
    Role { role: String, name: String },
    /// Any element whose text contains the given string.
    Text(String),
}

impl Locator {
    pub fn button(name: impl Into<String>) -> Self {
        Self::Role {
            role: "button".to_string(),
            name: name.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// The string this locator searches for.
    pub fn needle(&self) -> &str {
        match self {
            Self::Role { name, .. } => name,
            Self::Text(text) => text,
        }
    }

    /// Case-insensitive substring match against an element's name or text.
    pub fn matches(&self, haystack: &str) -> bool {
        RegexBuilder::new(&regex::escape(self.needle()))
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(haystack))
            .unwrap_or(false)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role { role, name } => write!(f, "{role} named {name:?}"),
            Self::Text(text) => write!(f, "text {text:?}"),
        }
    }
}

/// A finished download waiting to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Name the browser proposed for the file.
    pub suggested_filename: Option<String>,
    /// Where the browser left the artifact.
    pub path: PathBuf,
}

/// A single browser page driven sequentially.
#[async_trait::async_trait]
pub trait BrowserSession: Send {
    /// Load `url` in the page.
    async fn navigate(&mut self, url: &str) -> Result<(), AutomationError>;

    /// Current rendered document as HTML.
    async fn content(&mut self) -> Result<String, AutomationError>;

    /// Find an element matching `locator` and click it, giving up after `timeout`.
    async fn click(&mut self, locator: &Locator, timeout: Duration) -> Result<(), AutomationError>;

    /// Wait for the download started by the most recent click.
    async fn await_download(&mut self, timeout: Duration) -> Result<Download, AutomationError>;

    /// Move a finished download to `dest`, replacing any existing file.
    async fn save_download(&mut self, download: &Download, dest: &Path) -> Result<(), AutomationError>;

    /// Shut the engine down.
    async fn close(&mut self) -> Result<(), AutomationError> {
        Ok(())
    }
}
