#![allow(clippy::too_many_arguments)]

//! Broken link checker for paginated article listings
//!
//! A [`LinkChecker`] walks each seed listing page by page, opens every
//! article in its own window, probes the links inside the article content
//! and writes one report of broken links per seed.

pub mod config;
pub mod drivers;
pub mod error;
pub mod filter;
pub mod inspector;
pub mod probe;
pub mod report;
pub mod results;
pub mod session;
pub mod utils;
pub mod walker;

#[cfg(test)]
mod tests;

// Re-export commonly used types for convenience
pub use config::{CheckerConfig, DriverKind, ReportFormat};
pub use error::{CheckError, ConfigError, ReportError};
pub use results::{BrokenLinkRecord, LinkError, SeedReport, SeedStatus, SessionSummary};
pub use session::CrawlSession;

use drivers::{DriverFactory, StaticPageFactory, WebDriverFactory};
use filter::SeedValidator;
use probe::{HttpProbe, LinkProbe};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for a link checking run over one or more seed listings
pub struct LinkChecker {
    seeds: Vec<String>,
    config: CheckerConfig,
    cancel: CancellationToken,
}

impl LinkChecker {
    /// Create a new checker for the given seed URLs
    pub fn new(seeds: Vec<String>) -> Self {
        Self {
            seeds,
            config: CheckerConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Apply a configuration
    pub fn with_config(mut self, config: CheckerConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a JSON file
    pub fn with_config_file(self, path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let config = CheckerConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Apply configuration from a JSON string
    pub fn with_config_str(self, json: &str) -> Result<Self, ConfigError> {
        let config = CheckerConfig::from_json(json)?;
        Ok(self.with_config(config))
    }

    /// Set the number of seeds checked at once
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.config.max_concurrency = max_concurrency;
        self
    }

    pub fn with_driver(mut self, driver: DriverKind) -> Self {
        self.config.driver = driver;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Stop cooperatively when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Validate the seeds and run the check with the configured driver
    pub async fn run(self) -> Result<SessionSummary, CheckError> {
        self.config.validate()?;
        SeedValidator::from_config(&self.config)?.validate_all(&self.seeds)?;

        let probe: Arc<dyn LinkProbe> = Arc::new(
            HttpProbe::new(self.config.probe_timeout(), &self.config.user_agent)
                .map_err(|e| CheckError::Fatal(format!("failed to build HTTP client: {}", e)))?,
        );

        match self.config.driver {
            DriverKind::WebDriver => {
                let factory =
                    WebDriverFactory::new(self.config.webdriver_url.clone(), self.config.headless);
                self.run_with(factory, probe).await
            }
            DriverKind::Static => {
                let factory =
                    StaticPageFactory::new(self.config.ui_timeout(), &self.config.user_agent)
                        .map_err(|e| {
                            CheckError::Fatal(format!("failed to build HTTP client: {}", e))
                        })?;
                self.run_with(factory, probe).await
            }
        }
    }

    async fn run_with<F: DriverFactory + 'static>(
        self,
        factory: F,
        probe: Arc<dyn LinkProbe>,
    ) -> Result<SessionSummary, CheckError> {
        let sink = report::sink_for(&self.config);
        let session =
            CrawlSession::with_cancellation(factory, probe, sink, self.config, self.cancel)?;
        Ok(session.run(&self.seeds).await)
    }
}
