use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CSS selectors describing the site's markup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Article entry points on a listing page
    #[serde(default = "default_entry_selector")]
    pub entry: String,

    /// Article heading, read as the article title
    #[serde(default = "default_heading_selector")]
    pub heading: String,

    /// Container whose anchors are checked
    #[serde(default = "default_content_selector")]
    pub content: String,

    /// Anchors inside the content container
    #[serde(default = "default_anchor_selector")]
    pub anchor: String,

    /// Pagination control on a listing page
    #[serde(default = "default_pagination_selector")]
    pub pagination: String,

    /// Labels marking the "next page" link
    #[serde(default = "default_next_glyphs")]
    pub next_glyphs: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            entry: default_entry_selector(),
            heading: default_heading_selector(),
            content: default_content_selector(),
            anchor: default_anchor_selector(),
            pagination: default_pagination_selector(),
            next_glyphs: default_next_glyphs(),
        }
    }
}

/// Which automation backend drives the walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// A real browser behind a WebDriver server
    WebDriver,
    /// Plain HTTP fetches parsed as static HTML
    Static,
}

/// Output format of the per-seed report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }
}

/// Configuration for a link checking run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    #[serde(default)]
    pub selectors: SelectorConfig,

    #[serde(default = "default_driver")]
    pub driver: DriverKind,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Number of seeds processed at once, each with its own browser
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Bound for element and staleness waits, in seconds
    #[serde(default = "default_ui_timeout_secs")]
    pub ui_timeout_secs: u64,

    /// Timeout of a single link probe, in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Hard cap on listing pages visited per seed
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Probe each distinct target once per seed
    #[serde(default = "default_dedupe_probes")]
    pub dedupe_probes: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Shape every seed URL must match
    #[serde(default = "default_seed_pattern")]
    pub seed_pattern: String,

    /// Regex patterns for links to check (if empty, all links are checked)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for links to skip
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Directory receiving the reports
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_report_format")]
    pub report_format: ReportFormat,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            selectors: SelectorConfig::default(),
            driver: default_driver(),
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            max_concurrency: default_max_concurrency(),
            ui_timeout_secs: default_ui_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            max_pages: default_max_pages(),
            dedupe_probes: default_dedupe_probes(),
            user_agent: default_user_agent(),
            seed_pattern: default_seed_pattern(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            output_dir: default_output_dir(),
            report_format: default_report_format(),
        }
    }
}

impl CheckerConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Override the WebDriver URL from `WEBDRIVER_URL` when it is set
    pub fn apply_env(&mut self) {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
    }

    /// Reject values the walker cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrency",
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid {
                field: "max_pages",
                message: "must be at least 1".to_string(),
            });
        }
        if self.ui_timeout_secs == 0 || self.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "timeouts",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.selectors.next_glyphs.iter().all(|g| g.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "selectors.next_glyphs",
                message: "at least one non-empty label is required".to_string(),
            });
        }
        Ok(())
    }

    pub fn ui_timeout(&self) -> Duration {
        Duration::from_secs(self.ui_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn default_entry_selector() -> String {
    "div.image > a".to_string()
}

fn default_heading_selector() -> String {
    "h1".to_string()
}

fn default_content_selector() -> String {
    "#content".to_string()
}

fn default_anchor_selector() -> String {
    "a".to_string()
}

fn default_pagination_selector() -> String {
    ".pagination".to_string()
}

fn default_next_glyphs() -> Vec<String> {
    vec!["›".to_string(), ">".to_string()]
}

fn default_driver() -> DriverKind {
    DriverKind::WebDriver
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    1
}

fn default_ui_timeout_secs() -> u64 {
    10
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_max_pages() -> usize {
    1000
}

fn default_dedupe_probes() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("link-walker/{}", env!("CARGO_PKG_VERSION"))
}

fn default_seed_pattern() -> String {
    r"^https://[\w\-\.]+/[\w\-]+/$".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_report_format() -> ReportFormat {
    ReportFormat::Csv
}
