use clap::{Parser, ValueEnum};
use link_walker::{CheckerConfig, DriverKind, ReportFormat};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "link-walker")]
#[command(about = "Finds broken links in the articles of paginated listings")]
#[command(version)]
pub struct Args {
    /// Listing URLs to check, e.g. https://gemma.by/news/
    #[arg(required = true)]
    pub seeds: Vec<String>,

    /// Path to a JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Automation backend
    #[arg(short, long, value_enum)]
    pub driver: Option<DriverArg>,

    /// WebDriver server URL (overrides WEBDRIVER_URL)
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub show_browser: bool,

    /// Number of seeds checked at once, each with its own browser
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Directory receiving the reports
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Maximum listing pages per seed
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Element wait timeout in seconds
    #[arg(long)]
    pub ui_timeout: Option<u64>,

    /// Link probe timeout in seconds
    #[arg(long)]
    pub probe_timeout: Option<u64>,

    /// Append log output to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DriverArg {
    Webdriver,
    Static,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
}

impl Args {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply(&self, config: &mut CheckerConfig) {
        config.apply_env();

        if let Some(driver) = self.driver {
            config.driver = match driver {
                DriverArg::Webdriver => DriverKind::WebDriver,
                DriverArg::Static => DriverKind::Static,
            };
        }
        if let Some(url) = &self.webdriver_url {
            config.webdriver_url = url.clone();
        }
        if self.show_browser {
            config.headless = false;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(format) = self.format {
            config.report_format = match format {
                FormatArg::Csv => ReportFormat::Csv,
                FormatArg::Json => ReportFormat::Json,
            };
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(secs) = self.ui_timeout {
            config.ui_timeout_secs = secs;
        }
        if let Some(secs) = self.probe_timeout {
            config.probe_timeout_secs = secs;
        }
    }
}
