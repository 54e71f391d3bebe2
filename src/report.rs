use crate::config::{CheckerConfig, ReportFormat};
use crate::error::ReportError;
use crate::results::BrokenLinkRecord;
use crate::utils::derive_identity;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Persists the broken links found for one seed
pub trait ReportSink: Send + Sync {
    /// Write `records` under an identity derived from `seed`, returning the file written
    fn emit(&self, seed: &str, records: &[BrokenLinkRecord]) -> Result<PathBuf, ReportError>;
}

/// Report file for a seed: `error{identity}.{extension}` inside `dir`
pub fn report_path(dir: &Path, seed: &str, extension: &str) -> PathBuf {
    dir.join(format!("error{}.{}", derive_identity(seed), extension))
}

/// Build the sink selected by the configuration
pub fn sink_for(config: &CheckerConfig) -> Arc<dyn ReportSink> {
    match config.report_format {
        ReportFormat::Csv => Arc::new(CsvReport::new(&config.output_dir)),
        ReportFormat::Json => Arc::new(JsonReport::new(&config.output_dir)),
    }
}

fn ensure_dir(dir: &Path) -> Result<(), ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.display().to_string(),
        source,
    })
}

/// One CSV row; field order is the column order
#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Article title")]
    article_title: &'a str,
    #[serde(rename = "Article URL")]
    article_url: &'a str,
    #[serde(rename = "Error")]
    error: String,
    #[serde(rename = "Anchor text")]
    anchor_text: &'a str,
    #[serde(rename = "Target URL")]
    target_url: &'a str,
}

impl<'a> From<&'a BrokenLinkRecord> for CsvRow<'a> {
    fn from(record: &'a BrokenLinkRecord) -> Self {
        Self {
            article_title: &record.article_title,
            article_url: &record.article_url,
            error: record.error.to_string(),
            anchor_text: &record.anchor_text,
            target_url: &record.target_url,
        }
    }
}

/// Writes one CSV file per seed
#[derive(Debug, Clone)]
pub struct CsvReport {
    dir: PathBuf,
}

impl CsvReport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportSink for CsvReport {
    fn emit(&self, seed: &str, records: &[BrokenLinkRecord]) -> Result<PathBuf, ReportError> {
        ensure_dir(&self.dir)?;
        let path = report_path(&self.dir, seed, ReportFormat::Csv.extension());

        let mut writer = csv::Writer::from_path(&path)?;
        for record in records {
            writer.serialize(CsvRow::from(record))?;
        }
        writer.flush().map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        })?;

        ::log::info!("Saved {} broken links to {}", records.len(), path.display());
        Ok(path)
    }
}

/// Writes one pretty-printed JSON array per seed
#[derive(Debug, Clone)]
pub struct JsonReport {
    dir: PathBuf,
}

impl JsonReport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportSink for JsonReport {
    fn emit(&self, seed: &str, records: &[BrokenLinkRecord]) -> Result<PathBuf, ReportError> {
        ensure_dir(&self.dir)?;
        let path = report_path(&self.dir, seed, ReportFormat::Json.extension());

        let file = File::create(&path).map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), records)?;

        ::log::info!("Saved {} broken links to {}", records.len(), path.display());
        Ok(path)
    }
}
