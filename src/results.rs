use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Why a link was reported as broken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkError {
    /// The server answered with a status other than 200
    Status(u16),
    /// The request never produced a response
    Transport(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Status(code) => write!(f, "{}", code),
            LinkError::Transport(reason) => write!(f, "{}", reason),
        }
    }
}

/// A broken outbound link found inside an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLinkRecord {
    /// Heading text of the article containing the link
    pub article_title: String,

    /// URL of the article containing the link
    pub article_url: String,

    /// Status code or transport failure reason
    pub error: LinkError,

    /// Visible text of the anchor
    pub anchor_text: String,

    /// Resolved href of the anchor
    pub target_url: String,
}

/// Ordered records collected during one seed's crawl pass
#[derive(Debug, Default)]
pub struct RecordBatch {
    records: Vec<BrokenLinkRecord>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = BrokenLinkRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[BrokenLinkRecord] {
        &self.records
    }
}

/// Counters gathered while walking one listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Listing pages visited
    pub pages: usize,
    /// Articles inspected successfully
    pub articles: usize,
    /// Articles skipped because inspection failed
    pub failed_articles: usize,
}

/// How one seed's pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedStatus {
    /// Records were written to the given report
    Saved(PathBuf),
    /// The pass completed without finding broken links
    Empty,
    /// The pass was aborted
    Failed(String),
    /// The run was cancelled; partial records may have been saved
    Cancelled(Option<PathBuf>),
}

/// Outcome of one seed's crawl pass
#[derive(Debug, Clone)]
pub struct SeedReport {
    pub seed: String,
    pub status: SeedStatus,
    pub records: usize,
    pub stats: WalkStats,
}

/// Outcome of a whole session
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub seeds: Vec<SeedReport>,
    pub elapsed: Duration,
}

impl SessionSummary {
    pub fn total_records(&self) -> usize {
        self.seeds.iter().map(|s| s.records).sum()
    }

    pub fn failed_seeds(&self) -> usize {
        self.seeds
            .iter()
            .filter(|s| matches!(s.status, SeedStatus::Failed(_)))
            .count()
    }

    /// Report for a given seed, if it was processed
    pub fn seed(&self, seed: &str) -> Option<&SeedReport> {
        self.seeds.iter().find(|s| s.seed == seed)
    }
}
