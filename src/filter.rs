use crate::config::CheckerConfig;
use crate::error::ConfigError;
use regex::Regex;
use url::Url;

fn compile(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Decides which anchors found in an article are probed
#[derive(Debug, Default)]
pub struct LinkFilter {
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl LinkFilter {
    /// Create a link filter from include and exclude patterns
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include_regexes: compile(include)?,
            exclude_regexes: compile(exclude)?,
        })
    }

    pub fn from_config(config: &CheckerConfig) -> Result<Self, ConfigError> {
        Self::new(&config.include_patterns, &config.exclude_patterns)
    }

    /// Determine if a link should be probed
    pub fn should_check(&self, target: &str) -> bool {
        // Exclusions take precedence
        if self.exclude_regexes.iter().any(|r| r.is_match(target)) {
            return false;
        }

        // If include patterns are specified, at least one must match
        self.include_regexes.is_empty() || self.include_regexes.iter().any(|r| r.is_match(target))
    }
}

/// Validates seed URLs before a run starts
#[derive(Debug)]
pub struct SeedValidator {
    pattern: Regex,
}

impl SeedValidator {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { pattern })
    }

    pub fn from_config(config: &CheckerConfig) -> Result<Self, ConfigError> {
        Self::new(&config.seed_pattern)
    }

    pub fn is_valid(&self, seed: &str) -> bool {
        self.pattern.is_match(seed) && Url::parse(seed).is_ok()
    }

    /// Check every seed, failing on the first one of the wrong shape
    pub fn validate_all(&self, seeds: &[String]) -> Result<(), ConfigError> {
        match seeds.iter().find(|seed| !self.is_valid(seed)) {
            Some(bad) => Err(ConfigError::InvalidSeed(bad.clone())),
            None => Ok(()),
        }
    }
}
