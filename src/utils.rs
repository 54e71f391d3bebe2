use std::time::{Duration, Instant};

/// Derive a report identity from a seed URL
///
/// Every character that is not an ASCII letter, digit or underscore becomes
/// an underscore, so `https://gemma.by/soveti/` maps to
/// `https___gemma_by_soveti_`.
pub fn derive_identity(url: &str) -> String {
    url.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Split a duration into whole minutes and seconds
pub fn minutes_seconds(elapsed: Duration) -> (u64, u64) {
    let secs = elapsed.as_secs();
    (secs / 60, secs % 60)
}

/// Logs the elapsed time of a scope when dropped
pub struct RunTimer {
    label: &'static str,
    started: Instant,
}

impl RunTimer {
    pub fn start(label: &'static str) -> Self {
        ::log::debug!("{} started", label);
        Self {
            label,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for RunTimer {
    fn drop(&mut self) {
        let (minutes, seconds) = minutes_seconds(self.elapsed());
        ::log::info!("{} finished in {} min {} s", self.label, minutes, seconds);
    }
}
