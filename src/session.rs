//! Seed-level orchestration
//!
//! A session hands seeds to a fixed pool of workers. Each worker launches
//! its own driver lazily, reuses it across seeds and replaces it after a
//! fatal automation error. A seed's failure never reaches other seeds.

use crate::config::CheckerConfig;
use crate::drivers::{Driver, DriverFactory};
use crate::error::{CheckError, ConfigError};
use crate::filter::LinkFilter;
use crate::probe::{CachingProbe, LinkProbe};
use crate::report::ReportSink;
use crate::results::{RecordBatch, SeedReport, SeedStatus, SessionSummary, WalkStats};
use crate::utils::RunTimer;
use crate::walker::ListingWalker;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

struct Shared<F: DriverFactory> {
    factory: F,
    probe: Arc<dyn LinkProbe>,
    sink: Arc<dyn ReportSink>,
    config: CheckerConfig,
    filter: LinkFilter,
    cancel: CancellationToken,
}

/// Runs the crawl for a set of seeds
pub struct CrawlSession<F: DriverFactory + 'static> {
    shared: Arc<Shared<F>>,
}

impl<F: DriverFactory + 'static> CrawlSession<F> {
    pub fn new(
        factory: F,
        probe: Arc<dyn LinkProbe>,
        sink: Arc<dyn ReportSink>,
        config: CheckerConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_cancellation(factory, probe, sink, config, CancellationToken::new())
    }

    /// Create a session that stops cooperatively once `cancel` fires
    pub fn with_cancellation(
        factory: F,
        probe: Arc<dyn LinkProbe>,
        sink: Arc<dyn ReportSink>,
        config: CheckerConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let filter = LinkFilter::from_config(&config)?;
        Ok(Self {
            shared: Arc::new(Shared {
                factory,
                probe,
                sink,
                config,
                filter,
                cancel,
            }),
        })
    }

    /// Token that cancels this session
    pub fn cancellation(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Crawl every seed and emit one report per seed with broken links
    pub async fn run(&self, seeds: &[String]) -> SessionSummary {
        let timer = RunTimer::start("Link check");
        let num_workers = self.shared.config.max_concurrency.min(seeds.len()).max(1);
        ::log::info!(
            "Checking {} seeds with {} worker(s)",
            seeds.len(),
            num_workers
        );

        let (seed_tx, seed_rx) = mpsc::channel::<(usize, String)>(seeds.len().max(1));
        let (result_tx, mut result_rx) = mpsc::channel::<(usize, SeedReport)>(seeds.len().max(1));

        for (index, seed) in seeds.iter().enumerate() {
            if seed_tx.send((index, seed.clone())).await.is_err() {
                ::log::error!("Seed queue closed before {} was queued", seed);
            }
        }
        // Workers stop once the queue is drained
        drop(seed_tx);

        let seed_rx = Arc::new(Mutex::new(seed_rx));
        let mut handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&self.shared),
                Arc::clone(&seed_rx),
                result_tx.clone(),
            )));
        }
        drop(result_tx);

        let mut reports = Vec::with_capacity(seeds.len());
        while let Some(report) = result_rx.recv().await {
            reports.push(report);
        }
        for handle in handles {
            if let Err(e) = handle.await {
                ::log::error!("Worker task failed: {}", e);
            }
        }

        reports.sort_by_key(|(index, _)| *index);
        let summary = SessionSummary {
            seeds: reports.into_iter().map(|(_, report)| report).collect(),
            elapsed: timer.elapsed(),
        };
        ::log::info!(
            "Checked {} seeds: {} broken links, {} seeds failed",
            summary.seeds.len(),
            summary.total_records(),
            summary.failed_seeds()
        );
        summary
    }
}

/// Gets the next seed from the shared queue
async fn next_seed(queue: &Mutex<mpsc::Receiver<(usize, String)>>) -> Option<(usize, String)> {
    queue.lock().await.recv().await
}

async fn worker_loop<F: DriverFactory + 'static>(
    worker_id: usize,
    shared: Arc<Shared<F>>,
    queue: Arc<Mutex<mpsc::Receiver<(usize, String)>>>,
    results: mpsc::Sender<(usize, SeedReport)>,
) {
    ::log::debug!("Worker {} started", worker_id);
    let mut driver: Option<F::Driver> = None;

    while let Some((index, seed)) = next_seed(&queue).await {
        let report = if shared.cancel.is_cancelled() {
            ::log::info!("Not starting {}: session cancelled", seed);
            SeedReport {
                seed,
                status: SeedStatus::Cancelled(None),
                records: 0,
                stats: WalkStats::default(),
            }
        } else {
            // Launch lazily so idle workers never open a browser
            let active = match driver.take() {
                Some(active) => Some(active),
                None => match shared.factory.launch().await {
                    Ok(launched) => Some(launched),
                    Err(e) => {
                        ::log::error!("Worker {} could not start a browser: {}", worker_id, e);
                        None
                    }
                },
            };

            match active {
                Some(active) => {
                    let (report, fatal) = shared.run_seed(&active, seed).await;
                    if fatal {
                        ::log::warn!("Worker {} discarding unusable browser", worker_id);
                        quit_driver(worker_id, &active).await;
                    } else {
                        driver = Some(active);
                    }
                    report
                }
                None => SeedReport {
                    seed,
                    status: SeedStatus::Failed("browser could not be started".to_string()),
                    records: 0,
                    stats: WalkStats::default(),
                },
            }
        };

        if let Err(e) = results.send((index, report)).await {
            ::log::error!("Worker {} failed to send result: {}", worker_id, e);
        }
    }

    if let Some(active) = driver {
        quit_driver(worker_id, &active).await;
    }
    ::log::debug!("Worker {} finished", worker_id);
}

async fn quit_driver<D: Driver>(worker_id: usize, driver: &D) {
    if let Err(e) = driver.quit().await {
        ::log::warn!("Worker {} failed to close browser: {}", worker_id, e);
    }
}

impl<F: DriverFactory> Shared<F> {
    /// One seed's pass; the flag tells whether the driver must be replaced
    async fn run_seed(&self, driver: &F::Driver, seed: String) -> (SeedReport, bool) {
        ::log::info!("Checking {}", seed);
        let mut batch = RecordBatch::new();
        let result = self.walk_seed(driver, &seed, &mut batch).await;
        let records = batch.len();

        match result {
            Ok(stats) => {
                ::log::info!(
                    "Finished {}: {} pages, {} articles ({} skipped), {} broken links",
                    seed,
                    stats.pages,
                    stats.articles,
                    stats.failed_articles,
                    records
                );
                let status = match self.emit(&seed, batch) {
                    Ok(Some(path)) => SeedStatus::Saved(path),
                    Ok(None) => SeedStatus::Empty,
                    Err(e) => SeedStatus::Failed(e.to_string()),
                };
                let report = SeedReport {
                    seed,
                    status,
                    records,
                    stats,
                };
                (report, false)
            }
            Err(CheckError::Cancelled) => {
                ::log::warn!("Cancelled while checking {}", seed);
                let saved = match self.emit(&seed, batch) {
                    Ok(path) => path,
                    Err(e) => {
                        ::log::error!("{}", e);
                        None
                    }
                };
                let report = SeedReport {
                    seed,
                    status: SeedStatus::Cancelled(saved),
                    records,
                    stats: WalkStats::default(),
                };
                (report, false)
            }
            Err(e) => {
                ::log::error!("Check of {} aborted: {}", seed, e);
                let fatal = e.is_fatal();
                let report = SeedReport {
                    seed,
                    status: SeedStatus::Failed(e.to_string()),
                    records,
                    stats: WalkStats::default(),
                };
                (report, fatal)
            }
        }
    }

    async fn walk_seed(
        &self,
        driver: &F::Driver,
        seed: &str,
        batch: &mut RecordBatch,
    ) -> crate::error::Result<WalkStats> {
        driver.navigate(seed).await?;

        let cache;
        let probe: &dyn LinkProbe = if self.config.dedupe_probes {
            cache = CachingProbe::new(self.probe.as_ref());
            &cache
        } else {
            self.probe.as_ref()
        };

        let walker = ListingWalker::new(
            driver,
            probe,
            &self.filter,
            &self.config.selectors,
            self.config.ui_timeout(),
            self.config.max_pages,
            self.cancel.clone(),
        );
        walker.walk(batch).await
    }

    /// Hand a non-empty batch to the sink
    fn emit(&self, seed: &str, batch: RecordBatch) -> Result<Option<std::path::PathBuf>, CheckError> {
        if batch.is_empty() {
            ::log::info!("Nothing to save for {}", seed);
            return Ok(None);
        }
        let path = self.sink.emit(seed, batch.records())?;
        Ok(Some(path))
    }
}
