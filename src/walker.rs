use crate::config::SelectorConfig;
use crate::drivers::Driver;
use crate::error::{CheckError, Result};
use crate::filter::LinkFilter;
use crate::inspector::ArticleInspector;
use crate::probe::LinkProbe;
use crate::results::{RecordBatch, WalkStats};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Walks a paginated listing, inspecting every article on every page
///
/// Pagination follows the second-to-last link of the pagination control when
/// its label carries one of the configured "next" glyphs. A page only counts
/// as new once an entry captured on the previous page has gone stale.
pub struct ListingWalker<'a, D: Driver, P: LinkProbe + ?Sized> {
    driver: &'a D,
    inspector: ArticleInspector<'a, D, P>,
    selectors: &'a SelectorConfig,
    timeout: Duration,
    max_pages: usize,
    cancel: CancellationToken,
}

/// What the pagination step decided
#[derive(Debug, PartialEq, Eq)]
enum NextPage {
    Advanced,
    End(&'static str),
}

impl<'a, D: Driver, P: LinkProbe + ?Sized> ListingWalker<'a, D, P> {
    pub fn new(
        driver: &'a D,
        probe: &'a P,
        filter: &'a LinkFilter,
        selectors: &'a SelectorConfig,
        timeout: Duration,
        max_pages: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            driver,
            inspector: ArticleInspector::new(driver, probe, filter, selectors, timeout),
            selectors,
            timeout,
            max_pages,
            cancel,
        }
    }

    /// Walk from the listing page currently in the foreground
    ///
    /// Records are appended to `batch` as they are found, so a walk aborted
    /// by a fatal error or cancellation still leaves its partial results.
    pub async fn walk(&self, batch: &mut RecordBatch) -> Result<WalkStats> {
        let mut stats = WalkStats::default();
        let listing = self.driver.current_window().await?;

        loop {
            self.check_cancelled()?;

            let entries = match self.find_entries().await {
                Ok(entries) => entries,
                Err(CheckError::PageStructure(reason)) => {
                    ::log::info!("Listing ends after page {}: {}", stats.pages, reason);
                    break;
                }
                Err(e) => return Err(e),
            };
            stats.pages += 1;
            ::log::info!(
                "Listing page {}: {} articles",
                stats.pages,
                entries.len()
            );

            for (index, entry) in entries.iter().enumerate() {
                self.check_cancelled()?;

                match self.inspector.inspect(&listing, entry).await {
                    Ok(records) => {
                        stats.articles += 1;
                        batch.extend(records);
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        stats.failed_articles += 1;
                        ::log::warn!(
                            "Skipping article {} on listing page {}: {}",
                            index + 1,
                            stats.pages,
                            e
                        );
                    }
                }
            }

            self.check_cancelled()?;

            if stats.pages >= self.max_pages {
                ::log::warn!(
                    "Stopping after {} listing pages; pagination may be looping",
                    self.max_pages
                );
                break;
            }

            match self.advance(&entries[0]).await {
                Ok(NextPage::Advanced) => continue,
                Ok(NextPage::End(reason)) => {
                    ::log::info!("Listing ends after page {}: {}", stats.pages, reason);
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    ::log::warn!("Pagination failed after page {}: {}", stats.pages, e);
                    break;
                }
            }
        }

        Ok(stats)
    }

    /// Entry points of the current listing page; none is a page structure error
    async fn find_entries(&self) -> Result<Vec<D::Element>> {
        match self
            .driver
            .wait_for_all(&self.selectors.entry, self.timeout)
            .await
        {
            Ok(entries) if !entries.is_empty() => Ok(entries),
            Ok(_) => Err(CheckError::PageStructure(format!(
                "no article entries `{}`",
                self.selectors.entry
            ))),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Err(CheckError::PageStructure(format!(
                "no article entries `{}`: {}",
                self.selectors.entry, e
            ))),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(CheckError::Cancelled);
        }
        Ok(())
    }

    /// Click the "next" control and wait for `marker` to go stale
    async fn advance(&self, marker: &D::Element) -> Result<NextPage> {
        let controls = self.driver.find_all(&self.selectors.pagination).await?;
        let Some(control) = controls.first() else {
            return Ok(NextPage::End("no pagination control"));
        };

        let links = self.driver.find_within(control, "a").await?;
        if links.len() < 2 {
            return Ok(NextPage::End("pagination has no next link"));
        }

        let next = &links[links.len() - 2];
        let label = self.driver.text(next).await?;
        if !self.is_next_label(&label) {
            return Ok(NextPage::End("last page reached"));
        }

        self.driver.click(next).await?;
        match self.driver.wait_until_stale(marker, self.timeout).await {
            Ok(()) => Ok(NextPage::Advanced),
            Err(CheckError::Timeout { .. }) => {
                ::log::warn!("Next page link did not navigate within {:?}", self.timeout);
                Ok(NextPage::End("next link did not navigate"))
            }
            Err(e) => Err(e),
        }
    }

    fn is_next_label(&self, label: &str) -> bool {
        self.selectors
            .next_glyphs
            .iter()
            .filter(|glyph| !glyph.is_empty())
            .any(|glyph| label.contains(glyph.as_str()))
    }
}
