use crate::config::SelectorConfig;
use crate::drivers::Driver;
use crate::error::{CheckError, Result};
use crate::filter::LinkFilter;
use crate::probe::LinkProbe;
use crate::results::{BrokenLinkRecord, LinkError};
use std::time::Duration;

/// Error text recorded for an anchor that has no usable `href`
pub const MISSING_HREF: &str = "missing href";

/// Opens one article in its own window and checks the links in its content
pub struct ArticleInspector<'a, D: Driver, P: LinkProbe + ?Sized> {
    driver: &'a D,
    probe: &'a P,
    filter: &'a LinkFilter,
    selectors: &'a SelectorConfig,
    timeout: Duration,
}

impl<'a, D: Driver, P: LinkProbe + ?Sized> ArticleInspector<'a, D, P> {
    pub fn new(
        driver: &'a D,
        probe: &'a P,
        filter: &'a LinkFilter,
        selectors: &'a SelectorConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            driver,
            probe,
            filter,
            selectors,
            timeout,
        }
    }

    /// Inspect the article behind `entry` and return its broken links
    ///
    /// The article window is closed and `listing` refocused on every path,
    /// including when the inspection itself fails.
    pub async fn inspect(
        &self,
        listing: &D::Window,
        entry: &D::Element,
    ) -> Result<Vec<BrokenLinkRecord>> {
        let article_url = self
            .driver
            .attr(entry, "href")
            .await?
            .filter(|href| !href.is_empty())
            .ok_or_else(|| CheckError::not_found(format!("{}[href]", self.selectors.entry)))?;

        ::log::debug!("Opening article {}", article_url);
        let window = match self.driver.open_window(&article_url).await {
            Ok(window) => window,
            Err(e) => {
                // A failed open may still have moved the foreground
                if let Err(focus_err) = self.driver.focus(listing).await {
                    return Err(CheckError::Fatal(format!(
                        "listing lost after failing to open {}: {}",
                        article_url, focus_err
                    )));
                }
                return Err(e);
            }
        };

        let result = self.inspect_open(&article_url).await;

        let closed = self.driver.close(&window).await;
        let focused = self.driver.focus(listing).await;

        match (result, closed, focused) {
            (Ok(records), Ok(()), Ok(())) => Ok(records),
            // A teardown failure leaves the driver in an unknown state and wins
            (_, Err(e), _) | (_, _, Err(e)) => {
                ::log::error!("Failed to close article window for {}: {}", article_url, e);
                Err(CheckError::Fatal(format!(
                    "window teardown failed for {}: {}",
                    article_url, e
                )))
            }
            (Err(e), Ok(()), Ok(())) => Err(e),
        }
    }

    /// Steps run while the article window is in the foreground
    async fn inspect_open(&self, article_url: &str) -> Result<Vec<BrokenLinkRecord>> {
        let heading = self
            .driver
            .wait_for(&self.selectors.heading, self.timeout)
            .await?;
        let article_title = self.driver.text(&heading).await?.trim().to_string();

        let containers = self.driver.find_all(&self.selectors.content).await?;
        let Some(container) = containers.first() else {
            ::log::warn!(
                "No content container `{}` in \"{}\" ({})",
                self.selectors.content,
                article_title,
                article_url
            );
            return Ok(Vec::new());
        };

        let anchors = self
            .driver
            .find_within(container, &self.selectors.anchor)
            .await?;
        ::log::debug!(
            "Checking {} links in \"{}\" ({})",
            anchors.len(),
            article_title,
            article_url
        );

        let mut records = Vec::new();
        for anchor in &anchors {
            let anchor_text = self.driver.text(anchor).await?.trim().to_string();
            let Some(target_url) = self.driver.attr(anchor, "href").await? else {
                ::log::info!(
                    "Anchor without target in \"{}\": {:?}",
                    article_title,
                    anchor_text
                );
                records.push(BrokenLinkRecord {
                    article_title: article_title.clone(),
                    article_url: article_url.to_string(),
                    error: LinkError::Transport(MISSING_HREF.to_string()),
                    anchor_text,
                    target_url: String::new(),
                });
                continue;
            };
            if !self.filter.should_check(&target_url) {
                ::log::trace!("Link filter rejected: {}", target_url);
                continue;
            }

            let outcome = self.probe.probe(&target_url).await;
            if let Some(error) = outcome.failure() {
                ::log::info!(
                    "Broken link in \"{}\": {} ({})",
                    article_title,
                    target_url,
                    error
                );
                records.push(BrokenLinkRecord {
                    article_title: article_title.clone(),
                    article_url: article_url.to_string(),
                    error,
                    anchor_text,
                    target_url,
                });
            }
        }

        Ok(records)
    }
}
