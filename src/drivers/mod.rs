//! Browser automation capability
//!
//! The walker and inspector only talk to a [`Driver`]. Two backends exist:
//! [`webdriver::WebDriverSession`] drives a real browser over the W3C
//! WebDriver protocol, [`static_page::StaticPageDriver`] fetches pages over
//! plain HTTP and evaluates selectors against the parsed HTML.

pub mod static_page;
pub mod webdriver;

use crate::error::{CheckError, Result};
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::Instant;

pub use static_page::{StaticPageDriver, StaticPageFactory};
pub use webdriver::{WebDriverFactory, WebDriverSession};

/// Interval between two staleness checks
pub const STALENESS_POLL: Duration = Duration::from_millis(100);

/// One browser instance with its windows and element handles
///
/// Element handles are only valid for the document they were found in;
/// once the window navigates they become stale.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Handle to an element of the current document
    type Element: Clone + Debug + Send + Sync;

    /// Handle to one window (tab)
    type Window: Clone + Debug + PartialEq + Send + Sync;

    /// Navigate the foreground window
    async fn navigate(&self, url: &str) -> Result<()>;

    /// The foreground window
    async fn current_window(&self) -> Result<Self::Window>;

    /// Open `url` in a new window and make it the foreground window
    async fn open_window(&self, url: &str) -> Result<Self::Window>;

    /// Make `window` the foreground window
    async fn focus(&self, window: &Self::Window) -> Result<()>;

    /// Close `window`; the caller refocuses another window afterwards
    async fn close(&self, window: &Self::Window) -> Result<()>;

    /// All elements of the foreground document matching a CSS selector
    async fn find_all(&self, selector: &str) -> Result<Vec<Self::Element>>;

    /// Descendants of `parent` matching a CSS selector
    async fn find_within(
        &self,
        parent: &Self::Element,
        selector: &str,
    ) -> Result<Vec<Self::Element>>;

    /// Wait until an element matching `selector` is present
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<Self::Element>;

    /// Wait until at least one element matching `selector` is present, then return all of them
    async fn wait_for_all(&self, selector: &str, timeout: Duration) -> Result<Vec<Self::Element>>;

    /// Visible text of an element
    async fn text(&self, element: &Self::Element) -> Result<String>;

    /// Attribute value; `href` is returned resolved against the document URL
    async fn attr(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    /// Whether the element is no longer attached to the current document
    async fn is_stale(&self, element: &Self::Element) -> Result<bool>;

    /// Wait until `element` goes stale, proving that the page navigated
    async fn wait_until_stale(&self, element: &Self::Element, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_stale(element).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CheckError::timeout("element staleness", timeout));
            }
            tokio::time::sleep(STALENESS_POLL).await;
        }
    }

    /// End the browser session
    async fn quit(&self) -> Result<()>;
}

/// Creates driver instances; each session worker launches its own
#[async_trait]
pub trait DriverFactory: Send + Sync {
    type Driver: Driver + 'static;

    async fn launch(&self) -> Result<Self::Driver>;
}
