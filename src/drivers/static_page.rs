//! Driver over plain HTTP and parsed HTML
//!
//! Windows hold the fetched source of their current document. Element
//! handles are paths of `(selector, index)` steps re-evaluated against that
//! source, tagged with the document generation they were found in; any
//! navigation bumps the generation and so makes older handles stale.
//! Clicking a link follows its `href`. No JavaScript is executed.

use crate::drivers::{Driver, DriverFactory};
use crate::error::{CheckError, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

/// Handle to a window of a [`StaticPageDriver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(u64);

/// Handle to an element of a [`StaticPageDriver`] document
#[derive(Debug, Clone)]
pub struct StaticElement {
    window: u64,
    generation: u64,
    path: Vec<(String, usize)>,
}

#[derive(Debug)]
struct Document {
    /// `None` for the initial blank window
    url: Option<Url>,
    html: String,
    generation: u64,
}

#[derive(Debug, Default)]
struct State {
    windows: BTreeMap<u64, Document>,
    current: Option<u64>,
    next_window: u64,
    next_generation: u64,
    opened: usize,
    closed: usize,
}

impl State {
    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn current_id(&self) -> Result<u64> {
        self.current
            .filter(|id| self.windows.contains_key(id))
            .ok_or_else(|| CheckError::Automation("no foreground window".to_string()))
    }

    fn current_doc(&self) -> Result<(u64, &Document)> {
        let id = self.current_id()?;
        Ok((id, &self.windows[&id]))
    }

    /// Document an element belongs to, if the element is still attached
    fn live_doc(&self, element: &StaticElement) -> Option<&Document> {
        self.windows
            .get(&element.window)
            .filter(|doc| doc.generation == element.generation)
    }
}

/// Counters of window lifecycle events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// Windows opened with `open_window`
    pub opened: usize,
    /// Windows closed with `close`
    pub closed: usize,
    /// Windows currently open, including the initial one
    pub open_now: usize,
}

/// Driver evaluating CSS selectors against fetched HTML
#[derive(Debug)]
pub struct StaticPageDriver {
    client: Client,
    state: Mutex<State>,
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| CheckError::Automation(format!("invalid selector {}: {}", selector, e)))
}

/// Follow an element path inside a parsed document
fn resolve<'a>(doc: &'a Html, path: &[(String, usize)]) -> Result<Option<ElementRef<'a>>> {
    let mut steps = path.iter();
    let Some((first, index)) = steps.next() else {
        return Ok(None);
    };

    let mut current = doc.select(&parse_selector(first)?).nth(*index);
    for (selector, index) in steps {
        let selector = parse_selector(selector)?;
        current = match current {
            Some(parent) => parent.select(&selector).nth(*index),
            None => None,
        };
    }
    Ok(current)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl StaticPageDriver {
    /// Create a driver with one blank window in the foreground
    pub fn new(client: Client) -> Self {
        let mut state = State::default();
        let generation = state.bump_generation();
        state.windows.insert(
            0,
            Document {
                url: None,
                html: String::new(),
                generation,
            },
        );
        state.current = Some(0);
        state.next_window = 1;

        Self {
            client,
            state: Mutex::new(state),
        }
    }

    pub fn window_stats(&self) -> WindowStats {
        match self.state.lock() {
            Ok(state) => WindowStats {
                opened: state.opened,
                closed: state.closed,
                open_now: state.windows.len(),
            },
            Err(_) => WindowStats::default(),
        }
    }

    /// URL of the foreground document
    pub fn current_url(&self) -> Option<String> {
        let state = self.state.lock().ok()?;
        state
            .current_doc()
            .ok()
            .and_then(|(_, doc)| doc.url.as_ref().map(Url::to_string))
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| CheckError::Fatal("driver state poisoned".to_string()))
    }

    async fn fetch(&self, url: &str) -> Result<(Url, String)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CheckError::Automation(format!("navigating to {}: {}", url, e)))?;
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| CheckError::Automation(format!("reading {}: {}", url, e)))?;
        Ok((final_url, body))
    }

    /// Run `f` on a live element together with its document URL
    fn with_element<T>(
        &self,
        element: &StaticElement,
        f: impl FnOnce(ElementRef<'_>, Option<&Url>) -> Result<T>,
    ) -> Result<T> {
        let state = self.lock()?;
        let doc = state.live_doc(element).ok_or(CheckError::StaleElement)?;
        if state.current != Some(element.window) {
            return Err(CheckError::Automation(format!(
                "element of window {} used while it is not in the foreground",
                element.window
            )));
        }
        let html = Html::parse_document(&doc.html);
        match resolve(&html, &element.path)? {
            Some(found) => f(found, doc.url.as_ref()),
            None => Err(CheckError::StaleElement),
        }
    }

    /// Whether `target` only changes the fragment of the foreground document
    fn is_same_document(&self, target: &str) -> Result<bool> {
        let state = self.lock()?;
        let (_, doc) = state.current_doc()?;
        let (Some(current), Ok(mut target)) = (doc.url.as_ref(), Url::parse(target)) else {
            return Ok(false);
        };
        let mut current = current.clone();
        current.set_fragment(None);
        target.set_fragment(None);
        Ok(current == target)
    }

    fn resolved_href(element: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
        let raw = element
            .value()
            .attr("href")
            .filter(|href| !href.trim().is_empty())?;
        let resolved = match base {
            Some(base) => base.join(raw),
            None => Url::parse(raw),
        };
        Some(
            resolved
                .map(|u| u.to_string())
                .unwrap_or_else(|_| raw.to_string()),
        )
    }
}

#[async_trait]
impl Driver for StaticPageDriver {
    type Element = StaticElement;
    type Window = WindowId;

    async fn navigate(&self, url: &str) -> Result<()> {
        let (final_url, html) = self.fetch(url).await?;

        let mut state = self.lock()?;
        let id = state.current_id()?;
        let generation = state.bump_generation();
        state.windows.insert(
            id,
            Document {
                url: Some(final_url),
                html,
                generation,
            },
        );
        ::log::trace!("Window {} navigated to {}", id, url);
        Ok(())
    }

    async fn current_window(&self) -> Result<WindowId> {
        self.lock()?.current_id().map(WindowId)
    }

    async fn open_window(&self, url: &str) -> Result<WindowId> {
        // New windows are opened from the foreground one, as in a browser
        self.lock()?.current_id()?;
        let (final_url, html) = self.fetch(url).await?;

        let mut state = self.lock()?;
        let id = state.next_window;
        state.next_window += 1;
        let generation = state.bump_generation();
        state.windows.insert(
            id,
            Document {
                url: Some(final_url),
                html,
                generation,
            },
        );
        state.current = Some(id);
        state.opened += 1;
        Ok(WindowId(id))
    }

    async fn focus(&self, window: &WindowId) -> Result<()> {
        let mut state = self.lock()?;
        if !state.windows.contains_key(&window.0) {
            return Err(CheckError::Automation(format!("no such window: {}", window.0)));
        }
        state.current = Some(window.0);
        Ok(())
    }

    async fn close(&self, window: &WindowId) -> Result<()> {
        let mut state = self.lock()?;
        if state.windows.remove(&window.0).is_none() {
            return Err(CheckError::Automation(format!("no such window: {}", window.0)));
        }
        if state.current == Some(window.0) {
            state.current = None;
        }
        state.closed += 1;
        Ok(())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<StaticElement>> {
        let parsed = parse_selector(selector)?;
        let state = self.lock()?;
        let (window, doc) = state.current_doc()?;
        let count = Html::parse_document(&doc.html).select(&parsed).count();

        Ok((0..count)
            .map(|index| StaticElement {
                window,
                generation: doc.generation,
                path: vec![(selector.to_string(), index)],
            })
            .collect())
    }

    async fn find_within(
        &self,
        parent: &StaticElement,
        selector: &str,
    ) -> Result<Vec<StaticElement>> {
        let parsed = parse_selector(selector)?;
        let count = self.with_element(parent, |found, _| Ok(found.select(&parsed).count()))?;

        Ok((0..count)
            .map(|index| {
                let mut path = parent.path.clone();
                path.push((selector.to_string(), index));
                StaticElement {
                    window: parent.window,
                    generation: parent.generation,
                    path,
                }
            })
            .collect())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<StaticElement> {
        // A fetched document never changes, so one lookup settles the wait
        self.find_all(selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CheckError::timeout(format!("element `{}`", selector), timeout))
    }

    async fn wait_for_all(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Vec<StaticElement>> {
        let found = self.find_all(selector).await?;
        if found.is_empty() {
            return Err(CheckError::timeout(format!("elements `{}`", selector), timeout));
        }
        Ok(found)
    }

    async fn text(&self, element: &StaticElement) -> Result<String> {
        self.with_element(element, |found, _| {
            Ok(collapse_whitespace(&found.text().collect::<String>()))
        })
    }

    async fn attr(&self, element: &StaticElement, name: &str) -> Result<Option<String>> {
        self.with_element(element, |found, base| {
            if name == "href" {
                Ok(Self::resolved_href(found, base))
            } else {
                Ok(found.value().attr(name).map(str::to_string))
            }
        })
    }

    async fn click(&self, element: &StaticElement) -> Result<()> {
        let target = self.with_element(element, |found, base| {
            Ok(Self::resolved_href(found, base))
        })?;

        match target {
            Some(href) if self.is_same_document(&href)? => {
                ::log::debug!("Clicked in-page link {}, no navigation", href);
                Ok(())
            }
            Some(href) => self.navigate(&href).await,
            None => {
                ::log::debug!("Clicked element without href, nothing happens");
                Ok(())
            }
        }
    }

    async fn is_stale(&self, element: &StaticElement) -> Result<bool> {
        Ok(self.lock()?.live_doc(element).is_none())
    }

    async fn quit(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.windows.clear();
        state.current = None;
        Ok(())
    }
}

/// Launches [`StaticPageDriver`]s sharing one HTTP client
#[derive(Debug, Clone)]
pub struct StaticPageFactory {
    client: Client,
}

impl StaticPageFactory {
    /// `timeout` bounds every page load of the launched drivers
    pub fn new(timeout: Duration, user_agent: &str) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DriverFactory for StaticPageFactory {
    type Driver = StaticPageDriver;

    async fn launch(&self) -> Result<StaticPageDriver> {
        Ok(StaticPageDriver::new(self.client.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_navigation_makes_handles_stale() {
        let server = MockServer::start().await;
        serve(&server, "/a/", r#"<p><a href="/b/">next</a></p>"#).await;
        serve(&server, "/b/", "<p>done</p>").await;

        let driver = StaticPageDriver::new(Client::new());
        driver.navigate(&format!("{}/a/", server.uri())).await.unwrap();

        let link = driver.find_all("p a").await.unwrap().remove(0);
        assert!(!driver.is_stale(&link).await.unwrap());
        assert_eq!(
            driver.attr(&link, "href").await.unwrap(),
            Some(format!("{}/b/", server.uri()))
        );

        driver.click(&link).await.unwrap();
        assert!(driver.is_stale(&link).await.unwrap());
        assert!(matches!(
            driver.text(&link).await,
            Err(CheckError::StaleElement)
        ));
        assert_eq!(driver.current_url(), Some(format!("{}/b/", server.uri())));
    }

    #[tokio::test]
    async fn test_windows_are_tracked() {
        let server = MockServer::start().await;
        serve(&server, "/list/", "<h1>List</h1>").await;
        serve(&server, "/article/", "<h1>  Article\n title </h1>").await;

        let driver = StaticPageDriver::new(Client::new());
        driver.navigate(&format!("{}/list/", server.uri())).await.unwrap();
        let listing = driver.current_window().await.unwrap();

        let article = driver
            .open_window(&format!("{}/article/", server.uri()))
            .await
            .unwrap();
        let heading = driver.wait_for("h1", Duration::from_secs(1)).await.unwrap();
        assert_eq!(driver.text(&heading).await.unwrap(), "Article title");

        driver.close(&article).await.unwrap();
        assert!(driver.current_window().await.is_err());
        driver.focus(&listing).await.unwrap();

        assert_eq!(
            driver.window_stats(),
            WindowStats {
                opened: 1,
                closed: 1,
                open_now: 1,
            }
        );
        assert!(driver.close(&article).await.is_err());
    }

    #[tokio::test]
    async fn test_find_within_and_missing_elements() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/",
            r#"<div id="content"><a href="https://example.com/x">x</a><a>no target</a></div><a href="/out">out</a>"#,
        )
        .await;

        let driver = StaticPageDriver::new(Client::new());
        driver.navigate(&format!("{}/", server.uri())).await.unwrap();

        let container = driver.find_all("#content").await.unwrap().remove(0);
        let anchors = driver.find_within(&container, "a").await.unwrap();
        assert_eq!(anchors.len(), 2);
        assert_eq!(
            driver.attr(&anchors[0], "href").await.unwrap().as_deref(),
            Some("https://example.com/x")
        );
        assert_eq!(driver.attr(&anchors[1], "href").await.unwrap(), None);

        let missing = driver.wait_for("h1", Duration::from_millis(50)).await;
        assert!(matches!(missing, Err(CheckError::Timeout { .. })));
        assert!(driver.find_all("h1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fragment_link_does_not_reload() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/list/",
            r##"<a class="hash" href="#">›</a><a class="top" href="/list/#top">top</a>"##,
        )
        .await;

        let driver = StaticPageDriver::new(Client::new());
        driver.navigate(&format!("{}/list/", server.uri())).await.unwrap();

        for selector in [".hash", ".top"] {
            let link = driver.find_all(selector).await.unwrap().remove(0);
            driver.click(&link).await.unwrap();
            assert!(!driver.is_stale(&link).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_blank_href_reads_as_missing() {
        let server = MockServer::start().await;
        serve(&server, "/", r#"<a href="">empty</a><a href="  ">spaces</a>"#).await;

        let driver = StaticPageDriver::new(Client::new());
        driver.navigate(&format!("{}/", server.uri())).await.unwrap();

        for anchor in driver.find_all("a").await.unwrap() {
            assert_eq!(driver.attr(&anchor, "href").await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_background_elements_are_not_usable() {
        let server = MockServer::start().await;
        serve(&server, "/list/", "<h1>List</h1>").await;
        serve(&server, "/article/", "<h1>Article</h1>").await;

        let driver = StaticPageDriver::new(Client::new());
        driver.navigate(&format!("{}/list/", server.uri())).await.unwrap();
        let listing = driver.current_window().await.unwrap();
        let heading = driver.find_all("h1").await.unwrap().remove(0);

        let article = driver
            .open_window(&format!("{}/article/", server.uri()))
            .await
            .unwrap();
        assert!(matches!(
            driver.text(&heading).await,
            Err(CheckError::Automation(_))
        ));

        driver.close(&article).await.unwrap();
        assert!(
            driver
                .open_window(&format!("{}/article/", server.uri()))
                .await
                .is_err()
        );

        driver.focus(&listing).await.unwrap();
        assert_eq!(driver.text(&heading).await.unwrap(), "List");
    }

    #[tokio::test]
    async fn test_click_without_href_stays_put() {
        let server = MockServer::start().await;
        serve(&server, "/", "<span class=\"next\">›</span>").await;

        let driver = StaticPageDriver::new(Client::new());
        driver.navigate(&format!("{}/", server.uri())).await.unwrap();

        let span = driver.find_all(".next").await.unwrap().remove(0);
        driver.click(&span).await.unwrap();
        assert!(!driver.is_stale(&span).await.unwrap());

        let waited = driver
            .wait_until_stale(&span, Duration::from_millis(250))
            .await;
        assert!(matches!(waited, Err(CheckError::Timeout { .. })));
    }
}
