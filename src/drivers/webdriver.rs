use crate::drivers::{Driver, DriverFactory};
use crate::error::{CheckError, Result};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::wd::{Capabilities, WindowHandle};
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::time::Duration;

/// Common WebDriver endpoints tried when the configured one is unreachable
const FALLBACK_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4723", // Appium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

/// Launches browser sessions on a WebDriver server
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    webdriver_url: String,
    headless: bool,
}

impl WebDriverFactory {
    pub fn new(webdriver_url: impl Into<String>, headless: bool) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            headless,
        }
    }

    fn capabilities(&self) -> Capabilities {
        let mut args = vec!["--disable-blink-features=AutomationControlled"];
        if self.headless {
            args.push("--headless=new");
        }

        let mut caps = Capabilities::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }

    async fn connect(&self, url: &str) -> std::result::Result<Client, String> {
        ClientBuilder::native()
            .capabilities(self.capabilities())
            .connect(url)
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    type Driver = WebDriverSession;

    async fn launch(&self) -> Result<WebDriverSession> {
        match self.connect(&self.webdriver_url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", self.webdriver_url);
                return Ok(WebDriverSession::new(client));
            }
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    self.webdriver_url,
                    e
                );
            }
        }

        for url in FALLBACK_URLS.iter() {
            if *url == self.webdriver_url {
                continue;
            }

            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = self.connect(url).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(WebDriverSession::new(client));
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(CheckError::Fatal(format!(
            "no WebDriver server reachable at {} or fallbacks",
            self.webdriver_url
        )))
    }
}

/// One browser session on a WebDriver server
#[derive(Debug, Clone)]
pub struct WebDriverSession {
    client: Client,
}

impl WebDriverSession {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Map a WebDriver command error onto the crawl error taxonomy
fn classify(error: CmdError, context: &str) -> CheckError {
    if error.is_no_such_element() {
        return CheckError::not_found(context);
    }
    if error.is_stale_element_reference() {
        return CheckError::StaleElement;
    }
    if error.is_invalid_session_id() || error.is_session_not_created() {
        return CheckError::Fatal(format!("{}: {}", context, error));
    }

    match error {
        CmdError::WaitTimeout => CheckError::Timeout {
            what: context.to_string(),
            after: Duration::ZERO,
        },
        CmdError::Lost(_) | CmdError::Failed(_) | CmdError::FailedC(_) => {
            CheckError::Fatal(format!("{}: {}", context, error))
        }
        other => CheckError::Automation(format!("{}: {}", context, other)),
    }
}

#[async_trait]
impl Driver for WebDriverSession {
    type Element = Element;
    type Window = WindowHandle;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.client
            .goto(url)
            .await
            .map_err(|e| classify(e, &format!("navigating to {}", url)))
    }

    async fn current_window(&self) -> Result<WindowHandle> {
        self.client
            .window()
            .await
            .map_err(|e| classify(e, "reading current window"))
    }

    async fn open_window(&self, url: &str) -> Result<WindowHandle> {
        let origin = self
            .client
            .window()
            .await
            .map_err(|e| classify(e, "reading current window"))?;
        let response = self
            .client
            .new_window(true)
            .await
            .map_err(|e| classify(e, "opening window"))?;
        let handle = response.handle;

        self.client
            .switch_to_window(handle.clone())
            .await
            .map_err(|e| classify(e, "switching to new window"))?;

        if let Err(e) = self.client.goto(url).await {
            // Do not leave a half-opened window behind
            if let Err(close_err) = self.client.close_window().await {
                ::log::warn!("Failed to close window after navigation error: {}", close_err);
            }
            self.client
                .switch_to_window(origin)
                .await
                .map_err(|e| classify(e, "switching back after failed open"))?;
            return Err(classify(e, &format!("opening {}", url)));
        }

        Ok(handle)
    }

    async fn focus(&self, window: &WindowHandle) -> Result<()> {
        self.client
            .switch_to_window(window.clone())
            .await
            .map_err(|e| classify(e, "switching window"))
    }

    async fn close(&self, window: &WindowHandle) -> Result<()> {
        self.focus(window).await?;
        self.client
            .close_window()
            .await
            .map_err(|e| classify(e, "closing window"))
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Element>> {
        self.client
            .find_all(Locator::Css(selector))
            .await
            .map_err(|e| classify(e, selector))
    }

    async fn find_within(&self, parent: &Element, selector: &str) -> Result<Vec<Element>> {
        parent
            .find_all(Locator::Css(selector))
            .await
            .map_err(|e| classify(e, selector))
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<Element> {
        self.client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map_err(|e| match classify(e, selector) {
                CheckError::Timeout { what, .. } => CheckError::Timeout {
                    what,
                    after: timeout,
                },
                other => other,
            })
    }

    async fn wait_for_all(&self, selector: &str, timeout: Duration) -> Result<Vec<Element>> {
        self.wait_for(selector, timeout).await?;
        self.find_all(selector).await
    }

    async fn text(&self, element: &Element) -> Result<String> {
        element
            .text()
            .await
            .map_err(|e| classify(e, "reading element text"))
    }

    async fn attr(&self, element: &Element, name: &str) -> Result<Option<String>> {
        let context = format!("reading attribute {}", name);
        let raw = element
            .attr(name)
            .await
            .map_err(|e| classify(e, &context))?;
        if name != "href" {
            return Ok(raw);
        }
        if raw.as_deref().is_none_or(|href| href.trim().is_empty()) {
            return Ok(None);
        }
        // The `href` property is already resolved against the document URL
        element.prop(name).await.map_err(|e| classify(e, &context))
    }

    async fn click(&self, element: &Element) -> Result<()> {
        element
            .click()
            .await
            .map_err(|e| classify(e, "clicking element"))
    }

    async fn is_stale(&self, element: &Element) -> Result<bool> {
        match element.is_enabled().await {
            Ok(_) => Ok(false),
            Err(e) => match classify(e, "checking element") {
                CheckError::StaleElement | CheckError::ElementNotFound { .. } => Ok(true),
                other => Err(other),
            },
        }
    }

    async fn quit(&self) -> Result<()> {
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| classify(e, "closing browser session"))
    }
}
