use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info, warn};

use crate::driver::{DriverError, PageDriver};

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    /// DevTools endpoint of an already running Chrome, e.g. `http://127.0.0.1:9222`.
    pub attach_url: Option<String>,
    pub window_size: (u32, u32),
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            attach_url: None,
            window_size: (1920, 1080),
        }
    }
}

/// One browser process. Pages opened from it share its profile.
pub struct BrowserSession {
    browser: Browser,
}

impl BrowserSession {
    pub fn launch(options: &BrowserOptions) -> Result<Self> {
        if let Some(url) = &options.attach_url {
            info!(%url, "attaching to existing Chrome");
            match Browser::connect(url.clone()) {
                Ok(browser) => return Ok(Self { browser }),
                Err(e) => warn!("could not attach ({e:#}), launching a new browser"),
            }
        }

        let launch = LaunchOptions {
            headless: options.headless,
            window_size: Some(options.window_size),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-infobars"),
            ],
            idle_browser_timeout: Duration::from_secs(300),
            ..Default::default()
        };

        info!(headless = options.headless, "starting Chrome");
        let browser = Browser::new(launch).map_err(|e| anyhow!("Browser launch failed: {e}"))?;
        Ok(Self { browser })
    }

    /// Open a fresh tab parked on `about:blank`.
    pub fn new_page(&self) -> Result<ChromePage> {
        let tab = self.browser.new_tab().context("could not open a tab")?;
        tab.navigate_to("about:blank")?;
        debug!("new tab ready");
        Ok(ChromePage { tab })
    }
}

/// [`PageDriver`] over a headless_chrome tab. The tab API is blocking, so
/// every call hops onto the blocking pool.
#[derive(Clone)]
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    async fn blocking<T, F>(&self, timeout: Option<Duration>, f: F) -> Result<T, DriverError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| DriverError::Closed(format!("driver task aborted: {e}")))?
            .map_err(|e| classify(e, timeout))
    }
}

fn classify(err: anyhow::Error, timeout: Option<Duration>) -> DriverError {
    let message = format!("{err:#}");
    let lower = message.to_ascii_lowercase();
    if lower.contains("connection is closed") || lower.contains("target closed") {
        return DriverError::Closed(message);
    }
    if let Some(limit) = timeout {
        if lower.contains("never came") || lower.contains("timed out") || lower.contains("timeout")
        {
            return DriverError::Timeout(limit);
        }
    }
    DriverError::Failed(message)
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        let url = url.to_string();
        self.blocking(Some(timeout), move |tab| {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let selector = selector.to_string();
        self.blocking(Some(timeout), move |tab| {
            let el = tab.wait_for_element_with_custom_timeout(&selector, timeout)?;
            el.click()?;
            Ok(())
        })
        .await
    }

    async fn fill(
        &self,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let selector = selector.to_string();
        let text = text.to_string();
        self.blocking(Some(timeout), move |tab| {
            let el = tab.wait_for_element_with_custom_timeout(&selector, timeout)?;
            el.click()?;
            tab.evaluate(
                &format!("document.querySelector({}).value = ''", js_string(&selector)),
                false,
            )?;
            tab.type_str(&text)?;
            Ok(())
        })
        .await
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let selector = selector.to_string();
        self.blocking(Some(timeout), move |tab| {
            tab.wait_for_element_with_custom_timeout(&selector, timeout)?;
            Ok(())
        })
        .await
    }

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let script = format!(
            r#"(() => {{
  const el = document.querySelector({sel});
  if (!el || !el.options) return 'not a select element';
  const want = {val};
  const opt = [...el.options].find(o => o.value === want || o.text.trim() === want);
  if (!opt) return 'no option ' + want;
  el.value = opt.value;
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return 'ok';
}})()"#,
            sel = js_string(selector),
            val = js_string(value),
        );
        let selector = selector.to_string();
        self.blocking(Some(timeout), move |tab| {
            tab.wait_for_element_with_custom_timeout(&selector, timeout)?;
            let result = tab.evaluate(&script, false)?;
            match result.value.as_ref().and_then(|v| v.as_str()) {
                Some("ok") => Ok(()),
                Some(reason) => Err(anyhow!("{reason}")),
                None => Err(anyhow!("select script returned nothing")),
            }
        })
        .await
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let script = script.to_string();
        self.blocking(None, move |tab| {
            let result = tab.evaluate(&script, false)?;
            Ok(result.value.unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    async fn title(&self) -> Result<String, DriverError> {
        self.blocking(None, |tab| tab.get_title()).await
    }

    async fn url(&self) -> Result<String, DriverError> {
        self.blocking(None, |tab| Ok(tab.get_url())).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.blocking(None, |tab| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        })
        .await
    }
}
