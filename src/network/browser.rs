// * Browser Fetcher - headless Chromium login and profile scrape
// * One fresh browser per cycle; no cookies or sessions survive between samples

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::constants::{LOGIN_SETTLE_SECS, PAGE_TIMEOUT_MS};
use crate::network::errors::FetchError;
use crate::network::fetcher::{RawSample, SampleFetcher};

// * Reads textContent rather than innerText so hidden label spans are included
const TEXT_CONTENT_FN: &str = "function() { return this.textContent; }";

/// Selectors of the login form on the landing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
}

/// Everything the fetcher needs to reach the two traffic totals
#[derive(Clone)]
pub struct BrowserConfig {
    pub main_url: Url,
    pub profile_url: Url,
    pub username: String,
    pub password: String,
    pub login_form: LoginForm,
    pub download_selector: String,
    pub upload_selector: String,
    pub headless: bool,
}

impl std::fmt::Debug for BrowserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserConfig")
            .field("main_url", &self.main_url.as_str())
            .field("profile_url", &self.profile_url.as_str())
            .field("username", &self.username)
            .field("login_form", &self.login_form)
            .field("download_selector", &self.download_selector)
            .field("upload_selector", &self.upload_selector)
            .field("headless", &self.headless)
            .finish()
    }
}

/// [`SampleFetcher`] driving a real Chromium through the DevTools protocol
pub struct BrowserFetcher {
    config: BrowserConfig,
}

impl BrowserFetcher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    // * Launches a browser and spawns its event handler
    async fn launch(&self) -> Result<(Browser, tokio::task::JoinHandle<()>), FetchError> {
        let mut builder = CdpBrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");
        if !self.config.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(FetchError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::BrowserLaunch(e.to_string()))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler event error");
                }
            }
        });

        Ok((browser, handle))
    }

    // * Logs in on the landing page, then reads both totals from the profile page
    async fn scrape(&self, browser: &Browser) -> Result<RawSample, FetchError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()))?;

        info!(url = %self.config.main_url, "Opening landing page");
        bounded(page.goto(self.config.main_url.as_str()), FetchError::Navigation).await?;
        tokio::time::sleep(Duration::from_secs(LOGIN_SETTLE_SECS)).await;

        self.log_in(&page).await?;

        info!(url = %self.config.profile_url, "Fetching profile page");
        bounded(page.goto(self.config.profile_url.as_str()), FetchError::Navigation).await?;

        let download = read_text(&page, &self.config.download_selector).await?;
        let upload = read_text(&page, &self.config.upload_selector).await?;

        let _ = page.close().await;

        Ok(RawSample { download, upload })
    }

    async fn log_in(&self, page: &Page) -> Result<(), FetchError> {
        let form = &self.config.login_form;

        fill(page, &form.username_selector, &self.config.username).await?;
        fill(page, &form.password_selector, &self.config.password).await?;

        page.find_element(form.submit_selector.as_str())
            .await
            .map_err(|_| FetchError::MissingElement(form.submit_selector.clone()))?
            .click()
            .await
            .map_err(|e| FetchError::Login(e.to_string()))?;

        bounded(page.wait_for_navigation(), FetchError::Login).await?;
        debug!("Login form submitted");
        Ok(())
    }
}

#[async_trait]
impl SampleFetcher for BrowserFetcher {
    async fn fetch_raw_sample(&self) -> Result<RawSample, FetchError> {
        let (mut browser, handler) = self.launch().await?;

        let result = self.scrape(&browser).await;

        // * Close on every path, the next cycle starts from a clean profile
        if let Err(e) = browser.close().await {
            warn!(error = %e, "Browser did not close cleanly");
        }
        let _ = browser.wait().await;
        handler.abort();

        result
    }
}

// * Applies the page timeout to one DevTools round trip
async fn bounded<T, E, F>(fut: F, on_err: fn(String) -> FetchError) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(Duration::from_millis(PAGE_TIMEOUT_MS), fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(on_err(e.to_string())),
        Err(_) => Err(FetchError::Timeout(PAGE_TIMEOUT_MS)),
    }
}

async fn fill(page: &Page, selector: &str, text: &str) -> Result<(), FetchError> {
    let element = page
        .find_element(selector)
        .await
        .map_err(|_| FetchError::MissingElement(selector.to_string()))?;
    element
        .click()
        .await
        .map_err(|e| FetchError::Login(e.to_string()))?;
    element
        .type_str(text)
        .await
        .map_err(|e| FetchError::Login(e.to_string()))?;
    Ok(())
}

async fn read_text(page: &Page, selector: &str) -> Result<String, FetchError> {
    let element = page
        .find_element(selector)
        .await
        .map_err(|_| FetchError::MissingElement(selector.to_string()))?;

    let returns = element
        .call_js_fn(TEXT_CONTENT_FN, false)
        .await
        .map_err(|e| FetchError::ContentExtraction(e.to_string()))?;

    returns
        .result
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| FetchError::ContentExtraction(format!("'{}' has no text", selector)))
}
