use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use browserless_client::{BrowserlessClient, RenderOptions};
use rand::Rng;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::traits::PageFetcher;

/// Max concurrent Browserless sessions. Each render holds a remote browser.
const MAX_CONCURRENT_RENDERS: usize = 4;

const RENDER_ATTEMPTS: u32 = 2;
const RENDER_RETRY_BASE: Duration = Duration::from_secs(2);

fn ensure_http(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).context("Invalid URL")?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("Only http/https URLs are allowed, got: {}", parsed.scheme());
    }
    Ok(())
}

// --- Browserless ---

/// Renders pages through a Browserless instance. One fetcher is shared by
/// every task in a run; `close` makes later fetches return `None`.
pub struct BrowserlessFetcher {
    client: BrowserlessClient,
    options: RenderOptions,
    semaphore: Semaphore,
    closed: AtomicBool,
}

impl BrowserlessFetcher {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let client = BrowserlessClient::new(base_url, token)?;
        info!(base_url, max_concurrent = MAX_CONCURRENT_RENDERS, "Using BrowserlessFetcher");
        Ok(Self {
            client,
            options: RenderOptions::default(),
            semaphore: Semaphore::new(MAX_CONCURRENT_RENDERS),
            closed: AtomicBool::new(false),
        })
    }

    async fn render(&self, url: &str) -> Result<String> {
        ensure_http(url)?;
        let _permit = self.semaphore.acquire().await.context("fetcher closed")?;

        let mut last_err = None;
        for attempt in 0..RENDER_ATTEMPTS {
            match self.client.content(url, &self.options).await {
                Ok(html) if !html.trim().is_empty() => return Ok(html),
                Ok(_) => last_err = Some(anyhow::anyhow!("empty DOM")),
                Err(e) => last_err = Some(e.into()),
            }
            if attempt + 1 < RENDER_ATTEMPTS {
                let jitter = Duration::from_millis(rand::rng().random_range(0..500));
                debug!(url, attempt = attempt + 1, "Render failed, retrying after backoff");
                tokio::time::sleep(RENDER_RETRY_BASE + jitter).await;
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("render failed")))
    }
}

#[async_trait]
impl PageFetcher for BrowserlessFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        if self.closed.load(Ordering::Relaxed) {
            return None;
        }
        match self.render(url).await {
            Ok(html) => Some(html),
            Err(e) => {
                warn!(url, fetcher = "browserless", error = %e, "Fetch failed");
                None
            }
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::Relaxed) {
            self.semaphore.close();
            info!("Browserless session closed");
        }
    }
}

// --- Plain HTTP ---

/// Static-HTML fetcher for when no rendering service is configured.
pub struct HttpFetcher {
    client: reqwest::Client,
    closed: AtomicBool,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; WealthSignal/0.1)")
            .build()
            .context("Failed to build HTTP client")?;
        info!("Using HttpFetcher (no JS rendering)");
        Ok(Self {
            client,
            closed: AtomicBool::new(false),
        })
    }

    async fn get(&self, url: &str) -> Result<String> {
        ensure_http(url)?;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {status}");
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        if self.closed.load(Ordering::Relaxed) {
            return None;
        }
        match self.get(url).await {
            Ok(html) => Some(html),
            Err(e) => {
                warn!(url, fetcher = "http", error = %e, "Fetch failed");
                None
            }
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}
