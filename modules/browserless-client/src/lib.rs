pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

/// Clicks the first visible consent/cookie button it recognises. Runs inside
/// the page; failures are swallowed so rendering proceeds regardless.
const CONSENT_DISMISS_SCRIPT: &str = r#"
(() => {
  try {
    const labels = ["accept all", "accept", "agree", "i agree", "allow all",
      "accepter", "godkend", "godta", "acceptera", "zustimmen", "alle akzeptieren",
      "tillad alle", "ok"];
    const buttons = Array.from(document.querySelectorAll("button, a[role=button], input[type=submit]"));
    for (const b of buttons) {
      const text = (b.innerText || b.value || "").trim().toLowerCase();
      if (labels.includes(text)) { b.click(); return; }
    }
  } catch (_) {}
})();
"#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    url: &'a str,
    goto_options: GotoOptions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    add_script_tag: Vec<ScriptTag<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_timeout: Option<u64>,
    best_attempt: bool,
    reject_resource_types: &'a [&'a str],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    wait_until: &'static str,
    timeout: u64,
}

#[derive(Debug, Serialize)]
struct ScriptTag<'a> {
    content: &'a str,
}

/// Options for a single `/content` render.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Inject the consent-dismissal script before capturing the DOM.
    pub dismiss_consent: bool,
    /// Extra settle time after navigation, in milliseconds.
    pub settle_ms: Option<u64>,
    /// Navigation timeout, in milliseconds.
    pub navigation_timeout_ms: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dismiss_consent: true,
            settle_ms: Some(1_500),
            navigation_timeout_ms: 25_000,
        }
    }
}

const REJECTED_RESOURCES: &[&str] = &["image", "media", "font"];

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(45))
            .build()
            .map_err(|e| BrowserlessError::Build(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    /// Fetch fully-rendered HTML for a URL. Every call runs in a fresh
    /// browser context on the Browserless side, so cookies never carry over.
    pub async fn content(&self, url: &str, options: &RenderOptions) -> Result<String> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        let scripts = if options.dismiss_consent {
            vec![ScriptTag {
                content: CONSENT_DISMISS_SCRIPT,
            }]
        } else {
            Vec::new()
        };

        let body = ContentRequest {
            url,
            goto_options: GotoOptions {
                wait_until: "domcontentloaded",
                timeout: options.navigation_timeout_ms,
            },
            add_script_tag: scripts,
            wait_for_timeout: options.settle_ms,
            best_attempt: true,
            reject_resource_types: REJECTED_RESOURCES,
        };

        debug!(url, dismiss_consent = options.dismiss_consent, "Browserless content request");

        let resp = self.client.post(&endpoint).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}
