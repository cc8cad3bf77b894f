//! Page loaders: turn a URL into HTML.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dq_domain::config::{ScrapeBackend, ScrapeConfig};
use dq_domain::error::{Error, Result};
use dq_providers::util::{from_reqwest, http_client, truncate_chars};
use tokio::io::AsyncReadExt;

#[async_trait]
pub trait PageLoader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch `url` and return its HTML. An empty string means the page
    /// loaded with no document.
    async fn load(&self, url: &str) -> Result<String>;
}

/// Build the loader selected by `SCRAPE_BACKEND`.
pub fn loader_from_config(cfg: &ScrapeConfig) -> Result<Arc<dyn PageLoader>> {
    let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
    Ok(match cfg.backend {
        ScrapeBackend::Chromium => Arc::new(ChromiumLoader::new(&cfg.chromium_path, timeout)),
        ScrapeBackend::Http => Arc::new(HttpLoader::new(timeout)?),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Headless Chromium
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Renders the page in headless Chromium and dumps the resulting DOM, so
/// script-generated content is included.
pub struct ChromiumLoader {
    binary: String,
    timeout: Duration,
}

impl ChromiumLoader {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn args(url: &str) -> Vec<&str> {
        vec![
            "--headless",
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--hide-scrollbars",
            "--mute-audio",
            "--dump-dom",
            url,
        ]
    }
}

#[async_trait]
impl PageLoader for ChromiumLoader {
    fn name(&self) -> &'static str {
        "chromium"
    }

    async fn load(&self, url: &str) -> Result<String> {
        let mut child = tokio::process::Command::new(&self.binary)
            .args(Self::args(url))
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Other(format!("failed to launch {}: {e}", self.binary)))?;

        // Read both pipes while waiting so a chatty browser cannot block
        // on a full pipe.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Other("browser stdout not captured".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Other("browser stderr not captured".into()))?;
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(Error::Timeout(format!(
                    "page load exceeded {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        let out = stdout_task.await.unwrap_or_default();
        let err = stderr_task.await.unwrap_or_default();
        if !status.success() {
            let stderr = String::from_utf8_lossy(&err);
            return Err(Error::Other(format!(
                "{} exited with {status}: {}",
                self.binary,
                truncate_chars(stderr.trim(), 500)
            )));
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Plain HTTP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fetches the raw HTML with a GET; no scripts run.
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl PageLoader for HttpLoader {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn load(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, concat!("docqa/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http(format!("GET {url} returned {status}")));
        }
        resp.text().await.map_err(from_reqwest)
    }
}
