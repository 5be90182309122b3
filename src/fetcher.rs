// src/fetcher.rs
//! Page acquisition. The browser fetcher renders JavaScript-heavy job boards,
//! the HTTP fetcher covers static pages and hosts without Chromium.

use crate::config::{FetchOptions, FetcherKind};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// How long teardown waits for the CDP handler task before aborting it
const HANDLER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Rendered HTML of one page.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: Url,
    pub html: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, url: &Url) -> Result<RawPage>;
}

/// Parse user input into a URL. Nothing beyond syntax is checked.
pub fn parse_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    Url::parse(trimmed).map_err(|e| PipelineError::fetch(trimmed, format!("invalid URL: {}", e)))
}

pub fn from_options(options: &FetchOptions) -> Result<Box<dyn PageFetcher>> {
    match options.kind {
        FetcherKind::Browser => Ok(Box::new(BrowserFetcher::new(options.clone()))),
        FetcherKind::Http => Ok(Box::new(HttpFetcher::new(options.page_load_timeout)?)),
    }
}

/// Headless Chromium driven over CDP. One browser session per fetch.
pub struct BrowserFetcher {
    options: FetchOptions,
}

impl BrowserFetcher {
    pub fn new(options: FetchOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={}", DESKTOP_USER_AGENT))
            .request_timeout(self.options.page_load_timeout);

        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.options.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(|e| {
            PipelineError::Environment(format!("failed to configure browser: {}", e))
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    fn name(&self) -> &str {
        "browser"
    }

    #[instrument(skip(self, url), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<RawPage> {
        let mut session =
            ChromeSession::launch(self.browser_config()?, self.options.settle_delay).await?;

        info!("Fetching page with headless browser");
        let html = run_session(&mut session, url, self.options.page_load_timeout).await?;

        info!("Fetched {} bytes of HTML", html.len());
        Ok(RawPage {
            url: url.clone(),
            html,
        })
    }
}

/// A live page-loading session that owns external resources.
#[async_trait]
trait Session: Send + Sync {
    async fn load(&self, url: &Url) -> Result<String>;

    /// Release everything the session holds. Called once after every load.
    async fn close(&mut self);
}

/// Load under `limit`, then close the session whatever the load outcome was.
async fn run_session<S: Session>(session: &mut S, url: &Url, limit: Duration) -> Result<String> {
    let outcome = tokio::time::timeout(limit, session.load(url)).await;
    session.close().await;

    match outcome {
        Ok(result) => result,
        Err(_) => Err(PipelineError::FetchTimeout {
            url: url.to_string(),
            seconds: limit.as_secs(),
        }),
    }
}

/// Chromium reports failed navigations by landing on its own error page
fn is_error_page(landed: &str) -> bool {
    landed.starts_with("chrome-error://")
}

struct ChromeSession {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    settle_delay: Duration,
}

impl ChromeSession {
    async fn launch(config: BrowserConfig, settle_delay: Duration) -> Result<Self> {
        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            PipelineError::Environment(format!("failed to launch browser: {}", e))
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP event handler error: {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler_task: Some(handler_task),
            settle_delay,
        })
    }

    /// True once the Chromium child process has been reaped
    #[cfg(test)]
    fn process_exited(&mut self) -> bool {
        matches!(self.browser.try_wait(), Ok(Some(_)))
    }
}

#[async_trait]
impl Session for ChromeSession {
    async fn load(&self, url: &Url) -> Result<String> {
        let failed = |what: &str, e: CdpError| {
            PipelineError::fetch(url.as_str(), format!("{}: {}", what, e))
        };

        // Open blank first so navigation errors surface from goto
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| failed("failed to open page", e))?;

        page.goto(url.as_str())
            .await
            .map_err(|e| failed("navigation failed", e))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| failed("navigation failed", e))?;

        let landed = page
            .url()
            .await
            .map_err(|e| failed("failed to read page URL", e))?
            .unwrap_or_default();
        if is_error_page(&landed) {
            return Err(PipelineError::fetch(url.as_str(), "page could not be loaded"));
        }

        debug!("Page loaded, waiting {:?} for dynamic content", self.settle_delay);
        tokio::time::sleep(self.settle_delay).await;

        page.content()
            .await
            .map_err(|e| failed("failed to read page", e))
    }

    /// Close the browser, falling back to killing the process, then join
    /// the handler task.
    async fn close(&mut self) {
        match self.browser.close().await {
            Ok(_) => {
                if let Err(e) = self.browser.wait().await {
                    warn!("Browser did not exit cleanly: {}", e);
                }
            }
            Err(e) => {
                warn!("Failed to close browser, killing it: {}", e);
                if let Some(Err(e)) = self.browser.kill().await {
                    warn!("Failed to kill browser process: {}", e);
                }
            }
        }

        if let Some(mut handler_task) = self.handler_task.take() {
            if tokio::time::timeout(HANDLER_SHUTDOWN_GRACE, &mut handler_task)
                .await
                .is_err()
            {
                debug!("CDP handler still running after shutdown, aborting it");
                handler_task.abort();
            }
        }
        debug!("Browser session closed");
    }
}

/// Plain GET without JavaScript.
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                PipelineError::Environment(format!("failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client, timeout })
    }

    fn transport_error(&self, url: &Url, e: reqwest::Error) -> PipelineError {
        if e.is_timeout() {
            PipelineError::FetchTimeout {
                url: url.to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            PipelineError::fetch(url.as_str(), e)
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, url), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<RawPage> {
        info!("Fetching page over HTTP");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::fetch(url.as_str(), format!("HTTP {}", status)));
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        info!("Fetched {} bytes of HTML", html.len());
        Ok(RawPage {
            url: final_url,
            html,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use std::path::PathBuf;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_url() {
        let url = parse_url("  https://jobs.example/view?id=42 ").unwrap();
        assert_eq!(url.host_str(), Some("jobs.example"));

        for raw in ["", "not a url", "jobs.example/view"] {
            let err = parse_url(raw).unwrap_err();
            assert_eq!(err.stage(), Stage::Fetch, "input: {:?}", raw);
            assert!(err.to_string().contains("invalid URL"));
        }
    }

    #[tokio::test]
    async fn test_http_fetch_returns_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/42"))
            .and(header_exists("user-agent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><h1>Senior Developer</h1></body></html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let url = parse_url(&format!("{}/jobs/42", server.uri())).unwrap();
        let page = fetcher.fetch(&url).await.unwrap();

        assert!(page.html.contains("Senior Developer"));
        assert_eq!(page.url.path(), "/jobs/42");
    }

    #[tokio::test]
    async fn test_http_error_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let url = parse_url(&format!("{}/gone", server.uri())).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();

        assert!(matches!(err, PipelineError::Fetch { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_http_timeout_is_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_millis(200)).unwrap();
        let url = parse_url(&server.uri()).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();

        assert!(matches!(err, PipelineError::FetchTimeout { .. }));
        assert_eq!(err.stage(), Stage::Fetch);
    }

    #[tokio::test]
    async fn test_missing_chrome_is_environment_error() {
        let fetcher = BrowserFetcher::new(FetchOptions {
            chrome_executable: Some(PathBuf::from("/nonexistent/chromium")),
            ..FetchOptions::default()
        });
        let url = parse_url("https://jobs.example/1").unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Environment);
    }

    #[tokio::test]
    #[ignore = "requires a local Chromium installation"]
    async fn test_browser_fetch_renders_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><body><div id=\"jobDescriptionText\">We are hiring...</div></body></html>",
                "text/html",
            ))
            .mount(&server)
            .await;

        let fetcher = BrowserFetcher::new(FetchOptions {
            settle_delay: Duration::from_millis(100),
            ..FetchOptions::default()
        });
        let url = parse_url(&server.uri()).unwrap();
        let page = fetcher.fetch(&url).await.unwrap();

        assert!(page.html.contains("We are hiring..."));
    }

    struct ScriptedSession {
        delay: Duration,
        fail: bool,
        closed: usize,
    }

    impl ScriptedSession {
        fn new(delay: Duration, fail: bool) -> Self {
            Self {
                delay,
                fail,
                closed: 0,
            }
        }
    }

    #[async_trait]
    impl Session for ScriptedSession {
        async fn load(&self, url: &Url) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(PipelineError::fetch(url.as_str(), "net::ERR_CONNECTION_REFUSED"))
            } else {
                Ok("<html><body>Posting</body></html>".to_string())
            }
        }

        async fn close(&mut self) {
            self.closed += 1;
        }
    }

    #[tokio::test]
    async fn test_session_closed_after_success() {
        let url = parse_url("https://jobs.example/1").unwrap();
        let mut session = ScriptedSession::new(Duration::ZERO, false);

        let html = run_session(&mut session, &url, Duration::from_secs(5)).await.unwrap();
        assert!(html.contains("Posting"));
        assert_eq!(session.closed, 1);
    }

    #[tokio::test]
    async fn test_session_closed_after_failed_load() {
        let url = parse_url("http://127.0.0.1:9/").unwrap();
        let mut session = ScriptedSession::new(Duration::ZERO, true);

        let err = run_session(&mut session, &url, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
        assert_eq!(session.closed, 1);
    }

    #[tokio::test]
    async fn test_session_closed_after_timeout() {
        let url = parse_url("https://slow.example/").unwrap();
        let mut session = ScriptedSession::new(Duration::from_secs(30), false);

        let started = std::time::Instant::now();
        let err = run_session(&mut session, &url, Duration::from_millis(100)).await.unwrap_err();

        assert!(matches!(err, PipelineError::FetchTimeout { .. }));
        assert_eq!(err.stage(), Stage::Fetch);
        assert_eq!(session.closed, 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_error_page_detection() {
        assert!(is_error_page("chrome-error://chromewebdata/"));
        assert!(!is_error_page("https://jobs.example/1"));
        assert!(!is_error_page("about:blank"));
        assert!(!is_error_page(""));
    }

    #[tokio::test]
    #[ignore = "requires a local Chromium installation"]
    async fn test_browser_unreachable_url_fails_and_exits() {
        let fetcher = BrowserFetcher::new(FetchOptions {
            page_load_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(100),
            ..FetchOptions::default()
        });
        let mut session = ChromeSession::launch(
            fetcher.browser_config().unwrap(),
            fetcher.options.settle_delay,
        )
        .await
        .unwrap();
        let url = parse_url("http://127.0.0.1:9/").unwrap();

        let started = std::time::Instant::now();
        let err = run_session(&mut session, &url, fetcher.options.page_load_timeout)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Fetch);
        assert!(session.process_exited());
        // bound plus teardown
        assert!(started.elapsed() < Duration::from_secs(10) + HANDLER_SHUTDOWN_GRACE * 2);
    }
}
