//! The fetch pipeline: one attempt end-to-end, plus the bounded retry loop.
//!
//! An attempt owns exactly one browser and one page. Whatever happens
//! inside - navigation exhaustion, extraction misses, screenshot failures -
//! the browser is released on the way out and the caller receives either a
//! complete `FetchResult` or an error that feeds the retry loop. After the
//! last attempt the error is folded into a structured failure record; this
//! function never panics and never returns nothing.

use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::Utc;
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::antibot;
use crate::browser::capture::{ConsoleWatch, NetWatch};
use crate::browser::fingerprint::StealthKit;
use crate::browser::{self, interact, navigate, session};
use crate::core::types::{CookieRecord, CookieSeed, FetchRequest, FetchResult, Timing};
use crate::extract;

/// Wait budget for lazily-mounted social links.
const SOCIAL_HOST_WAIT_MS: u64 = 7_000;

/// Pre-flight failures. These are the only conditions reported before any
/// browser work happens.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("url is required")]
    MissingUrl,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Validate the request target: a syntactically valid absolute http(s) URL.
pub fn validate(req: &FetchRequest) -> Result<(), InputError> {
    let trimmed = req.url.trim();
    if trimmed.is_empty() {
        return Err(InputError::MissingUrl);
    }
    match Url::parse(trimmed) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(()),
        Ok(u) => Err(InputError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            u.scheme()
        ))),
        Err(e) => Err(InputError::InvalidUrl(e.to_string())),
    }
}

/// Run `attempt` up to `count` times sequentially, returning the first
/// success. Generic over the attempt future so the retry bound is testable.
pub(crate) async fn run_attempts<F, Fut>(count: u32, mut attempt: F) -> Result<FetchResult>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<FetchResult>>,
{
    let mut last_err = anyhow!("no attempts were made");
    for n in 1..=count {
        match attempt(n).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                warn!("attempt {}/{} failed: {:#}", n, count, e);
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// Run `work`, then always run `cleanup`, success or not.
pub(crate) async fn scoped<T>(
    work: impl Future<Output = Result<T>>,
    cleanup: impl Future<Output = ()>,
) -> Result<T> {
    let result = work.await;
    cleanup.await;
    result
}

/// Fetch `req.url` through a real browser. Always returns a well-formed
/// result; on retry exhaustion the error lands in `timing.error`.
pub async fn fetch(req: &FetchRequest) -> FetchResult {
    if let Err(e) = validate(req) {
        return FetchResult::failure(&req.url, format!("input_error: {}", e));
    }

    let attempts = req.retries.max(1);
    match run_attempts(attempts, |_n| attempt(req)).await {
        Ok(result) => result,
        Err(e) => FetchResult::failure(&req.url, format!("{:#}", e)),
    }
}

/// One isolated attempt: fresh browser, fresh session, guaranteed release.
async fn attempt(req: &FetchRequest) -> Result<FetchResult> {
    let started_at = Utc::now().timestamp_millis();

    let exe = browser::find_chrome_executable().ok_or_else(|| {
        anyhow!("no browser found; install Brave, Chrome, or Chromium, or set CHROME_EXECUTABLE")
    })?;

    let kit = StealthKit::detect();
    let (handle, page, plan) = session::establish(&exe, req, kit.as_ref()).await?;
    info!("session ready ({}) for {}", plan.label, req.url);

    scoped(drive(req, &page, started_at), handle.close()).await
}

/// Everything between "page is ready" and "result is assembled".
async fn drive(req: &FetchRequest, page: &Page, started_at: i64) -> Result<FetchResult> {
    seed_cookies(page, &req.cookies).await;

    interact::install_window_open_hook(page).await?;

    let console_watch = match ConsoleWatch::attach(page).await {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("console capture unavailable: {:#}", e);
            None
        }
    };
    let net_watch = NetWatch::attach(page, req.capture_net).await?;

    let outcome = navigate::navigate(page, &net_watch, &req.url, req.wait, req.timeout_ms).await;
    if outcome.is_none() {
        warn!("navigation_failed for {}; continuing against partial DOM", req.url);
    }

    // Lazy-content steps run regardless of the navigation outcome.
    interact::scroll_to_bottom(page, req.scroll_pages).await;
    interact::wait_for_any_host(page, &req.wait_social_hosts, SOCIAL_HOST_WAIT_MS).await;
    interact::trigger_social_clicks(page).await;

    if let Some(path) = &req.screenshot_path {
        save_screenshot(page, path).await;
    }

    let final_url = page
        .url()
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| req.url.clone());

    let title: String = page
        .evaluate("document.title")
        .await
        .ok()
        .and_then(|v| v.into_value::<String>().ok())
        .unwrap_or_default();

    // The rendered document feeds extraction and anti-bot detection even
    // when the caller did not ask for it back.
    let html = page.content().await.unwrap_or_default();
    let body_text = interact::body_text(page).await.unwrap_or_default();

    let cookies = read_cookies(page).await;
    if let Some(path) = &req.cookies_path {
        write_cookie_jar(&cookies, path);
    }

    let opened_urls = interact::opened_urls(page).await;

    let main = net_watch.main_response().unwrap_or_default();
    let status = main.status;
    let headers = main.headers;
    let server = headers.get("server").cloned().unwrap_or_default();

    let anti_bot = antibot::classify(status, &server, &html, &body_text);
    if anti_bot.detected {
        info!("anti-bot challenge detected ({}) on {}", anti_bot.kind, req.url);
    }

    let extracted = extract::run(&html, &final_url, &req.url);

    let console = console_watch.map(ConsoleWatch::finish).unwrap_or_default();
    let netlog = {
        let log = net_watch.finish();
        req.capture_net.then_some(log)
    };

    let finished_at = Utc::now().timestamp_millis();

    let mut result = FetchResult::skeleton(&req.url);
    result.ok = true;
    result.status = status;
    result.final_url = final_url;
    result.title = title;
    result.html = req.include_html.then_some(html);
    result.text = req.include_text.then_some(body_text);
    result.headers = headers;
    result.cookies = cookies;
    result.console = console;
    result.timing = Timing::bracket(started_at, finished_at);
    result.anti_bot = anti_bot;
    result.netlog = netlog;
    result.opened_urls = opened_urls;
    result.socials = extracted.socials;
    result.profile = extracted.profile;
    result.featured_videos = extracted.featured_videos;

    Ok(result)
}

/// Seed caller cookies into the session. Best-effort per record; a bad
/// cookie must not sink the attempt.
async fn seed_cookies(page: &Page, seeds: &[CookieSeed]) {
    for seed in seeds {
        if seed.name.is_empty() {
            continue;
        }

        let mut builder = CookieParam::builder()
            .name(seed.name.as_str())
            .value(seed.value.as_str());
        if let Some(domain) = &seed.domain {
            builder = builder.domain(domain.as_str());
        }
        if let Some(path) = &seed.path {
            builder = builder.path(path.as_str());
        }
        if let Some(url) = &seed.url {
            builder = builder.url(url.as_str());
        }
        if let Some(secure) = seed.secure {
            builder = builder.secure(secure);
        }
        if let Some(http_only) = seed.http_only {
            builder = builder.http_only(http_only);
        }

        match builder.build() {
            Ok(param) => {
                if let Err(e) = page.set_cookie(param).await {
                    warn!("failed to seed cookie '{}': {}", seed.name, e);
                }
            }
            Err(e) => warn!("invalid cookie '{}': {}", seed.name, e),
        }
    }
}

async fn read_cookies(page: &Page) -> Vec<CookieRecord> {
    page.get_cookies()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|c| CookieRecord {
            name: c.name,
            value: c.value,
            domain: c.domain,
            path: c.path,
            secure: c.secure,
            http_only: c.http_only,
            expires: None,
        })
        .collect()
}

/// Pretty-printed cookie jar, parent directories created as needed.
fn write_cookie_jar(cookies: &[CookieRecord], path: &std::path::Path) {
    let payload = match serde_json::to_string_pretty(cookies) {
        Ok(p) => p,
        Err(e) => {
            warn!("cookie jar serialization failed: {}", e);
            return;
        }
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("cookie jar dir creation failed: {}", e);
                return;
            }
        }
    }
    if let Err(e) = std::fs::write(path, payload) {
        warn!("cookie jar write failed: {}", e);
    }
}

/// Full-page screenshot, best-effort.
async fn save_screenshot(page: &Page, path: &std::path::Path) {
    let params = ScreenshotParams::builder()
        .format(CaptureScreenshotFormat::Png)
        .full_page(true)
        .build();
    match page.screenshot(params).await {
        Ok(bytes) => {
            if let Err(e) = std::fs::write(path, bytes) {
                warn!("screenshot write failed: {}", e);
            }
        }
        Err(e) => warn!("screenshot capture failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn validate_rejects_missing_and_malformed_urls() {
        let req = FetchRequest::new("");
        assert!(matches!(validate(&req), Err(InputError::MissingUrl)));

        let req = FetchRequest::new("not a url");
        assert!(matches!(validate(&req), Err(InputError::InvalidUrl(_))));

        let req = FetchRequest::new("ftp://example.com/file");
        assert!(matches!(validate(&req), Err(InputError::InvalidUrl(_))));

        let req = FetchRequest::new("https://example.com/page?x=1");
        assert!(validate(&req).is_ok());
    }

    #[tokio::test]
    async fn invalid_url_short_circuits_without_browser_work() {
        let req = FetchRequest::new("::not-a-url::");
        let result = fetch(&req).await;
        assert!(!result.ok);
        assert!(result
            .timing
            .error
            .as_deref()
            .unwrap_or_default()
            .starts_with("input_error"));
        assert_eq!(result.website, "::not-a-url::");
    }

    #[tokio::test]
    async fn retry_loop_runs_exactly_the_requested_attempts() {
        let calls = AtomicU32::new(0);
        let outcome = run_attempts(3, |_n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<FetchResult, _>(anyhow!("always fails")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn retry_loop_stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let outcome = run_attempts(5, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 2 {
                    Ok(FetchResult::skeleton("https://example.com"))
                } else {
                    Err(anyhow!("transient"))
                }
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn scoped_cleanup_runs_on_both_paths() {
        let cleanups = AtomicU32::new(0);

        let ok = scoped(async { Ok(1u32) }, async {
            cleanups.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert_eq!(ok.unwrap(), 1);

        let err = scoped(async { Err::<u32, _>(anyhow!("boom")) }, async {
            cleanups.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert!(err.is_err());

        // one cleanup per run, regardless of outcome
        assert_eq!(cleanups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_become_a_structured_failure() {
        // A valid URL with no browser on PATH still must produce a result
        // document rather than an error; simulate via the public wrapper on
        // the generic loop.
        let outcome = run_attempts(2, |_n| async { Err::<FetchResult, _>(anyhow!("boom")) }).await;
        let result = match outcome {
            Ok(r) => r,
            Err(e) => FetchResult::failure("https://example.com", format!("{:#}", e)),
        };
        assert!(!result.ok);
        assert_eq!(result.timing.error.as_deref(), Some("boom"));
        assert_eq!(result.website, "https://example.com");
    }
}
