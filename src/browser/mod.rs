//! Native browser management over CDP (`chromiumoxide`).
//!
//! This module is the single source of truth for:
//! * Finding a usable browser executable (Brave / Chrome / Chromium, cross-platform).
//! * Building a headless launch config from a session plan.
//! * `BrowserHandle` - one launched browser plus its CDP event pump, with a
//!   single close path so an attempt can always release what it acquired.
//!
//! Session identity (fingerprints, stealth injection) lives in `session` and
//! `fingerprint`; navigation, lazy-content interaction, and event capture in
//! their own submodules.

pub mod capture;
pub mod fingerprint;
pub mod interact;
pub mod navigate;
pub mod session;

use anyhow::{anyhow, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::Path;
use tracing::{error, info, warn};

use crate::core::config;
use crate::core::types::ProxyConfig;
use session::SessionPlan;

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan - finds package-manager installs on all platforms.
/// 3. OS-specific well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Some(p) = config::chrome_executable_override() {
        return Some(p);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "brave-browser",
            "brave",
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/brave-browser",
            "/usr/bin/brave",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

/// Build a headless `BrowserConfig` for one session plan.
///
/// Flags chosen for:
/// * CI / container compatibility (`--no-sandbox`, `--disable-dev-shm-usage`).
/// * Stealth - `--disable-blink-features=AutomationControlled` hides the
///   `navigator.webdriver` flag; the UA comes from the session plan.
/// * TLS tolerance - broken certs must not abort a fetch whose DOM we still
///   want to read (`--ignore-certificate-errors`).
pub fn build_headless_config(
    exe: &str,
    plan: &SessionPlan,
    proxy: Option<&ProxyConfig>,
) -> Result<BrowserConfig> {
    let (width, height) = plan.viewport;

    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: plan.emulate_mobile,
            is_landscape: !plan.emulate_mobile,
            has_touch: plan.emulate_mobile,
        })
        .window_size(width, height)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-translate")
        .arg("--disable-crash-reporter")
        .arg("--disable-breakpad")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--hide-scrollbars")
        .arg("--mute-audio")
        .arg("--ignore-certificate-errors")
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", plan.user_agent));

    if let Some(proxy) = proxy {
        if !proxy.server.trim().is_empty() {
            builder = builder.arg(format!("--proxy-server={}", proxy.server));
            if proxy.username.is_some() {
                warn!("proxy credentials supplied but not wired; use an authenticating gateway");
            }
        }
    }

    builder
        .build()
        .map_err(|e| anyhow!("failed to build browser config: {}", e))
}

/// One launched browser plus the task draining its CDP event stream.
///
/// The attempt that launches it owns it exclusively and must call
/// [`BrowserHandle::close`] on every exit path; close errors are logged and
/// swallowed so cleanup can never mask the attempt's own outcome.
pub struct BrowserHandle {
    browser: Browser,
    events: tokio::task::JoinHandle<()>,
}

impl BrowserHandle {
    /// Launch a browser with `config` and start draining its event stream.
    pub async fn launch(config: BrowserConfig, exe: &str) -> Result<Self> {
        info!("launching headless browser ({})", exe);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("failed to launch browser ({}): {}", exe, e))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("CDP handler error: {}", e);
                }
            }
        });

        Ok(Self { browser, events })
    }

    /// Open a blank tab in this browser.
    pub async fn new_page(&self) -> Result<Page> {
        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("failed to open page: {}", e))
    }

    /// Close the browser and stop the event pump. Best effort; never errors.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("browser close error (non-fatal): {}", e);
        }
        self.events.abort();
    }
}
