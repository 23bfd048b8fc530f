//! Post-navigation page interaction: scroll-driven hydration, waiting for
//! lazily-mounted social links, synthetic clicks on icon/text-matched
//! elements, and the window-open interceptor.
//!
//! Everything here is best-effort. Some sites render social buttons as
//! JS-bound elements with no href that only reveal a destination by calling
//! `window.open`; the click pass exists purely to trigger that side effect,
//! which the interceptor buffer records for later harvest.

use anyhow::{anyhow, Context, Result};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

const SCROLL_STEP_DELAY_MS: u64 = 250;
const CLICK_DELAY_MS: u64 = 400;
const CLICK_PASS_CAP_MS: u64 = 20_000;
const HOST_POLL_INTERVAL_MS: u64 = 250;

// Per-page buffer recording every address handed to window.open. Installed
// before any page script runs; read back once after the click pass.
const WINDOW_OPEN_HOOK: &str = r#"
(() => {
    try {
        window.__sitelensOpenedUrls = [];
        const originalOpen = window.open;
        window.open = function (...args) {
            const target = args[0];
            if (typeof target === 'string') {
                try { window.__sitelensOpenedUrls.push(target); } catch (e) {}
            }
            return typeof originalOpen === 'function' ? originalOpen.apply(this, args) : null;
        };
    } catch (e) {}
})();
"#;

const SCROLL_SCRIPT: &str = r#"
(async () => {
    const delay = (ms) => new Promise((r) => setTimeout(r, ms));
    for (let i = 0; i < __PAGES__; i++) {
        window.scrollTo(0, document.body.scrollHeight);
        await delay(__DELAY__);
    }
})()
"#;

const HOST_PREDICATE_SCRIPT: &str = r#"
(() => {
    const hosts = __HOSTS__;
    const anchors = Array.from(document.querySelectorAll('a[href]'));
    for (const a of anchors) {
        const href = String(a.getAttribute('href') || '').toLowerCase();
        if (!href) continue;
        if (hosts.some((h) => href.includes(h))) return true;
        try {
            const abs = new URL(href, location.href).href.toLowerCase();
            if (hosts.some((h) => abs.includes(h))) return true;
        } catch (e) {}
    }
    return false;
})()
"#;

const SOCIAL_CLICK_SCRIPT: &str = r#"
(async () => {
    const delay = (ms) => new Promise((r) => setTimeout(r, ms));

    const imgTokens = ['discord', 'twitter', 'x-', 'telegram', 't.me', 'github',
                       'linkedin', 'youtube', 'medium', 'reddit'];
    const textTokens = ['twitter', 'x (twitter)', 'x, formerly twitter', 'discord',
                        'telegram', 'github', 'youtube', 'medium', 'reddit'];

    const isSocialImg = (img) => {
        const src = (img.getAttribute('src') || '').toLowerCase();
        const alt = (img.getAttribute('alt') || '').toLowerCase();
        return imgTokens.some((t) => src.includes(t) || alt.includes(t));
    };

    const clickables = new Set();

    for (const img of Array.from(document.querySelectorAll('img')).filter(isSocialImg)) {
        const btn = img.closest('a, button, [role="button"], [tabindex]') || img;
        if (btn) clickables.add(btn);
    }

    for (const el of Array.from(document.querySelectorAll('a, button, [role="button"], [tabindex]'))) {
        const txt = (el.innerText || el.textContent || '').toLowerCase().trim();
        if (txt && textTokens.some((t) => txt.includes(t))) clickables.add(el);
    }

    for (const el of clickables) {
        try {
            el.dispatchEvent(new MouseEvent('click', { bubbles: true, cancelable: true }));
        } catch (e) {}
        await delay(__DELAY__);
    }
    return clickables.size;
})()
"#;

/// Evaluate a promise-returning expression, awaiting its settlement, bounded
/// by `cap_ms`.
async fn eval_async(page: &Page, script: String, cap_ms: u64) -> Result<serde_json::Value> {
    let params = EvaluateParams::builder()
        .expression(script)
        .await_promise(true)
        .build()
        .map_err(|e| anyhow!("evaluate params: {}", e))?;

    let result = timeout(Duration::from_millis(cap_ms), page.evaluate(params))
        .await
        .map_err(|_| anyhow!("evaluate timed out after {}ms", cap_ms))?
        .context("evaluate")?;

    Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
}

/// Install the window-open interceptor. Must run before navigation so the
/// hook lands ahead of any page script.
pub async fn install_window_open_hook(page: &Page) -> Result<()> {
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(WINDOW_OPEN_HOOK))
        .await
        .context("window.open hook")?;
    Ok(())
}

/// Read back the interceptor buffer: http(s) addresses only, deduplicated,
/// in first-seen order.
pub async fn opened_urls(page: &Page) -> Vec<String> {
    let raw: Vec<String> = page
        .evaluate("Array.isArray(window.__sitelensOpenedUrls) ? window.__sitelensOpenedUrls : []")
        .await
        .ok()
        .and_then(|v| v.into_value::<Vec<String>>().ok())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    raw.into_iter()
        .filter(|u| {
            let lower = u.to_ascii_lowercase();
            lower.starts_with("http://") || lower.starts_with("https://")
        })
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

/// Scroll to the bottom `pages` times with a short delay between
/// iterations, letting infinite-scroll and lazy-mount widgets populate.
pub async fn scroll_to_bottom(page: &Page, pages: u32) {
    if pages == 0 {
        return;
    }
    let script = SCROLL_SCRIPT
        .replace("__PAGES__", &pages.to_string())
        .replace("__DELAY__", &SCROLL_STEP_DELAY_MS.to_string());
    let cap = u64::from(pages) * SCROLL_STEP_DELAY_MS + 2_000;
    if let Err(e) = eval_async(page, script, cap).await {
        warn!("scroll pass failed: {:#}", e);
    }
}

/// Poll until some anchor's raw or base-resolved href contains one of the
/// requested host fragments, or until `wait_ms` elapses. Silent on timeout.
pub async fn wait_for_any_host(page: &Page, hosts: &[String], wait_ms: u64) {
    if hosts.is_empty() {
        return;
    }
    let lowered: Vec<String> = hosts.iter().map(|h| h.to_ascii_lowercase()).collect();
    let hosts_json = match serde_json::to_string(&lowered) {
        Ok(j) => j,
        Err(_) => return,
    };
    let script = HOST_PREDICATE_SCRIPT.replace("__HOSTS__", &hosts_json);

    let deadline = std::time::Instant::now() + Duration::from_millis(wait_ms);
    while std::time::Instant::now() < deadline {
        let hit: bool = page
            .evaluate(script.clone())
            .await
            .ok()
            .and_then(|v| v.into_value::<bool>().ok())
            .unwrap_or(false);
        if hit {
            return;
        }
        tokio::time::sleep(Duration::from_millis(HOST_POLL_INTERVAL_MS)).await;
    }
}

/// Dispatch synthetic clicks on social icons and brand-text buttons so
/// href-less handlers fire their window.open side effects.
pub async fn trigger_social_clicks(page: &Page) {
    let script = SOCIAL_CLICK_SCRIPT.replace("__DELAY__", &CLICK_DELAY_MS.to_string());
    match eval_async(page, script, CLICK_PASS_CAP_MS).await {
        Ok(count) => {
            if let Some(n) = count.as_u64() {
                if n > 0 {
                    tracing::debug!("clicked {} social candidates", n);
                }
            }
        }
        Err(e) => warn!("social click pass failed: {:#}", e),
    }
}

/// Visible body text, best-effort.
pub async fn body_text(page: &Page) -> Option<String> {
    page.evaluate("document.body ? document.body.innerText || '' : ''")
        .await
        .ok()
        .and_then(|v| v.into_value::<String>().ok())
}
