//! Multi-strategy navigation orchestrator.
//!
//! A single wait condition is never trusted: the caller's preferred mode is
//! tried first (with `networkidle` demoted, since requiring full network
//! silence up front stalls on chatty sites), then `load`, then `commit`,
//! then one generous `networkidle` pass. Each try has its own capped
//! timeout so a single slow strategy cannot eat the whole budget. The first
//! try that completes wins; when all fail the caller gets `None` and keeps
//! going against whatever DOM exists.

use anyhow::{anyhow, Result};
use chromiumoxide::Page;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::capture::NetWatch;
use crate::core::types::WaitMode;

/// Per-try ceiling for the primary strategies.
pub const NAV_TRY_CAP_MS: u64 = 20_000;
/// Per-try ceiling for the final networkidle pass.
pub const NAV_IDLE_CAP_MS: u64 = 15_000;
/// Post-success settle waits (errors ignored).
const SETTLE_MS: u64 = 5_000;
/// Network quiescence window for the idle heuristic.
const IDLE_QUIET_MS: u64 = 500;

/// Which strategy completed and what the main document answered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOutcome {
    pub strategy: WaitMode,
    pub status: u16,
    pub final_url: String,
    pub headers: BTreeMap<String, String>,
}

/// Ordered (strategy, per-try timeout) plan for one navigation.
pub fn build_plan(preferred: WaitMode, budget_ms: u64) -> Vec<(WaitMode, u64)> {
    let per_try = budget_ms.min(NAV_TRY_CAP_MS);
    let primary = match preferred {
        // networkidle is too strict as a first condition; nowait keeps the
        // minimal-DOM wait so extraction has something to chew on.
        WaitMode::NetworkIdle | WaitMode::NoWait => WaitMode::DomContentLoaded,
        other => other,
    };

    vec![
        (primary, per_try),
        (WaitMode::Load, per_try),
        (WaitMode::Commit, per_try),
        (WaitMode::NetworkIdle, budget_ms.min(NAV_IDLE_CAP_MS)),
    ]
}

/// Run the plan with `try_nav`, stopping at the first success. Generic over
/// the per-try future so strategy fallback is testable without a browser.
pub async fn run_plan<F, Fut>(plan: &[(WaitMode, u64)], mut try_nav: F) -> Option<NavigationOutcome>
where
    F: FnMut(WaitMode, u64) -> Fut,
    Fut: Future<Output = Result<NavigationOutcome>>,
{
    for (mode, per_try) in plan {
        match try_nav(*mode, *per_try).await {
            Ok(outcome) => {
                debug!("navigation completed under '{}'", mode.as_str());
                return Some(outcome);
            }
            Err(e) => {
                warn!("navigation try '{}' failed: {:#}", mode.as_str(), e);
            }
        }
    }
    None
}

/// Drive `page` to `url`. `None` means every strategy failed; the caller
/// must treat that as a failed navigation, not a fatal error.
pub async fn navigate(
    page: &Page,
    watch: &NetWatch,
    url: &str,
    preferred: WaitMode,
    budget_ms: u64,
) -> Option<NavigationOutcome> {
    let plan = build_plan(preferred, budget_ms);
    let outcome = run_plan(&plan, |mode, per_try| {
        attempt_strategy(page, watch, url, mode, per_try)
    })
    .await;

    if outcome.is_some() {
        // Let the DOM settle a little further; both waits are best-effort.
        let _ = timeout(Duration::from_millis(SETTLE_MS), wait_dom_ready(page, false)).await;
        let _ = timeout(
            Duration::from_millis(SETTLE_MS),
            wait_network_idle(page, IDLE_QUIET_MS),
        )
        .await;
    }

    outcome
}

async fn attempt_strategy(
    page: &Page,
    watch: &NetWatch,
    url: &str,
    mode: WaitMode,
    per_try_ms: u64,
) -> Result<NavigationOutcome> {
    let work = async {
        page.goto(url)
            .await
            .map_err(|e| anyhow!("goto failed: {}", e))?;

        match mode {
            WaitMode::Commit => {}
            WaitMode::Load => wait_dom_ready(page, true).await?,
            WaitMode::DomContentLoaded | WaitMode::NoWait => wait_dom_ready(page, false).await?,
            WaitMode::NetworkIdle => wait_network_idle(page, IDLE_QUIET_MS).await?,
        }
        Ok::<(), anyhow::Error>(())
    };

    timeout(Duration::from_millis(per_try_ms), work)
        .await
        .map_err(|_| anyhow!("strategy timed out after {}ms", per_try_ms))??;

    let main = watch.main_response().unwrap_or_default();
    Ok(NavigationOutcome {
        strategy: mode,
        status: main.status,
        final_url: if main.url.is_empty() {
            url.to_string()
        } else {
            main.url
        },
        headers: main.headers,
    })
}

/// Poll `document.readyState` until it leaves `loading` (or reaches
/// `complete` when `full_load` is set). Unbounded; callers wrap in a timeout.
async fn wait_dom_ready(page: &Page, full_load: bool) -> Result<()> {
    loop {
        let state: Option<String> = page
            .evaluate("document.readyState")
            .await
            .ok()
            .and_then(|v| v.into_value::<String>().ok());

        match state.as_deref() {
            Some("complete") => return Ok(()),
            Some("interactive") if !full_load => return Ok(()),
            _ => {}
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Playwright-style networkidle heuristic without CDP Network events: poll
/// `performance.getEntriesByType("resource").length` until the count has
/// been stable for `quiet_ms` with a complete document. Unbounded; callers
/// wrap in a timeout.
async fn wait_network_idle(page: &Page, quiet_ms: u64) -> Result<()> {
    let mut last_count: u64 = 0;
    let mut stable_since = std::time::Instant::now();

    loop {
        let count: u64 = page
            .evaluate("performance.getEntriesByType('resource').length")
            .await
            .ok()
            .and_then(|v| v.into_value::<serde_json::Value>().ok())
            .and_then(|j| j.as_u64())
            .unwrap_or(0);

        let ready: bool = page
            .evaluate("document.readyState")
            .await
            .ok()
            .and_then(|v| v.into_value::<String>().ok())
            .map(|s| s == "complete")
            .unwrap_or(false);

        if !ready || count != last_count {
            last_count = count;
            stable_since = std::time::Instant::now();
        } else if stable_since.elapsed().as_millis() as u64 >= quiet_ms {
            return Ok(());
        }

        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn outcome(strategy: WaitMode) -> NavigationOutcome {
        NavigationOutcome {
            strategy,
            status: 200,
            final_url: "https://example.com/".to_string(),
            headers: BTreeMap::new(),
        }
    }

    #[test]
    fn plan_demotes_networkidle_and_caps_timeouts() {
        let plan = build_plan(WaitMode::NetworkIdle, 60_000);
        assert_eq!(plan[0], (WaitMode::DomContentLoaded, 20_000));
        assert_eq!(plan[1], (WaitMode::Load, 20_000));
        assert_eq!(plan[2], (WaitMode::Commit, 20_000));
        assert_eq!(plan[3], (WaitMode::NetworkIdle, 15_000));
    }

    #[test]
    fn plan_respects_small_budgets() {
        let plan = build_plan(WaitMode::Load, 4_000);
        assert!(plan.iter().all(|(_, t)| *t == 4_000));
    }

    #[test]
    fn plan_maps_nowait_to_domcontentloaded() {
        let plan = build_plan(WaitMode::NoWait, 30_000);
        assert_eq!(plan[0].0, WaitMode::DomContentLoaded);
    }

    #[tokio::test]
    async fn fallback_stops_at_first_success() {
        let plan = build_plan(WaitMode::DomContentLoaded, 30_000);
        let calls = AtomicUsize::new(0);

        let result = run_plan(&plan, |mode, _timeout| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if mode == WaitMode::Commit {
                    Ok(outcome(mode))
                } else {
                    Err(anyhow!("simulated failure"))
                }
            }
        })
        .await;

        // domcontentloaded and load fail, commit succeeds, networkidle never runs
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap().strategy, WaitMode::Commit);
    }

    #[tokio::test]
    async fn first_try_success_skips_the_rest() {
        let plan = build_plan(WaitMode::Load, 30_000);
        let calls = AtomicUsize::new(0);

        let result = run_plan(&plan, |mode, _timeout| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(outcome(mode)) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap().strategy, WaitMode::Load);
    }

    #[tokio::test]
    async fn exhausted_plan_returns_none() {
        let plan = build_plan(WaitMode::DomContentLoaded, 30_000);
        let calls = AtomicUsize::new(0);

        let result = run_plan(&plan, |_mode, _timeout| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<NavigationOutcome, _>(anyhow!("nope")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(result.is_none());
    }
}
