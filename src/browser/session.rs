//! Session construction: the fingerprint context ladder.
//!
//! Three strategies of decreasing sophistication, first success wins:
//!
//! 1. Synthesized identity - when the stealth kit is present and the caller
//!    supplied any identity override, a coherent fingerprint profile drives
//!    the whole session (UA, platform, viewport, Accept-Language).
//! 2. Injected default - stealth script plus the caller UA or the fixed
//!    default, fallback viewport, `en-US` Accept-Language.
//! 3. Plain - same defaults, no stealth injection at all.
//!
//! Every rung is guarded: a failure is logged and the ladder falls through,
//! because a page must still be fetchable with degraded stealth.

use anyhow::{anyhow, Context, Result};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetScriptExecutionDisabledParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, SetBypassCspParams,
};
use chromiumoxide::Page;
use tracing::{debug, warn};

use super::fingerprint::{self, StealthKit};
use super::{build_headless_config, BrowserHandle};
use crate::core::types::FetchRequest;

/// One rung of the session ladder, fully resolved.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub label: &'static str,
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub accept_language: String,
    /// `navigator.platform` override; only synthesized identities carry one.
    pub platform: Option<String>,
    pub emulate_mobile: bool,
    pub stealth: bool,
}

/// Build the ordered ladder of session plans for this request.
pub fn build_plans(req: &FetchRequest, kit: Option<&StealthKit>) -> Vec<SessionPlan> {
    let mut plans = Vec::new();

    let caller_ua = req
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|ua| !ua.is_empty());

    if let Some(kit) = kit {
        let has_override = !req.fingerprint.is_empty() || caller_ua.is_some();
        if has_override {
            let identity = kit.synthesize(&req.fingerprint);
            plans.push(SessionPlan {
                label: "fingerprint-profile",
                user_agent: caller_ua
                    .map(str::to_string)
                    .unwrap_or(identity.user_agent),
                viewport: identity.viewport,
                accept_language: fingerprint::accept_language_for(&identity.locale),
                platform: Some(identity.platform),
                emulate_mobile: identity.mobile,
                stealth: true,
            });
        }

        plans.push(SessionPlan {
            label: "injected-default",
            user_agent: caller_ua.unwrap_or(fingerprint::DEFAULT_UA).to_string(),
            viewport: fingerprint::FALLBACK_VIEWPORT,
            accept_language: fingerprint::FALLBACK_ACCEPT_LANGUAGE.to_string(),
            platform: None,
            emulate_mobile: false,
            stealth: true,
        });
    }

    plans.push(SessionPlan {
        label: "plain",
        user_agent: caller_ua.unwrap_or(fingerprint::DEFAULT_UA).to_string(),
        viewport: fingerprint::FALLBACK_VIEWPORT,
        accept_language: fingerprint::FALLBACK_ACCEPT_LANGUAGE.to_string(),
        platform: None,
        emulate_mobile: false,
        stealth: false,
    });

    plans
}

/// Walk the ladder until one plan yields a live browser + configured page.
pub async fn establish(
    exe: &str,
    req: &FetchRequest,
    kit: Option<&StealthKit>,
) -> Result<(BrowserHandle, Page, SessionPlan)> {
    let plans = build_plans(req, kit);

    for plan in plans {
        match try_establish(exe, req, &plan, kit).await {
            Ok((handle, page)) => {
                debug!("session established via '{}' strategy", plan.label);
                return Ok((handle, page, plan));
            }
            Err(e) => {
                warn!("session strategy '{}' failed: {:#}", plan.label, e);
            }
        }
    }

    Err(anyhow!("every session strategy failed"))
}

async fn try_establish(
    exe: &str,
    req: &FetchRequest,
    plan: &SessionPlan,
    kit: Option<&StealthKit>,
) -> Result<(BrowserHandle, Page)> {
    let config = build_headless_config(exe, plan, req.proxy.as_ref())?;
    let handle = BrowserHandle::launch(config, exe).await?;

    let page = match handle.new_page().await {
        Ok(p) => p,
        Err(e) => {
            handle.close().await;
            return Err(e);
        }
    };

    if let Err(e) = apply_identity(&page, req, plan, kit).await {
        handle.close().await;
        return Err(e);
    }

    Ok((handle, page))
}

/// Apply the plan's identity to a fresh page: UA/platform override, extra
/// headers with the derived Accept-Language, CSP bypass, stealth script, and
/// the JS toggle.
async fn apply_identity(
    page: &Page,
    req: &FetchRequest,
    plan: &SessionPlan,
    kit: Option<&StealthKit>,
) -> Result<()> {
    page.execute(SetUserAgentOverrideParams {
        user_agent: plan.user_agent.clone(),
        accept_language: Some(plan.accept_language.clone()),
        platform: plan.platform.clone(),
        user_agent_metadata: None,
    })
    .await
    .context("user agent override")?;

    let mut headers = serde_json::Map::new();
    for (k, v) in &req.headers {
        headers.insert(k.clone(), serde_json::Value::String(v.clone()));
    }
    headers.insert(
        "Accept-Language".to_string(),
        serde_json::Value::String(plan.accept_language.clone()),
    );
    page.execute(SetExtraHttpHeadersParams::new(Headers::new(
        serde_json::Value::Object(headers),
    )))
    .await
    .context("extra headers")?;

    page.execute(SetBypassCspParams::new(true))
        .await
        .context("csp bypass")?;

    if !req.javascript {
        page.execute(SetScriptExecutionDisabledParams::new(true))
            .await
            .context("script execution toggle")?;
    }

    if plan.stealth {
        if let Some(kit) = kit {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
                kit.stealth_script(),
            ))
            .await
            .context("stealth injection")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FingerprintOverrides;

    #[test]
    fn ladder_with_overrides_has_three_rungs() {
        let mut req = FetchRequest::new("https://example.com");
        req.fingerprint = FingerprintOverrides {
            device: Some("desktop".to_string()),
            ..Default::default()
        };
        let plans = build_plans(&req, Some(&StealthKit));
        let labels: Vec<_> = plans.iter().map(|p| p.label).collect();
        assert_eq!(labels, ["fingerprint-profile", "injected-default", "plain"]);
        assert!(plans[0].stealth);
        assert!(!plans[2].stealth);
    }

    #[test]
    fn ladder_without_kit_is_plain_only() {
        let req = FetchRequest::new("https://example.com");
        let plans = build_plans(&req, None);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].label, "plain");
        assert_eq!(plans[0].user_agent, fingerprint::DEFAULT_UA);
        assert_eq!(plans[0].viewport, fingerprint::FALLBACK_VIEWPORT);
    }

    #[test]
    fn ladder_without_overrides_skips_synthesis() {
        let req = FetchRequest::new("https://example.com");
        let plans = build_plans(&req, Some(&StealthKit));
        let labels: Vec<_> = plans.iter().map(|p| p.label).collect();
        assert_eq!(labels, ["injected-default", "plain"]);
    }

    #[test]
    fn caller_ua_takes_priority_on_every_rung() {
        let mut req = FetchRequest::new("https://example.com");
        req.user_agent = Some("TestAgent/1.0".to_string());
        let plans = build_plans(&req, Some(&StealthKit));
        assert!(plans.iter().all(|p| p.user_agent == "TestAgent/1.0"));
        // a caller UA alone counts as an identity override
        assert_eq!(plans[0].label, "fingerprint-profile");
    }
}
