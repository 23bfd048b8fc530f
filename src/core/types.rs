use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Load-completion strategies accepted by the navigation orchestrator.
///
/// `NetworkIdle` as a *first* condition is too strict for many sites, so the
/// orchestrator demotes it to `DomContentLoaded` when building the try plan
/// (the generous networkidle try still runs last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle")]
    NetworkIdle,
    Commit,
    #[serde(rename = "nowait")]
    NoWait,
}

impl WaitMode {
    /// Parse a CLI wait mode. Unknown values fall back to `domcontentloaded`,
    /// matching the permissive flag handling of the rest of the CLI surface.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "load" => WaitMode::Load,
            "domcontentloaded" => WaitMode::DomContentLoaded,
            "networkidle" => WaitMode::NetworkIdle,
            "commit" => WaitMode::Commit,
            "nowait" => WaitMode::NoWait,
            _ => WaitMode::DomContentLoaded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WaitMode::Load => "load",
            WaitMode::DomContentLoaded => "domcontentloaded",
            WaitMode::NetworkIdle => "networkidle",
            WaitMode::Commit => "commit",
            WaitMode::NoWait => "nowait",
        }
    }
}

/// Caller-supplied identity overrides, folded into the fingerprint plan.
#[derive(Debug, Clone, Default)]
pub struct FingerprintOverrides {
    /// Device class: `desktop`, `mobile`, or `tablet`. Invalid values ignored.
    pub device: Option<String>,
    /// OS family: `windows`, `linux`, `macos`, `ios`, `android`.
    pub os: Option<String>,
    /// Preferred locales, most specific first.
    pub locales: Vec<String>,
    /// Explicit viewport, `width x height`.
    pub viewport: Option<(u32, u32)>,
}

impl FingerprintOverrides {
    pub fn is_empty(&self) -> bool {
        self.device.is_none()
            && self.os.is_none()
            && self.locales.is_empty()
            && self.viewport.is_none()
    }
}

/// A cookie record seeded into the session before navigation.
/// Accepts the loose JSON shape produced by browser exporters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CookieSeed {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub url: Option<String>,
    pub secure: Option<bool>,
    pub http_only: Option<bool>,
    pub expires: Option<f64>,
}

/// Proxy descriptor (`--proxy` JSON). Only `server` is wired into the
/// browser launch; credentialed proxies need an authenticating gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Everything one fetch needs: target, wait/timing policy, identity
/// overrides, capture flags, and lazy-content hints.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub wait: WaitMode,
    pub timeout_ms: u64,
    pub user_agent: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub cookies: Vec<CookieSeed>,
    pub retries: u32,
    pub capture_net: bool,
    pub include_html: bool,
    pub include_text: bool,
    /// JavaScript execution toggle. Off disables script execution via CDP
    /// emulation; most targets render nothing useful without it.
    pub javascript: bool,
    /// Host fragments to poll for in anchor hrefs after navigation.
    pub wait_social_hosts: Vec<String>,
    /// Scroll-to-bottom iterations for lazy/infinite-scroll content.
    pub scroll_pages: u32,
    pub proxy: Option<ProxyConfig>,
    pub fingerprint: FingerprintOverrides,
    pub screenshot_path: Option<PathBuf>,
    pub cookies_path: Option<PathBuf>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wait: WaitMode::DomContentLoaded,
            timeout_ms: 30_000,
            user_agent: None,
            headers: BTreeMap::new(),
            cookies: Vec::new(),
            retries: 1,
            capture_net: false,
            include_html: false,
            include_text: false,
            javascript: true,
            wait_social_hosts: Vec::new(),
            scroll_pages: 1,
            proxy: None,
            fingerprint: FingerprintOverrides::default(),
            screenshot_path: None,
            cookies_path: None,
        }
    }
}

/// One console message emitted by the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// One request or response observed on the wire, tagged by direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetLogEntry {
    /// `req` or `res`.
    pub dir: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
}

/// Session cookie read back after the page settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
}

/// Wall-clock bracket for one attempt, or the terminal error when every
/// attempt failed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Timing {
    pub fn bracket(started_at: i64, finished_at: i64) -> Self {
        Self {
            started_at: Some(started_at),
            finished_at: Some(finished_at),
            ms: Some(finished_at - started_at),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Advisory anti-bot classification. Never fatal; attached to the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AntiBotVerdict {
    pub detected: bool,
    /// `""`, `"403"`, `"503"`, or `"cloudflare"`.
    pub kind: String,
    /// Raw `server` response header, when present.
    pub server: String,
}

/// Per-platform social links found on the page. Every key is always
/// present; an empty string means "not found". `twitterAll` keeps every
/// twitter/x match seen so downstream disambiguation can pick a handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SocialLinks {
    #[serde(rename = "twitterURL")]
    pub twitter: String,
    #[serde(rename = "discordURL")]
    pub discord: String,
    #[serde(rename = "telegramURL")]
    pub telegram: String,
    #[serde(rename = "youtubeURL")]
    pub youtube: String,
    #[serde(rename = "linkedinURL")]
    pub linkedin: String,
    #[serde(rename = "redditURL")]
    pub reddit: String,
    #[serde(rename = "mediumURL")]
    pub medium: String,
    #[serde(rename = "githubURL")]
    pub github: String,
    #[serde(rename = "websiteURL")]
    pub website: String,
    #[serde(rename = "twitterAll")]
    pub twitter_all: Vec<String>,
}

/// Identity data read from a profile page: display name, avatar, outbound
/// links, and any @handles mentioned in the bio or header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProfileData {
    pub name: String,
    pub avatar: String,
    pub links: Vec<String>,
    pub handles: Vec<String>,
}

/// A featured video surfaced on a channel page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedVideo {
    pub video_id: String,
    pub title: String,
    pub url: String,
}

/// The single response record every fetch produces. On unrecoverable
/// failure this is still a well-formed document with `ok: false` and the
/// error captured in `timing`, never an absence of output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub ok: bool,
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub title: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub cookies: Vec<CookieRecord>,
    pub console: Vec<ConsoleEntry>,
    pub timing: Timing,
    pub anti_bot: AntiBotVerdict,
    /// Always the originally requested address, independent of navigation.
    pub website: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netlog: Option<Vec<NetLogEntry>>,
    /// Addresses the page tried to open in a new window/tab.
    pub opened_urls: Vec<String>,
    #[serde(flatten)]
    pub socials: SocialLinks,
    #[serde(flatten)]
    pub profile: ProfileData,
    pub featured_videos: Vec<FeaturedVideo>,
}

impl FetchResult {
    /// Empty result skeleton for `url`; every field at its safe default so
    /// consumers never branch on missing keys.
    pub fn skeleton(url: &str) -> Self {
        Self {
            ok: false,
            status: 0,
            url: url.to_string(),
            final_url: url.to_string(),
            title: String::new(),
            html: None,
            text: None,
            headers: BTreeMap::new(),
            cookies: Vec::new(),
            console: Vec::new(),
            timing: Timing::default(),
            anti_bot: AntiBotVerdict::default(),
            website: url.to_string(),
            netlog: None,
            opened_urls: Vec::new(),
            socials: SocialLinks {
                website: url.to_string(),
                ..Default::default()
            },
            profile: ProfileData::default(),
            featured_videos: Vec::new(),
        }
    }

    /// Terminal failure record after every attempt threw.
    pub fn failure(url: &str, message: impl Into<String>) -> Self {
        let mut r = Self::skeleton(url);
        r.timing = Timing::error(message);
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_mode_parse_round_trip() {
        for s in ["load", "domcontentloaded", "networkidle", "commit", "nowait"] {
            assert_eq!(WaitMode::parse(s).as_str(), s);
        }
        assert_eq!(WaitMode::parse("bogus"), WaitMode::DomContentLoaded);
        assert_eq!(WaitMode::parse(" LOAD "), WaitMode::Load);
    }

    #[test]
    fn failure_result_is_well_formed() {
        let r = FetchResult::failure("https://example.com", "boom");
        assert!(!r.ok);
        assert_eq!(r.website, "https://example.com");
        assert_eq!(r.timing.error.as_deref(), Some("boom"));
        assert_eq!(r.socials.website, "https://example.com");
    }

    #[test]
    fn result_serializes_with_original_key_style() {
        let r = FetchResult::skeleton("https://example.com");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["finalUrl"], "https://example.com");
        assert_eq!(v["antiBot"]["detected"], false);
        assert_eq!(v["twitterURL"], "");
        assert_eq!(v["websiteURL"], "https://example.com");
        assert!(v["twitterAll"].as_array().unwrap().is_empty());
        assert!(v["featuredVideos"].as_array().unwrap().is_empty());
        assert!(v["openedUrls"].as_array().unwrap().is_empty());
        // netlog omitted entirely unless network capture ran
        assert!(v.get("netlog").is_none());
        // body fields present as explicit nulls when not captured
        assert!(v["html"].is_null());
        assert!(v["text"].is_null());
    }
}
