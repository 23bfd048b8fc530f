//! Hand-rolled CLI surface and output shaping.
//!
//! Flags mirror what automation callers already pass; anything unparseable
//! degrades to a default instead of aborting, because a best-effort fetch
//! beats an argument error on an unattended pipeline. The `--raw` shape is
//! a compact compatibility format for callers that only want the rendered
//! HTML and the anti-bot verdict.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use url::Url;

use crate::core::types::{
    CookieSeed, FetchRequest, FingerprintOverrides, ProxyConfig, WaitMode,
};
use crate::core::types::FetchResult;

fn viewport_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(\d+)\s*x\s*(\d+)$").expect("valid viewport pattern"))
}

/// Parsed command line. `url` may be absent; everything else has a default.
#[derive(Debug, Clone)]
pub struct Cli {
    pub url: Option<String>,
    pub wait: WaitMode,
    pub timeout_ms: u64,
    pub user_agent: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub cookies: Vec<CookieSeed>,
    pub retries: u32,
    pub capture_net: bool,
    pub html: bool,
    pub text: bool,
    pub raw: bool,
    pub javascript: bool,
    pub wait_social_hosts: Vec<String>,
    pub scroll_pages: u32,
    pub proxy: Option<ProxyConfig>,
    pub fingerprint: FingerprintOverrides,
    pub screenshot_path: Option<PathBuf>,
    pub cookies_path: Option<PathBuf>,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            url: None,
            wait: WaitMode::DomContentLoaded,
            timeout_ms: 30_000,
            user_agent: None,
            headers: BTreeMap::new(),
            cookies: Vec::new(),
            retries: 1,
            capture_net: false,
            html: false,
            text: false,
            raw: false,
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

impl Cli {
    /// Parse arguments (program name already stripped). The first bare
    /// non-flag token is the positional URL.
    pub fn parse(args: &[String]) -> Self {
        let mut cli = Cli::default();
        let mut iter = args.iter().peekable();

        // Optional boolean flag value: consume the next token only when it
        // is a bare value, so `--captureNet --html` keeps working.
        fn bool_value(iter: &mut std::iter::Peekable<std::slice::Iter<'_, String>>) -> bool {
            match iter.peek() {
                Some(next) if !next.starts_with('-') => {
                    let v = iter.next().map(String::as_str).unwrap_or("true");
                    !v.eq_ignore_ascii_case("false")
                }
                _ => true,
            }
        }

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--html" => cli.html = true,
                "--text" => cli.text = true,
                "--raw" => {
                    cli.html = true;
                    cli.text = true;
                    cli.raw = true;
                }
                "--js" => cli.javascript = bool_value(&mut iter),
                "--captureNet" => cli.capture_net = bool_value(&mut iter),
                "--url" => cli.url = iter.next().cloned(),
                "--wait" => {
                    if let Some(v) = iter.next() {
                        cli.wait = WaitMode::parse(v);
                    }
                }
                "--timeout" => {
                    if let Some(v) = iter.next() {
                        if let Ok(ms) = v.parse::<u64>() {
                            if ms > 0 {
                                cli.timeout_ms = ms;
                            }
                        }
                    }
                }
                "--ua" => cli.user_agent = iter.next().cloned(),
                "--screenshot" => cli.screenshot_path = iter.next().map(PathBuf::from),
                "--cookiesPath" => cli.cookies_path = iter.next().map(PathBuf::from),
                "--headers" => {
                    if let Some(v) = iter.next() {
                        cli.headers = serde_json::from_str(v).unwrap_or_default();
                    }
                }
                "--cookies" => {
                    if let Some(v) = iter.next() {
                        cli.cookies = serde_json::from_str(v).unwrap_or_default();
                    }
                }
                "--proxy" => {
                    if let Some(v) = iter.next() {
                        cli.proxy = serde_json::from_str::<ProxyConfig>(v)
                            .ok()
                            .filter(|p| !p.server.trim().is_empty());
                    }
                }
                "--retries" => {
                    if let Some(v) = iter.next() {
                        cli.retries = v.parse().unwrap_or(0);
                    }
                }
                "--scrollPages" => {
                    if let Some(v) = iter.next() {
                        cli.scroll_pages = v.parse::<u32>().unwrap_or(1).max(1);
                    }
                }
                "--waitSocialHosts" => {
                    if let Some(v) = iter.next() {
                        cli.wait_social_hosts = v
                            .split(',')
                            .map(|s| s.trim().to_ascii_lowercase())
                            .filter(|s| !s.is_empty())
                            .collect();
                    }
                }
                "--fp-device" => cli.fingerprint.device = iter.next().cloned(),
                "--fp-os" => cli.fingerprint.os = iter.next().cloned(),
                "--fp-locales" => {
                    if let Some(v) = iter.next() {
                        cli.fingerprint.locales = v
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect();
                    }
                }
                "--fp-viewport" => {
                    if let Some(v) = iter.next() {
                        if let Some(caps) = viewport_re().captures(v.trim()) {
                            let w = caps.get(1).and_then(|m| m.as_str().parse().ok());
                            let h = caps.get(2).and_then(|m| m.as_str().parse().ok());
                            if let (Some(w), Some(h)) = (w, h) {
                                cli.fingerprint.viewport = Some((w, h));
                            }
                        }
                    }
                }
                other => {
                    if !other.starts_with('-') && cli.url.is_none() {
                        cli.url = Some(other.to_string());
                    }
                }
            }
        }

        cli
    }

    /// Turn the parsed flags into a request. `None` when no URL was given.
    pub fn to_request(&self) -> Option<FetchRequest> {
        let url = self.url.clone()?;
        let mut req = FetchRequest::new(url);
        req.wait = self.wait;
        req.timeout_ms = self.timeout_ms;
        req.user_agent = self.user_agent.clone();
        req.headers = self.headers.clone();
        req.cookies = self.cookies.clone();
        req.retries = self.retries;
        req.capture_net = self.capture_net;
        req.include_html = self.html || self.raw;
        // Plain invocations with no body flags still get visible text.
        req.include_text = self.text || (!self.html && !self.raw);
        req.javascript = self.javascript;
        req.wait_social_hosts = self.wait_social_hosts.clone();
        req.scroll_pages = self.scroll_pages;
        req.proxy = self.proxy.clone();
        req.fingerprint = self.fingerprint.clone();
        req.screenshot_path = self.screenshot_path.clone();
        req.cookies_path = self.cookies_path.clone();
        Some(req)
    }
}

/// Origin of the page the fetch actually landed on.
fn instance_of(result: &FetchResult) -> String {
    for candidate in [&result.final_url, &result.url] {
        if let Ok(u) = Url::parse(candidate) {
            let origin = u.origin();
            if matches!(origin, url::Origin::Tuple(..)) {
                return origin.ascii_serialization();
            }
        }
    }
    String::new()
}

/// Render the result document: the full pretty record, or the compact
/// `--raw` compatibility shape.
pub fn render(result: &FetchResult, raw: bool) -> Result<String> {
    if raw {
        let out = serde_json::json!({
            "ok": result.ok,
            "html": result.html.clone().unwrap_or_default(),
            "status": result.status,
            "antiBot": result.anti_bot,
            "instance": instance_of(result),
        });
        return serde_json::to_string(&out).context("raw output serialization");
    }
    serde_json::to_string_pretty(result).context("output serialization")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Cli::parse(&owned)
    }

    #[test]
    fn positional_url_and_flag_url() {
        let cli = parse(&["https://example.com"]);
        assert_eq!(cli.url.as_deref(), Some("https://example.com"));

        let cli = parse(&["--url", "https://example.com", "ignored-second"]);
        assert_eq!(cli.url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn missing_url_yields_no_request() {
        let cli = parse(&["--html"]);
        assert!(cli.to_request().is_none());
    }

    #[test]
    fn body_flags_control_capture() {
        let req = parse(&["https://e.com"]).to_request().unwrap();
        assert!(!req.include_html);
        assert!(req.include_text);

        let req = parse(&["https://e.com", "--html"]).to_request().unwrap();
        assert!(req.include_html);
        assert!(!req.include_text);

        let req = parse(&["https://e.com", "--raw"]).to_request().unwrap();
        assert!(req.include_html);
        assert!(req.include_text);
    }

    #[test]
    fn json_flags_parse_and_degrade() {
        let cli = parse(&[
            "https://e.com",
            "--headers",
            r#"{"X-Key": "abc"}"#,
            "--cookies",
            r#"[{"name": "sid", "value": "42", "domain": "e.com"}]"#,
        ]);
        assert_eq!(cli.headers.get("X-Key").map(String::as_str), Some("abc"));
        assert_eq!(cli.cookies.len(), 1);
        assert_eq!(cli.cookies[0].name, "sid");

        let cli = parse(&["https://e.com", "--headers", "not json"]);
        assert!(cli.headers.is_empty());
    }

    #[test]
    fn host_list_is_lowercased_and_trimmed() {
        let cli = parse(&["https://e.com", "--waitSocialHosts", "Twitter.com, t.me ,,discord.gg"]);
        assert_eq!(
            cli.wait_social_hosts,
            vec!["twitter.com", "t.me", "discord.gg"]
        );
    }

    #[test]
    fn fingerprint_flags() {
        let cli = parse(&[
            "https://e.com",
            "--fp-device", "mobile",
            "--fp-os", "android",
            "--fp-locales", "de-DE, en-GB",
            "--fp-viewport", "412x915",
        ]);
        assert_eq!(cli.fingerprint.device.as_deref(), Some("mobile"));
        assert_eq!(cli.fingerprint.os.as_deref(), Some("android"));
        assert_eq!(cli.fingerprint.locales, vec!["de-DE", "en-GB"]);
        assert_eq!(cli.fingerprint.viewport, Some((412, 915)));
    }

    #[test]
    fn boolean_flags_with_and_without_values() {
        let cli = parse(&["https://e.com", "--captureNet", "--html"]);
        assert!(cli.capture_net);
        assert!(cli.html);

        let cli = parse(&["https://e.com", "--captureNet", "false"]);
        assert!(!cli.capture_net);

        let cli = parse(&["https://e.com", "--js", "false"]);
        assert!(!cli.javascript);
    }

    #[test]
    fn scroll_pages_has_a_floor_of_one() {
        let cli = parse(&["https://e.com", "--scrollPages", "0"]);
        assert_eq!(cli.scroll_pages, 1);
        let cli = parse(&["https://e.com", "--scrollPages", "4"]);
        assert_eq!(cli.scroll_pages, 4);
    }

    #[test]
    fn raw_render_shape() {
        let mut result = FetchResult::skeleton("https://twitter.com/acme");
        result.ok = true;
        result.status = 200;
        result.final_url = "https://x.com/acme".to_string();
        result.html = Some("<html></html>".to_string());

        let out = render(&result, true).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["ok"], true);
        assert_eq!(v["status"], 200);
        assert_eq!(v["html"], "<html></html>");
        assert_eq!(v["instance"], "https://x.com");
        assert_eq!(v["antiBot"]["detected"], false);
    }

    #[test]
    fn proxy_json_requires_a_server() {
        let cli = parse(&["https://e.com", "--proxy", r#"{"server": "socks5://127.0.0.1:9050"}"#]);
        assert_eq!(cli.proxy.unwrap().server, "socks5://127.0.0.1:9050");

        let cli = parse(&["https://e.com", "--proxy", r#"{"username": "u"}"#]);
        assert!(cli.proxy.is_none());
    }
}
