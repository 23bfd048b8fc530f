//! Anti-bot / challenge-page detection.
//!
//! Detection is advisory: the verdict is attached to the result and never
//! aborts a fetch. Classification order matters - a hard 403/503 wins over
//! any body heuristics, and the Cloudflare body scan only runs behind a
//! matching `server` header before falling back to DOM signatures.

use aho_corasick::AhoCorasick;
use scraper::{Html, Selector};
use std::sync::OnceLock;

use crate::core::types::AntiBotVerdict;

/// Phrases that identify an interstitial challenge page.
const CHALLENGE_PHRASES: &[&str] = &[
    "verifying you are human",
    "checking your browser",
    "review the security of your connection",
    "cf-challenge",
    "cloudflare",
    "attention required!",
];

/// Elements only challenge pages render.
const CHALLENGE_SELECTORS: &[&str] = &[
    "#cf-challenge-running",
    "div#cf-please-wait",
    "div.cf-browser-verification",
    "div[id*=\"challenge\"]",
];

/// Only the head of the document is scanned; challenge markers sit well
/// within the first 50k characters.
const BODY_SCAN_CHARS: usize = 50_000;

static PHRASE_MATCHER: OnceLock<AhoCorasick> = OnceLock::new();

fn phrase_matcher() -> &'static AhoCorasick {
    PHRASE_MATCHER.get_or_init(|| {
        AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(CHALLENGE_PHRASES)
            .expect("valid challenge phrases")
    })
}

fn scan_head(text: &str) -> bool {
    let head: String = text.chars().take(BODY_SCAN_CHARS).collect();
    phrase_matcher().is_match(&head)
}

fn dom_has_challenge_markers(html: &str) -> bool {
    if html.is_empty() {
        return false;
    }
    let doc = Html::parse_document(html);
    for raw in CHALLENGE_SELECTORS {
        if let Ok(sel) = Selector::parse(raw) {
            if doc.select(&sel).next().is_some() {
                return true;
            }
        }
    }
    false
}

/// Classify the final page state. `html` is the rendered document, `body_text`
/// the visible text; either may be empty when the corresponding read failed
/// upstream, in which case the respective heuristics simply see nothing.
pub fn classify(status: u16, server: &str, html: &str, body_text: &str) -> AntiBotVerdict {
    if status == 403 || status == 503 {
        return AntiBotVerdict {
            detected: true,
            kind: status.to_string(),
            server: server.to_string(),
        };
    }

    if server.to_ascii_lowercase().contains("cloudflare") && scan_head(html) {
        return AntiBotVerdict {
            detected: true,
            kind: "cloudflare".to_string(),
            server: server.to_string(),
        };
    }

    if dom_has_challenge_markers(html) || (!body_text.is_empty() && scan_head(body_text)) {
        return AntiBotVerdict {
            detected: true,
            kind: "cloudflare".to_string(),
            server: server.to_string(),
        };
    }

    AntiBotVerdict {
        detected: false,
        kind: String::new(),
        server: server.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_status_codes_win_without_any_body_signal() {
        let v = classify(503, "", "<html><body>plain page</body></html>", "plain page");
        assert_eq!(v, AntiBotVerdict { detected: true, kind: "503".into(), server: "".into() });

        let v = classify(403, "nginx", "", "");
        assert!(v.detected);
        assert_eq!(v.kind, "403");
        assert_eq!(v.server, "nginx");
    }

    #[test]
    fn cloudflare_server_with_challenge_phrase() {
        let html = "<html><body><p>Checking your browser before accessing.</p></body></html>";
        let v = classify(200, "cloudflare", html, "");
        assert!(v.detected);
        assert_eq!(v.kind, "cloudflare");
        assert_eq!(v.server, "cloudflare");
    }

    #[test]
    fn cloudflare_server_with_clean_body_is_clean() {
        let html = "<html><body><h1>Welcome</h1></body></html>";
        let v = classify(200, "cloudflare", html, "Welcome");
        // "cloudflare" appears only in the header, not the page itself
        assert!(!v.detected);
        assert_eq!(v.server, "cloudflare");
    }

    #[test]
    fn body_phrase_without_server_header_still_detects() {
        let v = classify(200, "", "<html><body>hello</body></html>", "Checking your browser");
        assert!(v.detected);
        assert_eq!(v.kind, "cloudflare");
    }

    #[test]
    fn challenge_selector_in_dom_detects() {
        let html = r#"<html><body><div id="cf-challenge-running"></div></body></html>"#;
        let v = classify(200, "", html, "");
        assert!(v.detected);
        assert_eq!(v.kind, "cloudflare");

        let html = r#"<html><body><div id="big-challenge-box"></div></body></html>"#;
        assert!(classify(200, "", html, "").detected);
    }

    #[test]
    fn clean_page_is_clean() {
        let html = "<html><body><h1>Docs</h1><a href=\"https://github.com/acme\">code</a></body></html>";
        let v = classify(200, "nginx/1.25", html, "Docs code");
        assert!(!v.detected);
        assert_eq!(v.kind, "");
    }

    #[test]
    fn phrase_scan_is_case_insensitive_and_bounded() {
        let mut padding = "x".repeat(60_000);
        padding.push_str("VERIFYING YOU ARE HUMAN");
        // marker beyond the scan window stays invisible
        assert!(!classify(200, "cloudflare", &padding, "").detected);

        let near = format!("{}VERIFYING YOU ARE HUMAN", "x".repeat(1_000));
        assert!(classify(200, "cloudflare", &near, "").detected);
    }
}
