//! Generic social-link extraction over the rendered document.
//!
//! First matching href in document order wins per platform; the twitter/x
//! family additionally accumulates every match so downstream consumers can
//! disambiguate between, say, a project account and a founder account.

use scraper::{Html, Selector};
use url::Url;

use crate::core::types::SocialLinks;

/// Platform key -> host patterns. A host matches when it equals the pattern
/// or is a subdomain of it.
const PLATFORM_DOMAINS: &[(&str, &[&str])] = &[
    ("twitter", &["twitter.com", "x.com"]),
    ("discord", &["discord.gg", "discord.com"]),
    ("telegram", &["t.me", "telegram.me"]),
    ("youtube", &["youtube.com", "youtu.be"]),
    ("linkedin", &["linkedin.com"]),
    ("reddit", &["reddit.com"]),
    ("medium", &["medium.com"]),
    ("github", &["github.com"]),
];

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

fn matching_platform(url: &Url) -> Option<&'static str> {
    let host = url.host_str()?.to_ascii_lowercase();
    for (key, domains) in PLATFORM_DOMAINS {
        if domains.iter().any(|d| host_matches(&host, d)) {
            return Some(key);
        }
    }
    None
}

/// Rewrite a `twitter.com` host (or subdomain) to `x.com`, preserving
/// path and query. Idempotent; anything unparseable passes through.
pub fn canonicalize_twitter(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let Some(host) = parsed.host_str().map(str::to_ascii_lowercase) else {
        return url.to_string();
    };

    let new_host = if host == "twitter.com" || host == "www.twitter.com" {
        Some("x.com".to_string())
    } else if let Some(prefix) = host.strip_suffix(".twitter.com") {
        match prefix {
            "www" => Some("x.com".to_string()),
            other => Some(format!("{}.x.com", other)),
        }
    } else {
        None
    };

    match new_host {
        Some(h) if parsed.set_host(Some(&h)).is_ok() => parsed.to_string(),
        _ => url.to_string(),
    }
}

/// Scan every anchor of `html`, resolving relative hrefs against
/// `final_url`. The synthesized `websiteURL` is always `requested_url`,
/// independent of navigation success.
pub fn extract(html: &str, final_url: &str, requested_url: &str) -> SocialLinks {
    let mut out = SocialLinks {
        website: requested_url.to_string(),
        ..Default::default()
    };

    let base = Url::parse(final_url).ok();
    let doc = Html::parse_document(html);
    let Ok(anchor_sel) = Selector::parse("a[href]") else {
        return out;
    };

    for anchor in doc.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
        {
            continue;
        }

        let resolved = match Url::parse(href) {
            Ok(u) => Some(u),
            Err(_) => base.as_ref().and_then(|b| b.join(href).ok()),
        };
        let Some(resolved) = resolved else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        let Some(platform) = matching_platform(&resolved) else {
            continue;
        };
        let absolute = resolved.to_string();

        if platform == "twitter" && !out.twitter_all.contains(&absolute) {
            out.twitter_all.push(absolute.clone());
        }

        let slot = match platform {
            "twitter" => &mut out.twitter,
            "discord" => &mut out.discord,
            "telegram" => &mut out.telegram,
            "youtube" => &mut out.youtube,
            "linkedin" => &mut out.linkedin,
            "reddit" => &mut out.reddit,
            "medium" => &mut out.medium,
            "github" => &mut out.github,
            _ => continue,
        };
        if slot.is_empty() {
            *slot = absolute;
        }
    }

    // Canonical host for the whole twitter family.
    if !out.twitter.is_empty() {
        out.twitter = canonicalize_twitter(&out.twitter);
    }
    for entry in &mut out.twitter_all {
        *entry = canonicalize_twitter(entry);
    }
    let mut seen = std::collections::HashSet::new();
    out.twitter_all.retain(|u| seen.insert(u.clone()));

    out
}
