//! Identity-page extraction for x.com / twitter.com profiles: display name,
//! avatar (three fallback sources), outbound bio/header links, and @handles.
//!
//! Profile markup shifts constantly, so every read has a fallback and a
//! missing element is an expected outcome, not an error.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use url::Url;

use crate::core::types::ProfileData;

/// Path segment that marks a genuine profile image URL.
const PROFILE_IMAGE_SEGMENT: &str = "pbs.twimg.com/profile_images/";

fn naked_domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*\.[a-zA-Z]{2,}(?:/[^\s]+)?)")
            .expect("valid naked-domain pattern")
    })
}

fn naked_domain_exact_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*\.[a-zA-Z]{2,}(?:/[^\s]+)?$")
            .expect("valid exact pattern")
    })
}

fn handle_href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/([A-Za-z0-9_]{1,15})/?$").expect("valid handle pattern"))
}

fn handle_mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@([A-Za-z0-9_]{1,15})").expect("valid mention pattern"))
}

fn bg_image_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)url\(["']?(https?://[^"')]+profile_images[^"')]+)["']?\)"#)
            .expect("valid background-image pattern")
    })
}

fn avatar_size_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(/profile_images/[^/]+/[^/.]+?)(?:_[0-9]+x[0-9]+|_x[0-9]+|_normal|_bigger|_mini)(\.[a-zA-Z0-9]+)$")
            .expect("valid avatar suffix pattern")
    })
}

/// Force https on protocol-relative and plain-http URLs.
fn force_https(url: &str) -> String {
    let u = url.trim();
    if let Some(rest) = u.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    if let Some(rest) = u.strip_prefix("http://") {
        return format!("https://{}", rest);
    }
    u.to_string()
}

/// Host without a leading `www.`, lowercased. Empty on parse failure.
fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .map(|h| h.trim_start_matches("www.").to_string())
        .unwrap_or_default()
}

/// Platform-internal hosts that never count as outbound links.
fn is_service_host(host: &str) -> bool {
    matches!(host, "x.com" | "twitter.com" | "t.co")
        || host.ends_with(".x.com")
        || host.ends_with(".twitter.com")
        || host.ends_with(".twimg.com")
}

fn trim_naked_token(token: &str) -> &str {
    token.trim().trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '('])
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
}

/// Strip a trailing parenthetical or "/"-delimited suffix from a document
/// title, leaving the display name.
fn name_from_title(title: &str) -> String {
    let t = title.trim();
    static PAREN: OnceLock<Regex> = OnceLock::new();
    static SLASH: OnceLock<Regex> = OnceLock::new();
    let paren = PAREN.get_or_init(|| Regex::new(r"^(.+?)\s*\(").expect("valid title pattern"));
    let slash = SLASH.get_or_init(|| Regex::new(r"^(.+?)\s*/\s").expect("valid title pattern"));

    paren
        .captures(t)
        .or_else(|| slash.captures(t))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| t.to_string())
}

/// Normalize a chosen avatar URL: decode the `&amp;` entity, force https,
/// and strip the `_normal` / `_400x400`-style size suffix so callers get
/// the original-resolution image.
fn normalize_avatar(url: &str) -> String {
    let decoded = url.replace("&amp;", "&");
    let https = force_https(&decoded);
    avatar_size_suffix_re().replace(&https, "$1$2").into_owned()
}

/// Avatar resolution, three sources in fixed order: a profile-image `<img>`,
/// an inline background-image div, then the `og:image` meta tag. Each source
/// must carry the profile-image path segment to qualify.
fn resolve_avatar(doc: &Html) -> String {
    if let Ok(sel) = Selector::parse("img[src]") {
        for img in doc.select(&sel) {
            if let Some(src) = img.value().attr("src") {
                if src.contains(PROFILE_IMAGE_SEGMENT) {
                    return normalize_avatar(src);
                }
            }
        }
    }

    if let Ok(sel) = Selector::parse(r#"div[style*="background-image"]"#) {
        for div in doc.select(&sel) {
            if let Some(style) = div.value().attr("style") {
                if let Some(caps) = bg_image_url_re().captures(style) {
                    if let Some(m) = caps.get(1) {
                        return normalize_avatar(m.as_str());
                    }
                }
            }
        }
    }

    if let Ok(sel) = Selector::parse(r#"meta[property="og:image"], meta[name="og:image"]"#) {
        for meta in doc.select(&sel) {
            if let Some(content) = meta.value().attr("content") {
                if content.contains(PROFILE_IMAGE_SEGMENT) {
                    return normalize_avatar(content);
                }
            }
        }
    }

    String::new()
}

/// Recover outbound targets from a bio or header anchor. Short-link
/// redirectors (`t.co`) carry the real destination only in their visible
/// text, so that text is parsed instead of the href.
fn collect_anchor_links(anchor: &ElementRef<'_>, links: &mut BTreeSet<String>, handles: &mut BTreeSet<String>) {
    let Some(href) = anchor.value().attr("href") else {
        return;
    };
    let href = href.trim();
    if href.is_empty() {
        return;
    }

    if let Some(caps) = handle_href_re().captures(href) {
        if let Some(m) = caps.get(1) {
            handles.insert(format!("@{}", m.as_str()));
        }
        return;
    }

    if !href.starts_with("http") {
        return;
    }

    let url = force_https(href);
    let host = host_of(&url);

    if host == "t.co" {
        let visible = visible_anchor_text(anchor);
        for token in naked_domain_re().find_iter(&visible) {
            let naked = trim_naked_token(token.as_str());
            if naked.is_empty() {
                continue;
            }
            let candidate = if naked.starts_with("http") {
                force_https(naked)
            } else {
                format!("https://{}", naked)
            };
            if !is_service_host(&host_of(&candidate)) && !host_of(&candidate).is_empty() {
                links.insert(candidate);
            }
        }
        return;
    }

    if !is_service_host(&host) && !host.is_empty() {
        links.insert(url);
    }
}

/// Anchor text preferring an inner `span` when it looks like a bare
/// domain-path token (the profile header renders redirectors that way).
fn visible_anchor_text(anchor: &ElementRef<'_>) -> String {
    if let Ok(span_sel) = Selector::parse("span") {
        for span in anchor.select(&span_sel) {
            let text = element_text(&span);
            if naked_domain_exact_re().is_match(&text) {
                return text;
            }
        }
    }
    element_text(anchor)
}

/// Parse a profile page into name, avatar, outbound links, and handles.
/// A DOM with none of the expected containers yields the empty default.
pub fn extract(html: &str) -> ProfileData {
    let doc = Html::parse_document(html);
    let mut links: BTreeSet<String> = BTreeSet::new();
    let mut handles: BTreeSet<String> = BTreeSet::new();

    let mut name = first_text(&doc, r#"[data-testid="UserName"] span"#)
        .or_else(|| first_text(&doc, r#"h2[role="heading"] > div > span"#))
        .unwrap_or_default();
    if name.is_empty() {
        if let Some(title) = first_text(&doc, "title") {
            name = name_from_title(&title);
        }
    }

    let mut text_chunks: Vec<String> = Vec::new();

    if let Ok(bio_sel) = Selector::parse(r#"[data-testid="UserDescription"]"#) {
        if let Some(bio) = doc.select(&bio_sel).next() {
            if let Ok(anchor_sel) = Selector::parse("a[href]") {
                for anchor in bio.select(&anchor_sel) {
                    collect_anchor_links(&anchor, &mut links, &mut handles);
                }
            }

            // Bare domain-path tokens mentioned in plain bio text, not
            // already captured through an anchor.
            let text = element_text(&bio);
            for token in naked_domain_re().find_iter(&text) {
                let naked = trim_naked_token(token.as_str());
                if naked.is_empty() {
                    continue;
                }
                let host = host_of(&format!("https://{}", naked));
                if host.is_empty() || is_service_host(&host) {
                    continue;
                }
                if links.iter().any(|l| l.contains(naked)) {
                    continue;
                }
                links.insert(format!("https://{}", naked));
            }
            text_chunks.push(text);
        }
    }

    if let Ok(header_sel) = Selector::parse(r#"[data-testid="UserProfileHeader_Items"]"#) {
        if let Some(header) = doc.select(&header_sel).next() {
            if let Ok(anchor_sel) = Selector::parse("a[href]") {
                for anchor in header.select(&anchor_sel) {
                    collect_anchor_links(&anchor, &mut links, &mut handles);
                }
            }
            text_chunks.push(element_text(&header));
        }
    }

    if handles.is_empty() {
        let all_text = text_chunks.join(" ");
        for caps in handle_mention_re().captures_iter(&all_text) {
            if let Some(m) = caps.get(1) {
                handles.insert(format!("@{}", m.as_str()));
            }
        }
    }

    ProfileData {
        name,
        avatar: resolve_avatar(&doc),
        links: links.into_iter().collect(),
        handles: handles.into_iter().collect(),
    }
}
