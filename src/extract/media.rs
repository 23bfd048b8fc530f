//! Featured-media extraction for youtube.com channel pages.
//!
//! Channel pages embed their full state as an inline `ytInitialData`
//! assignment; the featured shelf lives behind a fixed nested path inside
//! the selected tab. When the blob is missing or the walk comes up empty,
//! a single DOM query against the channel-trailer player recovers at least
//! the pinned video. Any parse failure yields an empty list.

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

use crate::core::types::FeaturedVideo;

fn initial_data_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)ytInitialData\s*=\s*(\{.*?\});").expect("valid initial-data pattern")
    })
}

fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

fn title_of(player: &Value) -> String {
    player
        .pointer("/title/runs/0/text")
        .or_else(|| player.pointer("/title/simpleText"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn walk_initial_data(data: &Value) -> Vec<FeaturedVideo> {
    let mut featured = Vec::new();

    let Some(tabs) = data
        .pointer("/contents/twoColumnBrowseResultsRenderer/tabs")
        .and_then(Value::as_array)
    else {
        return featured;
    };

    for tab in tabs {
        let Some(renderer) = tab.get("tabRenderer") else {
            continue;
        };
        if !renderer
            .get("selected")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            continue;
        }

        let Some(sections) = renderer
            .pointer("/content/sectionListRenderer/contents")
            .and_then(Value::as_array)
        else {
            continue;
        };

        for section in sections {
            let Some(items) = section
                .pointer("/itemSectionRenderer/contents")
                .and_then(Value::as_array)
            else {
                continue;
            };

            for item in items {
                let Some(player) = item.get("channelVideoPlayerRenderer") else {
                    continue;
                };
                let Some(video_id) = player.get("videoId").and_then(Value::as_str) else {
                    continue;
                };
                featured.push(FeaturedVideo {
                    video_id: video_id.to_string(),
                    title: title_of(player),
                    url: watch_url(video_id),
                });
            }
        }
    }

    featured
}

fn from_initial_data(html: &str) -> Vec<FeaturedVideo> {
    let Some(caps) = initial_data_re().captures(html) else {
        return Vec::new();
    };
    let Some(raw) = caps.get(1) else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(raw.as_str()) {
        Ok(data) => walk_initial_data(&data),
        Err(_) => Vec::new(),
    }
}

/// Channel-trailer fallback: one anchor inside the trailer player whose
/// href carries a `v=` query parameter.
fn from_trailer_component(html: &str) -> Vec<FeaturedVideo> {
    let doc = Html::parse_document(html);
    let Ok(sel) = Selector::parse("ytd-channel-video-player-renderer a[href]") else {
        return Vec::new();
    };

    for anchor in doc.select(&sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let resolved = match Url::parse(href) {
            Ok(u) => u,
            Err(_) => match Url::parse("https://www.youtube.com").and_then(|b| b.join(href)) {
                Ok(u) => u,
                Err(_) => continue,
            },
        };
        let Some(video_id) = resolved
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
        else {
            continue;
        };
        if video_id.is_empty() {
            continue;
        }

        let title = anchor.text().collect::<Vec<_>>().join(" ").trim().to_string();
        return vec![FeaturedVideo {
            url: watch_url(&video_id),
            video_id,
            title,
        }];
    }

    Vec::new()
}

/// Extract the featured-video list from a channel page.
pub fn extract(html: &str) -> Vec<FeaturedVideo> {
    let featured = from_initial_data(html);
    if !featured.is_empty() {
        return featured;
    }
    from_trailer_component(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_html(selected: bool, title_variant: &str) -> String {
        let title = match title_variant {
            "runs" => r#"{"runs": [{"text": "Launch Trailer"}]}"#,
            "simple" => r#"{"simpleText": "Launch Trailer"}"#,
            _ => "{}",
        };
        format!(
            r#"<html><body><script>
            var ytInitialData = {{"contents": {{"twoColumnBrowseResultsRenderer": {{"tabs": [
                {{"tabRenderer": {{"selected": {selected}, "content": {{"sectionListRenderer": {{"contents": [
                    {{"itemSectionRenderer": {{"contents": [
                        {{"channelVideoPlayerRenderer": {{"videoId": "dQw4w9WgXcQ", "title": {title}}}}}
                    ]}}}}
                ]}}}}}}}}
            ]}}}}}};
            </script></body></html>"#
        )
    }

    #[test]
    fn walks_selected_tab_to_the_player_node() {
        let videos = extract(&channel_html(true, "runs"));
        assert_eq!(
            videos,
            vec![FeaturedVideo {
                video_id: "dQw4w9WgXcQ".to_string(),
                title: "Launch Trailer".to_string(),
                url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            }]
        );
    }

    #[test]
    fn reads_simple_text_titles() {
        let videos = extract(&channel_html(true, "simple"));
        assert_eq!(videos[0].title, "Launch Trailer");
    }

    #[test]
    fn unselected_tabs_are_ignored() {
        assert!(extract(&channel_html(false, "runs")).is_empty());
    }

    #[test]
    fn missing_title_still_yields_the_video() {
        let videos = extract(&channel_html(true, "none"));
        assert_eq!(videos[0].video_id, "dQw4w9WgXcQ");
        assert_eq!(videos[0].title, "");
    }

    #[test]
    fn malformed_blob_yields_empty_list() {
        let html = "<script>var ytInitialData = {broken json};</script>";
        assert!(extract(html).is_empty());
    }

    #[test]
    fn trailer_component_fallback() {
        let html = r#"
            <ytd-channel-video-player-renderer>
                <a href="/watch?v=abc123XYZ_-">Intro to Acme</a>
            </ytd-channel-video-player-renderer>
        "#;
        let videos = extract(html);
        assert_eq!(
            videos,
            vec![FeaturedVideo {
                video_id: "abc123XYZ_-".to_string(),
                title: "Intro to Acme".to_string(),
                url: "https://www.youtube.com/watch?v=abc123XYZ_-".to_string(),
            }]
        );
    }

    #[test]
    fn page_without_any_signal_yields_empty_list() {
        assert!(extract("<html><body><h1>channel</h1></body></html>").is_empty());
    }
}
