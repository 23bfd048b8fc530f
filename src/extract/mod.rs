//! Site-aware extraction over the captured rendered document.
//!
//! Three readers run against the final DOM snapshot: the generic
//! social-link scan (always), the profile reader (x/twitter identity
//! pages), and the featured-media reader (youtube channel pages). Each is
//! independent; one reader coming up empty never affects the others, and a
//! page with nothing to extract yields complete defaults.

pub mod media;
pub mod profile;
pub mod social;

use url::Url;

use crate::core::types::{FeaturedVideo, ProfileData, SocialLinks};

/// Combined output of every applicable extractor, all fields always present.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub socials: SocialLinks,
    pub profile: ProfileData,
    pub featured_videos: Vec<FeaturedVideo>,
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .map(|h| h.trim_start_matches("www.").to_string())
        .unwrap_or_default()
}

fn is_twitter_family(host: &str) -> bool {
    matches!(host, "x.com" | "twitter.com") || host.ends_with(".x.com") || host.ends_with(".twitter.com")
}

fn is_youtube_family(host: &str) -> bool {
    host == "youtube.com" || host.ends_with(".youtube.com")
}

/// Run every extractor that applies to the final location of the page.
pub fn run(html: &str, final_url: &str, requested_url: &str) -> Extracted {
    let socials = social::extract(html, final_url, requested_url);

    let host = host_of(final_url);
    let profile = if is_twitter_family(&host) {
        profile::extract(html)
    } else {
        ProfileData::default()
    };
    let featured_videos = if is_youtube_family(&host) {
        media::extract(html)
    } else {
        Vec::new()
    };

    Extracted {
        socials,
        profile,
        featured_videos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_reader_only_runs_on_identity_pages() {
        let html = r#"<div data-testid="UserName"><span>Acme</span></div>"#;

        let on_profile = run(html, "https://x.com/acme", "https://x.com/acme");
        assert_eq!(on_profile.profile.name, "Acme");

        let elsewhere = run(html, "https://acme.example/", "https://acme.example/");
        assert_eq!(elsewhere.profile, ProfileData::default());
    }

    #[test]
    fn media_reader_only_runs_on_channel_pages() {
        let html = r#"
            <ytd-channel-video-player-renderer>
                <a href="/watch?v=abc123XYZ_-">Intro</a>
            </ytd-channel-video-player-renderer>
        "#;

        let on_channel = run(html, "https://www.youtube.com/@acme", "https://youtube.com/@acme");
        assert_eq!(on_channel.featured_videos.len(), 1);

        let elsewhere = run(html, "https://acme.example/", "https://acme.example/");
        assert!(elsewhere.featured_videos.is_empty());
    }

    #[test]
    fn social_scan_always_runs() {
        let html = r#"<a href="https://github.com/acme">src</a>"#;
        let out = run(html, "https://x.com/acme", "https://x.com/acme");
        assert_eq!(out.socials.github, "https://github.com/acme");
    }
}
