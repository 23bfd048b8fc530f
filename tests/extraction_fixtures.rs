/// Extraction-layer fixture tests: one realistic landing page and one
/// profile page run through the combined extractor dispatch.
use sitelens::extract;

const LANDING_PAGE: &str = r#"
<!doctype html>
<html>
<head>
    <title>Acme Protocol - The Modular Data Layer</title>
    <meta property="og:image" content="https://acme.example/banner.png">
</head>
<body>
    <header>
        <nav>
            <a href="/docs">Docs</a>
            <a href="https://github.com/acme-protocol/core">GitHub</a>
        </nav>
    </header>
    <main>
        <p>Build on the modular data layer.</p>
        <a href="https://twitter.com/acmeprotocol">Follow us</a>
    </main>
    <footer>
        <a href="https://discord.gg/acme">Discord</a>
        <a href="https://t.me/acmeprotocol">Telegram</a>
        <a href="https://x.com/acme_intern">Intern account</a>
        <a href="https://medium.com/@acmeprotocol">Blog</a>
        <a href="/careers">Careers</a>
    </footer>
</body>
</html>
"#;

#[test]
fn landing_page_social_sweep() {
    let out = extract::run(
        LANDING_PAGE,
        "https://acme.example/",
        "https://acme.example/",
    );

    println!("socials: {:?}", out.socials);

    // first twitter-family link wins, canonicalized to x.com
    assert_eq!(out.socials.twitter, "https://x.com/acmeprotocol");
    // both twitter-family links kept for disambiguation
    assert_eq!(
        out.socials.twitter_all,
        vec![
            "https://x.com/acmeprotocol".to_string(),
            "https://x.com/acme_intern".to_string(),
        ]
    );
    assert_eq!(out.socials.discord, "https://discord.gg/acme");
    assert_eq!(out.socials.telegram, "https://t.me/acmeprotocol");
    assert_eq!(out.socials.medium, "https://medium.com/@acmeprotocol");
    assert_eq!(out.socials.github, "https://github.com/acme-protocol/core");
    assert_eq!(out.socials.website, "https://acme.example/");

    // not an identity or channel page
    assert_eq!(out.profile.name, "");
    assert!(out.featured_videos.is_empty());
}

const PROFILE_PAGE: &str = r#"
<!doctype html>
<html>
<head>
    <title>Acme Protocol (@acmeprotocol) / X</title>
    <meta property="og:image" content="https://pbs.twimg.com/profile_images/17/acme_400x400.jpg">
</head>
<body>
    <div data-testid="UserName"><span>Acme Protocol</span></div>
    <div data-testid="UserDescription">
        The modular data layer. Docs at <a href="https://t.co/x1"><span>docs.acme.example/start</span></a>
        and grants via grants.acme.example/apply. By <a href="/acme_labs">@acme_labs</a>.
    </div>
    <div data-testid="UserProfileHeader_Items">
        <a href="https://t.co/y2"><span>acme.example</span></a>
    </div>
</body>
</html>
"#;

#[test]
fn profile_page_identity_read() {
    let out = extract::run(
        PROFILE_PAGE,
        "https://x.com/acmeprotocol",
        "https://x.com/acmeprotocol",
    );

    println!("profile: {:?}", out.profile);

    assert_eq!(out.profile.name, "Acme Protocol");
    // og:image is the only qualifying avatar source here; the size suffix
    // is stripped to recover the original upload
    assert_eq!(
        out.profile.avatar,
        "https://pbs.twimg.com/profile_images/17/acme.jpg"
    );
    assert!(out
        .profile
        .links
        .contains(&"https://docs.acme.example/start".to_string()));
    assert!(out
        .profile
        .links
        .contains(&"https://grants.acme.example/apply".to_string()));
    assert!(out.profile.links.contains(&"https://acme.example".to_string()));
    assert!(!out.profile.links.iter().any(|l| l.contains("t.co")));
    assert_eq!(out.profile.handles, vec!["@acme_labs".to_string()]);
}

#[test]
fn hostile_markup_never_panics() {
    let cases = [
        "",
        "<<<<>>>>",
        "<a href>empty</a>",
        "<a href=\"////\">weird</a>",
        "<img src=>",
        "<div style=\"background-image: url(\">broken</div>",
    ];
    for html in cases {
        let out = extract::run(html, "https://x.com/a", "https://x.com/a");
        assert_eq!(out.socials.website, "https://x.com/a");
    }
}
