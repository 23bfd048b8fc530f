//! Fingerprint synthesis and anti-detection script injection.
//!
//! The stealth kit plays the role of an optional anti-detection capability:
//! it is resolved once at startup ([`StealthKit::detect`]) and the session
//! ladder degrades gracefully when it is absent. A synthesized identity is a
//! *coherent* tuple - user agent, platform, viewport, and locale drawn from
//! the same profile - because mismatched signals (a macOS UA with a Windows
//! platform hint) are themselves a detection vector.

use rand::seq::IndexedRandom;

use crate::core::config;
use crate::core::types::FingerprintOverrides;

/// Fixed realistic fallback UA used when no override and no synthesized
/// profile applies.
pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Fallback viewport for non-synthesized sessions.
pub const FALLBACK_VIEWPORT: (u32, u32) = (1366, 768);

/// Fallback Accept-Language for non-synthesized sessions.
pub const FALLBACK_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceClass {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Some(DeviceClass::Desktop),
            "mobile" => Some(DeviceClass::Mobile),
            "tablet" => Some(DeviceClass::Tablet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Linux,
    Macos,
    Ios,
    Android,
}

impl OsFamily {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" => Some(OsFamily::Windows),
            "linux" => Some(OsFamily::Linux),
            "macos" => Some(OsFamily::Macos),
            "ios" => Some(OsFamily::Ios),
            "android" => Some(OsFamily::Android),
            _ => None,
        }
    }
}

/// A coherent browser identity: every field describes the same machine.
#[derive(Debug, Clone)]
pub struct FingerprintProfile {
    pub user_agent: &'static str,
    /// Value for the CDP platform override (what `navigator.platform` reports).
    pub platform: &'static str,
    pub device: DeviceClass,
    pub os: OsFamily,
    pub viewport: (u32, u32),
}

const PROFILES: &[FingerprintProfile] = &[
    FingerprintProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
        platform: "Win32",
        device: DeviceClass::Desktop,
        os: OsFamily::Windows,
        viewport: (1920, 1080),
    },
    FingerprintProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
        platform: "MacIntel",
        device: DeviceClass::Desktop,
        os: OsFamily::Macos,
        viewport: (1440, 900),
    },
    FingerprintProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        platform: "Linux x86_64",
        device: DeviceClass::Desktop,
        os: OsFamily::Linux,
        viewport: (1920, 1080),
    },
    FingerprintProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
        platform: "Win32",
        device: DeviceClass::Desktop,
        os: OsFamily::Windows,
        viewport: (1920, 1080),
    },
    FingerprintProfile {
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
        platform: "iPhone",
        device: DeviceClass::Mobile,
        os: OsFamily::Ios,
        viewport: (390, 844),
    },
    FingerprintProfile {
        user_agent: "Mozilla/5.0 (Linux; Android 14; Pixel 8 Pro) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36",
        platform: "Linux armv81",
        device: DeviceClass::Mobile,
        os: OsFamily::Android,
        viewport: (412, 915),
    },
    FingerprintProfile {
        user_agent: "Mozilla/5.0 (iPad; CPU OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
        platform: "iPad",
        device: DeviceClass::Tablet,
        os: OsFamily::Ios,
        viewport: (820, 1180),
    },
];

/// A synthesized identity ready to be applied to a session.
#[derive(Debug, Clone)]
pub struct SynthesizedIdentity {
    pub user_agent: String,
    pub platform: String,
    pub viewport: (u32, u32),
    pub locale: String,
    pub mobile: bool,
}

/// Derive an Accept-Language header value from a primary locale.
pub fn accept_language_for(locale: &str) -> String {
    format!("{},en;q=0.9", locale)
}

/// Anti-detection capability. `detect()` resolves availability once at
/// startup; callers hold the result and never re-probe.
#[derive(Debug, Clone, Copy)]
pub struct StealthKit;

impl StealthKit {
    pub fn detect() -> Option<Self> {
        config::stealth_enabled().then_some(Self)
    }

    /// Pick a coherent profile honoring whatever overrides were supplied.
    /// Invalid override values are ignored rather than rejected; when the
    /// filter leaves nothing, the full table is used.
    pub fn synthesize(&self, overrides: &FingerprintOverrides) -> SynthesizedIdentity {
        let want_device = overrides.device.as_deref().and_then(DeviceClass::parse);
        let want_os = overrides.os.as_deref().and_then(OsFamily::parse);

        let filtered: Vec<&FingerprintProfile> = PROFILES
            .iter()
            .filter(|p| want_device.map_or(true, |d| p.device == d))
            .filter(|p| want_os.map_or(true, |o| p.os == o))
            .collect();

        let mut rng = rand::rng();
        let profile = filtered
            .choose(&mut rng)
            .copied()
            .unwrap_or(&PROFILES[0]);

        let locale = overrides
            .locales
            .first()
            .cloned()
            .unwrap_or_else(|| "en-US".to_string());

        SynthesizedIdentity {
            user_agent: profile.user_agent.to_string(),
            platform: profile.platform.to_string(),
            viewport: overrides.viewport.unwrap_or(profile.viewport),
            locale,
            mobile: profile.device != DeviceClass::Desktop,
        }
    }

    /// Anti-detection script injected before any page script runs.
    pub fn stealth_script(&self) -> &'static str {
        STEALTH_SCRIPT
    }
}

// Injected on every new document before page scripts execute. Ordering
// matters: navigator hardening must land before any detector can read the
// original descriptors.
const STEALTH_SCRIPT: &str = r#"
(() => {
    try {
        const proto = Navigator.prototype;
        try {
            Object.defineProperty(proto, 'webdriver', { get: () => undefined, configurable: true });
        } catch (e) {}
        try { delete navigator.webdriver; } catch (e) {}
        try {
            Object.defineProperty(proto, 'languages', { get: () => ['en-US', 'en'], configurable: true });
        } catch (e) {}
        try {
            Object.defineProperty(proto, 'plugins', { get: () => [1, 2, 3, 4, 5], configurable: true });
        } catch (e) {}
    } catch (e) {}
})();

// Headless Chromium ships without a chrome.runtime object; detectors check
// for its presence and basic callability.
if (!window.chrome) { window.chrome = {}; }
if (!window.chrome.runtime) {
    window.chrome.runtime = {
        connect: function () { return { onDisconnect: { addListener: function () {} } }; },
        sendMessage: function () {},
    };
}

// Notification permission probes must not reveal the "denied by default"
// headless signature.
const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
if (originalQuery) {
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters)
    );
}

// Mask the software GL renderer headless mode exposes.
const getParameter = WebGLRenderingContext.prototype.getParameter;
WebGLRenderingContext.prototype.getParameter = function (parameter) {
    if (parameter === 37445) return 'Intel Inc.';
    if (parameter === 37446) return 'Intel Iris OpenGL Engine';
    return getParameter.apply(this, arguments);
};
if (typeof WebGL2RenderingContext !== 'undefined') {
    const getParameter2 = WebGL2RenderingContext.prototype.getParameter;
    WebGL2RenderingContext.prototype.getParameter = function (parameter) {
        if (parameter === 37445) return 'Intel Inc.';
        if (parameter === 37446) return 'Intel Iris OpenGL Engine';
        return getParameter2.apply(this, arguments);
    };
}

// Automation framework markers.
delete window.__playwright;
delete window.__puppeteer;
delete window.__selenium;
delete window.callPhantom;
delete window._phantom;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesize_honors_device_and_os_filters() {
        let kit = StealthKit;
        let overrides = FingerprintOverrides {
            device: Some("mobile".to_string()),
            os: Some("ios".to_string()),
            locales: vec!["de-DE".to_string()],
            viewport: None,
        };
        let id = kit.synthesize(&overrides);
        assert!(id.user_agent.contains("iPhone"));
        assert!(id.mobile);
        assert_eq!(id.locale, "de-DE");
    }

    #[test]
    fn synthesize_ignores_invalid_overrides() {
        let kit = StealthKit;
        let overrides = FingerprintOverrides {
            device: Some("toaster".to_string()),
            os: None,
            locales: vec![],
            viewport: Some((800, 600)),
        };
        let id = kit.synthesize(&overrides);
        assert_eq!(id.viewport, (800, 600));
        assert_eq!(id.locale, "en-US");
    }

    #[test]
    fn accept_language_derivation() {
        assert_eq!(accept_language_for("fr-FR"), "fr-FR,en;q=0.9");
    }
}
