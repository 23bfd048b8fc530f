use std::path::Path;

pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";
pub const ENV_STEALTH: &str = "SITELENS_STEALTH";

/// Optional override for the Chromium-family browser executable.
///
/// Default behavior is auto-discovery (see `browser::find_chrome_executable()`).
/// This function only returns a value when `CHROME_EXECUTABLE` is set to an
/// existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}

/// Global toggle for the stealth kit (fingerprint profiles + anti-detection
/// script injection). Default: enabled. Set `SITELENS_STEALTH=0` (or
/// `false`/`no`) to fall back to plain sessions only.
pub fn stealth_enabled() -> bool {
    let Ok(v) = std::env::var(ENV_STEALTH) else {
        return true;
    };
    let v = v.trim().to_ascii_lowercase();
    if v.is_empty() {
        return true;
    }
    !matches!(v.as_str(), "0" | "false" | "no" | "off" | "disabled")
}
