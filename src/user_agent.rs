//! Shared User-Agent string for catalog and download requests.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/autonomys/autodrive-audit";

/// Default User-Agent (identifies the tool and its version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("autodrive-audit/{version} (+{PROJECT_UA_URL})")
}
