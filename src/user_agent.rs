//! Shared User-Agent string for sheet and archive HTTP clients.

/// Tool identifier placed after the name/version pair.
const UA_COMMENT: &str = "mirror-sync";

/// Default User-Agent for every HTTP request made by the sync tool.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("games-sync/{version} ({UA_COMMENT})")
}
