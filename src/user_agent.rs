//! Shared User-Agent strings for page, robots.txt, and image requests.
//!
//! Single source for the project URL and product token so crawl traffic and
//! robots.txt group matching stay consistent.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/harvester";

/// Product token matched against `User-agent:` lines in robots.txt.
pub(crate) const ROBOTS_TOKEN: &str = "harvester";

/// Default User-Agent for every request (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{ROBOTS_TOKEN}/{version} (image-collector; +{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_token_version_and_url() {
        let ua = default_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL: {ua}");
        assert_eq!(
            Some(env!("CARGO_PKG_VERSION")),
            ua.strip_prefix("harvester/")
                .and_then(|s| s.split(' ').next()),
            "UA must contain crate version"
        );
    }

    #[test]
    fn test_robots_token_is_ua_product() {
        assert!(default_user_agent().starts_with(ROBOTS_TOKEN));
    }
}
