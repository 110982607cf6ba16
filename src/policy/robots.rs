//! robots.txt fetching, parsing, and evaluation.
//!
//! Supports grouped `User-agent` lines, `Allow` and `Disallow` rules, `#`
//! comments, and the `*` / `$` wildcards. A path is decided by the longest
//! matching rule; on a tie `Allow` wins. Rules are cached per origin for the
//! lifetime of one [`RobotsPolicy`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, instrument};
use url::Url;

use super::PolicyFetcher;
use crate::download::HttpClient;
use crate::download::client::read_body_limited;
use crate::download::constants::{MAX_ROBOTS_BYTES, POLICY_TIMEOUT};
use crate::user_agent::ROBOTS_TOKEN;

/// One `Allow` or `Disallow` line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    pattern: String,
}

/// Rules shared by a run of consecutive `User-agent` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

/// A parsed robots.txt file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    groups: Vec<Group>,
}

impl RobotsRules {
    /// Rules that allow everything (absent or unreadable robots.txt).
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parses a robots.txt body. Unknown directives and malformed lines are ignored.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current: Option<Group> = None;
        let mut in_rules = false;

        for raw in body.lines() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if in_rules || current.is_none() {
                        groups.extend(current.take());
                        current = Some(Group::default());
                        in_rules = false;
                    }
                    if let Some(group) = current.as_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    let Some(group) = current.as_mut() else {
                        continue;
                    };
                    in_rules = true;
                    // An empty rule matches nothing.
                    if value.is_empty() {
                        continue;
                    }
                    group.rules.push(Rule {
                        allow: key == "allow",
                        pattern: normalize_pattern(value),
                    });
                }
                _ => {}
            }
        }
        groups.extend(current);
        Self { groups }
    }

    /// Returns true if `agent` may fetch `path` (path plus optional query).
    ///
    /// Groups naming the agent's product token take precedence over the `*`
    /// group; several groups naming the same agent are merged.
    #[must_use]
    pub fn is_allowed(&self, agent: &str, path: &str) -> bool {
        let agent = agent.to_ascii_lowercase();
        let named: Vec<&Group> = self
            .groups
            .iter()
            .filter(|g| {
                g.agents
                    .iter()
                    .any(|a| a.split('/').next().is_some_and(|name| name.trim() == agent))
            })
            .collect();
        let selected = if named.is_empty() {
            self.groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .collect()
        } else {
            named
        };

        let mut best: Option<&Rule> = None;
        for rule in selected.iter().flat_map(|g| g.rules.iter()) {
            if !pattern_matches(&rule.pattern, path) {
                continue;
            }
            best = match best {
                None => Some(rule),
                Some(current) if rule.pattern.len() > current.pattern.len() => Some(rule),
                Some(current)
                    if rule.pattern.len() == current.pattern.len() && rule.allow =>
                {
                    Some(rule)
                }
                keep => keep,
            };
        }
        best.is_none_or(|rule| rule.allow)
    }
}

fn normalize_pattern(value: &str) -> String {
    if value.starts_with('/') || value.starts_with('*') {
        value.to_string()
    } else {
        format!("/{value}")
    }
}

/// Matches `path` against a robots pattern with `*` (any run) and a trailing
/// `$` (end anchor). Patterns are prefix matches otherwise.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(stripped) => (stripped, true),
        None => (pattern, false),
    };

    let parts: Vec<&str> = pattern.split('*').collect();
    let Some((first, rest_parts)) = parts.split_first() else {
        return true;
    };
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };
    if rest_parts.is_empty() {
        return !anchored || rest.is_empty();
    }

    for (i, part) in rest_parts.iter().enumerate() {
        let last = i + 1 == rest_parts.len();
        if last && anchored {
            return rest.ends_with(part);
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

/// Path and query of `url`, as robots rules see it.
fn robots_path(url: &Url) -> String {
    let path = if url.path().is_empty() { "/" } else { url.path() };
    match url.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

/// Builds the origin string (scheme + host + explicit port) of a URL.
#[must_use]
pub fn origin_for_robots(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}

/// robots.txt policy with a per-origin cache.
///
/// Create one per crawl; the cache is never shared across invocations.
/// Any failure to obtain robots.txt (network error, timeout, non-2xx,
/// oversized body) counts as "no rules", so every URL on that origin is allowed.
#[derive(Debug)]
pub struct RobotsPolicy {
    client: HttpClient,
    agent: String,
    timeout: Duration,
    cache: DashMap<String, Arc<RobotsRules>>,
}

impl RobotsPolicy {
    /// Creates a policy evaluating rules for this tool's product token.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            agent: ROBOTS_TOKEN.to_string(),
            timeout: POLICY_TIMEOUT,
            cache: DashMap::new(),
        }
    }

    /// Overrides the robots.txt fetch timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of origins whose rules are cached.
    #[must_use]
    pub fn cached_origins(&self) -> usize {
        self.cache.len()
    }

    async fn rules_for(&self, origin: &str) -> Arc<RobotsRules> {
        if let Some(rules) = self.cache.get(origin).map(|entry| Arc::clone(entry.value())) {
            return rules;
        }
        let rules = Arc::new(self.fetch_rules(origin).await);
        Arc::clone(
            self.cache
                .entry(origin.to_string())
                .or_insert(rules)
                .value(),
        )
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_rules(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{origin}/robots.txt");
        let response = match self.client.get(&robots_url, self.timeout).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "robots.txt unavailable, allowing all");
                return RobotsRules::allow_all();
            }
        };
        match read_body_limited(response, &robots_url, MAX_ROBOTS_BYTES).await {
            Ok(body) => RobotsRules::parse(&String::from_utf8_lossy(&body)),
            Err(e) => {
                debug!(error = %e, "robots.txt unreadable, allowing all");
                RobotsRules::allow_all()
            }
        }
    }
}

#[async_trait]
impl PolicyFetcher for RobotsPolicy {
    async fn is_allowed(&self, url: &Url) -> bool {
        let Some(origin) = origin_for_robots(url) else {
            return true;
        };
        let rules = self.rules_for(&origin).await;
        let path = robots_path(url);
        let allowed = rules.is_allowed(&self.agent, &path);
        if !allowed {
            debug!(url = %url, path = %path, "robots.txt disallows path");
        }
        allowed
    }
}
