//! Robots.txt ruleset
//!
//! Allow/deny decisions are delegated to the robotstxt crate (Google's
//! matcher: longest match wins, `Allow` beats an equally long `Disallow`,
//! `*` and `$` wildcards). Group selection for `Crawl-delay` and the exposed
//! disallow list is done here with the same rule: the group naming our agent
//! if one exists, otherwise the `*` group.

use std::time::Duration;

use robotstxt::DefaultMatcher;

/// Parsed robots.txt rules for one host
#[derive(Debug, Clone)]
pub struct RobotsRuleset {
    host: String,
    agent: String,
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    disallow_patterns: Vec<String>,
    crawl_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct Group {
    agents: Vec<String>,
    disallow: Vec<String>,
    crawl_delay: Option<Duration>,
}

impl RobotsRuleset {
    /// Creates a ruleset from raw robots.txt content
    ///
    /// # Arguments
    ///
    /// * `host` - Host key the rules were fetched from
    /// * `agent` - Product token of this crawler (e.g. "RagCrawler")
    /// * `content` - The raw robots.txt file content
    pub fn from_content(host: &str, agent: &str, content: &str) -> Self {
        let (disallow_patterns, crawl_delay) = select_group(content, agent);
        Self {
            host: host.to_string(),
            agent: agent.to_string(),
            content: content.to_string(),
            disallow_patterns,
            crawl_delay,
        }
    }

    /// Creates a permissive ruleset that allows everything
    ///
    /// This is used when robots.txt is missing or cannot be fetched.
    pub fn allow_all(host: &str, agent: &str) -> Self {
        Self {
            host: host.to_string(),
            agent: agent.to_string(),
            content: String::new(),
            disallow_patterns: Vec::new(),
            crawl_delay: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Disallow rules of the group that applies to this crawler, in file order
    pub fn disallow_patterns(&self) -> &[String] {
        &self.disallow_patterns
    }

    /// Checks if a URL is allowed for this crawler
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path (e.g., "/page.html")
    pub fn is_allowed(&self, url: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, &self.agent, url)
    }

    /// Crawl delay declared for this crawler, if any
    ///
    /// Values that do not fit a `Duration` (negative, NaN, `1e300`) are
    /// dropped at parse time; callers still clamp to their own maximum.
    pub fn crawl_delay(&self) -> Option<Duration> {
        self.crawl_delay
    }
}

/// Splits robots.txt into user-agent groups and returns the disallow rules
/// and crawl delay of the group that applies to `agent`
fn select_group(content: &str, agent: &str) -> (Vec<String>, Option<Duration>) {
    let mut groups: Vec<Group> = Vec::new();
    let mut current = Group::default();
    let mut in_agent_lines = false;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                // Consecutive User-agent lines share one group
                if !in_agent_lines && !current.agents.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
                current.agents.push(value.to_lowercase());
                in_agent_lines = true;
            }
            "disallow" => {
                in_agent_lines = false;
                if !value.is_empty() {
                    current.disallow.push(value.to_string());
                }
            }
            "crawl-delay" => {
                in_agent_lines = false;
                if let Some(delay) = value
                    .parse::<f64>()
                    .ok()
                    .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                {
                    current.crawl_delay = Some(delay);
                }
            }
            _ => in_agent_lines = false,
        }
    }
    if !current.agents.is_empty() {
        groups.push(current);
    }

    let agent = agent.to_lowercase();
    let specific: Vec<&Group> = groups
        .iter()
        .filter(|g| g.agents.iter().any(|a| a != "*" && agent.starts_with(a.as_str())))
        .collect();
    let selected = if specific.is_empty() {
        groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a == "*"))
            .collect()
    } else {
        specific
    };

    let disallow = selected
        .iter()
        .flat_map(|g| g.disallow.iter().cloned())
        .collect();
    let crawl_delay = selected.iter().find_map(|g| g.crawl_delay);
    (disallow, crawl_delay)
}
