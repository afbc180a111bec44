//! A single host's robots.txt rules

use robotstxt::DefaultMatcher;

/// Rules from one robots.txt body
///
/// `None` stands for a host without usable rules, which permits everything.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    rules: Option<String>,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        let rules = Some(content.to_string()).filter(|c| !c.trim().is_empty());
        Self { rules }
    }

    /// Policy used when robots.txt is missing or could not be fetched
    pub fn allow_all() -> Self {
        Self { rules: None }
    }

    pub fn is_permissive(&self) -> bool {
        self.rules.is_none()
    }

    /// Checks `url` (absolute, or a bare path) under the group for `user_agent`
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.rules {
            None => true,
            Some(rules) => {
                DefaultMatcher::default().one_agent_allowed_by_robots(rules, user_agent, url)
            }
        }
    }
}
