//! Robots.txt politeness
//!
//! Per-host rules are fetched once, parsed with the `robotstxt` matcher, and
//! shared by every worker through [`HostPolicyCache`].

mod cache;
mod parser;

pub use cache::HostPolicyCache;
pub use parser::ParsedRobots;
