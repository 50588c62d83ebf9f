//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! A missing or unreachable robots.txt never stops a crawl; it means "allow all".

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::RobotsRuleset;
