//! Header assembly for scheduling API requests
//!
//! The user agent is chosen randomly once per process and then reused for
//! every request, so the session presents one consistent browser fingerprint.

use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, USER_AGENT};

/// Pool of realistic User-Agent strings
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Pick the user agent for this process
pub fn pick_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).unwrap_or(&USER_AGENTS[0])
}

/// Build the fixed header set for an API request
pub fn build_headers(user_agent: &str, origin: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));

    if let Ok(value) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, value);
    }
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(ORIGIN, value);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_comes_from_pool() {
        for _ in 0..50 {
            assert!(USER_AGENTS.contains(&pick_user_agent()));
        }
    }

    #[test]
    fn test_headers_include_fixed_set() {
        let headers = build_headers(USER_AGENTS[0], "https://scheduler.test");

        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert!(headers.contains_key(ACCEPT));
        assert_eq!(headers.get(ORIGIN).unwrap(), "https://scheduler.test");
        assert_eq!(headers.get(USER_AGENT).unwrap(), USER_AGENTS[0]);
    }
}
