//! Rate limiter for login attempts
//!
//! Two sliding windows guard the login endpoint:
//! - failed attempts per username (5 per 15 minutes)
//! - requests per client IP (10 per minute)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

const USERNAME_LIMIT: usize = 5;
const USERNAME_WINDOW_MINUTES: i64 = 15;
const IP_LIMIT: usize = 10;
const IP_WINDOW_MINUTES: i64 = 1;

/// Timestamps of recent hits per key, pruned lazily.
struct SlidingWindow<K> {
    hits: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
    limit: usize,
    window: Duration,
}

impl<K: Eq + Hash> SlidingWindow<K> {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            hits: RwLock::new(HashMap::new()),
            limit,
            window,
        }
    }

    async fn is_limited(&self, key: &K, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let hits = self.hits.read().await;
        hits.get(key)
            .map(|times| times.iter().filter(|t| **t > cutoff).count() >= self.limit)
            .unwrap_or(false)
    }

    async fn record(&self, key: K, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        let mut hits = self.hits.write().await;
        let times = hits.entry(key).or_default();
        times.retain(|t| *t > cutoff);
        times.push(now);
    }

    async fn clear(&self, key: &K) {
        self.hits.write().await.remove(key);
    }

    async fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let mut hits = self.hits.write().await;
        hits.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
        hits.len()
    }
}

/// Login rate limiter
pub struct LoginRateLimiter {
    usernames: SlidingWindow<String>,
    ips: SlidingWindow<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            usernames: SlidingWindow::new(USERNAME_LIMIT, Duration::minutes(USERNAME_WINDOW_MINUTES)),
            ips: SlidingWindow::new(IP_LIMIT, Duration::minutes(IP_WINDOW_MINUTES)),
        }
    }

    /// Usernames are compared case-insensitively
    pub async fn is_username_limited(&self, username: &str) -> bool {
        self.usernames
            .is_limited(&username.to_lowercase(), Utc::now())
            .await
    }

    pub async fn record_failed_attempt(&self, username: &str) {
        self.usernames.record(username.to_lowercase(), Utc::now()).await;
    }

    /// Forget failures after a successful login
    pub async fn clear_username_attempts(&self, username: &str) {
        self.usernames.clear(&username.to_lowercase()).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.ips.is_limited(&ip, Utc::now()).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ips.record(ip, Utc::now()).await;
    }

    /// Drop entries outside their window. Returns the number of keys still tracked.
    pub async fn cleanup(&self) -> usize {
        let now = Utc::now();
        self.usernames.prune(now).await + self.ips.prune(now).await
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_username_limit_after_five_failures() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            limiter.record_failed_attempt("sensei").await;
            assert!(!limiter.is_username_limited("sensei").await);
        }
        limiter.record_failed_attempt("sensei").await;
        assert!(limiter.is_username_limited("sensei").await);

        limiter.clear_username_attempts("sensei").await;
        assert!(!limiter.is_username_limited("sensei").await);
    }

    #[tokio::test]
    async fn test_usernames_are_case_insensitive() {
        let limiter = LoginRateLimiter::new();
        for name in ["Sensei", "SENSEI", "sensei", "sEnSeI", "senSEI"] {
            limiter.record_failed_attempt(name).await;
        }
        assert!(limiter.is_username_limited("sensei").await);
    }

    #[tokio::test]
    async fn test_ip_limit_after_ten_requests() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);

        for _ in 0..9 {
            limiter.record_ip_request(ip).await;
        }
        assert!(!limiter.is_ip_limited(ip).await);

        limiter.record_ip_request(ip).await;
        assert!(limiter.is_ip_limited(ip).await);
        assert!(!limiter.is_ip_limited(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))).await);
    }

    #[tokio::test]
    async fn test_window_expiry() {
        let window: SlidingWindow<&str> = SlidingWindow::new(2, Duration::minutes(1));
        let start = Utc::now();

        window.record("k", start).await;
        window.record("k", start).await;
        assert!(window.is_limited(&"k", start).await);

        let later = start + Duration::minutes(2);
        assert!(!window.is_limited(&"k", later).await);
        assert_eq!(window.prune(later).await, 0);
    }
}
