//! Resolution of container hostnames to routable addresses.
//!
//! A freshly started container is not always attached to its network yet, so
//! lookups are retried a fixed number of times with a fixed delay. The retry
//! loop runs inline in the event loop and holds up every queued event while it
//! sleeps.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use hera_core::config::ResolverConfig;

/// Errors raised while resolving a hostname.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Unable to resolve {hostname} after {attempts} attempts: {reason}")]
    Exhausted {
        hostname: String,
        attempts: u32,
        reason: String,
    },
}

/// DNS-style lookup of a single hostname.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn lookup(&self, hostname: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// [`HostResolver`] backed by the system resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsResolver;

#[async_trait]
impl HostResolver for DnsResolver {
    async fn lookup(&self, hostname: &str) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((hostname, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

impl From<&ResolverConfig> for RetryPolicy {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay(),
        }
    }
}

/// Resolve `hostname`, returning the first address of the first successful
/// lookup. Sleeps `policy.delay` between failed attempts, never after the last.
pub async fn resolve(
    resolver: &dyn HostResolver,
    hostname: &str,
    policy: RetryPolicy,
) -> Result<IpAddr, ResolveError> {
    let mut reason = String::from("no attempts made");

    for attempt in 1..=policy.max_attempts {
        match resolver.lookup(hostname).await {
            Ok(addrs) => {
                if let Some(addr) = addrs.first() {
                    return Ok(*addr);
                }
                reason = "no addresses returned".to_string();
            }
            Err(e) => reason = e.to_string(),
        }

        if attempt < policy.max_attempts {
            info!(
                hostname,
                "Unable to resolve hostname, retrying ({attempt}/{})", policy.max_attempts
            );
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(ResolveError::Exhausted {
        hostname: hostname.to_string(),
        attempts: policy.max_attempts,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Fails `failures` times, then answers with `addrs`.
    struct FlakyResolver {
        failures: u32,
        calls: AtomicU32,
        addrs: Vec<IpAddr>,
        seen_at: Mutex<VecDeque<tokio::time::Instant>>,
    }

    impl FlakyResolver {
        fn new(failures: u32, addrs: Vec<IpAddr>) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                addrs,
                seen_at: Mutex::new(VecDeque::new()),
            }
        }
    }

    #[async_trait]
    impl HostResolver for FlakyResolver {
        async fn lookup(&self, _hostname: &str) -> std::io::Result<Vec<IpAddr>> {
            if let Ok(mut seen) = self.seen_at.lock() {
                seen.push_back(tokio::time::Instant::now());
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such host",
                ));
            }
            Ok(self.addrs.clone())
        }
    }

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap_or(IpAddr::from([0, 0, 0, 0]))
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_returns_without_delay() {
        let resolver = FlakyResolver::new(0, vec![addr("10.0.0.5"), addr("10.0.0.6")]);
        let start = tokio::time::Instant::now();

        let ip = resolve(&resolver, "app1", RetryPolicy::default()).await;

        assert_eq!(ip.ok(), Some(addr("10.0.0.5")));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let resolver = FlakyResolver::new(2, vec![addr("10.0.0.5")]);
        let start = tokio::time::Instant::now();

        let ip = resolve(&resolver, "app1", RetryPolicy::default()).await;

        assert_eq!(ip.ok(), Some(addr("10.0.0.5")));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_five_attempts_two_seconds_apart() {
        let resolver = FlakyResolver::new(u32::MAX, Vec::new());
        let start = tokio::time::Instant::now();

        let result = resolve(&resolver, "app1", RetryPolicy::default()).await;

        assert!(matches!(
            result,
            Err(ResolveError::Exhausted { attempts: 5, .. })
        ));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(8));

        let seen: Vec<_> = resolver
            .seen_at
            .lock()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        for pair in seen.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_answer_counts_as_failure() {
        let resolver = FlakyResolver::new(0, Vec::new());
        let policy = RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(10),
        };

        let err = resolve(&resolver, "app1", policy).await;
        match err {
            Err(ResolveError::Exhausted { reason, .. }) => {
                assert_eq!(reason, "no addresses returned");
            }
            Ok(ip) => panic!("unexpected address {ip}"),
        }
    }

    #[test]
    fn policy_from_config() {
        let policy = RetryPolicy::from(&ResolverConfig {
            max_attempts: 3,
            retry_delay_ms: 250,
        });
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_millis(250));
        assert_eq!(RetryPolicy::from(&ResolverConfig::default()), RetryPolicy::default());
    }

    #[tokio::test]
    async fn resolves_localhost() {
        let ip = resolve(&DnsResolver, "localhost", RetryPolicy::default()).await;
        assert!(ip.is_ok_and(|ip| ip.is_loopback()));
    }
}
