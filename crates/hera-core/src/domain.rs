//! Registrable ("root") domain lookup using the public suffix list.

use crate::error::{Error, Result};

/// Return the registrable domain (public suffix plus one label) of `hostname`.
///
/// `sub.domain.co.uk` becomes `domain.co.uk`; a hostname that already is a
/// registrable domain is returned unchanged. Scheme, port and path are ignored
/// and the result is lowercased.
pub fn root_domain(hostname: &str) -> Result<String> {
    let host = normalize(hostname);
    if host.is_empty() {
        return Err(Error::InvalidHostname(hostname.to_string()));
    }

    psl::domain_str(&host)
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidHostname(hostname.to_string()))
}

fn normalize(hostname: &str) -> String {
    let trimmed = hostname.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let host = without_scheme
        .split(['/', ':'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('.');
    host.to_ascii_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn strips_subdomains() {
        assert_eq!(root_domain("sub.domain.com").unwrap(), "domain.com");
        assert_eq!(root_domain("a.b.c.domain.com").unwrap(), "domain.com");
    }

    #[test]
    fn honours_multi_label_suffixes() {
        assert_eq!(root_domain("sub.domain.co.uk").unwrap(), "domain.co.uk");
        assert_eq!(root_domain("domain.net.za").unwrap(), "domain.net.za");
        assert_eq!(root_domain("sub.domain.org.au").unwrap(), "domain.org.au");
    }

    #[test]
    fn is_idempotent() {
        for host in ["domain.com", "x.a.com", "sub.domain.co.uk", "site.tld"] {
            let once = root_domain(host).unwrap();
            assert_eq!(root_domain(&once).unwrap(), once, "not idempotent for {host}");
        }
    }

    #[test]
    fn normalizes_input() {
        assert_eq!(root_domain("https://Sub.Domain.COM/").unwrap(), "domain.com");
        assert_eq!(root_domain("sub.domain.com:443").unwrap(), "domain.com");
        assert_eq!(root_domain("domain.com.").unwrap(), "domain.com");
    }

    #[test]
    fn rejects_bare_suffix_and_empty() {
        assert!(matches!(root_domain("com"), Err(Error::InvalidHostname(_))));
        assert!(matches!(root_domain("co.uk"), Err(Error::InvalidHostname(_))));
        assert!(matches!(root_domain("  "), Err(Error::InvalidHostname(_))));
    }
}
