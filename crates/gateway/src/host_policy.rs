//! Allow-list for the generic image proxy.
//!
//! `/api/proxy-image` takes an absolute URL from the caller, so without a
//! policy it would fetch anything the server can reach.

use url::Url;

use mikareads_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct ImageHostPolicy {
    /// Exact hosts or `*.suffix` wildcards.
    allowed_hosts: Vec<String>,
    allowed_ports: Vec<u16>,
}

impl ImageHostPolicy {
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            allowed_ports: vec![80, 443],
        }
    }

    /// Parse `raw` and check it against the policy.
    ///
    /// Rules:
    /// 1. Scheme must be http or https.
    /// 2. Port must be in `allowed_ports`.
    /// 3. Host must be a domain name, not an IP literal.
    /// 4. Host must match an allow-list rule.
    pub fn check(&self, raw: &str) -> Result<Url> {
        let url = Url::parse(raw).map_err(|e| Error::invalid_request(format!("Invalid image URL: {}", e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_request(format!(
                "Scheme '{}' is not allowed",
                url.scheme()
            )));
        }

        let port = url.port_or_known_default().unwrap_or(80);
        if !self.allowed_ports.contains(&port) {
            return Err(Error::invalid_request(format!("Port {} is not allowed", port)));
        }

        let host = match url.host() {
            Some(url::Host::Domain(domain)) => domain.to_ascii_lowercase(),
            Some(_) => {
                return Err(Error::invalid_request(
                    "Direct IP access is prohibited. Use domain names.",
                ))
            }
            None => return Err(Error::invalid_request("URL has no host")),
        };

        if self.allowed_hosts.iter().any(|rule| matches(&host, rule)) {
            Ok(url)
        } else {
            Err(Error::invalid_request(format!(
                "Host '{}' is not an allowed image host",
                host
            )))
        }
    }
}

/// Supported rules: `example.com`, `*.example.com`.
fn matches(host: &str, rule: &str) -> bool {
    match rule.strip_prefix("*.") {
        Some(suffix) => host
            .strip_suffix(suffix)
            .is_some_and(|prefix| prefix.ends_with('.')),
        None => host == rule,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ImageHostPolicy {
        ImageHostPolicy::new(vec![
            "uploads.mangadex.org".to_string(),
            "*.mangadex.network".to_string(),
        ])
    }

    #[test]
    fn test_allows_exact_and_wildcard_hosts() {
        assert!(policy()
            .check("https://uploads.mangadex.org/covers/a/b.jpg")
            .is_ok());
        assert!(policy()
            .check("https://abc.def.mangadex.network:443/data/h/1.png")
            .is_ok());
    }

    #[test]
    fn test_wildcard_requires_subdomain_boundary() {
        assert!(policy().check("https://evilmangadex.network/x.png").is_err());
        assert!(policy().check("https://mangadex.network/x.png").is_err());
    }

    #[test]
    fn test_rejects_unlisted_hosts_ips_and_ports() {
        assert!(policy().check("https://example.com/x.png").is_err());
        assert!(policy().check("http://127.0.0.1/x.png").is_err());
        assert!(policy().check("https://uploads.mangadex.org:8443/x.png").is_err());
        assert!(policy().check("file:///etc/passwd").is_err());
        assert!(policy().check("not a url").is_err());
    }
}
