use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

/// Why a link cannot be fetched server-side.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("URL has no host: {0}")]
    MissingHost(String),
    /// RFC 1918, link-local, unique-local or unspecified address.
    #[error("Private address {0} is not allowed")]
    PrivateIp(String),
    #[error("Loopback hosts are not allowed")]
    Localhost,
}

/// Which hosts a server-side fetch may target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostPolicy {
    /// Reject loopback and private address ranges.
    #[default]
    PublicOnly,
    /// Any http(s) host. For self-hosted setups that poll LAN feeds.
    AllowPrivate,
}

/// Parse a feed link the server is about to fetch.
///
/// Only http(s) links with a host pass. Under [`HostPolicy::PublicOnly`]
/// loopback hosts and private addresses are refused as well, so a subscriber
/// cannot point the server at its own network.
///
/// ```
/// use feedreader::util::{validate_url, HostPolicy};
///
/// let url = validate_url("https://example.com/feed.xml", HostPolicy::PublicOnly).unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("http://192.168.1.1/feed", HostPolicy::PublicOnly).is_err());
/// assert!(validate_url("http://192.168.1.1/feed", HostPolicy::AllowPrivate).is_ok());
/// assert!(validate_url("file:///etc/passwd", HostPolicy::AllowPrivate).is_err());
/// ```
pub fn validate_url(link: &str, policy: HostPolicy) -> Result<Url, UrlValidationError> {
    let url = Url::parse(link.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()));
    }

    let Some(host) = url.host() else {
        return Err(UrlValidationError::MissingHost(link.to_owned()));
    };

    if policy == HostPolicy::PublicOnly {
        check_public(&host)?;
    }
    Ok(url)
}

fn check_public(host: &Host<&str>) -> Result<(), UrlValidationError> {
    match *host {
        Host::Domain(domain) if domain.eq_ignore_ascii_case("localhost") => {
            Err(UrlValidationError::Localhost)
        }
        Host::Domain(_) => Ok(()),
        Host::Ipv4(ip) if ip.is_loopback() => Err(UrlValidationError::Localhost),
        Host::Ipv6(ip) if ip.is_loopback() => Err(UrlValidationError::Localhost),
        Host::Ipv4(ip) if is_private_v4(ip) => Err(UrlValidationError::PrivateIp(ip.to_string())),
        Host::Ipv6(ip) if is_private_v6(ip) => Err(UrlValidationError::PrivateIp(ip.to_string())),
        Host::Ipv4(_) | Host::Ipv6(_) => Ok(()),
    }
}

/// The site a link belongs to: `scheme://host[:port]`, default port omitted.
///
/// Feeds are keyed by this value so that an article submitted with only its
/// link can be attached to the feed of the same site.
///
/// ```
/// use feedreader::util::site_link;
///
/// assert_eq!(site_link("https://blog.example.com/posts/1?x=y").unwrap(), "https://blog.example.com");
/// assert_eq!(site_link("http://example.com:8080/rss").unwrap(), "http://example.com:8080");
/// ```
pub fn site_link(link: &str) -> Result<String, UrlValidationError> {
    let url = validate_url(link, HostPolicy::AllowPrivate)?;
    Ok(url.origin().ascii_serialization())
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    // fc00::/7 unique local, fe80::/10 link local
    ip.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public(url: &str) -> Result<Url, UrlValidationError> {
        validate_url(url, HostPolicy::PublicOnly)
    }

    #[test]
    fn test_valid_urls() {
        assert!(public("https://example.com/feed.xml").is_ok());
        assert!(public("http://news.example.org").is_ok());
        assert!(public("https://example.com:443/feed.xml").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            public("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(public("ftp://example.com").is_err());
        assert!(validate_url("ftp://example.com", HostPolicy::AllowPrivate).is_err());
    }

    #[test]
    fn test_unparseable_url() {
        assert!(matches!(
            public("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_localhost_rejected() {
        assert!(matches!(
            public("http://localhost/feed"),
            Err(UrlValidationError::Localhost)
        ));
        assert!(public("http://127.0.0.1/feed").is_err());
        assert!(public("http://[::1]/feed").is_err());
    }

    #[test]
    fn test_private_ips_rejected() {
        assert!(public("http://192.168.1.1/feed").is_err());
        assert!(public("http://10.0.0.1:3000/feed").is_err());
        assert!(public("http://172.16.0.1/feed").is_err());
        assert!(public("http://169.254.1.1/feed").is_err());
        assert!(public("http://[fe80::1]/feed").is_err());
        assert!(public("http://0.0.0.0/feed").is_err());
    }

    #[test]
    fn test_allow_private_accepts_lan_hosts() {
        assert!(validate_url("http://127.0.0.1:9000/feed", HostPolicy::AllowPrivate).is_ok());
        assert!(validate_url("http://localhost/feed", HostPolicy::AllowPrivate).is_ok());
    }

    #[test]
    fn test_site_link_strips_path_and_query() {
        assert_eq!(
            site_link("https://example.com/a/b.html?c=d#e").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn test_site_link_keeps_explicit_port() {
        assert_eq!(
            site_link("http://127.0.0.1:8080/rss.xml").unwrap(),
            "http://127.0.0.1:8080"
        );
        assert_eq!(
            site_link("https://example.com:443/rss.xml").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn test_site_link_rejects_garbage() {
        assert!(site_link("example.com/feed").is_err());
        assert!(site_link("mailto:someone@example.com").is_err());
    }
}
