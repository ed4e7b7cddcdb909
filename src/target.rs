//! Target URI parsing.
//!
//! Accepted shapes (`scheme` is whatever the provider was registered under):
//!
//! - `k8s-dns://my-svc.my-ns.svc.cluster.local`
//! - `k8s-dns://my-svc.my-ns.svc.cluster.local:8080`
//! - `k8s-dns:///my-svc.my-ns.svc.cluster.local`
//! - `k8s-dns:///my-svc.my-ns.svc.cluster.local:8080`

use anyhow::{anyhow, Context};
use hickory_resolver::Name;
use url::Url;

use crate::error::{Error, Result};

/// A resolver target decoded from the channel's URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    authority: String,
    host: Name,
    host_str: String,
    port: u16,
}

impl ParsedTarget {
    /// Parses a target URI string, substituting `default_port` when the URI
    /// carries no port.
    pub fn parse(uri: &str, default_port: u16) -> Result<ParsedTarget> {
        let url = Url::parse(uri)
            .map_err(|e| Error::invalid_target(uri, anyhow::Error::new(e)))?;
        Self::from_url(&url, default_port)
    }

    pub(crate) fn from_url(url: &Url, default_port: u16) -> Result<ParsedTarget> {
        Self::from_url_inner(url, default_port)
            .map_err(|e| Error::invalid_target(url.as_str(), e))
    }

    fn from_url_inner(url: &Url, default_port: u16) -> anyhow::Result<ParsedTarget> {
        // The `scheme:///host[:port]` shape has an empty authority and the
        // name sits in the path; strip the leading slash and reparse the
        // remainder as an authority.
        let name_url;
        let url = if url.host_str().map_or(true, |h| h.is_empty()) {
            let path = url.path();
            let name = match path.strip_prefix('/') {
                Some(name) => name,
                None => {
                    if path.is_empty() {
                        anyhow::bail!("missing path component");
                    }
                    anyhow::bail!("path component '{}' must start with '/'", path);
                }
            };
            name_url = Url::parse(&format!("{}://{}", url.scheme(), name))
                .with_context(|| format!("invalid authority '{}'", name))?;
            &name_url
        } else {
            url
        };

        let host_str = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => anyhow::bail!("missing host"),
        };
        let host = parse_host(&host_str)?;

        let port = url.port().unwrap_or(default_port);
        if port == 0 {
            anyhow::bail!("port must be non-zero");
        }

        let authority = match url.port() {
            Some(p) => format!("{}:{}", host_str, p),
            None => host_str.clone(),
        };

        Ok(ParsedTarget {
            authority,
            host,
            host_str,
            port,
        })
    }

    /// The authority presented to the channel (TLS hostname, auth).
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The target as an absolute DNS name.
    pub fn host(&self) -> &Name {
        &self.host
    }

    /// The host exactly as written in the URI, for error messages.
    pub fn host_str(&self) -> &str {
        &self.host_str
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

fn parse_host(host_str: &str) -> anyhow::Result<Name> {
    let mut name = Name::from_utf8(host_str)
        .map_err(|e| anyhow!("invalid host '{}': {}", host_str, e))?;
    name.set_fqdn(true);
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(uri: &str) -> ParsedTarget {
        ParsedTarget::parse(uri, 42).unwrap()
    }

    #[test]
    fn parse_plain() {
        let t = target("k8s-dns://foo.googleapis.com");
        assert_eq!(t.authority(), "foo.googleapis.com");
        assert_eq!(t.host_str(), "foo.googleapis.com");
        assert_eq!(t.port(), 42);
    }

    #[test]
    fn parse_with_port() {
        let t = target("k8s-dns://foo.googleapis.com:8080");
        assert_eq!(t.authority(), "foo.googleapis.com:8080");
        assert_eq!(t.host_str(), "foo.googleapis.com");
        assert_eq!(t.port(), 8080);
    }

    #[test]
    fn parse_with_extra_slash() {
        let t = target("k8s-dns:///foo.googleapis.com");
        assert_eq!(t.authority(), "foo.googleapis.com");
        assert_eq!(t.host_str(), "foo.googleapis.com");
        assert_eq!(t.port(), 42);
    }

    #[test]
    fn parse_with_extra_slash_and_port() {
        let t = target("k8s-dns:///foo.googleapis.com:8080");
        assert_eq!(t.authority(), "foo.googleapis.com:8080");
        assert_eq!(t.host_str(), "foo.googleapis.com");
        assert_eq!(t.port(), 8080);
    }

    #[test]
    fn slash_variants_agree_on_everything_but_punctuation() {
        let a = target("k8s-dns://foo.example:8080");
        let b = target("k8s-dns:///foo.example:8080");
        assert_eq!(a.host(), b.host());
        assert_eq!(a.host_str(), b.host_str());
        assert_eq!(a.port(), b.port());
    }

    #[test]
    fn host_is_fully_qualified() {
        let t = target("k8s-dns://foo.example");
        assert!(t.host().is_fqdn());
    }

    #[test]
    fn rejects_missing_host() {
        let err = ParsedTarget::parse("k8s-dns://", 42).unwrap_err();
        assert!(matches!(err, Error::InvalidTarget { .. }));
    }

    #[test]
    fn rejects_relative_path() {
        // no authority and no leading slash on the path
        let err = ParsedTarget::parse("k8s-dns:foo.example", 42).unwrap_err();
        assert!(err.to_string().contains("k8s-dns:foo.example"));
    }

    #[test]
    fn rejects_malformed_host() {
        // single label longer than the 63-octet DNS limit
        let label = "a".repeat(64);
        assert!(ParsedTarget::parse(&format!("k8s-dns://{}.example", label), 42).is_err());
    }

    #[test]
    fn rejects_port_zero() {
        assert!(ParsedTarget::parse("k8s-dns://foo.example:0", 42).is_err());
        assert!(ParsedTarget::parse("k8s-dns://foo.example", 0).is_err());
    }

    #[test]
    fn error_message_carries_original_uri() {
        let err = ParsedTarget::parse("k8s-dns://foo.example:0", 42).unwrap_err();
        assert!(err.to_string().contains("k8s-dns://foo.example:0"));
    }
}
