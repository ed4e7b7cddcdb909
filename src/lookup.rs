//! The DNS query seam.
//!
//! The resolver core only needs one operation: an A-record lookup against
//! the authoritative servers, with every cache layer out of the way so the
//! answer reflects the servers' TTL policy and nothing else.

use std::net::IpAddr;

use anyhow::Context;
use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::{Name, TokioAsyncResolver};
use tracing::debug;

/// Executes A-record lookups for the resolver.
///
/// Implementations return the raw answer: unsorted, possibly with
/// duplicates, possibly empty. Canonicalization and empty-answer handling
/// belong to the resolver core.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    async fn lookup_a(&self, host: &Name) -> anyhow::Result<Vec<IpAddr>>;
}

/// [`DnsLookup`] backed by hickory-resolver.
///
/// Both constructors disable the resolver-side cache and the hosts file, so
/// every call goes to the configured nameservers.
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    /// Builds a lookup client from the system configuration (resolv.conf).
    pub fn from_system_conf() -> anyhow::Result<Self> {
        let (config, opts) = hickory_resolver::system_conf::read_system_conf()
            .context("failed to read system DNS configuration")?;
        Ok(Self::build(config, opts))
    }

    /// Builds a lookup client querying the given nameservers over UDP.
    ///
    /// Integration setups point this at a fixture DNS server instead of the
    /// cluster's resolv.conf.
    pub fn with_nameservers(servers: &[IpAddr], port: u16) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(servers, port, true);
        let config = ResolverConfig::from_parts(None, vec![], group);
        Self::build(config, ResolverOpts::default())
    }

    fn build(config: ResolverConfig, mut opts: ResolverOpts) -> Self {
        opts.cache_size = 0;
        opts.use_hosts_file = false;
        let resolver = TokioAsyncResolver::tokio(config, opts);
        Self { resolver }
    }
}

#[async_trait]
impl DnsLookup for HickoryLookup {
    async fn lookup_a(&self, host: &Name) -> anyhow::Result<Vec<IpAddr>> {
        let lookup = self.resolver.ipv4_lookup(host.clone()).await?;
        let addrs: Vec<IpAddr> = lookup.iter().map(|a| IpAddr::V4(a.0)).collect();
        debug!(host = %host, count = addrs.len(), "DNS lookup result");
        Ok(addrs)
    }
}
