//! Provider: manufactures resolvers for `k8s-dns` target URIs.
//!
//! An alternative to a stock DNS resolver geared towards Kubernetes
//! headless services: instead of resolving once per connection attempt, the
//! resolvers it produces watch the set of ready pod addresses by polling
//! the cluster DNS directly (host caches bypassed) and notify the channel
//! whenever that set changes.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use url::Url;

use crate::error::{Error, Result};
use crate::lookup::{DnsLookup, HickoryLookup};
use crate::resolver::{K8sDnsResolver, NameResolver};
use crate::sync::SyncContext;
use crate::target::ParsedTarget;

/// The default URI scheme handled by [`K8sDnsResolverProvider`].
pub const DEFAULT_SCHEME: &str = "k8s-dns";

/// The default interval between DNS refresh operations.
///
/// The default in-cluster CoreDNS TTL is 5 seconds; refreshing at twice
/// that balances propagation latency against DNS server load.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// The default provider priority, the middle of the accepted [0, 10] range.
pub const DEFAULT_PRIORITY: u8 = 5;

/// What a provider advertises to the host framework, and the one factory
/// method the framework calls with a target URI.
pub trait ResolverProvider: Send + Sync {
    fn is_available(&self) -> bool;

    /// Providers claiming the same scheme are ranked by this value; higher
    /// wins. Always within [0, 10].
    fn priority(&self) -> u8;

    fn default_scheme(&self) -> &str;

    /// Creates a resolver for `uri`, or `Ok(None)` when the URI's scheme is
    /// not this provider's.
    fn new_resolver(&self, uri: &str, args: &ResolverArgs)
        -> Result<Option<Box<dyn NameResolver>>>;
}

/// Everything the host framework supplies to a new resolver.
pub struct ResolverArgs {
    /// Port used when the target URI does not carry one.
    pub default_port: u16,
    /// Serialized executor all resolver state mutations run on.
    pub sync_ctx: SyncContext,
    /// Runtime the resolver schedules ticks and lookups on.
    pub handle: Handle,
    /// Overrides the hickory-backed DNS client. Mainly a seam for tests and
    /// custom transports; `None` means system configuration.
    pub lookup: Option<Arc<dyn DnsLookup>>,
}

/// [`ResolverProvider`] for DNS-based service discovery in Kubernetes.
///
/// Immutable once constructed: the refresh interval is snapshotted into
/// every resolver this provider creates, and there is no way to change it
/// for resolvers already live.
#[derive(Debug)]
pub struct K8sDnsResolverProvider {
    scheme: String,
    priority: u8,
    refresh_interval: Duration,
}

impl Default for K8sDnsResolverProvider {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            priority: DEFAULT_PRIORITY,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl K8sDnsResolverProvider {
    /// Creates a provider with a custom scheme, priority and refresh
    /// interval. Use this to register the provider under an alternative
    /// URI scheme.
    pub fn new(scheme: &str, priority: u8, refresh_interval_secs: u64) -> Result<Self> {
        if scheme.is_empty() {
            return Err(Error::InvalidConfiguration(
                "scheme must not be empty".to_string(),
            ));
        }
        if priority > 10 {
            return Err(Error::InvalidConfiguration(format!(
                "provider priority must be within [0, 10], got {}",
                priority
            )));
        }
        if refresh_interval_secs == 0 {
            return Err(Error::InvalidConfiguration(
                "refresh interval must be > 0, got 0".to_string(),
            ));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            priority,
            refresh_interval: Duration::from_secs(refresh_interval_secs),
        })
    }
}

impl ResolverProvider for K8sDnsResolverProvider {
    fn is_available(&self) -> bool {
        true
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn default_scheme(&self) -> &str {
        &self.scheme
    }

    fn new_resolver(
        &self,
        uri: &str,
        args: &ResolverArgs,
    ) -> Result<Option<Box<dyn NameResolver>>> {
        let url = Url::parse(uri)
            .map_err(|e| Error::invalid_target(uri, anyhow::Error::new(e)))?;
        if url.scheme() != self.scheme {
            return Ok(None);
        }

        let target = ParsedTarget::from_url(&url, args.default_port)?;
        let lookup = match &args.lookup {
            Some(lookup) => lookup.clone(),
            None => Arc::new(HickoryLookup::from_system_conf().map_err(|e| {
                Error::InvalidConfiguration(format!("failed to configure DNS client: {:#}", e))
            })?),
        };

        Ok(Some(Box::new(K8sDnsResolver::new(
            target,
            self.refresh_interval,
            args.sync_ctx.clone(),
            args.handle.clone(),
            lookup,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let provider = K8sDnsResolverProvider::default();
        assert!(provider.is_available());
        assert_eq!(provider.priority(), 5);
        assert_eq!(provider.default_scheme(), "k8s-dns");
    }

    #[test]
    fn rejects_out_of_range_priority() {
        assert!(K8sDnsResolverProvider::new("k8s-dns", 11, 10).is_err());
        assert!(K8sDnsResolverProvider::new("k8s-dns", 10, 10).is_ok());
    }

    #[test]
    fn rejects_zero_refresh_interval() {
        let err = K8sDnsResolverProvider::new("k8s-dns", 5, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_empty_scheme() {
        assert!(K8sDnsResolverProvider::new("", 5, 10).is_err());
    }

    #[tokio::test]
    async fn foreign_scheme_yields_no_resolver() {
        let provider = K8sDnsResolverProvider::default();
        let args = test_args();
        let resolver = provider
            .new_resolver("dns://foo.example:8080", &args)
            .unwrap();
        assert!(resolver.is_none());
    }

    #[tokio::test]
    async fn matching_scheme_yields_resolver_with_authority() {
        let provider = K8sDnsResolverProvider::default();
        let args = test_args();
        let resolver = provider
            .new_resolver("k8s-dns:///svc.ns.svc.cluster.local:8080", &args)
            .unwrap()
            .expect("scheme matches");
        assert_eq!(resolver.service_authority(), "svc.ns.svc.cluster.local:8080");
    }

    #[tokio::test]
    async fn invalid_target_is_an_error() {
        let provider = K8sDnsResolverProvider::default();
        let args = test_args();
        assert!(provider.new_resolver("k8s-dns://", &args).is_err());
    }

    fn test_args() -> ResolverArgs {
        let handle = Handle::current();
        ResolverArgs {
            default_port: 443,
            sync_ctx: SyncContext::new(&handle),
            handle,
            lookup: Some(Arc::new(NoopLookup)),
        }
    }

    struct NoopLookup;

    #[async_trait::async_trait]
    impl DnsLookup for NoopLookup {
        async fn lookup_a(&self, _host: &hickory_resolver::Name) -> anyhow::Result<Vec<std::net::IpAddr>> {
            Ok(Vec::new())
        }
    }
}
