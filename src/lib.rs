//! DNS-based name resolution for Kubernetes headless services.
//!
//! A headless service exposes one A record per ready pod. The resolver
//! here polls those records directly against the cluster DNS servers on a
//! fixed cadence, with every host-side cache bypassed, and tells the
//! channel's listener whenever the address set actually changes.
//!
//! Target URIs look like:
//!
//! - `k8s-dns:///my-svc.my-namespace.svc.cluster.local` (default port)
//! - `k8s-dns:///my-svc.my-namespace.svc.cluster.local:8080`
//!
//! Only A records are supported. Failure hands retry control back to the
//! channel: after an error notification the resolver stays idle until the
//! channel calls `refresh`.

pub mod error;
pub mod listener;
pub mod lookup;
pub mod provider;
pub mod resolver;
pub mod sync;
pub mod target;

pub use error::{Error, Result};
pub use listener::{EndpointGroup, Listener, Status, StatusCode};
pub use lookup::{DnsLookup, HickoryLookup};
pub use provider::{
    K8sDnsResolverProvider, ResolverArgs, ResolverProvider, DEFAULT_PRIORITY,
    DEFAULT_REFRESH_INTERVAL, DEFAULT_SCHEME,
};
pub use resolver::{K8sDnsResolver, NameResolver};
pub use sync::{ScheduledHandle, SyncContext};
pub use target::ParsedTarget;
