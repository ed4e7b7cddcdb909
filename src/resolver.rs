//! The resolver core: polls DNS on a fixed cadence, deduplicates answers,
//! and reports changes to the channel's listener.
//!
//! Retry discipline after a failure belongs to the channel, not to the
//! resolver: on any failure the recurring tick is cancelled and the
//! resolver sits idle until the channel calls `refresh`.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::listener::{EndpointGroup, Listener, Status};
use crate::lookup::DnsLookup;
use crate::sync::{ScheduledHandle, SyncContext};
use crate::target::ParsedTarget;

/// The operations a channel invokes on a resolver.
pub trait NameResolver: Send {
    /// The authority for this target. Pure.
    fn service_authority(&self) -> &str;

    /// Begins resolution: an immediate refresh, then recurring refreshes at
    /// the configured interval. Called exactly once.
    fn start(&self, listener: Box<dyn Listener>);

    /// Asks for re-resolution. A no-op while the recurring tick is armed;
    /// after a failure it re-arms the tick, paced so polls stay at least
    /// one interval apart.
    fn refresh(&self);

    /// Stops resolution. Idempotent; no listener calls happen afterwards.
    fn shutdown(&self);
}

/// DNS-polling [`NameResolver`] for headless-service targets.
pub struct K8sDnsResolver {
    inner: Arc<Inner>,
}

struct Inner {
    target: ParsedTarget,
    refresh_interval: Duration,
    sync_ctx: SyncContext,
    handle: Handle,
    lookup: Arc<dyn DnsLookup>,
    state: Mutex<ResolverState>,
}

#[derive(Default)]
struct ResolverState {
    listener: Option<Box<dyn Listener>>,
    scheduled: Option<ScheduledHandle>,
    last_success: Option<SuccessResult>,
    refreshing: bool,
    shut_down: bool,
}

struct SuccessResult {
    addresses: Vec<IpAddr>,
    received_at: Instant,
}

impl K8sDnsResolver {
    pub(crate) fn new(
        target: ParsedTarget,
        refresh_interval: Duration,
        sync_ctx: SyncContext,
        handle: Handle,
        lookup: Arc<dyn DnsLookup>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                target,
                refresh_interval,
                sync_ctx,
                handle,
                lookup,
                state: Mutex::new(ResolverState::default()),
            }),
        }
    }
}

impl NameResolver for K8sDnsResolver {
    fn service_authority(&self) -> &str {
        self.inner.target.authority()
    }

    fn start(&self, listener: Box<dyn Listener>) {
        let inner = self.inner.clone();
        self.inner.sync_ctx.execute(move || inner.do_start(listener));
    }

    fn refresh(&self) {
        let inner = self.inner.clone();
        self.inner.sync_ctx.execute(move || inner.do_refresh());
    }

    fn shutdown(&self) {
        let inner = self.inner.clone();
        self.inner.sync_ctx.execute(move || inner.do_shutdown());
    }
}

impl Inner {
    fn do_start(self: &Arc<Self>, listener: Box<dyn Listener>) {
        let mut state = self.state.lock().unwrap();
        if state.shut_down {
            return;
        }
        if state.listener.is_some() {
            warn!(
                authority = %self.target.authority(),
                "resolver started twice; keeping the original schedule"
            );
            return;
        }
        state.listener = Some(listener);
        self.arm(&mut state, Duration::ZERO);
    }

    fn do_refresh(self: &Arc<Self>) {
        let mut state = self.state.lock().unwrap();
        if state.shut_down || state.listener.is_none() || state.scheduled.is_some() {
            // not started yet, already terminated, or already polling;
            // at most one scheduled task may exist
            return;
        }

        // The last attempt failed and the channel is retrying us. Pace the
        // next tick so polls stay one interval apart even across the
        // failure: no earlier than last success + interval.
        let initial_delay = match &state.last_success {
            Some(last) => (last.received_at + self.refresh_interval)
                .duration_since(Instant::now()),
            None => Duration::ZERO,
        };
        debug!(
            host = %self.target.host_str(),
            delay_ms = initial_delay.as_millis() as u64,
            "re-arming refresh after failure"
        );
        self.arm(&mut state, initial_delay);
    }

    fn do_shutdown(self: &Arc<Self>) {
        let mut state = self.state.lock().unwrap();
        if state.shut_down {
            return;
        }
        state.shut_down = true;
        if let Some(task) = state.scheduled.take() {
            task.cancel();
        }
        // late lookup completions observe the missing listener and skip
        state.listener = None;
    }

    /// Arms the recurring refresh. Caller holds the state lock and has
    /// verified no task is currently scheduled.
    fn arm(self: &Arc<Self>, state: &mut ResolverState, initial_delay: Duration) {
        let inner = Arc::clone(self);
        let task = self.sync_ctx.schedule_with_fixed_delay(
            initial_delay,
            self.refresh_interval,
            &self.handle,
            move || inner.refresh_inner(),
        );
        state.scheduled = Some(task);
    }

    /// One tick: kick off a lookup unless one is already in flight.
    fn refresh_inner(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().unwrap();
            if state.refreshing || state.shut_down {
                return;
            }
            state.refreshing = true;
        }

        let inner = Arc::clone(self);
        self.handle.spawn(async move {
            let result = inner.lookup.lookup_a(inner.target.host()).await;
            // never touch state from the lookup task; hop back first
            let ctx = inner.sync_ctx.clone();
            ctx.execute(move || inner.on_lookup_complete(result));
        });
    }

    fn on_lookup_complete(&self, result: anyhow::Result<Vec<IpAddr>>) {
        let mut state = self.state.lock().unwrap();
        state.refreshing = false;
        if state.shut_down {
            return;
        }

        match result {
            Ok(addresses) => {
                if addresses.is_empty() {
                    // an empty address list is equivalent to an error in the
                    // listener contract; report it as one so the channel's
                    // retry logic kicks in
                    let err = anyhow::anyhow!("no addresses for {}", self.target.host_str());
                    self.handle_failure(&mut state, err);
                } else {
                    self.handle_success(&mut state, addresses);
                }
            }
            Err(err) => {
                error!(host = %self.target.host_str(), error = %err, "DNS lookup failed");
                self.handle_failure(&mut state, err);
            }
        }
    }

    fn handle_success(&self, state: &mut ResolverState, mut addresses: Vec<IpAddr>) {
        // canonical form: unique addresses in ascending textual order, so
        // comparison does not depend on answer order and the group list the
        // channel sees is stable
        addresses.sort_by_cached_key(|addr| addr.to_string());
        addresses.dedup();

        let changed = match &state.last_success {
            Some(last) => last.addresses != addresses,
            None => true,
        };
        if changed {
            debug!(
                host = %self.target.host_str(),
                count = addresses.len(),
                "resolved address set changed"
            );
            if let Some(listener) = &state.listener {
                let groups = addresses
                    .iter()
                    .map(|&ip| EndpointGroup::single(SocketAddr::new(ip, self.target.port())))
                    .collect();
                listener.on_addresses(groups);
            }
        }

        state.last_success = Some(SuccessResult {
            addresses,
            received_at: Instant::now(),
        });
    }

    fn handle_failure(&self, state: &mut ResolverState, err: anyhow::Error) {
        // the channel owns retry cadence: stop ticking and wait for refresh
        if let Some(task) = state.scheduled.take() {
            task.cancel();
        }
        if let Some(listener) = &state.listener {
            let status = Status::unavailable(format!(
                "Unable to resolve host {}",
                self.target.host_str()
            ))
            .with_cause(err);
            listener.on_error(status);
        }
    }
}
