//! The observer surface the channel hands to a resolver.

use std::fmt;
use std::net::SocketAddr;

/// A set of socket addresses the channel treats as equivalent attempts for
/// one logical endpoint. This resolver always produces single-endpoint
/// groups, one per resolved backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointGroup {
    addresses: Vec<SocketAddr>,
}

impl EndpointGroup {
    pub fn single(addr: SocketAddr) -> Self {
        Self {
            addresses: vec![addr],
        }
    }

    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }
}

/// Coarse failure category reported through [`Listener::on_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// The host could not be resolved right now; the channel should retry
    /// by calling `refresh` at a cadence of its choosing.
    Unavailable,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// A failure notification: category, human-readable description and the
/// underlying cause.
#[derive(Debug)]
pub struct Status {
    code: StatusCode,
    message: String,
    cause: Option<anyhow::Error>,
}

impl Status {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::Unavailable,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: anyhow::Error) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}: {}", self.code, self.message, cause),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// Observer for resolution results, supplied by the channel at `start`.
///
/// Calls are serialized: the resolver never invokes the listener from two
/// places at once, and after `shutdown` it never invokes it again.
pub trait Listener: Send + 'static {
    /// A new address set was resolved. Groups arrive in ascending order of
    /// their textual address form, deduplicated; unchanged sets are not
    /// re-delivered.
    fn on_addresses(&self, groups: Vec<EndpointGroup>);

    /// Resolution failed. No further ticks fire until the channel calls
    /// `refresh`.
    fn on_error(&self, status: Status);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_renders_code_message_and_cause() {
        let status = Status::unavailable("Unable to resolve host svc.example.org")
            .with_cause(anyhow::anyhow!("connection refused"));
        assert_eq!(
            status.to_string(),
            "unavailable: Unable to resolve host svc.example.org: connection refused"
        );
        assert_eq!(status.code(), StatusCode::Unavailable);
        assert!(status.cause().is_some());
    }

    #[test]
    fn group_holds_single_endpoint() {
        let group = EndpointGroup::single("10.0.0.1:9000".parse().unwrap());
        assert_eq!(group.addresses().len(), 1);
    }
}
