use thiserror::Error;

/// A `Result` alias where the `Err` case is this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the provider.
///
/// Resolution failures at runtime (transport errors, empty answers) are
/// never returned through this type; they reach the channel only as
/// `unavailable` notifications on the listener, and the channel decides
/// when to retry.
#[derive(Error, Debug)]
pub enum Error {
    /// The target URI could not be turned into a resolvable DNS name.
    #[error("invalid DNS target URI '{uri}': {source}")]
    InvalidTarget {
        uri: String,
        #[source]
        source: anyhow::Error,
    },

    /// Provider construction was handed an out-of-range or missing option.
    #[error("invalid resolver configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    pub(crate) fn invalid_target(uri: &str, source: anyhow::Error) -> Self {
        Error::InvalidTarget {
            uri: uri.to_string(),
            source,
        }
    }
}
