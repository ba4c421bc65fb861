pub mod config;
pub mod document;
pub mod sanitize;
pub mod scheduler;

pub use document::StatusDocument;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to connect to {address:?}: {source}")]
    Connect {
        address: String,
        #[source]
        source: BoxError,
    },
    #[error("serverStatus failed on {address:?}: {source}")]
    Command {
        address: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("failed to create statsd client for {endpoint:?}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to send gauge {metric:?}: {source}")]
    Send {
        metric: String,
        #[source]
        source: BoxError,
    },
}

/// Source of `serverStatus` snapshots for a single server.
#[async_trait::async_trait]
pub trait StatusSource: std::fmt::Debug + Send + Sync + 'static {
    fn address(&self) -> &str;

    async fn fetch(&self) -> Result<StatusDocument, FetchError>;
}

/// Forwards a snapshot to a metrics backend.
#[async_trait::async_trait]
pub trait Emitter: std::fmt::Debug + Send + Sync + 'static {
    /// Returns the number of gauges sent.
    ///
    /// Documents without a host are skipped and report zero gauges.
    async fn emit(&self, document: &StatusDocument) -> Result<usize, EmitError>;
}
