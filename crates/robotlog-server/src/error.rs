//! Error types for the server binary.

/// Top-level error for the server binary.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: robotlog_core::ConfigError,
    },

    /// Opening the store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: robotlog_store::DbError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("http error: {source}")]
    Http {
        /// The underlying server error.
        #[from]
        source: robotlog_api::ServerError,
    },

    /// The log filter directive could not be parsed.
    #[error("invalid log level {level:?}: {message}")]
    Logging {
        /// The rejected directive.
        level: String,
        /// Parser message.
        message: String,
    },
}
