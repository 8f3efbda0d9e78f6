//! Shared application state for the registry API.

use robotlog_store::Registry;

/// State handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The registry all requests are served from.
    pub registry: Registry,
}

impl AppState {
    /// Wrap a registry.
    pub const fn new(registry: Registry) -> Self {
        Self { registry }
    }
}
