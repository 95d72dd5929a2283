use thiserror::Error;

use vitrine_store::StoreError;

/// Failures the catalog engine surfaces to its callers.
///
/// The facet aggregator never returns one of these; only the feed
/// assembler propagates upstream failures (at hydration time).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CatalogError {
    /// True when the underlying failure was an upstream timeout, which
    /// maps to 504 rather than 502 at the HTTP edge.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Store(err) => err.is_timeout(),
        }
    }
}
