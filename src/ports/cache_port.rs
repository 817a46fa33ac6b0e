//! Read-only indicator cache port trait.

use crate::domain::indicator::IndicatorOutput;

/// Identifies one indicator computation over one concrete price series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Canonical indicator key, e.g. `SMA(period=5)`.
    pub indicator: String,
    /// Content fingerprint of the input series.
    pub fingerprint: String,
}

/// The engine only reads; population and invalidation belong to the implementor.
pub trait IndicatorCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<IndicatorOutput>;
}
