//! Historical reference statistics port trait.

use crate::domain::normalization::ReferenceStats;
use crate::domain::variable::ComparisonGroup;

/// Supplies per-group reference statistics for normalization. The engine only
/// applies them; deriving them from history is the provider's business.
pub trait HistoricalRangeProvider: Send + Sync {
    fn reference_stats(&self, group: ComparisonGroup) -> Option<ReferenceStats>;
}
