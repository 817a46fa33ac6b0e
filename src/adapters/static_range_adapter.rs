//! Reference statistics held in memory, usually loaded from configuration.

use crate::domain::normalization::ReferenceStats;
use crate::domain::variable::ComparisonGroup;
use crate::ports::range_port::HistoricalRangeProvider;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct StaticRangeAdapter {
    stats: HashMap<ComparisonGroup, ReferenceStats>,
}

impl StaticRangeAdapter {
    pub fn new(stats: HashMap<ComparisonGroup, ReferenceStats>) -> Self {
        Self { stats }
    }

    pub fn with(mut self, group: ComparisonGroup, stats: ReferenceStats) -> Self {
        self.stats.insert(group, stats);
        self
    }
}

impl HistoricalRangeProvider for StaticRangeAdapter {
    fn reference_stats(&self, group: ComparisonGroup) -> Option<ReferenceStats> {
        self.stats.get(&group).copied()
    }
}
