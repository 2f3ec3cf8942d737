//! Running session statistics.

use serde::{Deserialize, Serialize};

/// Counters over the answered queries of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    /// Queries that reached retrieval
    pub total_queries: u64,

    /// Queries that retrieved at least one unit
    pub successful_retrievals: u64,

    /// Mean context length in characters over all counted queries
    pub avg_context_length: f64,
}

impl SessionStatistics {
    /// Count one query with the given context length and retrieval size.
    pub fn record(&mut self, context_chars: usize, retrieved: usize) {
        self.total_queries += 1;
        if retrieved > 0 {
            self.successful_retrievals += 1;
        }

        // Incremental mean: exact for every n, no running sum to overflow
        let count = self.total_queries as f64;
        self.avg_context_length += (context_chars as f64 - self.avg_context_length) / count;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_mean_matches_arithmetic_mean() {
        let lengths = [120usize, 0, 457, 33, 1000, 2];
        let mut stats = SessionStatistics::default();
        for (i, len) in lengths.iter().enumerate() {
            stats.record(*len, i % 2);
        }

        let expected = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;
        assert!((stats.avg_context_length - expected).abs() < 1e-9);
        assert_eq!(stats.total_queries, 6);
        assert_eq!(stats.successful_retrievals, 3);
    }

    #[test]
    fn test_reset() {
        let mut stats = SessionStatistics::default();
        stats.record(10, 1);
        stats.reset();
        assert_eq!(stats, SessionStatistics::default());
    }
}
