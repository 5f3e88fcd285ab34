//! Per-set timing reports.

use std::fmt;

use serde::Serialize;

use crate::engine::EngineSummary;

/// Compile and execute timings of one result set, in seconds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct QuerySummary {
    compiling_time: f64,
    execution_time: f64,
}

impl QuerySummary {
    /// Seconds spent compiling.
    pub fn compiling_time(&self) -> f64 {
        self.compiling_time
    }

    /// Seconds spent executing.
    pub fn execution_time(&self) -> f64 {
        self.execution_time
    }

    /// Sum of both phases.
    pub fn total_time(&self) -> f64 {
        self.compiling_time + self.execution_time
    }
}

impl From<EngineSummary> for QuerySummary {
    fn from(summary: EngineSummary) -> Self {
        Self {
            compiling_time: summary.compiling_ms / 1_000.0,
            execution_time: summary.execution_ms / 1_000.0,
        }
    }
}

impl fmt::Display for QuerySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "compiling: {:.6}s, execution: {:.6}s",
            self.compiling_time, self.execution_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milliseconds_become_seconds() {
        let summary = QuerySummary::from(EngineSummary {
            compiling_ms: 1.5,
            execution_ms: 250.0,
        });
        assert_eq!(summary.compiling_time(), 0.0015);
        assert_eq!(summary.execution_time(), 0.25);
        assert_eq!(summary.to_string(), "compiling: 0.001500s, execution: 0.250000s");
    }
}
