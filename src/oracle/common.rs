use std::time::Duration;

use super::VerificationError;

/// Round trip times collected over repeated commands
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyStats {
    pub iterations: u32,
    pub total: Duration,
    pub max: Duration,
}

impl LatencyStats {
    pub fn record(&mut self, latency: Duration) {
        self.iterations += 1;
        self.total += latency;
        self.max = self.max.max(latency);
    }

    pub fn mean(&self) -> Duration {
        if self.iterations == 0 {
            Duration::ZERO
        } else {
            self.total / self.iterations
        }
    }

    /// Both the mean and the worst round trip have to stay strictly below `bound`. Without a
    /// single measurement there is nothing to bound, which fails as well.
    pub fn check_below(&self, bound: Duration) -> Result<(), VerificationError> {
        if self.iterations == 0 {
            return Err(VerificationError::Timing {
                what: "latency".to_string(),
                measured: "no round trips".to_string(),
                bound: format!("{bound:?}"),
            });
        }
        for (what, measured) in [("mean latency", self.mean()), ("max latency", self.max)] {
            if measured >= bound {
                return Err(VerificationError::Timing {
                    what: format!("{what} over {} iterations", self.iterations),
                    measured: format!("{measured:?}"),
                    bound: format!("{bound:?}"),
                });
            }
        }
        Ok(())
    }
}
