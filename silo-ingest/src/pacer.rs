//! Fixed-interval pacing for the idle sweep.

use std::time::{Duration, Instant};

/// Rate limiter that fires at most once per interval.
///
/// The idle sweep walks every open batch; running it on every consumer
/// loop turn would be wasted work, so the coordinator gates it behind a
/// pacer. The first call always fires.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last_fire: Option<Instant>,
}

impl Pacer {
    /// Creates a pacer with the given minimum interval between firings.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fire: None,
        }
    }

    /// Returns true if the interval has elapsed, consuming the firing.
    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    /// Clock-injected variant of [`ready`](Self::ready).
    pub fn ready_at(&mut self, now: Instant) -> bool {
        match self.last_fire {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_fire = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_fires() {
        let mut pacer = Pacer::new(Duration::from_secs(15));
        assert!(pacer.ready());
    }

    #[test]
    fn test_fires_at_most_once_per_interval() {
        let mut pacer = Pacer::new(Duration::from_secs(15));
        let start = Instant::now();

        assert!(pacer.ready_at(start));
        assert!(!pacer.ready_at(start));
        assert!(!pacer.ready_at(start + Duration::from_secs(14)));
        assert!(pacer.ready_at(start + Duration::from_secs(15)));
        assert!(!pacer.ready_at(start + Duration::from_secs(16)));
    }
}
