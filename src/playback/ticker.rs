use std::time::{Duration, Instant};

/// Holds at most one pending tick deadline.
///
/// Scheduling while a tick is pending replaces it, so a loop driven by the
/// ticker never has two ticks in flight.
#[derive(Debug)]
pub struct FrameTicker {
    interval: Duration,
    pending: Option<Instant>,
}

impl FrameTicker {
    /// `target_fps == 0` means unpaced: each tick is due immediately.
    pub fn new(target_fps: u32) -> Self {
        let interval = if target_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / target_fps
        };
        Self {
            interval,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Schedule the next tick one interval after `now`.
    pub fn schedule(&mut self, now: Instant) {
        self.pending = Some(now + self.interval);
    }

    pub fn schedule_now(&mut self, now: Instant) {
        self.pending = Some(now);
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending
    }

    /// Consume the pending tick if it is due.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(deadline) if deadline <= now => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paces_at_target_fps() {
        let mut ticker = FrameTicker::new(25);
        let now = Instant::now();
        ticker.schedule(now);
        assert_eq!(ticker.deadline(), Some(now + Duration::from_millis(40)));
        assert!(!ticker.take_due(now));
        assert!(ticker.take_due(now + Duration::from_millis(40)));
        assert!(!ticker.is_pending());
    }

    #[test]
    fn unpaced_ticks_are_due_immediately() {
        let mut ticker = FrameTicker::new(0);
        let now = Instant::now();
        ticker.schedule(now);
        assert!(ticker.take_due(now));
    }

    #[test]
    fn cancel_drops_pending_tick() {
        let mut ticker = FrameTicker::new(30);
        let now = Instant::now();
        ticker.schedule(now);
        ticker.schedule(now + Duration::from_millis(5));
        ticker.cancel();
        assert!(!ticker.take_due(now + Duration::from_secs(1)));
    }
}
