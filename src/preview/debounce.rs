use std::time::{Duration, Instant};

/// Trailing-edge debounce driven by caller-supplied instants.
///
/// Every [`schedule`](Self::schedule) restarts the window and replaces the pending value,
/// so a burst collapses into one [`poll`](Self::poll) hit carrying the latest value.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Takes the pending value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((_, deadline)) if now >= deadline => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Drops the pending value. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_collapses_into_one_value() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();
        let mut fired = Vec::new();

        for step in 0..5u64 {
            let now = start + Duration::from_millis(step * 50);
            if let Some(value) = debouncer.poll(now) {
                fired.push(value);
            }
            debouncer.schedule(step, now);
        }
        for step in 5..12u64 {
            if let Some(value) = debouncer.poll(start + Duration::from_millis(step * 50)) {
                fired.push(value);
            }
        }

        assert_eq!(fired, vec![4]);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn poll_waits_for_deadline() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let now = Instant::now();
        debouncer.schedule("blur", now);

        assert_eq!(debouncer.poll(now + Duration::from_millis(99)), None);
        assert_eq!(debouncer.poll(now + Duration::from_millis(100)), Some("blur"));
        assert_eq!(debouncer.poll(now + Duration::from_millis(500)), None);
    }

    #[test]
    fn cancel_prevents_stale_fire() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let now = Instant::now();
        debouncer.schedule(1, now);

        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());
        assert_eq!(debouncer.poll(now + Duration::from_secs(1)), None);
    }
}
