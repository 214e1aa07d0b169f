use std::time::{Duration, Instant};

/// Coalesce rapid repeated triggers into one delayed execution: a single
/// pending slot overwritten by each new request, flushed once the quiet
/// period elapses. The window restarts on every submit, so only the last
/// pending value is ever processed.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<T>,
    deadline: Option<Instant>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            deadline: None,
        }
    }

    pub fn submit(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        self.deadline = Some(now + self.window);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending value once its quiet period has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Take the pending value immediately (e.g. before an export).
    pub fn flush(&mut self) -> Option<T> {
        self.deadline = None;
        self.pending.take()
    }
}

/// Gate continuous pointer-driven updates to at most one per interval.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Returns true and arms the gate when enough time has passed since the
    /// last accepted call.
    pub fn ready(&mut self, now: Instant) -> bool {
        let ok = self
            .last
            .map(|l| now.duration_since(l) >= self.min_interval)
            .unwrap_or(true);
        if ok {
            self.last = Some(now);
        }
        ok
    }
}
