use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Shared stop condition for all workers. A worker asks for permission
/// before each iteration; the first refusal ends its loop.
#[derive(Debug)]
pub struct IterationGate {
    counter: AtomicU64,
    iterations: Option<u64>,
    duration: Option<Duration>,
    deadline: OnceLock<Instant>,
}

impl IterationGate {
    pub fn new(iterations: Option<u64>, duration: Option<Duration>) -> Self {
        Self {
            counter: AtomicU64::new(0),
            iterations,
            duration,
            deadline: OnceLock::new(),
        }
    }

    pub fn open_at(&self, started: Instant) {
        if let Some(duration) = self.duration {
            let _ = self.deadline.set(started + duration);
        }
    }

    pub fn open(&self) {
        self.open_at(Instant::now());
    }

    pub fn next(&self) -> bool {
        // Duration mode is the only case that needs timekeeping on this path.
        if self.duration.is_some() {
            let now = Instant::now();

            // If the runner never opened the gate explicitly, the first
            // observed iteration arms the deadline.
            if self.deadline.get().is_none() {
                self.open_at(now);
            }

            if let Some(deadline) = self.deadline.get()
                && now >= *deadline
            {
                return false;
            }
        }

        match self.iterations {
            Some(total) => self.counter.fetch_add(1, Ordering::Relaxed) < total,
            // Neither bound set: run a single pass.
            None if self.duration.is_none() => self.counter.fetch_add(1, Ordering::Relaxed) == 0,
            None => true,
        }
    }
}
