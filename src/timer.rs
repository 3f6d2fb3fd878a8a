//! Cooperative single-shot timers.
//!
//! Nothing here runs on another thread: the host calls
//! [`DocumentViewport::poll`](crate::DocumentViewport::poll) from its event
//! loop and every armed [`SingleShot`] whose deadline has passed fires there.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Source of "now" for debounce deadlines.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time, so a
/// host (or a test) can keep one handle and advance the viewport's copy.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }
}

/// A restartable delayed task.
///
/// Every `start` bumps the generation and replaces the armed deadline, so a
/// burst of starts collapses into one fire carrying the last generation.
/// `cancel` also bumps it: whatever was scheduled before is stale.
#[derive(Debug, Clone)]
pub struct SingleShot {
    delay: Duration,
    generation: u64,
    armed: Option<Armed>,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    generation: u64,
    due: Instant,
}

impl SingleShot {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            armed: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Arms (or re-arms) the timer and returns the new generation.
    pub fn start(&mut self, now: Instant) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.armed = Some(Armed {
            generation: self.generation,
            due: now + self.delay,
        });
        self.generation
    }

    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.armed = None;
    }

    /// Fires at most once per `start`. Returns the generation that fired.
    pub fn fire_if_due(&mut self, now: Instant) -> Option<u64> {
        let armed = self.armed?;
        if armed.due > now {
            return None;
        }

        self.armed = None;
        if armed.generation != self.generation {
            return None;
        }
        Some(armed.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_after_delay() {
        let clock = ManualClock::new();
        let mut timer = SingleShot::new(Duration::from_millis(100));
        timer.start(clock.now());

        clock.advance_ms(99);
        assert_eq!(timer.fire_if_due(clock.now()), None);

        clock.advance_ms(1);
        assert_eq!(timer.fire_if_due(clock.now()), Some(1));
        assert_eq!(timer.fire_if_due(clock.now()), None);
    }

    #[test]
    fn restart_pushes_deadline_and_keeps_last_generation() {
        let clock = ManualClock::new();
        let mut timer = SingleShot::new(Duration::from_millis(800));
        timer.start(clock.now());
        clock.advance_ms(500);
        timer.start(clock.now());
        clock.advance_ms(500);
        assert_eq!(timer.fire_if_due(clock.now()), None);

        clock.advance_ms(300);
        assert_eq!(timer.fire_if_due(clock.now()), Some(2));
    }

    #[test]
    fn cancel_prevents_fire() {
        let clock = ManualClock::new();
        let mut timer = SingleShot::new(Duration::from_millis(10));
        timer.start(clock.now());
        timer.cancel();
        clock.advance_ms(50);
        assert_eq!(timer.fire_if_due(clock.now()), None);
        assert_eq!(timer.generation(), 2);
        assert!(!timer.is_armed());
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let before = other.now();
        clock.advance_ms(250);
        assert_eq!(other.now() - before, Duration::from_millis(250));
    }
}
