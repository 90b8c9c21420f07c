use std::time::Duration;

use tokio::time::Instant;

/// A fixed-length active window: screen flicker, button cooldown.
#[derive(Debug, Clone)]
pub struct Pulse {
    duration: Duration,
    until: Option<Instant>,
}

impl Pulse {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            until: None,
        }
    }

    /// Flicker shown when a secure message arrives.
    pub fn flicker() -> Self {
        Self::new(Duration::from_millis(800))
    }

    /// Ping button cooldown.
    pub fn cooldown() -> Self {
        Self::new(Duration::from_millis(3000))
    }

    /// Start (or restart) the window at `now`.
    pub fn trigger(&mut self, now: Instant) {
        self.until = Some(now + self.duration);
    }

    /// Keep the window open until at least `now + duration`.
    pub fn hold(&mut self, now: Instant, duration: Duration) {
        let until = now + duration;
        self.until = Some(self.until.map_or(until, |current| current.max(until)));
    }

    /// Start the window only if it is not already running.
    pub fn try_trigger(&mut self, now: Instant) -> bool {
        if self.is_active(now) {
            return false;
        }
        self.trigger(now);
        true
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_never_shortens_the_window() {
        let t0 = Instant::now();
        let mut flicker = Pulse::flicker();
        flicker.hold(t0, Duration::from_millis(2000));
        flicker.trigger(t0 + Duration::from_millis(100));
        flicker.hold(t0 + Duration::from_millis(200), Duration::from_millis(500));
        assert!(flicker.is_active(t0 + Duration::from_millis(1999)));
        assert!(!flicker.is_active(t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let t0 = Instant::now();
        let mut cooldown = Pulse::cooldown();
        assert!(cooldown.try_trigger(t0));
        assert!(!cooldown.try_trigger(t0 + Duration::from_millis(2999)));
        assert!(cooldown.try_trigger(t0 + Duration::from_millis(3000)));
    }

    #[test]
    fn flicker_restarts_on_trigger() {
        let t0 = Instant::now();
        let mut flicker = Pulse::flicker();
        assert!(!flicker.is_active(t0));
        flicker.trigger(t0);
        flicker.trigger(t0 + Duration::from_millis(500));
        assert!(flicker.is_active(t0 + Duration::from_millis(1200)));
        assert!(!flicker.is_active(t0 + Duration::from_millis(1300)));
    }
}
