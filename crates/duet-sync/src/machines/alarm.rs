use std::time::Duration;

use tokio::time::Instant;

use duet_types::{InteractionKind, Portal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Idle,
    Alarming { until: Instant },
}

/// Alarm overlay raised by the other portal's ping.
///
/// The deadline is fixed by the first matching signal. Signals that arrive
/// while alarming neither extend it nor queue another alarm.
#[derive(Debug, Clone)]
pub struct Alarm {
    expected: InteractionKind,
    duration: Duration,
    state: AlarmState,
}

impl Alarm {
    pub fn new(expected: InteractionKind, duration: Duration) -> Self {
        Self {
            expected,
            duration,
            state: AlarmState::Idle,
        }
    }

    /// The alarm a portal shows when its peer pings it.
    pub fn for_portal(portal: Portal) -> Self {
        let duration = match portal {
            Portal::Girlfriend => Duration::from_millis(2000),
            Portal::Boyfriend => Duration::from_millis(3000),
        };
        Self::new(portal.incoming_ping(), duration)
    }

    /// Feed a received signal. Returns true if it raised the alarm.
    pub fn on_signal(&mut self, kind: InteractionKind, now: Instant) -> bool {
        if kind != self.expected {
            return false;
        }
        match self.tick(now) {
            AlarmState::Idle => {
                self.state = AlarmState::Alarming {
                    until: now + self.duration,
                };
                true
            }
            AlarmState::Alarming { .. } => false,
        }
    }

    /// Advance to `now` and return the resulting state.
    pub fn tick(&mut self, now: Instant) -> AlarmState {
        if let AlarmState::Alarming { until } = self.state {
            if now >= until {
                self.state = AlarmState::Idle;
            }
        }
        self.state
    }

    pub fn is_alarming(&mut self, now: Instant) -> bool {
        matches!(self.tick(now), AlarmState::Alarming { .. })
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
