use std::time::Duration;

use tokio::time::Instant;

use duet_types::MoodId;

/// Tokens dropped within this distance of the dock are accepted.
const DOCK_RADIUS: f32 = 120.0;
const ACCEPT_HOLD: Duration = Duration::from_millis(1800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockState {
    Idle,
    /// A token is being dragged close to the dock.
    Anticipating,
    /// A token was dropped in; it unlocks at `until`.
    Accepted { token: MoodId, until: Instant },
}

/// Drag-and-drop mood token assignment on the companion's dock.
#[derive(Debug, Clone)]
pub struct TokenDock {
    state: DockState,
}

impl Default for TokenDock {
    fn default() -> Self {
        Self {
            state: DockState::Idle,
        }
    }
}

impl TokenDock {
    pub fn state(&self) -> DockState {
        self.state
    }

    fn locked(&self, compact: bool) -> bool {
        compact || matches!(self.state, DockState::Accepted { .. })
    }

    /// A token is being dragged `distance` px from the dock.
    pub fn on_drag(&mut self, distance: f32, compact: bool) {
        if self.locked(compact) {
            return;
        }
        self.state = if distance < DOCK_RADIUS {
            DockState::Anticipating
        } else {
            DockState::Idle
        };
    }

    /// A token was released `distance` px from the dock. Returns true if accepted.
    pub fn on_drop(&mut self, token: MoodId, distance: f32, compact: bool, now: Instant) -> bool {
        if self.locked(compact) {
            return false;
        }
        if distance < DOCK_RADIUS {
            self.state = DockState::Accepted {
                token,
                until: now + ACCEPT_HOLD,
            };
            true
        } else {
            self.state = DockState::Idle;
            false
        }
    }

    /// Returns the token once its hold has elapsed, resetting the dock.
    pub fn tick(&mut self, now: Instant) -> Option<MoodId> {
        match self.state {
            DockState::Accepted { token, until } if now >= until => {
                self.state = DockState::Idle;
                Some(token)
            }
            _ => None,
        }
    }
}
