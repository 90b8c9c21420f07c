use std::time::Duration;

use tokio::time::Instant;

const LINE_INTERVAL: Duration = Duration::from_millis(400);
const SETTLE: Duration = Duration::from_millis(1200);

pub const DEFAULT_BOOT_LINES: [&str; 6] = [
    "BIOS VER 9.2.4 - CELESTIAL OS",
    "INITIALIZING POWER ROUTING...",
    "[OK] MAIN THRUSTERS ONLINE",
    "PINGING STELLAR RELAY...",
    "DECRYPTING MEMORY NODES...",
    "WELCOME HOME.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    /// `shown` lines are on screen.
    Revealing { shown: usize },
    /// All lines shown, holding before the dashboard appears.
    Settling,
    Done,
}

/// Boot screen: one line every 400 ms, then a 1200 ms settle.
#[derive(Debug, Clone)]
pub struct BootSequence {
    lines: Vec<String>,
    started: Instant,
}

impl BootSequence {
    pub fn new(lines: Vec<String>, started: Instant) -> Self {
        Self { lines, started }
    }

    pub fn with_default_lines(started: Instant) -> Self {
        Self::new(DEFAULT_BOOT_LINES.iter().map(|l| l.to_string()).collect(), started)
    }

    pub fn phase(&self, now: Instant) -> BootPhase {
        let elapsed = now.saturating_duration_since(self.started);
        let reveal = LINE_INTERVAL * self.lines.len() as u32;

        if elapsed < reveal {
            let shown = (elapsed.as_millis() / LINE_INTERVAL.as_millis()) as usize;
            BootPhase::Revealing { shown }
        } else if elapsed < reveal + SETTLE {
            BootPhase::Settling
        } else {
            BootPhase::Done
        }
    }

    pub fn visible(&self, now: Instant) -> &[String] {
        match self.phase(now) {
            BootPhase::Revealing { shown } => &self.lines[..shown],
            _ => &self.lines,
        }
    }

    /// When the sequence finishes.
    pub fn done_at(&self) -> Instant {
        self.started + LINE_INTERVAL * self.lines.len() as u32 + SETTLE
    }
}
