use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use duet_types::companion::Gesture;
use duet_types::{Memory, MoodId, MoodLog, NewRow, Portal, Quote, Row, SecureMessage, Table};

use crate::bus::{Delivery, EventBus, LinkState, Subscription};
use crate::clock::{self, CelestialPhase};
use crate::machines::{
    Alarm, BootPhase, BootSequence, Companion, DecryptReveal, DockState, Pulse, StatusLine,
    TokenDock,
};
use crate::store::{CurrentValue, RecentMemories};

pub const TRANSMISSION_FAILED: &str = "ERROR: TRANSMISSION FAILED.";
pub const SYNC_FAILED: &str = "ERROR: SYNC FAILED.";
const QUOTE_UPLOADING: &str = "UPLOADING TO MAINFRAME...";
const QUOTE_DONE: &str = "OVERRIDE SUCCESSFUL.";
const MEMORY_UPLOADING: &str = "UPLOADING TO STORAGE...";
const MEMORY_SYNCING: &str = "SYNCING DATABASE...";
const MEMORY_DONE: &str = "MEMORY VAULT SYNCED.";
/// The girlfriend portal's screen flickers while its ping alarm sounds.
const PING_FLICKER: Duration = Duration::from_millis(2000);

/// Result of a user action. Failures are already reflected in status text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Nothing to do (blank input, cooldown running).
    Skipped,
    Sent,
    Failed,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    portal: Portal,
    bus: EventBus,

    mood: CurrentValue<MoodLog>,
    accent: CurrentValue<MoodLog>,
    quote: CurrentValue<Quote>,
    secure: CurrentValue<SecureMessage>,
    memories: RecentMemories,

    alarm: Mutex<Alarm>,
    flicker: Mutex<Pulse>,
    cooldown: Mutex<Pulse>,
    reveal: Mutex<DecryptReveal>,
    companion: Mutex<Companion>,
    dock: Mutex<TokenDock>,

    quote_status: Mutex<StatusLine>,
    memory_status: Mutex<StatusLine>,
    comm_status: Mutex<StatusLine>,
}

impl Shared {
    async fn set_mood(&self, mood: MoodId) -> ActionOutcome {
        match self.bus.publish(NewRow::MoodLogs { mood_id: mood }).await {
            Ok(row) => {
                self.mood.apply_row(row.clone());
                self.accent.apply_row(row);
                ActionOutcome::Sent
            }
            Err(e) => {
                warn!("Mood change to {} failed: {}", mood, e);
                lock(&self.comm_status).error(TRANSMISSION_FAILED);
                ActionOutcome::Failed
            }
        }
    }

    fn on_interaction(&self, delivery: Delivery) {
        let Delivery::Insert(Row::Interactions(signal)) = delivery else {
            return;
        };
        let now = Instant::now();
        if lock(&self.alarm).on_signal(signal.interaction_type, now) {
            info!("Attention requested by {} portal", self.portal.peer());
            if self.portal == Portal::Girlfriend {
                lock(&self.flicker).hold(now, PING_FLICKER);
            }
        }
    }

    fn on_secure_message(&self, delivery: Delivery) {
        let arrived = matches!(delivery, Delivery::Insert(_));
        if self.secure.apply_delivery(delivery) && arrived {
            lock(&self.flicker).trigger(Instant::now());
        }
    }
}

/// One portal's live dashboard state.
///
/// Starting a session subscribes to every shared table. Dropping it cancels
/// the subscriptions and abandons a held dock token; actions still in flight
/// finish against stores nobody observes.
pub struct PortalSession {
    shared: Arc<Shared>,
    subscriptions: Vec<Subscription>,
    closed: CancellationToken,
    boot: BootSequence,
    start_date: NaiveDate,
}

impl PortalSession {
    /// Must be called inside a tokio runtime.
    pub fn start(portal: Portal, user_name: &str, bus: EventBus) -> Self {
        let config = bus.config().clone();
        let shared = Arc::new(Shared {
            portal,
            bus: bus.clone(),
            mood: CurrentValue::new(),
            accent: CurrentValue::new(),
            quote: CurrentValue::new(),
            secure: CurrentValue::new(),
            memories: RecentMemories::new(config.memory_limit),
            alarm: Mutex::new(Alarm::for_portal(portal)),
            flicker: Mutex::new(Pulse::flicker()),
            cooldown: Mutex::new(Pulse::cooldown()),
            reveal: Mutex::new(DecryptReveal::default()),
            companion: Mutex::new(Companion::new(user_name, false)),
            dock: Mutex::new(TokenDock::default()),
            quote_status: Mutex::new(StatusLine::default()),
            memory_status: Mutex::new(StatusLine::default()),
            comm_status: Mutex::new(StatusLine::default()),
        });

        let mut subscriptions = Vec::new();

        let s = shared.clone();
        subscriptions.push(bus.subscribe(Table::MoodLogs, Some(1), move |d| {
            s.mood.apply_delivery(d);
        }));

        // Second, independent consumer of the same table drives the accent color
        let s = shared.clone();
        subscriptions.push(bus.subscribe(Table::MoodLogs, Some(1), move |d| {
            s.accent.apply_delivery(d);
        }));

        let s = shared.clone();
        subscriptions.push(bus.subscribe(Table::DailyQuotes, Some(1), move |d| {
            s.quote.apply_delivery(d);
        }));

        let s = shared.clone();
        subscriptions.push(bus.subscribe(
            Table::Memories,
            Some(config.memory_limit),
            move |d| {
                s.memories.apply_delivery(d);
            },
        ));

        let s = shared.clone();
        subscriptions.push(bus.subscribe(Table::SecureMessages, Some(1), move |d| {
            s.on_secure_message(d)
        }));

        // Signals are never replayed, so no snapshot
        let s = shared.clone();
        subscriptions.push(bus.subscribe(Table::Interactions, None, move |d| {
            s.on_interaction(d)
        }));

        info!("{} portal session started", portal);

        Self {
            shared,
            subscriptions,
            closed: CancellationToken::new(),
            boot: BootSequence::with_default_lines(Instant::now()),
            start_date: config.start_date,
        }
    }

    pub fn portal(&self) -> Portal {
        self.shared.portal
    }

    // -- Shared state --

    pub fn mood(&self) -> Option<MoodLog> {
        self.shared.mood.get()
    }

    pub fn watch_mood(&self) -> watch::Receiver<Option<MoodLog>> {
        self.shared.mood.watch()
    }

    /// Accent color of the latest mood.
    pub fn accent(&self) -> &'static str {
        self.shared
            .accent
            .get()
            .map(|m| m.mood_id)
            .unwrap_or_default()
            .accent()
    }

    pub fn quote(&self) -> Option<Quote> {
        self.shared.quote.get()
    }

    pub fn secure_message(&self) -> Option<SecureMessage> {
        self.shared.secure.get()
    }

    pub fn memories(&self) -> Vec<Memory> {
        self.shared.memories.get()
    }

    pub fn watch_memories(&self) -> watch::Receiver<Vec<Memory>> {
        self.shared.memories.watch()
    }

    pub fn link_states(&self) -> Vec<(Table, LinkState)> {
        self.subscriptions
            .iter()
            .map(|s| (s.table(), s.link_state()))
            .collect()
    }

    /// True once every subscription has its feed up.
    pub fn is_live(&self) -> bool {
        self.subscriptions
            .iter()
            .all(|s| s.link_state() == LinkState::Live)
    }

    // -- Effects --

    pub fn alarm_active(&self) -> bool {
        lock(&self.shared.alarm).is_alarming(Instant::now())
    }

    /// Screen flicker after a secure message arrives, or while the
    /// girlfriend portal's ping alarm sounds.
    pub fn flickering(&self) -> bool {
        lock(&self.shared.flicker).is_active(Instant::now())
    }

    pub fn boot_phase(&self) -> BootPhase {
        self.boot.phase(Instant::now())
    }

    pub fn days_together(&self) -> i64 {
        clock::days_since(self.start_date, Utc::now())
    }

    pub fn celestial(&self) -> CelestialPhase {
        CelestialPhase::at(Utc::now())
    }

    // -- Status lines --

    pub fn quote_status(&self) -> String {
        lock(&self.shared.quote_status).text(Instant::now()).to_string()
    }

    pub fn memory_status(&self) -> String {
        lock(&self.shared.memory_status).text(Instant::now()).to_string()
    }

    /// Status for mood changes, pings and secure messages.
    pub fn comm_status(&self) -> String {
        lock(&self.shared.comm_status).text(Instant::now()).to_string()
    }

    // -- Actions --

    pub async fn set_mood(&self, mood: MoodId) -> ActionOutcome {
        self.shared.set_mood(mood).await
    }

    pub async fn override_quote(&self, text: &str, author: &str) -> ActionOutcome {
        if text.trim().is_empty() {
            return ActionOutcome::Skipped;
        }
        lock(&self.shared.quote_status).progress(QUOTE_UPLOADING);

        let row = NewRow::DailyQuotes {
            quote_text: text.to_string(),
            author: author.to_string(),
        };
        match self.shared.bus.publish(row).await {
            Ok(row) => {
                self.shared.quote.apply_row(row);
                lock(&self.shared.quote_status).success(QUOTE_DONE, Instant::now());
                ActionOutcome::Sent
            }
            Err(e) => {
                warn!("Quote override failed: {}", e);
                lock(&self.shared.quote_status).error(TRANSMISSION_FAILED);
                ActionOutcome::Failed
            }
        }
    }

    pub async fn send_secret(&self, message: &str) -> ActionOutcome {
        if message.trim().is_empty() {
            return ActionOutcome::Skipped;
        }

        let row = NewRow::SecureMessages {
            message: message.to_string(),
        };
        match self.shared.bus.publish(row).await {
            Ok(row) => {
                self.shared.secure.apply_row(row);
                ActionOutcome::Sent
            }
            Err(e) => {
                warn!("Secure message failed: {}", e);
                lock(&self.shared.comm_status).error(TRANSMISSION_FAILED);
                ActionOutcome::Failed
            }
        }
    }

    /// Ping the other portal. Skipped while the button cools down.
    pub async fn ping(&self) -> ActionOutcome {
        if !lock(&self.shared.cooldown).try_trigger(Instant::now()) {
            return ActionOutcome::Skipped;
        }

        let portal = self.shared.portal;
        let row = NewRow::Interactions {
            interaction_type: portal.outgoing_ping(),
            sender: portal.sender_label().to_string(),
        };
        match self.shared.bus.publish(row).await {
            Ok(_) => ActionOutcome::Sent,
            Err(e) => {
                warn!("Ping failed: {}", e);
                lock(&self.shared.comm_status).error(TRANSMISSION_FAILED);
                ActionOutcome::Failed
            }
        }
    }

    /// Upload an image and record it as a memory.
    pub async fn upload_memory(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
        memory_date: NaiveDate,
    ) -> ActionOutcome {
        if bytes.is_empty() || caption.trim().is_empty() {
            return ActionOutcome::Skipped;
        }

        let name = blob_name(file_name, Utc::now());
        lock(&self.shared.memory_status).progress(MEMORY_UPLOADING);

        let result = async {
            let image_url = self.shared.bus.backend().upload(&name, bytes).await?;
            lock(&self.shared.memory_status).progress(MEMORY_SYNCING);
            self.shared
                .bus
                .publish(NewRow::Memories {
                    image_url,
                    caption: caption.to_string(),
                    memory_date,
                })
                .await
        }
        .await;

        match result {
            Ok(row) => {
                self.shared.memories.apply_delivery(Delivery::Insert(row));
                lock(&self.shared.memory_status).success(MEMORY_DONE, Instant::now());
                ActionOutcome::Sent
            }
            Err(e) => {
                warn!("Memory sync failed: {}", e);
                lock(&self.shared.memory_status).error(SYNC_FAILED);
                ActionOutcome::Failed
            }
        }
    }

    // -- Cipher box --

    pub fn press_reveal(&self) {
        let message = self.shared.secure.get().map(|m| m.message);
        lock(&self.shared.reveal).press(message.as_deref());
    }

    pub fn release_reveal(&self) {
        lock(&self.shared.reveal).release();
    }

    pub fn cipher_view(&self) -> String {
        let message = self.shared.secure.get().map(|m| m.message);
        lock(&self.shared.reveal).view(message.as_deref())
    }

    // -- Companion --

    pub async fn chat(&self, input: &str) -> ActionOutcome {
        let Some(req) = lock(&self.shared.companion).begin_turn(input) else {
            return ActionOutcome::Skipped;
        };

        match self.shared.bus.backend().companion(&req).await {
            Ok(reply) => {
                lock(&self.shared.companion).apply_reply(input, reply, Instant::now());
                ActionOutcome::Sent
            }
            Err(e) => {
                warn!("Companion call failed: {}", e);
                lock(&self.shared.companion).apply_failure();
                ActionOutcome::Failed
            }
        }
    }

    pub fn companion_message(&self) -> String {
        lock(&self.shared.companion).message().to_string()
    }

    pub fn companion_compact(&self) -> bool {
        lock(&self.shared.companion).is_compact()
    }

    pub fn set_companion_compact(&self, compact: bool) {
        lock(&self.shared.companion).set_parent_compact(compact);
    }

    pub fn companion_gesture(&self) -> Gesture {
        lock(&self.shared.companion).gesture(Instant::now())
    }

    pub fn companion_annoyed(&self) -> bool {
        lock(&self.shared.companion).is_annoyed(Instant::now())
    }

    /// The companion's body was dragged and released at this offset.
    pub fn poke_companion(&self, dx: f32, dy: f32) -> bool {
        lock(&self.shared.companion).on_drag_end(dx, dy, Instant::now())
    }

    // -- Token dock --

    pub fn dock_state(&self) -> DockState {
        lock(&self.shared.dock).state()
    }

    pub fn drag_token(&self, distance: f32) {
        let compact = self.companion_compact();
        lock(&self.shared.dock).on_drag(distance, compact);
    }

    /// Drop a mood token at `distance` px from the dock. An accepted token is
    /// published as the new mood once the dock's hold elapses.
    pub fn drop_token(&self, token: MoodId, distance: f32) -> bool {
        let compact = self.companion_compact();
        let until = {
            let mut dock = lock(&self.shared.dock);
            if !dock.on_drop(token, distance, compact, Instant::now()) {
                return false;
            }
            match dock.state() {
                DockState::Accepted { until, .. } => until,
                _ => return false,
            }
        };

        let shared = self.shared.clone();
        let closed = self.closed.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = closed.cancelled() => {
                    debug!("Session closed while holding token {}", token);
                    return;
                }
                _ = tokio::time::sleep_until(until) => {}
            }
            let unlocked = lock(&shared.dock).tick(Instant::now());
            if let Some(mood) = unlocked {
                debug!("Token {} unlocked", mood);
                shared.set_mood(mood).await;
            }
        });
        true
    }
}

impl Drop for PortalSession {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// Storage name for an uploaded image: upload time in millis plus the
/// original extension.
fn blob_name(file_name: &str, now: DateTime<Utc>) -> String {
    let ext: String = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    let ext = if ext.is_empty() { "bin".to_string() } else { ext };
    format!("{}.{}", now.timestamp_millis(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_names_keep_a_clean_extension() {
        let now: DateTime<Utc> = "2024-05-01T10:00:00Z".parse().unwrap();
        assert_eq!(blob_name("beach.JPG", now), "1714557600000.jpg");
        assert_eq!(blob_name("no-extension", now), "1714557600000.bin");
        assert_eq!(blob_name("evil.p/n..g", now), "1714557600000.g");
    }
}
