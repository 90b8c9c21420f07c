use std::time::Duration;

use tokio::time::Instant;

use duet_types::companion::{
    BodyAction, ChatRole, ChatTurn, CompanionReply, CompanionRequest, Gesture, MAX_ANNOYANCE,
};

const GESTURE_HOLD: Duration = Duration::from_millis(4000);
const ANNOYED_HOLD: Duration = Duration::from_millis(7000);
/// Drags shorter than this in both axes are not pokes.
const POKE_THRESHOLD: f32 = 10.0;
/// From this poke on, every poke (re)starts the annoyance window.
const ANNOYING_POKE: u8 = 4;

pub const THINKING_MESSAGE: &str = "Processing... ⚙️";
pub const SEVERED_MESSAGE: &str = "Comm-link severed.";
pub const ANNOYED_MESSAGE: &str =
    "UNAUTHORIZED KINETIC TRAUMA DETECTED. PLEASE REFRAIN FROM SHAKING THE CHASSIS.";

/// The companion widget: chat turns, body overrides, gestures and pokes.
#[derive(Debug, Clone)]
pub struct Companion {
    user_name: String,
    parent_compact: bool,
    override_compact: Option<bool>,
    gesture: Option<(Gesture, Instant)>,
    pokes: u8,
    annoyed_until: Option<Instant>,
    history: Vec<ChatTurn>,
    message: String,
    thinking: bool,
}

impl Companion {
    pub fn new(user_name: impl Into<String>, parent_compact: bool) -> Self {
        Self {
            user_name: user_name.into(),
            parent_compact,
            override_compact: None,
            gesture: None,
            pokes: 0,
            annoyed_until: None,
            history: Vec::new(),
            message: String::new(),
            thinking: false,
        }
    }

    pub fn set_parent_compact(&mut self, compact: bool) {
        self.parent_compact = compact;
    }

    /// The companion's own override wins over the parent's layout.
    pub fn is_compact(&self) -> bool {
        self.override_compact.unwrap_or(self.parent_compact)
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn annoyance_level(&self) -> u8 {
        self.pokes.min(MAX_ANNOYANCE)
    }

    /// Start a chat turn. Returns the request to send, or `None` for blank input.
    pub fn begin_turn(&mut self, input: &str) -> Option<CompanionRequest> {
        if input.trim().is_empty() {
            return None;
        }
        self.thinking = true;
        self.message = THINKING_MESSAGE.to_string();
        Some(CompanionRequest {
            user_message: input.to_string(),
            user_name: self.user_name.clone(),
            history: self.history.clone(),
            annoyance_level: self.annoyance_level(),
        })
    }

    /// Apply a successful reply to the turn started with `user_message`.
    pub fn apply_reply(&mut self, user_message: &str, reply: CompanionReply, now: Instant) {
        self.thinking = false;
        if reply.message.is_empty() {
            return;
        }

        self.history.push(ChatTurn::new(ChatRole::User, user_message));
        self.history.push(ChatTurn::new(ChatRole::Model, reply.message.clone()));
        self.message = reply.message;

        match reply.action {
            BodyAction::Expand => self.override_compact = Some(false),
            BodyAction::Retract => self.override_compact = Some(true),
            BodyAction::None => {}
        }

        self.gesture = match reply.gesture {
            Gesture::None => None,
            gesture => Some((gesture, now + GESTURE_HOLD)),
        };
    }

    /// The call failed; history is left as it was.
    pub fn apply_failure(&mut self) {
        self.thinking = false;
        self.message = SEVERED_MESSAGE.to_string();
    }

    pub fn gesture(&self, now: Instant) -> Gesture {
        match self.gesture {
            Some((gesture, until)) if now < until => gesture,
            _ => Gesture::None,
        }
    }

    /// A drag of the companion's body ended with this offset.
    /// Returns true if the drag was far enough to count as a poke.
    pub fn on_drag_end(&mut self, dx: f32, dy: f32, now: Instant) -> bool {
        self.tick(now);
        if dx.abs() <= POKE_THRESHOLD && dy.abs() <= POKE_THRESHOLD {
            return false;
        }
        self.pokes = self.pokes.saturating_add(1);
        if self.pokes >= ANNOYING_POKE {
            self.annoyed_until = Some(now + ANNOYED_HOLD);
            self.message = ANNOYED_MESSAGE.to_string();
        }
        true
    }

    pub fn is_annoyed(&mut self, now: Instant) -> bool {
        self.tick(now);
        self.annoyed_until.is_some()
    }

    /// Calm down once the annoyance window has passed: pokes reset to zero.
    pub fn tick(&mut self, now: Instant) {
        if self.annoyed_until.is_some_and(|until| now >= until) {
            self.annoyed_until = None;
            self.pokes = 0;
            self.message.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(action: BodyAction, gesture: Gesture) -> CompanionReply {
        CompanionReply {
            message: "beep".into(),
            action,
            gesture,
        }
    }

    #[test]
    fn actions_override_parent_layout() {
        let now = Instant::now();
        let mut bot = Companion::new("Boss", true);
        assert!(bot.is_compact());

        bot.apply_reply("grow", reply(BodyAction::Expand, Gesture::None), now);
        assert!(!bot.is_compact());

        bot.apply_reply("hello", reply(BodyAction::None, Gesture::None), now);
        assert!(!bot.is_compact());

        bot.apply_reply("go away", reply(BodyAction::Retract, Gesture::None), now);
        assert!(bot.is_compact());

        bot.set_parent_compact(false);
        assert!(bot.is_compact());
    }

    #[test]
    fn none_action_leaves_parent_preference() {
        let now = Instant::now();
        let mut bot = Companion::new("Boss", false);
        bot.apply_reply("hi", reply(BodyAction::None, Gesture::Wave), now);
        assert!(!bot.is_compact());
        bot.set_parent_compact(true);
        assert!(bot.is_compact());
    }

    #[test]
    fn gesture_holds_for_four_seconds() {
        let now = Instant::now();
        let mut bot = Companion::new("Boss", false);
        bot.apply_reply("hi", reply(BodyAction::None, Gesture::Wave), now);
        assert_eq!(bot.gesture(now + Duration::from_millis(3999)), Gesture::Wave);
        assert_eq!(bot.gesture(now + Duration::from_millis(4000)), Gesture::None);
    }

    #[test]
    fn history_grows_only_on_success() {
        let now = Instant::now();
        let mut bot = Companion::new("Boss", false);

        assert!(bot.begin_turn("   ").is_none());

        let req = bot.begin_turn("hi").unwrap();
        assert!(req.history.is_empty());
        assert!(bot.is_thinking());
        bot.apply_reply("hi", reply(BodyAction::None, Gesture::None), now);
        assert_eq!(bot.history().len(), 2);
        assert_eq!(bot.history()[1].role, ChatRole::Model);

        let req = bot.begin_turn("again").unwrap();
        assert_eq!(req.history.len(), 2);
        bot.apply_failure();
        assert_eq!(bot.history().len(), 2);
        assert_eq!(bot.message(), SEVERED_MESSAGE);
        assert!(!bot.is_thinking());
    }

    #[test]
    fn pokes_from_the_fourth_annoy_for_seven_seconds() {
        let t0 = Instant::now();
        let mut bot = Companion::new("Boss", false);

        assert!(!bot.on_drag_end(4.0, -9.5, t0));
        for i in 0..3 {
            assert!(bot.on_drag_end(25.0, 0.0, t0));
            assert_eq!(bot.annoyance_level(), i + 1);
        }
        assert!(!bot.is_annoyed(t0));

        bot.on_drag_end(0.0, -40.0, t0);
        assert!(bot.is_annoyed(t0));
        assert_eq!(bot.message(), ANNOYED_MESSAGE);

        // a fifth poke restarts the window from its own time
        let t1 = t0 + Duration::from_secs(1);
        bot.on_drag_end(0.0, 40.0, t1);
        assert_eq!(bot.message(), ANNOYED_MESSAGE);
        assert_eq!(bot.annoyance_level(), MAX_ANNOYANCE);
        assert_eq!(bot.begin_turn("sorry").unwrap().annoyance_level, MAX_ANNOYANCE);

        assert!(bot.is_annoyed(t0 + Duration::from_millis(7000)));
        assert!(!bot.is_annoyed(t1 + Duration::from_millis(7000)));
        assert_eq!(bot.annoyance_level(), 0);
    }
}
