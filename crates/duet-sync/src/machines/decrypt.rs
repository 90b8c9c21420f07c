use crate::glyphs;

/// Press-and-hold reveal of the secure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecryptReveal {
    #[default]
    Sealed,
    Revealed,
}

impl DecryptReveal {
    /// Pressing reveals only when there is a message to reveal.
    pub fn press(&mut self, message: Option<&str>) {
        if message.is_some_and(|m| !m.is_empty()) {
            *self = DecryptReveal::Revealed;
        }
    }

    pub fn release(&mut self) {
        *self = DecryptReveal::Sealed;
    }

    /// What the cipher box shows for `message` in the current state.
    pub fn view(&self, message: Option<&str>) -> String {
        match (self, message) {
            (_, None) => glyphs::AWAITING_TRANSMISSION.to_string(),
            (_, Some("")) => glyphs::AWAITING_TRANSMISSION.to_string(),
            (DecryptReveal::Revealed, Some(m)) => m.to_string(),
            (DecryptReveal::Sealed, Some(m)) => glyphs::cipher(m),
        }
    }
}
