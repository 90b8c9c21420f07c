//! Display helpers for the cipher box and the memory gallery.

pub const AWAITING_TRANSMISSION: &str = "AWAITING_TRANSMISSION...";

/// Cosmetic icons for memory orbs.
pub const ORBS: [&str; 6] = ["✦", "⟡", "⍙", "≈", "☾", "✧"];

fn glyph(c: char) -> Option<&'static str> {
    Some(match c {
        'a' => "❤️",
        'b' => "💖",
        'c' => "💗",
        'd' => "💓",
        'e' => "💞",
        'f' => "💕",
        'g' => "💌",
        'h' => "💘",
        'i' => "💝",
        'j' => "💟",
        'k' => "❤️‍🔥",
        'l' => "🏩",
        'm' => "💒",
        'n' => "👰",
        'o' => "💍",
        'p' => "💎",
        'q' => "🌹",
        'r' => "🌷",
        's' => "🌻",
        't' => "🌼",
        'u' => "🎈",
        'v' => "🎁",
        'w' => "🎀",
        'x' => "🧸",
        'y' => "✨",
        'z' => "🌟",
        ' ' => "  ",
        _ => return None,
    })
}

/// Sealed view of a secure message: letters become glyphs, everything else
/// passes through unchanged.
pub fn cipher(message: &str) -> String {
    if message.is_empty() {
        return AWAITING_TRANSMISSION.to_string();
    }
    let mut out = String::with_capacity(message.len() * 4);
    for c in message.chars().flat_map(char::to_lowercase) {
        match glyph(c) {
            Some(g) => out.push_str(g),
            None => out.push(c),
        }
    }
    out
}

/// Orb icon for a memory, picked from the last character of its id.
pub fn orb_for(id: &str) -> &'static str {
    let code = id.chars().last().map_or(0, |c| c as usize);
    ORBS[code % ORBS.len()]
}
