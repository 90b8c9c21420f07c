use std::time::Duration;

use tokio::time::Instant;

const SUCCESS_CLEAR: Duration = Duration::from_millis(4000);

/// Inline status text next to a form.
///
/// Success messages clear themselves after four seconds; progress and error
/// messages stay until replaced.
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    text: String,
    clear_at: Option<Instant>,
}

impl StatusLine {
    pub fn progress(&mut self, text: &str) {
        self.text = text.to_string();
        self.clear_at = None;
    }

    pub fn success(&mut self, text: &str, now: Instant) {
        self.text = text.to_string();
        self.clear_at = Some(now + SUCCESS_CLEAR);
    }

    pub fn error(&mut self, text: &str) {
        self.progress(text);
    }

    pub fn text(&mut self, now: Instant) -> &str {
        if self.clear_at.is_some_and(|at| now >= at) {
            self.text.clear();
            self.clear_at = None;
        }
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_clears_after_four_seconds() {
        let t0 = Instant::now();
        let mut status = StatusLine::default();
        status.progress("UPLOADING TO MAINFRAME...");
        status.success("OVERRIDE SUCCESSFUL.", t0);
        assert_eq!(status.text(t0 + Duration::from_millis(3999)), "OVERRIDE SUCCESSFUL.");
        assert_eq!(status.text(t0 + Duration::from_millis(4000)), "");
    }

    #[test]
    fn errors_stay() {
        let t0 = Instant::now();
        let mut status = StatusLine::default();
        status.success("OVERRIDE SUCCESSFUL.", t0);
        status.error("ERROR: TRANSMISSION FAILED.");
        assert_eq!(status.text(t0 + Duration::from_secs(60)), "ERROR: TRANSMISSION FAILED.");
    }
}
