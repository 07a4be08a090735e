//! UI notifier: fire-and-forget callbacks from the core to the front end.

use serde::Serialize;

use crate::song::Pattern;

pub trait Notifier {
    /// Highlight the playing step, or clear the marker with `None`.
    fn step_marker(&mut self, _step: Option<usize>) {}

    /// The saved pattern list or the current pattern changed.
    fn patterns_changed(&mut self, _patterns: &[Pattern], _current: usize) {}

    /// A message for the user, e.g. why an action was refused.
    fn notice(&mut self, _message: &str) {}
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {}

/// Queues notifications until the host (or a test) collects them.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RecordingNotifier {
    pub markers: Vec<Option<usize>>,
    pub pattern_lists: Vec<(Vec<String>, usize)>,
    pub notices: Vec<String>,
}

impl RecordingNotifier {
    /// Take everything queued so far.
    pub fn take(&mut self) -> RecordingNotifier {
        std::mem::take(self)
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.pattern_lists.is_empty() && self.notices.is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn step_marker(&mut self, step: Option<usize>) {
        self.markers.push(step);
    }

    fn patterns_changed(&mut self, patterns: &[Pattern], current: usize) {
        let names = patterns.iter().map(|p| p.name.clone()).collect();
        self.pattern_lists.push((names, current));
    }

    fn notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_drains_the_queue() {
        let mut n = RecordingNotifier::default();
        n.step_marker(Some(3));
        n.notice("hello");
        let taken = n.take();
        assert_eq!(taken.markers, vec![Some(3)]);
        assert_eq!(taken.notices, vec!["hello".to_string()]);
        assert!(n.is_empty());
    }
}
