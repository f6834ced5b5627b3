//! Modal notices.
//!
//! Winner announcements and game-over messages are modal: only one is on
//! screen at a time and the rest wait their turn in arrival order.

use std::collections::VecDeque;

/// A modal notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Someone won a round.
    Winner {
        /// Winning identity.
        player: String,
        /// Whether the local participant won.
        is_self: bool,
    },
    /// The game is over.
    GameOver {
        /// Human-readable cause.
        reason: String,
    },
}

impl Notice {
    /// Text to display.
    pub fn text(&self) -> String {
        match self {
            Self::Winner { is_self: true, .. } => "You win!".to_string(),
            Self::Winner { player, .. } => format!("{player} wins!"),
            Self::GameOver { reason } => format!("Game over: {reason}"),
        }
    }
}

/// FIFO of pending notices. The head is the one on screen.
#[derive(Debug, Clone, Default)]
pub struct NoticeQueue {
    pending: VecDeque<Notice>,
}

impl NoticeQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a notice. Returns it if it should be shown right away, i.e.
    /// nothing else was on screen.
    pub fn push(&mut self, notice: Notice) -> Option<&Notice> {
        self.pending.push_back(notice);
        if self.pending.len() == 1 { self.pending.front() } else { None }
    }

    /// Dismiss the notice on screen and return the next one to show.
    pub fn dismiss(&mut self) -> Option<&Notice> {
        self.pending.pop_front();
        self.pending.front()
    }

    /// Notice currently on screen.
    pub fn current(&self) -> Option<&Notice> {
        self.pending.front()
    }

    /// Number of notices on screen or waiting.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is on screen.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn winner(player: &str) -> Notice {
        Notice::Winner { player: player.into(), is_self: false }
    }

    #[test]
    fn first_notice_is_shown_immediately() {
        let mut queue = NoticeQueue::new();
        assert_eq!(queue.push(winner("a")), Some(&winner("a")));
        assert_eq!(queue.push(winner("b")), None);
        assert_eq!(queue.current(), Some(&winner("a")));
    }

    #[test]
    fn dismiss_advances_in_arrival_order() {
        let mut queue = NoticeQueue::new();
        queue.push(winner("a"));
        queue.push(winner("b"));
        queue.push(Notice::GameOver { reason: "bye".into() });

        assert_eq!(queue.dismiss(), Some(&winner("b")));
        assert_eq!(queue.dismiss(), Some(&Notice::GameOver { reason: "bye".into() }));
        assert_eq!(queue.dismiss(), None);
        assert!(queue.is_empty());
        assert_eq!(queue.dismiss(), None);
    }

    #[test]
    fn notice_text() {
        assert_eq!(Notice::Winner { player: "x".into(), is_self: true }.text(), "You win!");
        assert_eq!(winner("bo").text(), "bo wins!");
        assert_eq!(Notice::GameOver { reason: "bo left".into() }.text(), "Game over: bo left");
    }
}
