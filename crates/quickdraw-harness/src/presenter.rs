//! Presenter that records everything it is asked to show.

use std::sync::{Arc, Mutex, PoisonError};

use quickdraw_app::{Notice, Placement, Presenter};

/// One presentation call.
#[derive(Debug, Clone, PartialEq)]
pub enum Shown {
    /// Status line replaced.
    Status(String),
    /// Roster shown.
    Roster(Vec<String>),
    /// Target shown.
    Target(Placement),
    /// Target hidden.
    TargetHidden,
    /// Modal notice shown.
    Notice(Notice),
    /// Modal notice removed.
    NoticeCleared,
}

/// Records presentation calls. Clones share the same log, so a test can keep
/// one while the runtime owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    log: Arc<Mutex<Vec<Shown>>>,
}

impl RecordingPresenter {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything shown so far, in order.
    pub fn log(&self) -> Vec<Shown> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Status lines shown so far.
    pub fn statuses(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|shown| match shown {
                Shown::Status(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Notices put on screen so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.log()
            .into_iter()
            .filter_map(|shown| match shown {
                Shown::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    /// Most recent roster.
    pub fn last_roster(&self) -> Option<Vec<String>> {
        self.log().into_iter().rev().find_map(|shown| match shown {
            Shown::Roster(players) => Some(players),
            _ => None,
        })
    }

    /// Whether the target is currently visible.
    pub fn target_visible(&self) -> bool {
        self.log().iter().rev().find_map(|shown| match shown {
            Shown::Target(_) => Some(true),
            Shown::TargetHidden => Some(false),
            _ => None,
        }) == Some(true)
    }

    fn record(&self, shown: Shown) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).push(shown);
    }
}

impl Presenter for RecordingPresenter {
    fn status(&mut self, text: &str) {
        self.record(Shown::Status(text.to_string()));
    }

    fn roster(&mut self, players: &[String]) {
        self.record(Shown::Roster(players.to_vec()));
    }

    fn show_target(&mut self, placement: Placement) {
        self.record(Shown::Target(placement));
    }

    fn hide_target(&mut self) {
        self.record(Shown::TargetHidden);
    }

    fn show_notice(&mut self, notice: &Notice) {
        self.record(Shown::Notice(notice.clone()));
    }

    fn clear_notice(&mut self) {
        self.record(Shown::NoticeCleared);
    }
}
