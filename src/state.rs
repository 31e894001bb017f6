//! Application state management
//! This module defines the observable model the presentation layer renders and
//! the publish-on-change handle used to mutate it.

use serde::Serialize;
use tokio::sync::watch;

/// Everything the presentation layer can see
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservableModel {
    pub is_connected: bool,
    pub is_locked: bool,
    /// Session log, one entry per line
    pub log: Vec<String>,
    /// Cosmetic flag owned by the presentation layer
    pub is_demo_mode: bool,
}

impl ObservableModel {
    /// Renders the log the way the view shows it: every line newline-terminated
    pub fn log_text(&self) -> String {
        self.log.iter().fold(String::new(), |mut text, line| {
            text.push_str(line);
            text.push('\n');
            text
        })
    }
}

/// Writer side of the model. Only the controller holds one.
#[derive(Debug)]
pub struct ModelHandle {
    tx: watch::Sender<ObservableModel>,
}

impl ModelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ObservableModel::default());
        Self { tx }
    }

    /// Returns a receiver that wakes on every published change
    pub fn subscribe(&self) -> watch::Receiver<ObservableModel> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ObservableModel {
        self.tx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.tx.borrow().is_connected
    }

    pub fn is_locked(&self) -> bool {
        self.tx.borrow().is_locked
    }

    pub fn set_connected(&self, connected: bool) {
        self.tx.send_if_modified(|model| {
            let changed = model.is_connected != connected;
            model.is_connected = connected;
            changed
        });
    }

    pub fn set_locked(&self, locked: bool) {
        self.tx.send_if_modified(|model| {
            let changed = model.is_locked != locked;
            model.is_locked = locked;
            changed
        });
    }

    pub fn set_demo_mode(&self, demo: bool) {
        self.tx.send_if_modified(|model| {
            let changed = model.is_demo_mode != demo;
            model.is_demo_mode = demo;
            changed
        });
    }

    /// Appends one line to the log
    pub fn append_line(&self, line: impl Into<String>) {
        let line = line.into();
        self.tx.send_modify(|model| model.log.push(line));
    }

    /// Replaces the whole log with a single line
    pub fn replace_log(&self, line: impl Into<String>) {
        let line = line.into();
        self.tx.send_modify(|model| {
            model.log.clear();
            model.log.push(line);
        });
    }
}

impl Default for ModelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_text_terminates_every_line() {
        let model = ModelHandle::new();
        model.append_line("poweredOn");
        model.append_line("start scan");
        assert_eq!(model.snapshot().log_text(), "poweredOn\nstart scan\n");
    }

    #[test]
    fn replace_drops_previous_lines() {
        let model = ModelHandle::new();
        model.append_line("a");
        model.append_line("b");
        model.replace_log("ON");
        assert_eq!(model.snapshot().log, vec!["ON".to_string()]);
    }

    #[test]
    fn unchanged_flag_is_not_published() {
        let model = ModelHandle::new();
        let mut rx = model.subscribe();
        rx.borrow_and_update();
        model.set_connected(false);
        assert!(!rx.has_changed().unwrap());
        model.set_connected(true);
        assert!(rx.has_changed().unwrap());
    }
}
