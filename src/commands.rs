//! Control commands
//! This module defines the commands the presentation layer can issue and the
//! handle it uses to issue them and to read the observable model.

use std::str::FromStr;

use anyhow::{Result, anyhow};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::state::ObservableModel;

/// A user action forwarded to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Scan,
    Disconnect,
    /// Toggle the lock
    Write,
    SetDemoMode(bool),
    /// Tear the session down and stop the event loop
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command: {0}")]
pub struct ParseCommandError(String);

impl FromStr for ControlCommand {
    type Err = ParseCommandError;

    /// Parses the terminal front end's command words
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = s.split_whitespace().collect();
        match words.as_slice() {
            ["scan"] | ["connect"] => Ok(Self::Scan),
            ["disconnect"] => Ok(Self::Disconnect),
            ["write"] | ["switch"] | ["toggle"] => Ok(Self::Write),
            ["demo", "on"] => Ok(Self::SetDemoMode(true)),
            ["demo", "off"] => Ok(Self::SetDemoMode(false)),
            ["quit"] | ["exit"] => Ok(Self::Shutdown),
            _ => Err(ParseCommandError(s.trim().to_string())),
        }
    }
}

/// Clonable handle held by the presentation layer
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<ControlCommand>,
    model: watch::Receiver<ObservableModel>,
}

impl ControlHandle {
    pub fn new(
        tx: mpsc::UnboundedSender<ControlCommand>,
        model: watch::Receiver<ObservableModel>,
    ) -> Self {
        Self { tx, model }
    }

    /// Starts a scan for the lock. Ignored unless the radio is on and no session is active.
    pub fn scan(&self) -> Result<()> {
        self.send(ControlCommand::Scan)
    }

    /// Disconnects from the lock
    pub fn disconnect(&self) -> Result<()> {
        self.send(ControlCommand::Disconnect)
    }

    /// Toggles the lock state
    pub fn write(&self) -> Result<()> {
        self.send(ControlCommand::Write)
    }

    pub fn set_demo_mode(&self, demo: bool) -> Result<()> {
        self.send(ControlCommand::SetDemoMode(demo))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(ControlCommand::Shutdown)
    }

    pub fn send(&self, command: ControlCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| anyhow!("Controller event loop has stopped"))
    }

    /// The latest published model
    pub fn model(&self) -> ObservableModel {
        self.model.borrow().clone()
    }

    /// A receiver that wakes whenever the model changes
    pub fn subscribe(&self) -> watch::Receiver<ObservableModel> {
        self.model.clone()
    }

    /// Whether scan should be offered to the user
    pub fn can_scan(&self) -> bool {
        !self.model.borrow().is_connected
    }

    /// Whether disconnect and write should be offered to the user
    pub fn can_operate(&self) -> bool {
        self.model.borrow().is_connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_words() {
        assert_eq!("scan".parse(), Ok(ControlCommand::Scan));
        assert_eq!(" write ".parse(), Ok(ControlCommand::Write));
        assert_eq!("disconnect".parse(), Ok(ControlCommand::Disconnect));
        assert_eq!("demo on".parse(), Ok(ControlCommand::SetDemoMode(true)));
        assert_eq!("demo  off".parse(), Ok(ControlCommand::SetDemoMode(false)));
        assert_eq!("quit".parse(), Ok(ControlCommand::Shutdown));
    }

    #[test]
    fn rejects_unknown_words() {
        let err = "unlock now".parse::<ControlCommand>().unwrap_err();
        assert_eq!(err.to_string(), "unknown command: unlock now");
    }

    #[test]
    fn send_fails_once_loop_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (_model_tx, model_rx) = watch::channel(ObservableModel::default());
        let handle = ControlHandle::new(tx, model_rx);
        drop(rx);
        assert!(handle.scan().is_err());
    }

    #[test]
    fn availability_follows_connection_flag() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (model_tx, model_rx) = watch::channel(ObservableModel::default());
        let handle = ControlHandle::new(tx, model_rx);
        assert!(handle.can_scan());
        model_tx.send_modify(|m| m.is_connected = true);
        assert!(handle.can_operate());
        assert!(!handle.can_scan());
    }
}
