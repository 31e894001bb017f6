//! Lock commands implementation
//! This module contains the commands that can be written to the lock peripheral

use crate::core::bluetooth::constants::{PAYLOAD_OFF, PAYLOAD_ON};

/// Lock commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCommand {
    /// Lock engaged ("ON")
    On,
    /// Lock released ("OFF")
    Off,
}

impl LockCommand {
    /// The command that puts the peripheral into the given lock state
    pub fn from_locked(locked: bool) -> Self {
        if locked { Self::On } else { Self::Off }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::On => PAYLOAD_ON,
            Self::Off => PAYLOAD_OFF,
        }
    }

    /// Convert the command to its byte representation: the bare ASCII token, no framing
    pub fn to_bytes(&self) -> Vec<u8> {
        self.token().as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_encodes_as_on() {
        assert_eq!(LockCommand::from_locked(true).to_bytes(), b"ON".to_vec());
    }

    #[test]
    fn unlocked_encodes_as_off() {
        assert_eq!(LockCommand::from_locked(false).to_bytes(), b"OFF".to_vec());
    }
}
