//! Host Command Definitions

use serde::{Deserialize, Serialize};

/// Commands the device understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Send one frame of unsent samples
    RequestFrame,
}

impl Command {
    /// Parse an inbound byte; anything unrecognised is `None`
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            crate::REQUEST_FRAME => Some(Command::RequestFrame),
            _ => None,
        }
    }

    /// Wire byte for this command
    pub fn as_byte(&self) -> u8 {
        match self {
            Command::RequestFrame => crate::REQUEST_FRAME,
        }
    }
}
