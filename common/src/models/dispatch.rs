use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;
use crate::models::device::DeviceRef;

/// A command a player understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", content = "text", rename_all = "kebab-case")]
pub enum PlayerCommand {
    Pause,
    Mute,
    Unmute,
    Reboot,
    /// Replaces whatever is on screen with the text. Messages do not queue.
    ShowMessage(String),
}

impl FromStr for PlayerCommand {
    type Err = ConfigError;

    /// Accepts `pause`, `mute`, `unmute`, `reboot` and `show-message:<text>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let (name, argument) = match input.split_once(':') {
            Some((name, text)) => (name, Some(text)),
            None => (input, None),
        };

        match (name.to_ascii_lowercase().as_str(), argument) {
            ("pause", None) => Ok(Self::Pause),
            ("mute", None) => Ok(Self::Mute),
            ("unmute", None) => Ok(Self::Unmute),
            ("reboot", None) => Ok(Self::Reboot),
            ("show-message", Some(text)) if !text.trim().is_empty() => {
                Ok(Self::ShowMessage(text.to_string()))
            }
            ("show-message", _) => Err(ConfigError::EmptyMessage),
            _ => Err(ConfigError::UnknownCommand(input.to_string())),
        }
    }
}

impl fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause => f.write_str("pause"),
            Self::Mute => f.write_str("mute"),
            Self::Unmute => f.write_str("unmute"),
            Self::Reboot => f.write_str("reboot"),
            Self::ShowMessage(text) => write!(f, "show-message:{text}"),
        }
    }
}

/// Whether a dispatch waits for the remote command to finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    #[default]
    Wait,
    /// The command is started in the background on the device; success means it was sent.
    Detached,
}

/// Outcome of one command on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub device: DeviceRef,
    pub command: String,
    pub success: bool,
    /// Error detail on failure, a short note on some successes.
    pub detail: Option<String>,
    pub output: Option<String>,
}

impl DispatchResult {
    pub fn succeeded(device: DeviceRef, command: &PlayerCommand, detail: Option<String>) -> Self {
        Self {
            device,
            command: command.to_string(),
            success: true,
            detail,
            output: None,
        }
    }

    pub fn failed(device: DeviceRef, command: &PlayerCommand, detail: impl Into<String>) -> Self {
        Self {
            device,
            command: command.to_string(),
            success: false,
            detail: Some(detail.into()),
            output: None,
        }
    }

    pub fn with_output(mut self, output: &str) -> Self {
        let trimmed = output.trim();
        if !trimmed.is_empty() {
            self.output = Some(trimmed.to_string());
        }
        self
    }
}
