//! Diagnostic session and reset selection for services 0x10 and 0x11.

use std::time::Duration;

///Diagnostic sessions selectable through DiagnosticSessionControl.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DiagnosticSession {
    Default,
    Programming,
    Extended,
    SafetySystem,
}

impl DiagnosticSession {
    /// Map a session-control sub-function byte. `None` for sub-functions
    /// this ECU does not support.
    pub fn from_subfunction(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(DiagnosticSession::Default),
            0x02 => Some(DiagnosticSession::Programming),
            0x03 => Some(DiagnosticSession::Extended),
            0x04 => Some(DiagnosticSession::SafetySystem),
            _ => None,
        }
    }

    /// Inactivity window after which the session falls back to
    /// [`DiagnosticSession::Default`].
    pub fn timeout(&self) -> Duration {
        match self {
            DiagnosticSession::Default => Duration::from_secs(5),
            DiagnosticSession::Programming => Duration::from_secs(10),
            DiagnosticSession::Extended => Duration::from_secs(7),
            DiagnosticSession::SafetySystem => Duration::from_secs(15),
        }
    }
}

///Reset kinds selectable through ECUReset.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResetType {
    HardReset,
    KeyOffOnReset,
    SoftReset,
    EnableRapidPowerShutdown,
    DisableRapidPowerShutdown,
}

impl ResetType {
    /// Map an ECU-reset sub-function byte.
    pub fn from_subfunction(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(ResetType::HardReset),
            0x02 => Some(ResetType::KeyOffOnReset),
            0x03 => Some(ResetType::SoftReset),
            0x04 => Some(ResetType::EnableRapidPowerShutdown),
            0x05 => Some(ResetType::DisableRapidPowerShutdown),
            _ => None,
        }
    }
}
