//! Domain primitive types used across the Zygote workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::RESPONSE_LEN;

/// Acknowledgment returned for a fork request.
///
/// Carries the PID of the short-lived middle process. By the time a
/// token exists that process has already exited and been reaped, so the
/// value is a synchronization marker and never a handle to the sandboxed
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncToken(u32);

impl SyncToken {
    /// Wraps a raw middle-process PID.
    #[must_use]
    pub const fn new(pid: u32) -> Self {
        Self(pid)
    }

    /// Returns the raw PID value carried by the token.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Encodes the token in its wire form (little-endian `u32`).
    #[must_use]
    pub const fn to_wire(self) -> [u8; RESPONSE_LEN] {
        self.0.to_le_bytes()
    }

    /// Decodes a token from its wire form.
    #[must_use]
    pub const fn from_wire(bytes: [u8; RESPONSE_LEN]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

impl fmt::Display for SyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sync:{}", self.0)
    }
}

/// How strictly a syscall policy treats names it cannot resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Unknown names are logged and skipped; the remaining rules install.
    #[default]
    Lenient,
    /// Any unknown name aborts filter construction.
    Strict,
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lenient => write!(f, "lenient"),
            Self::Strict => write!(f, "strict"),
        }
    }
}
