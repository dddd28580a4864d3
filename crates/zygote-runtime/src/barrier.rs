//! Readiness barrier built on the middle process's exit.
//!
//! The middle process of a fork request exits only after the nested
//! layer's control socket is bound. Waiting for that exit is therefore
//! enough to know the socket exists, with no polling and no extra
//! descriptor.

use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;
use zygote_common::error::{Result, ZygoteError};
use zygote_common::types::SyncToken;

/// How the middle process of a request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Exited 0: the nested control socket is bound.
    Ready(SyncToken),
    /// Exited non-zero or was killed: the nested layer was never built.
    Failed {
        /// Token naming the reaped middle process.
        token: SyncToken,
        /// Human-readable exit status.
        status: String,
    },
}

impl Readiness {
    /// The token to answer the requester with, whatever the outcome.
    pub const fn token(&self) -> SyncToken {
        match self {
            Self::Ready(token) | Self::Failed { token, .. } => *token,
        }
    }

    /// Whether the nested layer came up.
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Pending readiness of one nested layer.
#[derive(Debug)]
#[must_use = "an unawaited barrier leaves a zombie behind"]
pub struct ReadinessBarrier {
    middle: Pid,
}

impl ReadinessBarrier {
    /// Creates a barrier on the given middle process.
    pub const fn new(middle: Pid) -> Self {
        Self { middle }
    }

    /// PID of the process being waited on.
    pub const fn middle(&self) -> Pid {
        self.middle
    }

    /// Blocks until the middle process terminates and reaps it.
    ///
    /// The token carried by the result only marks the end of the wait;
    /// the process it names no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::Process`] if `waitpid(2)` fails.
    pub fn await_ready(self) -> Result<Readiness> {
        let token = self.token();
        loop {
            match waitpid(self.middle, None) {
                Ok(WaitStatus::Exited(_, 0)) => return Ok(Readiness::Ready(token)),
                Ok(WaitStatus::Exited(_, code)) => {
                    return Ok(Readiness::Failed {
                        token,
                        status: format!("exited with status {code}"),
                    });
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    return Ok(Readiness::Failed {
                        token,
                        status: format!("killed by {signal:?}"),
                    });
                }
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => return Err(ZygoteError::process("waitpid", e)),
            }
        }
    }

    #[allow(clippy::cast_sign_loss)]
    const fn token(&self) -> SyncToken {
        SyncToken::new(self.middle.as_raw() as u32)
    }
}
