//! Unified error types for the Zygote workspace.
//!
//! Every fallible operation in the isolation primitives and the layer
//! runtime returns [`ZygoteError`]. The binary wraps it in `anyhow` at the
//! top level only.

use std::os::fd::RawFd;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ZygoteError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration or invocation value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// `unshare(2)` refused to detach the requested namespaces.
    #[error("namespace unshare failed: {source}")]
    Namespace {
        /// OS error reported by the kernel.
        source: std::io::Error,
    },

    /// The syscall filter could not be built or loaded.
    #[error("seccomp filter error: {message}")]
    Seccomp {
        /// Description of the failure.
        message: String,
    },

    /// A policy names a syscall that does not exist on this architecture.
    #[error("unknown syscall in policy: {name}")]
    UnknownSyscall {
        /// The unresolvable syscall name.
        name: String,
    },

    /// Writing the PID into a cgroup membership descriptor failed.
    #[error("cgroup admission through fd {fd} failed: {source}")]
    Cgroup {
        /// Descriptor number of the `cgroup.procs` handle.
        fd: RawFd,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Switching the filesystem root through a directory descriptor failed.
    #[error("chroot failed: {source}")]
    Chroot {
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// `fork(2)` or `waitpid(2)` failed.
    #[error("process {op} failed: {source}")]
    Process {
        /// The process operation that failed.
        op: &'static str,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// A peer violated the control-socket wire protocol.
    #[error("protocol violation: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// The bootstrap resource could not be loaded or its runner failed.
    #[error("bootstrap failed: {message}")]
    Bootstrap {
        /// Description of the failure.
        message: String,
        /// Text of the bootstrap resource that was being executed.
        source_text: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl ZygoteError {
    /// Builds a [`ZygoteError::Process`] from the failed operation and OS error.
    pub fn process(op: &'static str, source: impl Into<std::io::Error>) -> Self {
        Self::Process {
            op,
            source: source.into(),
        }
    }

    /// Builds a [`ZygoteError::Protocol`] from a message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ZygoteError>;
