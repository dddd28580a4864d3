//! Linux namespace management for sandbox layers.
//!
//! Every layer detaches its UTS, PID, and IPC namespaces in a single
//! `unshare(2)` call before it forks, so the forked child is the first
//! process of the fresh PID namespace.

pub mod pid;

use std::fmt;

use nix::sched::{CloneFlags, unshare};
use zygote_common::error::{Result, ZygoteError};

/// A namespace kind a sandbox layer can detach from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Hostname and NIS domain name.
    Uts,
    /// Process ID number space.
    Pid,
    /// System V IPC objects and POSIX message queues.
    Ipc,
}

impl Namespace {
    const fn clone_flag(self) -> CloneFlags {
        match self {
            Self::Uts => CloneFlags::CLONE_NEWUTS,
            Self::Pid => pid::CLONE_FLAG,
            Self::Ipc => CloneFlags::CLONE_NEWIPC,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uts => write!(f, "uts"),
            Self::Pid => write!(f, "pid"),
            Self::Ipc => write!(f, "ipc"),
        }
    }
}

/// Set of namespaces a layer unshares.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceSet {
    /// Isolate UTS (hostname) namespace.
    pub uts: bool,
    /// Isolate PID namespace.
    pub pid: bool,
    /// Isolate IPC namespace.
    pub ipc: bool,
}

impl Default for NamespaceSet {
    fn default() -> Self {
        Self {
            uts: true,
            pid: true,
            ipc: true,
        }
    }
}

impl NamespaceSet {
    /// Returns the namespaces enabled in this set.
    pub fn members(&self) -> Vec<Namespace> {
        [
            (self.uts, Namespace::Uts),
            (self.pid, Namespace::Pid),
            (self.ipc, Namespace::Ipc),
        ]
        .into_iter()
        .filter_map(|(enabled, ns)| enabled.then_some(ns))
        .collect()
    }

    /// Combined `clone(2)` flags for every namespace in the set.
    pub fn clone_flags(&self) -> CloneFlags {
        self.members()
            .into_iter()
            .fold(CloneFlags::empty(), |acc, ns| acc | ns.clone_flag())
    }
}

/// Detaches the calling process from its parent's namespaces.
///
/// All namespaces in `set` are unshared atomically. The PID namespace
/// only applies to children forked afterwards; the caller itself keeps
/// its PID.
///
/// # Errors
///
/// Returns [`ZygoteError::Namespace`] if `unshare(2)` fails, typically
/// with `EPERM` when the caller lacks `CAP_SYS_ADMIN`.
pub fn unshare_namespaces(set: &NamespaceSet) -> Result<()> {
    let flags = set.clone_flags();
    if flags.is_empty() {
        tracing::debug!("no namespaces requested");
        return Ok(());
    }
    unshare(flags).map_err(|e| ZygoteError::Namespace { source: e.into() })?;
    tracing::debug!(namespaces = ?set.members(), "namespaces unshared");
    Ok(())
}
