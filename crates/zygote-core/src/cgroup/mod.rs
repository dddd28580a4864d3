//! Cgroup admission through pre-opened membership descriptors.
//!
//! The host creates cgroups and opens their `cgroup.procs` files before
//! the sandbox root changes; after `chroot` those files are no longer
//! reachable by path. This module only ever writes the caller's own PID
//! into such a descriptor and then closes it.

use std::fs::File;
use std::io::Write;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use zygote_common::error::{Result, ZygoteError};

use crate::namespace::pid::current_pid;

/// An open descriptor to a `cgroup.procs` membership file.
#[derive(Debug)]
pub struct CgroupHandle {
    fd: OwnedFd,
}

impl CgroupHandle {
    /// Wraps an owned membership descriptor.
    pub const fn new(fd: OwnedFd) -> Self {
        Self { fd }
    }

    /// Takes ownership of an inherited descriptor number.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::Cgroup`] if `fd` is not open in this process.
    pub fn inherited(fd: RawFd) -> Result<Self> {
        // SAFETY: F_GETFD only inspects the descriptor table.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        Errno::result(flags).map_err(|e| ZygoteError::Cgroup {
            fd,
            source: e.into(),
        })?;
        // SAFETY: the descriptor is open and was handed to this process by
        // the host exclusively for admission; nothing else owns it.
        let owned = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self::new(owned))
    }

    /// Writes the caller's PID into the membership file and closes it.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::Cgroup`] if the kernel rejects the write.
    pub fn admit(self) -> Result<()> {
        let fd = self.fd.as_raw_fd();
        let pid = current_pid();
        let mut file = File::from(self.fd);
        file.write_all(pid.to_string().as_bytes())
            .map_err(|e| ZygoteError::Cgroup { fd, source: e })?;
        drop(file);
        tracing::debug!(fd, pid, "joined cgroup, descriptor closed");
        Ok(())
    }
}

/// Joins every cgroup whose handle the host left open at `base..base + count`.
///
/// Descriptors are consumed in ascending order and each is closed once
/// written.
///
/// # Errors
///
/// Returns [`ZygoteError::Cgroup`] on the first descriptor that is not
/// open or cannot be written.
pub fn admit_inherited(base: RawFd, count: u32) -> Result<()> {
    for offset in 0..count {
        let fd = base
            .checked_add_unsigned(offset)
            .ok_or_else(|| ZygoteError::Config {
                message: format!("cgroup descriptor {base}+{offset} out of range"),
            })?;
        CgroupHandle::inherited(fd)?.admit()?;
        tracing::info!(fd, "joined inherited cgroup");
    }
    Ok(())
}
