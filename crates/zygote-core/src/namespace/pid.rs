//! PID namespace helpers.
//!
//! After `unshare(CLONE_NEWPID)` the caller stays in its old namespace;
//! the next `fork(2)` child sees itself as PID 1 inside the new one.

use nix::sched::CloneFlags;
use nix::unistd::getpid;

/// Flag detaching the PID namespace.
pub const CLONE_FLAG: CloneFlags = CloneFlags::CLONE_NEWPID;

/// Returns the calling process's PID as seen from its own namespace.
#[allow(clippy::cast_sign_loss)]
pub fn current_pid() -> u32 {
    getpid().as_raw() as u32
}

/// Returns whether the caller is the init process of its PID namespace.
pub fn is_namespace_init() -> bool {
    current_pid() == 1
}
