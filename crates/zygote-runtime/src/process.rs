//! Process duplication and termination helpers.
//!
//! Every branch created here ends in [`exit_now`] rather than unwinding,
//! so no destructor of the pre-fork stack ever runs twice.

use nix::unistd::{ForkResult, fork};
use zygote_common::error::{Result, ZygoteError};

/// Duplicates the calling process.
///
/// # Errors
///
/// Returns [`ZygoteError::Process`] if `fork(2)` fails.
pub fn fork_process() -> Result<ForkResult> {
    // SAFETY: the binary never starts threads, so the child inherits a
    // consistent address space. Test harness threads only run allocator-safe
    // code in children.
    unsafe { fork() }.map_err(|e| ZygoteError::process("fork", e))
}

/// Terminates the calling process immediately with `code`.
///
/// Skips `atexit` handlers and destructors; descriptors are closed by
/// the kernel.
pub fn exit_now(code: i32) -> ! {
    // SAFETY: _exit has no preconditions.
    unsafe { libc::_exit(code) }
}
