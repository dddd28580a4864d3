//! Kernel-level checks for installed syscall filters.
//!
//! Each test compiles a filter in the parent, forks, installs it in the
//! child only, and reports the child's observations back over a socket.

#![allow(clippy::expect_used, clippy::unwrap_used, unsafe_code)]

use std::io::Read;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;

use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, fork};
use zygote_common::types::PolicyMode;
use zygote_core::seccomp::{CompiledFilter, SyscallPolicy};

const DENIED_WITH_EPERM: u8 = b'E';
const ALLOWED: u8 = b'A';
const OTHER: u8 = b'?';

/// Installs `filter` in a forked child, runs `getppid` there, and returns
/// what the child observed.
fn getppid_verdict(filter: &CompiledFilter) -> u8 {
    let (mut parent_end, child_end) = UnixStream::pair().expect("pair");

    // SAFETY: the child only issues raw syscalls before exiting.
    match unsafe { fork() }.expect("fork") {
        ForkResult::Child => {
            let verdict = if filter.install().is_err() {
                OTHER
            } else {
                // SAFETY: raw syscalls with no memory arguments.
                let ret = unsafe { libc::syscall(libc::SYS_getppid) };
                let errno = unsafe { *libc::__errno_location() };
                if ret == -1 && errno == libc::EPERM {
                    DENIED_WITH_EPERM
                } else if ret > 0 {
                    ALLOWED
                } else {
                    OTHER
                }
            };
            // SAFETY: one-byte write from a live stack slot, then thread exit.
            unsafe {
                let _ = libc::write(child_end.as_raw_fd(), (&raw const verdict).cast(), 1);
                libc::syscall(libc::SYS_exit, 0);
            }
            unreachable!("exit returned");
        }
        ForkResult::Parent { child } => {
            drop(child_end);
            let mut byte = [0u8; 1];
            parent_end.read_exact(&mut byte).expect("child verdict");
            let status = waitpid(child, None).expect("waitpid");
            assert!(matches!(status, WaitStatus::Exited(_, 0)), "child status {status:?}");
            byte[0]
        }
    }
}

fn policy(names: &[&str]) -> SyscallPolicy {
    SyscallPolicy::new(
        names.iter().map(ToString::to_string).collect(),
        PolicyMode::Lenient,
        libc::EPERM as u32,
    )
}

#[test]
fn syscall_outside_policy_fails_with_configured_errno() {
    let filter = policy(&["read", "write", "exit"]).compile().expect("compile");
    assert_eq!(getppid_verdict(&filter), DENIED_WITH_EPERM);
}

#[test]
fn unknown_names_do_not_block_installation() {
    let filter = policy(&["read", "write", "exit", "getppid", "not_a_real_syscall"])
        .compile()
        .expect("compile");
    assert_eq!(filter.skipped(), ["not_a_real_syscall"]);
    assert_eq!(getppid_verdict(&filter), ALLOWED);
}
