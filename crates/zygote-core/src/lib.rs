//! # zygote-core
//!
//! Low-level Linux isolation primitives for Zygote sandbox layers.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: UTS, PID, and IPC detachment via `unshare(2)`.
//! - **Seccomp**: allow-list syscall filters with a fixed deny errno.
//! - **Cgroups**: admission through pre-opened `cgroup.procs` descriptors.
//! - **Filesystem**: `chroot` through a received directory descriptor.
//! - **Descriptor passing**: `SCM_RIGHTS` transfer over Unix sockets.
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! proper error handling and `// SAFETY:` documentation.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::panic, clippy::unwrap_used))]

#[cfg(not(target_os = "linux"))]
compile_error!("zygote-core requires Linux namespaces, seccomp, and cgroups");

pub mod cgroup;
pub mod fd_passing;
pub mod filesystem;
pub mod namespace;
pub mod seccomp;
