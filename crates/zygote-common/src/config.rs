//! Global configuration model for a Zygote sandbox host.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::types::PolicyMode;

/// Root configuration shared by every layer of one sandbox tree.
///
/// A layer hands the same configuration to the nested layers it spawns;
/// relative and absolute paths alike are resolved against the root the
/// layer occupies at the time of use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZygoteConfig {
    /// Path of the control socket each layer binds.
    pub socket_path: PathBuf,
    /// Path of the syscall allow-list document.
    pub policy_path: PathBuf,
    /// Handling of syscall names that do not resolve on this platform.
    pub policy_mode: PolicyMode,
    /// First descriptor number of the inherited cgroup handles.
    pub cgroup_fd_base: i32,
    /// errno returned by denied syscalls.
    pub deny_errno: u32,
}

impl Default for ZygoteConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(constants::DEFAULT_SOCKET_PATH),
            policy_path: PathBuf::from(constants::DEFAULT_POLICY_PATH),
            policy_mode: PolicyMode::default(),
            cgroup_fd_base: constants::CGROUP_FD_BASE,
            deny_errno: constants::SECCOMP_DENY_ERRNO,
        }
    }
}
