//! System-wide constants and default paths.

/// Control socket path bound by every sandbox layer.
///
/// Resolved against whatever root the layer currently occupies, so the
/// same literal is reused at every nesting depth.
pub const DEFAULT_SOCKET_PATH: &str = "/host/comms.sock";

/// Default location of the syscall allow-list, relative to the working directory.
pub const DEFAULT_POLICY_PATH: &str = "syscalls.json";

/// First descriptor number of the inherited cgroup membership handles.
pub const CGROUP_FD_BASE: i32 = 3;

/// errno returned by syscalls the filter does not allow.
pub const SECCOMP_DENY_ERRNO: u32 = 1;

/// Width of the reserved payload accompanying every fork request.
pub const REQUEST_RESERVED_LEN: usize = 8;

/// Number of descriptors carried by every fork request.
pub const REQUEST_FD_COUNT: usize = 2;

/// Width of the fork response (a little-endian `u32`).
pub const RESPONSE_LEN: usize = 4;

/// Environment variable carrying the listener descriptor into exec'd bootstraps.
pub const LISTEN_FD_ENV: &str = "ZYGOTE_LISTEN_FD";

/// Environment variable carrying the layer depth into exec'd bootstraps.
pub const LAYER_DEPTH_ENV: &str = "ZYGOTE_LAYER_DEPTH";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "zygote";
