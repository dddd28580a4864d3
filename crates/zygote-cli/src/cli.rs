//! Command-line surface of the `zygote` binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use zygote_common::config::ZygoteConfig;
use zygote_common::constants::{BIN_NAME, DEFAULT_POLICY_PATH, DEFAULT_SOCKET_PATH};
use zygote_common::types::PolicyMode;
use zygote_core::namespace::NamespaceSet;
use zygote_runtime::entry::{InvocationArgs, parse_enable_seccomp};

/// Zygote: fork-server bootstrap for nested Linux sandboxes.
///
/// The host is expected to have chrooted into the runtime filesystem and
/// opened one `cgroup.procs` descriptor per cgroup at fd 3 onwards.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Bootstrap document executed by every layer.
    pub bootstrap: PathBuf,

    /// Number of inherited cgroup descriptors starting at fd 3.
    #[arg(default_value_t = 0)]
    pub cgroup_count: u32,

    /// Installs the syscall filter when omitted or exactly "true".
    pub enable_seccomp: Option<String>,

    /// Control socket path, reused at every nesting depth.
    #[arg(long, env = "ZYGOTE_SOCKET_PATH", default_value = DEFAULT_SOCKET_PATH)]
    pub socket_path: PathBuf,

    /// Syscall allow-list document.
    #[arg(long, env = "ZYGOTE_POLICY", default_value = DEFAULT_POLICY_PATH)]
    pub policy: PathBuf,

    /// Fail when the policy names a syscall unknown on this platform.
    #[arg(long, env = "ZYGOTE_STRICT_POLICY")]
    pub strict_policy: bool,

    /// Log output format.
    #[arg(long, env = "ZYGOTE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log line format written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

impl Cli {
    /// Host configuration derived from the flags.
    pub fn config(&self) -> ZygoteConfig {
        ZygoteConfig {
            socket_path: self.socket_path.clone(),
            policy_path: self.policy.clone(),
            policy_mode: if self.strict_policy {
                PolicyMode::Strict
            } else {
                PolicyMode::Lenient
            },
            ..ZygoteConfig::default()
        }
    }

    /// Positional parameters handed to the bootstrap entry.
    pub fn invocation(&self) -> InvocationArgs {
        InvocationArgs {
            bootstrap_path: self.bootstrap.clone(),
            cgroup_count: self.cgroup_count,
            enable_seccomp: parse_enable_seccomp(self.enable_seccomp.as_deref()),
            namespaces: NamespaceSet::default(),
        }
    }
}
