//! Bootstrap entry: the first layer of a sandbox tree.
//!
//! The host chroots into the runtime filesystem and opens the cgroup
//! handles before invoking the binary; this module turns the parsed
//! invocation into cgroup admission, filter installation, and the start
//! of layer 0.

use std::convert::Infallible;
use std::path::PathBuf;

use zygote_common::config::ZygoteConfig;
use zygote_common::error::Result;
use zygote_core::cgroup::admit_inherited;
use zygote_core::namespace::NamespaceSet;
use zygote_core::seccomp::install_policy;

use crate::layer::LayerSettings;
use crate::starter::start_layer;

/// Parameters the host passes on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationArgs {
    /// Bootstrap document executed by every layer.
    pub bootstrap_path: PathBuf,
    /// Number of inherited `cgroup.procs` descriptors.
    pub cgroup_count: u32,
    /// Whether to install the syscall filter.
    pub enable_seccomp: bool,
    /// Namespaces every layer detaches.
    pub namespaces: NamespaceSet,
}

/// Interprets the optional `enable-seccomp` argument.
///
/// Enabled when absent or exactly `"true"`; any other value disables it.
pub fn parse_enable_seccomp(value: Option<&str>) -> bool {
    value.is_none_or(|v| v == "true")
}

/// Runs the bootstrap entry. Never returns on success.
///
/// Joins the inherited cgroups first, so the admission writes are never
/// subject to the syscall filter, then installs the filter and starts
/// layer 0.
///
/// # Errors
///
/// Returns the first fatal setup error: cgroup admission, filter
/// installation, namespace detachment, socket bind, or fork.
pub fn run(args: InvocationArgs, config: ZygoteConfig) -> Result<Infallible> {
    tracing::info!(
        bootstrap = %args.bootstrap_path.display(),
        cgroups = args.cgroup_count,
        seccomp = args.enable_seccomp,
        "zygote starting"
    );

    admit_inherited(config.cgroup_fd_base, args.cgroup_count)?;

    if args.enable_seccomp {
        let _ = install_policy(&config.policy_path, config.policy_mode, config.deny_errno)?;
    } else {
        tracing::warn!("seccomp disabled by invocation");
    }

    let mut settings = LayerSettings::new(config, args.bootstrap_path);
    settings.namespaces = args.namespaces;
    start_layer(settings, 0)
}
