//! Nested layer initialization inside a fork server's middle process.

use std::convert::Infallible;
use std::os::fd::AsRawFd;

use zygote_common::error::Result;
use zygote_core::cgroup::CgroupHandle;
use zygote_core::filesystem::chroot::chroot_into;

use crate::layer::LayerSettings;
use crate::protocol::ForkRequest;
use crate::server::MiddleProcess;
use crate::starter;

/// Builds a nested layer one level below the layer serving the request.
#[derive(Debug, Clone)]
pub struct NestedLayer {
    settings: LayerSettings,
    parent_depth: u32,
}

impl NestedLayer {
    /// Creates the initializer for requests served by a layer at `parent_depth`.
    pub const fn new(settings: LayerSettings, parent_depth: u32) -> Self {
        Self {
            settings,
            parent_depth,
        }
    }
}

impl MiddleProcess for NestedLayer {
    fn run(&self, request: ForkRequest) -> Result<Infallible> {
        initialize(self.settings.clone(), request, self.parent_depth)
    }
}

/// Enters the requested root and cgroup, then starts the nested layer.
///
/// The root switch happens first so the nested layer's socket and
/// bootstrap paths resolve inside the new root.
///
/// # Errors
///
/// Returns an error if the chroot, the cgroup admission, or the layer
/// start fails. On success this function never returns.
pub fn initialize(settings: LayerSettings, request: ForkRequest, parent_depth: u32) -> Result<Infallible> {
    let (root, cgroup) = request.into_descriptors();
    tracing::debug!(
        root_fd = root.as_raw_fd(),
        cgroup_fd = cgroup.as_raw_fd(),
        depth = parent_depth + 1,
        "initializing nested layer"
    );
    chroot_into(root)?;
    CgroupHandle::new(cgroup).admit()?;
    starter::start_layer(settings, parent_depth + 1)
}
