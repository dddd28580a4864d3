//! Sandbox layers: one namespace and root boundary each.

use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};

use zygote_common::config::ZygoteConfig;
use zygote_core::namespace::NamespaceSet;

use crate::initializer::NestedLayer;
use crate::server::ForkServer;

/// Settings every layer of one sandbox tree shares.
///
/// Paths are re-resolved at each depth against that layer's root.
#[derive(Debug, Clone)]
pub struct LayerSettings {
    /// Host configuration (socket path, policy, cgroup base).
    pub config: ZygoteConfig,
    /// Path of the bootstrap document each layer executes.
    pub bootstrap_path: PathBuf,
    /// Namespaces each layer detaches before binding its socket.
    pub namespaces: NamespaceSet,
}

impl LayerSettings {
    /// Creates settings with the default namespace set.
    pub fn new(config: ZygoteConfig, bootstrap_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            bootstrap_path: bootstrap_path.into(),
            namespaces: NamespaceSet::default(),
        }
    }
}

/// A running sandbox layer.
///
/// Owns the bound control listener. The layer lives as long as the
/// process tree holding it; there is no explicit teardown.
#[derive(Debug)]
pub struct SandboxLayer {
    listener: UnixListener,
    settings: LayerSettings,
    depth: u32,
}

impl SandboxLayer {
    pub(crate) const fn new(listener: UnixListener, settings: LayerSettings, depth: u32) -> Self {
        Self {
            listener,
            settings,
            depth,
        }
    }

    /// Nesting depth, 0 for the layer built by the entry point.
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// Settings inherited by nested layers.
    pub const fn settings(&self) -> &LayerSettings {
        &self.settings
    }

    /// Path the control socket was bound at, relative to this layer's root.
    pub fn socket_path(&self) -> &Path {
        &self.settings.config.socket_path
    }

    /// The bound control listener.
    pub const fn listener(&self) -> &UnixListener {
        &self.listener
    }

    /// Releases the listener, e.g. to hand it to an exec'd bootstrap.
    pub fn into_listener(self) -> UnixListener {
        self.listener
    }

    /// Turns this layer into a fork server whose requests build nested layers.
    pub fn into_fork_server(self) -> ForkServer<NestedLayer> {
        let nested = NestedLayer::new(self.settings, self.depth);
        ForkServer::new(self.listener, nested)
    }
}
