//! Layer start-up: bootstrap document, namespaces, control socket,
//! bootstrap process.

use std::convert::Infallible;
use std::os::unix::net::UnixListener;
use std::path::Path;

use nix::unistd::ForkResult;
use zygote_common::error::{Result, ZygoteError};
use zygote_core::namespace::unshare_namespaces;

use crate::bootstrap::LoadedBootstrap;
use crate::layer::{LayerSettings, SandboxLayer};
use crate::process::{exit_now, fork_process};

/// Starts a sandbox layer at `depth` and exits the calling process.
///
/// Loads the bootstrap document, detaches the configured namespaces,
/// binds the control socket, and forks the bootstrap process. The
/// caller exits with status 0 once the fork succeeds; the socket is
/// already bound at that point, so a peer waiting on the caller's exit
/// can connect right away. The bootstrap process is the first process
/// of the new PID namespace.
///
/// A document that cannot be loaded fails the call before any socket
/// exists, so a layer with a broken bootstrap is never connectable.
///
/// # Errors
///
/// Returns an error if loading, unsharing, binding, or forking fails.
/// Nothing is returned on success.
pub fn start_layer(settings: LayerSettings, depth: u32) -> Result<Infallible> {
    let bootstrap = LoadedBootstrap::load(&settings.bootstrap_path)
        .inspect_err(|e| log_bootstrap_failure(e, &settings.bootstrap_path, depth))?;

    unshare_namespaces(&settings.namespaces)?;

    let socket_path = settings.config.socket_path.clone();
    let listener = UnixListener::bind(&socket_path).map_err(|e| ZygoteError::Io {
        path: socket_path.clone(),
        source: e,
    })?;
    tracing::debug!(path = %socket_path.display(), depth, "control socket bound");

    match fork_process()? {
        ForkResult::Parent { child } => {
            tracing::info!(bootstrap_pid = child.as_raw(), depth, "sandbox layer started");
            exit_now(0)
        }
        ForkResult::Child => {
            let path = settings.bootstrap_path.clone();
            let layer = SandboxLayer::new(listener, settings, depth);
            match bootstrap.run(layer) {
                Ok(never) => match never {},
                Err(e) => log_bootstrap_failure(&e, &path, depth),
            }
            exit_now(1)
        }
    }
}

fn log_bootstrap_failure(err: &ZygoteError, path: &Path, depth: u32) {
    if let ZygoteError::Bootstrap {
        message,
        source_text,
    } = err
    {
        tracing::error!(
            error = %message,
            source = %source_text,
            path = %path.display(),
            depth,
            "bootstrap failed"
        );
    } else {
        tracing::error!(error = %err, path = %path.display(), depth, "bootstrap failed");
    }
}
