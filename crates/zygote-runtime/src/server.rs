//! Fork-server loop.
//!
//! Accepts fork requests on a layer's control socket one at a time. For
//! each request the loop forks a middle process, hands it the request,
//! and waits for it to exit before answering. The middle process builds
//! the nested layer and exits 0 as soon as that layer's socket is bound,
//! so the answer doubles as a readiness signal.

use std::convert::Infallible;
use std::io::ErrorKind;
use std::os::fd::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;

use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, close};
use zygote_common::error::{Result, ZygoteError};
use zygote_common::types::SyncToken;
use zygote_core::namespace::pid::is_namespace_init;

use crate::barrier::{Readiness, ReadinessBarrier};
use crate::process::{exit_now, fork_process};
use crate::protocol::{self, ForkRequest};

/// Work done inside the middle process of a fork request.
///
/// Runs after the loop's listener and the client connection have been
/// closed in that process. Must either never return or return an error;
/// exiting with status 0 tells the loop the nested layer is ready.
pub trait MiddleProcess {
    /// Consumes the request and builds the nested layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the nested layer cannot be built. The middle
    /// process then exits with status 1.
    fn run(&self, request: ForkRequest) -> Result<Infallible>;
}

/// Sequential fork-request server bound to one control socket.
#[derive(Debug)]
pub struct ForkServer<M> {
    listener: Option<UnixListener>,
    middle: M,
    served: u64,
}

impl<M: MiddleProcess> ForkServer<M> {
    /// Creates a server on a bound listener.
    pub const fn new(listener: UnixListener, middle: M) -> Self {
        Self {
            listener: Some(listener),
            middle,
            served: 0,
        }
    }

    /// Number of requests answered so far.
    pub const fn served(&self) -> u64 {
        self.served
    }

    /// Serves requests until a fatal error occurs.
    ///
    /// Malformed requests and nested layers that fail to start are logged
    /// and skipped. Orphaned descendants re-parented to this process are
    /// reaped between requests.
    ///
    /// # Errors
    ///
    /// Returns an error if `accept(2)` or `fork(2)` fails.
    pub fn serve(mut self) -> Result<Infallible> {
        tracing::info!(
            fd = self.listener.as_ref().map(AsRawFd::as_raw_fd),
            namespace_init = is_namespace_init(),
            "fork server accepting requests"
        );
        loop {
            reap_orphans();
            let _ = self.handle_next()?;
        }
    }

    /// Accepts and fully handles a single connection.
    ///
    /// Every well-formed request is answered, including ones whose nested
    /// layer failed to start; the answer marks the end of the attempt.
    /// Returns `Ok(None)` when a malformed request was dropped without a
    /// response.
    ///
    /// # Errors
    ///
    /// Returns an error if `accept(2)` or `fork(2)` fails.
    pub fn handle_next(&mut self) -> Result<Option<SyncToken>> {
        let conn = self.accept()?;
        let request = match ForkRequest::read_from(&conn) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed fork request");
                return Ok(None);
            }
        };
        self.spawn_child(conn, request)
    }

    fn accept(&self) -> Result<UnixStream> {
        let Some(listener) = self.listener.as_ref() else {
            return Err(ZygoteError::Io {
                path: PathBuf::new(),
                source: std::io::Error::new(ErrorKind::NotConnected, "listener already released"),
            });
        };
        loop {
            match listener.accept() {
                Ok((conn, _)) => return Ok(conn),
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::ConnectionAborted) => {}
                Err(e) => {
                    let path = listener
                        .local_addr()
                        .ok()
                        .and_then(|addr| addr.as_pathname().map(PathBuf::from))
                        .unwrap_or_default();
                    return Err(ZygoteError::Io { path, source: e });
                }
            }
        }
    }

    fn spawn_child(&mut self, mut conn: UnixStream, request: ForkRequest) -> Result<Option<SyncToken>> {
        match fork_process()? {
            ForkResult::Child => {
                drop(conn);
                if let Some(listener) = self.listener.take() {
                    if let Err(e) = close(listener) {
                        tracing::warn!(error = %e, "closing inherited listener failed");
                    }
                }
                match self.middle.run(request) {
                    Ok(never) => match never {},
                    Err(e) => {
                        tracing::error!(error = %e, "nested layer setup failed");
                        exit_now(1)
                    }
                }
            }
            ForkResult::Parent { child } => {
                drop(request);
                let token = match ReadinessBarrier::new(child).await_ready() {
                    Ok(Readiness::Ready(token)) => token,
                    Ok(Readiness::Failed { token, status }) => {
                        tracing::warn!(%token, %status, "nested layer failed to start");
                        token
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "lost track of middle process, closing without response");
                        return Ok(None);
                    }
                };
                if let Err(e) = protocol::write_response(&mut conn, token) {
                    tracing::warn!(error = %e, %token, "requester left before the response");
                }
                self.served += 1;
                tracing::info!(%token, served = self.served, "fork request served");
                Ok(Some(token))
            }
        }
    }
}

/// Reaps every already-terminated child without blocking.
fn reap_orphans() {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => break,
            Ok(status) => tracing::debug!(?status, "reaped orphaned descendant"),
        }
    }
}
