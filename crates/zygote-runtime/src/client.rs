//! Requesting side of the control-socket protocol.

use std::os::fd::BorrowedFd;
use std::os::unix::net::UnixStream;
use std::path::Path;

use zygote_common::error::{Result, ZygoteError};
use zygote_common::types::SyncToken;

use crate::protocol;

/// Asks the layer listening at `socket_path` to build a nested layer.
///
/// Blocks until the serving layer has finished the attempt and returns
/// the token it answered with. If the nested layer started, its control
/// socket is bound by the time this returns.
///
/// # Errors
///
/// Returns [`ZygoteError::Io`] if the socket cannot be reached and
/// [`ZygoteError::Protocol`] if the connection closes without an answer.
pub fn request_fork(socket_path: &Path, root: BorrowedFd<'_>, cgroup: BorrowedFd<'_>) -> Result<SyncToken> {
    let mut conn = UnixStream::connect(socket_path).map_err(|e| ZygoteError::Io {
        path: socket_path.to_path_buf(),
        source: e,
    })?;
    protocol::send_request(&conn, root, cgroup)?;
    protocol::read_response(&mut conn)
}
