//! Control-socket wire protocol.
//!
//! Request: one `sendmsg(2)` of [`REQUEST_RESERVED_LEN`] reserved bytes
//! with an `SCM_RIGHTS` message carrying exactly two descriptors, the
//! root directory first and the `cgroup.procs` handle second.
//!
//! Response: [`RESPONSE_LEN`] bytes holding the middle process PID as a
//! little-endian `u32`, written once before the server closes the
//! connection.

use std::io::{Read, Write};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::os::unix::net::UnixStream;

use zygote_common::constants::{REQUEST_FD_COUNT, REQUEST_RESERVED_LEN, RESPONSE_LEN};
use zygote_common::error::{Result, ZygoteError};
use zygote_common::types::SyncToken;
use zygote_core::fd_passing;

/// One inbound fork request.
///
/// Owns both forwarded descriptors; dropping the request closes them.
#[derive(Debug)]
pub struct ForkRequest {
    reserved: [u8; REQUEST_RESERVED_LEN],
    root: OwnedFd,
    cgroup: OwnedFd,
}

impl ForkRequest {
    /// Reads one request from an accepted connection.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::Protocol`] if the peer closes early or sends
    /// anything other than exactly two descriptors. Descriptors that did
    /// arrive with a rejected request are closed.
    pub fn read_from(conn: &UnixStream) -> Result<Self> {
        let received = fd_passing::recv_from(conn, REQUEST_RESERVED_LEN)
            .map_err(|e| ZygoteError::protocol(format!("failed to read fork request: {e}")))?;

        let count = received.fds.len();
        let Ok([root, cgroup]) = <[OwnedFd; REQUEST_FD_COUNT]>::try_from(received.fds) else {
            return Err(ZygoteError::protocol(format!(
                "fork request carried {count} descriptors, expected {REQUEST_FD_COUNT}"
            )));
        };
        let mut reserved = [0u8; REQUEST_RESERVED_LEN];
        reserved.copy_from_slice(&received.payload);
        Ok(Self {
            reserved,
            root,
            cgroup,
        })
    }

    /// The reserved payload, passed through uninterpreted.
    pub const fn reserved(&self) -> [u8; REQUEST_RESERVED_LEN] {
        self.reserved
    }

    /// Descriptor of the directory the nested layer will use as its root.
    pub fn root(&self) -> BorrowedFd<'_> {
        self.root.as_fd()
    }

    /// Descriptor of the `cgroup.procs` file the nested layer joins.
    pub fn cgroup(&self) -> BorrowedFd<'_> {
        self.cgroup.as_fd()
    }

    /// Splits the request into `(root, cgroup)` descriptors.
    pub fn into_descriptors(self) -> (OwnedFd, OwnedFd) {
        (self.root, self.cgroup)
    }
}

/// Sends a fork request carrying `root` and `cgroup` over `conn`.
///
/// The reserved field is sent as zeroes.
///
/// # Errors
///
/// Returns [`ZygoteError::Protocol`] if the message cannot be sent.
pub fn send_request(conn: &UnixStream, root: BorrowedFd<'_>, cgroup: BorrowedFd<'_>) -> Result<()> {
    fd_passing::send_with_fds(conn.as_fd(), &[0u8; REQUEST_RESERVED_LEN], &[root, cgroup])
        .map_err(|e| ZygoteError::protocol(format!("failed to send fork request: {e}")))
}

/// Writes the response for a completed request.
///
/// # Errors
///
/// Returns the I/O error if the peer has gone away.
pub fn write_response(conn: &mut UnixStream, token: SyncToken) -> std::io::Result<()> {
    conn.write_all(&token.to_wire())
}

/// Reads the response to a request sent on `conn`.
///
/// # Errors
///
/// Returns [`ZygoteError::Protocol`] if the server closes the connection
/// before a full response arrives.
pub fn read_response(conn: &mut UnixStream) -> Result<SyncToken> {
    let mut wire = [0u8; RESPONSE_LEN];
    conn.read_exact(&mut wire)
        .map_err(|e| ZygoteError::protocol(format!("no fork response: {e}")))?;
    Ok(SyncToken::from_wire(wire))
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::os::unix::fs::MetadataExt;

    use super::*;

    fn two_files() -> (tempfile::TempDir, File, File) {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = File::open(dir.path()).expect("open dir");
        let cgroup = File::create(dir.path().join("cgroup.procs")).expect("create");
        (dir, root, cgroup)
    }

    #[test]
    fn request_carries_root_then_cgroup() {
        let (client, server) = UnixStream::pair().expect("pair");
        let (_dir, root, cgroup) = two_files();

        send_request(&client, root.as_fd(), cgroup.as_fd()).expect("send");
        let request = ForkRequest::read_from(&server).expect("read");

        assert_eq!(request.reserved(), [0u8; REQUEST_RESERVED_LEN]);
        let (got_root, got_cgroup) = request.into_descriptors();
        let root_meta = File::from(got_root).metadata().expect("root meta");
        let cgroup_meta = File::from(got_cgroup).metadata().expect("cgroup meta");
        assert!(root_meta.is_dir());
        assert_eq!(root_meta.ino(), root.metadata().expect("meta").ino());
        assert_eq!(cgroup_meta.ino(), cgroup.metadata().expect("meta").ino());
    }

    #[test]
    fn request_with_one_descriptor_is_rejected() {
        let (client, server) = UnixStream::pair().expect("pair");
        let (_dir, root, _cgroup) = two_files();

        fd_passing::send_with_fds(client.as_fd(), &[0u8; REQUEST_RESERVED_LEN], &[root.as_fd()])
            .expect("send");
        let err = ForkRequest::read_from(&server).expect_err("one fd");
        assert!(err.to_string().contains("carried 1 descriptors"));
    }

    #[test]
    fn request_without_descriptors_is_rejected() {
        let (mut client, server) = UnixStream::pair().expect("pair");
        client.write_all(&[0u8; REQUEST_RESERVED_LEN]).expect("write");
        assert!(matches!(
            ForkRequest::read_from(&server),
            Err(ZygoteError::Protocol { .. })
        ));
    }

    #[test]
    fn response_is_four_bytes_little_endian() {
        let (mut server, mut client) = UnixStream::pair().expect("pair");
        write_response(&mut server, SyncToken::new(4242)).expect("write");
        drop(server);

        let mut raw = Vec::new();
        let _ = client.read_to_end(&mut raw).expect("read");
        assert_eq!(raw, 4242u32.to_le_bytes());
    }

    #[test]
    fn closed_connection_is_not_a_response() {
        let (server, mut client) = UnixStream::pair().expect("pair");
        drop(server);
        assert!(matches!(
            read_response(&mut client),
            Err(ZygoteError::Protocol { .. })
        ));
    }
}
