//! Unix socket descriptor passing via `SCM_RIGHTS`.
//!
//! A fork request is one `sendmsg(2)` carrying a short fixed payload and
//! a single `SCM_RIGHTS` control message. Received descriptors are wrapped
//! in [`OwnedFd`] the moment they leave the control buffer, so every early
//! return closes them.

use std::io;
use std::mem::size_of;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

/// Upper bound on descriptors accepted in one message.
///
/// Larger than any request needs so that an over-full message is seen and
/// rejected by the caller instead of being truncated by the kernel.
pub const MAX_FDS: usize = 8;

/// Payload and descriptors read from one message.
#[derive(Debug)]
pub struct Received {
    /// Bytes of the regular payload.
    pub payload: Vec<u8>,
    /// Descriptors carried in `SCM_RIGHTS` messages, in sender order.
    pub fds: Vec<OwnedFd>,
}

fn cmsg_space(fd_count: usize) -> usize {
    let bytes = u32::try_from(fd_count * size_of::<RawFd>()).unwrap_or(u32::MAX);
    // SAFETY: CMSG_SPACE is pure arithmetic.
    unsafe { libc::CMSG_SPACE(bytes) as usize }
}

/// Control buffer aligned for `cmsghdr`.
fn control_buffer(fd_count: usize) -> Vec<u64> {
    vec![0u64; cmsg_space(fd_count).div_ceil(size_of::<u64>())]
}

/// Sends `payload` together with `fds` over a connected stream socket.
///
/// The descriptors ride on the first byte of the payload; any remainder
/// the kernel did not take in the first call is written plainly.
///
/// # Errors
///
/// Returns the OS error if `sendmsg(2)` fails, or `InvalidInput` for an
/// empty payload (ancillary data needs at least one data byte).
pub fn send_with_fds(socket: BorrowedFd<'_>, payload: &[u8], fds: &[BorrowedFd<'_>]) -> io::Result<()> {
    if payload.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "descriptor passing needs a non-empty payload",
        ));
    }
    if fds.len() > MAX_FDS {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("at most {MAX_FDS} descriptors per message"),
        ));
    }

    let raw: Vec<RawFd> = fds.iter().map(AsRawFd::as_raw_fd).collect();
    let mut iov = libc::iovec {
        iov_base: payload.as_ptr().cast_mut().cast(),
        iov_len: payload.len(),
    };
    let mut control = control_buffer(raw.len());

    // SAFETY: an all-zero msghdr is a valid empty message.
    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_iov = &raw mut iov;
    msg.msg_iovlen = 1;
    if !raw.is_empty() {
        msg.msg_control = control.as_mut_ptr().cast();
        msg.msg_controllen = cmsg_space(raw.len()) as _;

        // SAFETY: msg_control points at a zeroed, aligned buffer sized by
        // CMSG_SPACE for exactly raw.len() descriptors.
        unsafe {
            let cmsg = libc::CMSG_FIRSTHDR(&raw const msg);
            if cmsg.is_null() {
                return Err(io::Error::other("CMSG_FIRSTHDR returned null"));
            }
            (*cmsg).cmsg_level = libc::SOL_SOCKET;
            (*cmsg).cmsg_type = libc::SCM_RIGHTS;
            (*cmsg).cmsg_len = libc::CMSG_LEN((raw.len() * size_of::<RawFd>()) as u32) as _;
            std::ptr::copy_nonoverlapping(
                raw.as_ptr().cast::<u8>(),
                libc::CMSG_DATA(cmsg),
                raw.len() * size_of::<RawFd>(),
            );
        }
    }

    // SAFETY: msg and everything it points to outlive the call.
    let sent = unsafe { libc::sendmsg(socket.as_raw_fd(), &raw const msg, libc::MSG_NOSIGNAL) };
    let Ok(sent) = usize::try_from(sent) else {
        return Err(io::Error::last_os_error());
    };
    write_all(socket, &payload[sent..])
}

/// Receives up to `payload_len` bytes and every descriptor sent with them.
///
/// Reads until the payload is complete. Descriptors are accepted only
/// alongside the first chunk and are created close-on-exec.
///
/// # Errors
///
/// Returns `UnexpectedEof` if the peer closes before any byte arrives or
/// mid-payload, `InvalidData` if the control data was truncated, or the
/// OS error from `recvmsg(2)`.
pub fn recv_with_fds(socket: BorrowedFd<'_>, payload_len: usize) -> io::Result<Received> {
    let mut payload = vec![0u8; payload_len];
    let mut iov = libc::iovec {
        iov_base: payload.as_mut_ptr().cast(),
        iov_len: payload_len,
    };
    let mut control = control_buffer(MAX_FDS);

    // SAFETY: an all-zero msghdr is a valid empty message.
    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_iov = &raw mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr().cast();
    msg.msg_controllen = cmsg_space(MAX_FDS) as _;

    let received = loop {
        // SAFETY: msg points at live buffers of the advertised sizes.
        let ret = unsafe { libc::recvmsg(socket.as_raw_fd(), &raw mut msg, libc::MSG_CMSG_CLOEXEC) };
        if let Ok(received) = usize::try_from(ret) {
            break received;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    };

    // SAFETY: the kernel filled msg_control; the iteration stays inside
    // msg_controllen via CMSG_NXTHDR.
    let fds = unsafe { take_rights(&msg) };

    if msg.msg_flags & libc::MSG_CTRUNC != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "control message truncated",
        ));
    }
    if received == 0 && payload_len > 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "peer closed before sending",
        ));
    }
    read_exact(socket, &mut payload[received..])?;
    Ok(Received { payload, fds })
}

/// Collects every `SCM_RIGHTS` descriptor in `msg` into owned handles.
unsafe fn take_rights(msg: &libc::msghdr) -> Vec<OwnedFd> {
    let mut fds = Vec::new();
    // SAFETY: upheld by the caller.
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                let data = libc::CMSG_DATA(cmsg);
                let header = libc::CMSG_LEN(0) as usize;
                let count = ((*cmsg).cmsg_len as usize).saturating_sub(header) / size_of::<RawFd>();
                for i in 0..count {
                    let fd = std::ptr::read_unaligned(data.cast::<RawFd>().add(i));
                    fds.push(OwnedFd::from_raw_fd(fd));
                }
            }
            cmsg = libc::CMSG_NXTHDR(msg, cmsg);
        }
    }
    fds
}

fn write_all(socket: BorrowedFd<'_>, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        // SAFETY: buf is a live slice of the given length.
        let ret = unsafe {
            libc::send(
                socket.as_raw_fd(),
                buf.as_ptr().cast(),
                buf.len(),
                libc::MSG_NOSIGNAL,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        #[allow(clippy::cast_sign_loss)]
        let written = ret as usize;
        buf = &buf[written..];
    }
    Ok(())
}

fn read_exact(socket: BorrowedFd<'_>, mut buf: &mut [u8]) -> io::Result<()> {
    while !buf.is_empty() {
        // SAFETY: buf is a live mutable slice of the given length.
        let ret = unsafe { libc::recv(socket.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len(), 0) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if ret == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed mid-payload",
            ));
        }
        #[allow(clippy::cast_sign_loss)]
        let read = ret as usize;
        buf = &mut buf[read..];
    }
    Ok(())
}

/// Convenience wrapper for callers holding an `AsFd` socket.
///
/// # Errors
///
/// See [`recv_with_fds`].
pub fn recv_from(socket: &impl AsFd, payload_len: usize) -> io::Result<Received> {
    recv_with_fds(socket.as_fd(), payload_len)
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use std::os::unix::fs::MetadataExt;
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn passes_two_descriptors_in_order() {
        let (tx, rx) = UnixStream::pair().expect("pair");
        let dir = tempfile::tempdir().expect("tempdir");
        let first = File::create(dir.path().join("first")).expect("first");
        let second = File::create(dir.path().join("second")).expect("second");

        send_with_fds(tx.as_fd(), &[7u8; 8], &[first.as_fd(), second.as_fd()]).expect("send");
        let got = recv_from(&rx, 8).expect("recv");

        assert_eq!(got.payload, vec![7u8; 8]);
        let inodes: Vec<u64> = got
            .fds
            .into_iter()
            .map(|fd| File::from(fd).metadata().expect("fstat").ino())
            .collect();
        assert_eq!(
            inodes,
            vec![
                first.metadata().expect("first").ino(),
                second.metadata().expect("second").ino(),
            ]
        );
    }

    #[test]
    fn received_descriptors_are_distinct_from_originals() {
        let (tx, rx) = UnixStream::pair().expect("pair");
        let dir = tempfile::tempdir().expect("tempdir");
        let file = File::create(dir.path().join("f")).expect("create");

        send_with_fds(tx.as_fd(), b"x", &[file.as_fd()]).expect("send");
        let got = recv_from(&rx, 1).expect("recv");

        assert_eq!(got.fds.len(), 1);
        assert_ne!(got.fds[0].as_raw_fd(), file.as_raw_fd());
    }

    #[test]
    fn plain_payload_yields_no_descriptors() {
        let (mut tx, rx) = UnixStream::pair().expect("pair");
        tx.write_all(&[0u8; 8]).expect("write");
        let got = recv_from(&rx, 8).expect("recv");
        assert!(got.fds.is_empty());
    }

    #[test]
    fn closed_peer_is_unexpected_eof() {
        let (tx, rx) = UnixStream::pair().expect("pair");
        drop(tx);
        let err = recv_from(&rx, 8).expect_err("eof");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn short_first_chunk_is_completed() {
        let (tx, rx) = UnixStream::pair().expect("pair");
        let dir = tempfile::tempdir().expect("tempdir");
        let file = File::create(dir.path().join("f")).expect("create");

        send_with_fds(tx.as_fd(), &[1, 2, 3], &[file.as_fd()]).expect("send head");
        (&tx).write_all(&[4, 5, 6, 7, 8]).expect("send tail");
        let got = recv_from(&rx, 8).expect("recv");

        assert_eq!(got.payload, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(got.fds.len(), 1);
    }

    #[test]
    fn empty_payload_is_rejected() {
        let (tx, _rx) = UnixStream::pair().expect("pair");
        let err = send_with_fds(tx.as_fd(), &[], &[]).expect_err("empty");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
