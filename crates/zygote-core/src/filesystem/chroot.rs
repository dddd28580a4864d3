//! `chroot(2)` through a directory descriptor.

use std::os::fd::{AsRawFd, OwnedFd};

use nix::unistd::{chroot, fchdir};
use zygote_common::error::{Result, ZygoteError};

/// Makes the directory behind `root` the caller's filesystem root.
///
/// The working directory ends up at the new root. `root` is closed on
/// return, whether or not the switch succeeded.
///
/// # Errors
///
/// Returns [`ZygoteError::Chroot`] if `root` is not a directory or the
/// caller lacks `CAP_SYS_CHROOT`.
pub fn chroot_into(root: OwnedFd) -> Result<()> {
    let fd = root.as_raw_fd();
    fchdir(&root).map_err(|e| ZygoteError::Chroot { source: e.into() })?;
    chroot(".").map_err(|e| ZygoteError::Chroot { source: e.into() })?;
    drop(root);
    tracing::debug!(fd, "root switched, descriptor closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;

    #[test]
    fn regular_file_is_not_a_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plain");
        let file = File::create(&path).expect("create");
        let err = chroot_into(OwnedFd::from(file)).expect_err("not a directory");
        assert!(matches!(err, ZygoteError::Chroot { .. }));
    }

    #[test]
    fn failed_switch_reports_enotdir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = File::create(dir.path().join("plain")).expect("create");
        let Err(ZygoteError::Chroot { source }) = chroot_into(OwnedFd::from(file)) else {
            panic!("expected a chroot error");
        };
        assert_eq!(source.raw_os_error(), Some(libc::ENOTDIR));
    }
}
