//! Filesystem root switching for sandbox layers.
//!
//! The root directory arrives as an open descriptor rather than a path,
//! so the switch goes through `fchdir(2)` followed by `chroot(".")`.

pub mod chroot;
