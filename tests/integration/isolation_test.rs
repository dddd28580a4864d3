//! Integration tests for the isolation primitives.
//!
//! These tests are implemented in:
//! `crates/zygote-core/tests/seccomp_enforcement.rs`
//! `crates/zygote-core/tests/cgroup_inheritance.rs` (ignored, needs root and cgroup v2)
//!
//! Covered scenarios:
//! - `syscall_outside_policy_fails_with_configured_errno`: denied calls return EPERM
//! - `unknown_names_do_not_block_installation`: lenient policies skip unknown names
//! - `grandchild_stays_in_cgroup_after_admitting_parent_exits`: membership is inherited
