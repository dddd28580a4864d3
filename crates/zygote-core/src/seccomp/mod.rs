//! Seccomp-BPF allow-list filtering.
//!
//! A policy document lists the syscalls a sandbox may use by name:
//!
//! ```json
//! {"calls": ["read", "write", "exit", "futex"]}
//! ```
//!
//! Every other syscall fails with a fixed errno. The filter is built with
//! `seccompiler` and loaded into the kernel in two separate steps so the
//! compiled program can be prepared before a `fork(2)` and installed in
//! the child without allocating.
//!
//! # Kernel Requirements
//!
//! - Kernel 3.5+ for seccomp-bpf and `PR_SET_NO_NEW_PRIVS`
//!
//! Once installed a filter can never be removed or relaxed, and every
//! process forked afterwards inherits it.

pub mod syscalls;

use std::collections::BTreeMap;
use std::path::Path;

use seccompiler::{BpfProgram, SeccompAction, SeccompFilter, SeccompRule, TargetArch};
use serde::{Deserialize, Serialize};
use zygote_common::error::{Result, ZygoteError};
use zygote_common::types::PolicyMode;

#[cfg(target_arch = "x86_64")]
const TARGET_ARCH: TargetArch = TargetArch::x86_64;
#[cfg(target_arch = "aarch64")]
const TARGET_ARCH: TargetArch = TargetArch::aarch64;
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("seccomp filtering supports x86_64 and aarch64 only");

/// On-disk form of a syscall allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Permitted syscall names.
    pub calls: Vec<String>,
}

/// An ordered allow-list of syscall names paired with a deny action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallPolicy {
    calls: Vec<String>,
    mode: PolicyMode,
    deny_errno: u32,
}

impl SyscallPolicy {
    /// Creates a policy from syscall names.
    pub fn new(calls: Vec<String>, mode: PolicyMode, deny_errno: u32) -> Self {
        Self {
            calls,
            mode,
            deny_errno,
        }
    }

    /// Reads a policy document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::Io`] if the file cannot be read and
    /// [`ZygoteError::Serialization`] if it is not a policy document.
    pub fn load(path: &Path, mode: PolicyMode, deny_errno: u32) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ZygoteError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let doc: PolicyDocument = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.display(), calls = doc.calls.len(), "loaded syscall policy");
        Ok(Self::new(doc.calls, mode, deny_errno))
    }

    /// Syscall names in document order.
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// Builds the BPF program for this policy.
    ///
    /// In [`PolicyMode::Lenient`] a name that does not resolve on this
    /// architecture is logged and left out, widening nothing but denying
    /// that name. In [`PolicyMode::Strict`] it aborts compilation.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::UnknownSyscall`] in strict mode, and
    /// [`ZygoteError::Seccomp`] if nothing resolved or `seccompiler`
    /// rejects the filter.
    pub fn compile(&self) -> Result<CompiledFilter> {
        let mut rules: BTreeMap<i64, Vec<SeccompRule>> = BTreeMap::new();
        let mut skipped = Vec::new();

        for name in &self.calls {
            match syscalls::resolve(name) {
                Some(nr) => {
                    let _ = rules.entry(nr).or_default();
                }
                None if self.mode == PolicyMode::Strict => {
                    return Err(ZygoteError::UnknownSyscall { name: name.clone() });
                }
                None => {
                    tracing::warn!(syscall = %name, "unknown syscall in policy, rule skipped");
                    skipped.push(name.clone());
                }
            }
        }

        if rules.is_empty() {
            return Err(ZygoteError::Seccomp {
                message: "policy allows no resolvable syscalls".into(),
            });
        }

        let allowed = rules.len();

        let filter = SeccompFilter::new(
            rules,
            SeccompAction::Errno(self.deny_errno),
            SeccompAction::Allow,
            TARGET_ARCH,
        )
        .map_err(|e| ZygoteError::Seccomp {
            message: format!("failed to create seccomp filter: {e}"),
        })?;
        let program: BpfProgram = filter.try_into().map_err(|e: seccompiler::BackendError| {
            ZygoteError::Seccomp {
                message: format!("failed to compile BPF program: {e}"),
            }
        })?;

        Ok(CompiledFilter {
            program,
            allowed,
            skipped,
        })
    }
}

/// A compiled, not yet installed, syscall filter.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    program: BpfProgram,
    allowed: usize,
    skipped: Vec<String>,
}

impl CompiledFilter {
    /// Number of distinct syscalls the filter allows.
    pub const fn allowed(&self) -> usize {
        self.allowed
    }

    /// Policy names that were left out because they did not resolve.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Loads the filter into the kernel for the calling thread.
    ///
    /// Sets `no_new_privs` first, which lets unprivileged processes
    /// install filters. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::Seccomp`] if the kernel rejects the program.
    pub fn install(&self) -> Result<()> {
        seccompiler::apply_filter(&self.program).map_err(|e| ZygoteError::Seccomp {
            message: format!("failed to apply seccomp filter: {e}"),
        })
    }
}

/// Loads, compiles, and installs the policy at `path`.
///
/// # Errors
///
/// Returns any error from [`SyscallPolicy::load`],
/// [`SyscallPolicy::compile`], or [`CompiledFilter::install`].
pub fn install_policy(path: &Path, mode: PolicyMode, deny_errno: u32) -> Result<CompiledFilter> {
    let filter = SyscallPolicy::load(path, mode, deny_errno)?.compile()?;
    filter.install()?;
    tracing::info!(
        allowed = filter.allowed(),
        skipped = filter.skipped().len(),
        %mode,
        "seccomp filter installed"
    );
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn lenient_mode_skips_unknown_names() {
        let policy = SyscallPolicy::new(
            names(&["read", "no_such_call", "write", "exit"]),
            PolicyMode::Lenient,
            1,
        );
        let filter = policy.compile().expect("compile");
        assert_eq!(filter.allowed(), 3);
        assert_eq!(filter.skipped(), ["no_such_call"]);
    }

    #[test]
    fn strict_mode_rejects_unknown_names() {
        let policy = SyscallPolicy::new(names(&["read", "no_such_call"]), PolicyMode::Strict, 1);
        let err = policy.compile().expect_err("strict");
        assert!(matches!(err, ZygoteError::UnknownSyscall { name } if name == "no_such_call"));
    }

    #[test]
    fn recent_syscalls_are_allowed_not_skipped() {
        let calls = names(&[
            "read",
            "clone3",
            "rseq",
            "close_range",
            "faccessat2",
            "openat2",
            "pidfd_open",
            "io_uring_setup",
        ]);
        let filter = SyscallPolicy::new(calls, PolicyMode::Lenient, 1)
            .compile()
            .expect("compile");
        assert!(filter.skipped().is_empty(), "{:?}", filter.skipped());
        assert_eq!(filter.allowed(), 8);
    }

    #[test]
    fn strict_mode_accepts_recent_syscalls() {
        let policy = SyscallPolicy::new(names(&["read", "clone3"]), PolicyMode::Strict, 1);
        assert_eq!(policy.compile().expect("strict").allowed(), 2);
    }

    #[test]
    fn duplicate_names_collapse() {
        let policy = SyscallPolicy::new(names(&["read", "read", "write"]), PolicyMode::Lenient, 1);
        assert_eq!(policy.compile().expect("compile").allowed(), 2);
    }

    #[test]
    fn policy_with_nothing_resolvable_is_rejected() {
        let policy = SyscallPolicy::new(names(&["bogus"]), PolicyMode::Lenient, 1);
        assert!(matches!(policy.compile(), Err(ZygoteError::Seccomp { .. })));
    }

    #[test]
    fn load_reads_calls_field() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(br#"{"calls": ["read", "write", "futex"]}"#)
            .expect("write");
        let policy = SyscallPolicy::load(file.path(), PolicyMode::Lenient, 1).expect("load");
        assert_eq!(policy.calls(), ["read", "write", "futex"]);
    }

    #[test]
    fn load_rejects_document_without_calls() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(br#"{"syscalls": []}"#).expect("write");
        let err = SyscallPolicy::load(file.path(), PolicyMode::Lenient, 1).expect_err("schema");
        assert!(matches!(err, ZygoteError::Serialization { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = SyscallPolicy::load(Path::new("/nonexistent/syscalls.json"), PolicyMode::Lenient, 1)
            .expect_err("missing");
        assert!(matches!(err, ZygoteError::Io { .. }));
    }
}
