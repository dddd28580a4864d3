//! Full nesting with namespaces and chroot. Needs root.
//!
//! Run with `cargo test -p zygote-runtime --test nested_layers -- --ignored`.

#![allow(clippy::expect_used, clippy::unwrap_used, unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::path::Path;

use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid};
use zygote_common::config::ZygoteConfig;
use zygote_runtime::client;
use zygote_runtime::layer::LayerSettings;
use zygote_runtime::process::{exit_now, fork_process};
use zygote_runtime::starter::start_layer;

const FORK_SERVER: &str = r#"{"entry": "fork-server"}"#;

fn prepare_root(root: &Path) {
    fs::create_dir_all(root.join("host")).expect("mkdir host");
    fs::write(root.join("bootstrap.json"), FORK_SERVER).expect("bootstrap");
}

/// Kills every process re-parented to this test process.
fn kill_adopted_children() {
    let me = std::process::id().to_string();
    for entry in fs::read_dir("/proc").into_iter().flatten().flatten() {
        let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        // Fields after the parenthesised command: state, ppid, ...
        let Some((_, rest)) = stat.rsplit_once(')') else {
            continue;
        };
        if rest.split_whitespace().nth(1) != Some(me.as_str()) {
            continue;
        }
        if let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            let pid = Pid::from_raw(pid);
            let _ = kill(pid, Signal::SIGKILL);
            let _ = waitpid(pid, None);
        }
    }
}

#[test]
#[ignore = "requires root for namespaces and chroot"]
fn nested_layer_is_ready_and_admitted() {
    // SAFETY: prctl with integer arguments only.
    let _ = unsafe { libc::prctl(libc::PR_SET_CHILD_SUBREAPER, 1, 0, 0, 0) };

    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("nested");
    prepare_root(dir.path());
    prepare_root(&nested);
    let cgroup_path = dir.path().join("cgroup.procs");
    let _ = File::create(&cgroup_path).expect("cgroup file");

    match fork_process().expect("fork") {
        ForkResult::Child => {
            if std::env::set_current_dir(dir.path()).is_err() {
                exit_now(2)
            }
            let mut config = ZygoteConfig::default();
            config.socket_path = "host/comms.sock".into();
            let _ = start_layer(LayerSettings::new(config, "bootstrap.json"), 0);
            exit_now(1)
        }
        ForkResult::Parent { child } => {
            let status = waitpid(child, None).expect("waitpid");
            assert_eq!(status, WaitStatus::Exited(child, 0));
        }
    }

    let root = File::open(&nested).expect("open nested root");
    let cgroup = OpenOptions::new().write(true).open(&cgroup_path).expect("open cgroup");
    let token = client::request_fork(&dir.path().join("host/comms.sock"), root.as_fd(), cgroup.as_fd())
        .expect("response");

    let nested_ready = UnixStream::connect(nested.join("host/comms.sock")).is_ok();
    let admitted = fs::read_to_string(&cgroup_path).expect("cgroup");
    kill_adopted_children();

    assert!(nested_ready, "nested socket not bound when the response arrived");
    assert_eq!(admitted, token.as_u32().to_string());
}
