//! Integration tests for the fork-server loop and sandbox layers.
//!
//! These tests are implemented in:
//! `crates/zygote-runtime/tests/fork_server.rs`
//! `crates/zygote-runtime/tests/layer.rs`
//! `crates/zygote-runtime/tests/nested_layers.rs` (ignored, needs root)
//! `crates/zygote-runtime/src/entry.rs` (unit tests)
//!
//! Covered scenarios:
//! - `every_request_gets_exactly_one_response`: one answer per request, cgroup written with the token
//! - `middle_processes_are_reaped`: no zombie left after the readiness barrier
//! - `descriptor_count_returns_to_baseline`: forwarded descriptors closed after N requests
//! - `malformed_request_is_dropped_and_loop_continues`: wrong descriptor count gets no answer
//! - `failed_nested_layer_is_still_answered`: middle exit 1 still produces a token
//! - `middle_process_does_not_hold_the_listener`: the loop's socket is closed before the nested layer starts
//! - `invalid_bootstrap_never_exposes_a_socket`: exit 1 and no socket file
//! - `missing_bootstrap_fails_before_binding`: unreadable bootstrap exits 1 before binding
//! - `corrected_bootstrap_can_start_in_the_same_root`: a failed start leaves nothing behind to clean up
//! - `exec_bootstrap_inherits_bound_listener`: listener fd and depth exported to the program
//! - `bind_failure_is_reported_to_the_caller`: occupied socket path exits 1
//! - `inherited_cgroup_descriptors_receive_entry_pid`: entry point writes its PID to fds 3..
//! - `no_cgroups_without_seccomp_starts_a_connectable_layer`: bare entry reaches a bound layer
//! - `missing_bootstrap_exits_without_a_socket`: entry point propagates the load failure
//! - `nested_layer_is_ready_and_admitted`: full chroot and namespace nesting
