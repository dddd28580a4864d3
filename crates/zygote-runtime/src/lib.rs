//! # zygote-runtime
//!
//! Sandbox layer lifecycle on top of the `zygote-core` primitives:
//! starting a layer, serving fork requests on its control socket, and
//! initializing the nested layers those requests create.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod barrier;
pub mod bootstrap;
pub mod client;
pub mod entry;
pub mod initializer;
pub mod layer;
pub mod process;
pub mod protocol;
pub mod server;
pub mod starter;
