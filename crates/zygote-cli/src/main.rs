//! # zygote
//!
//! Bootstraps a sandbox host: joins the inherited cgroups, installs the
//! syscall filter, and starts the first fork-server layer. Exits 0 once
//! that layer's control socket is bound and 1 on any setup failure.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod cli;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use zygote_runtime::entry;

use crate::cli::{Cli, LogFormat};

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let code = i32::from(e.use_stderr());
        let _ = e.print();
        std::process::exit(code)
    });
    init_tracing(cli.log_format);

    let config = cli.config();
    match entry::run(cli.invocation(), config).context("sandbox layer setup failed")? {}
}
