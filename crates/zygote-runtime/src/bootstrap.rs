//! Bootstrap documents and the runners they select.
//!
//! Each layer's bootstrap process reads a JSON document from the
//! layer's root and hands the layer to the runner it names:
//!
//! ```json
//! { "entry": "fork-server" }
//! { "entry": "exec", "argv": ["/bin/agent", "--serve"], "env": { "RUST_LOG": "info" } }
//! ```
//!
//! `fork-server` turns the layer into a fork server. `exec` replaces the
//! bootstrap process with a program that inherits the control listener;
//! the listener's descriptor is exported in [`LISTEN_FD_ENV`] and the
//! layer depth in [`LAYER_DEPTH_ENV`].

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::os::fd::IntoRawFd;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use zygote_common::constants::{LAYER_DEPTH_ENV, LISTEN_FD_ENV};
use zygote_common::error::{Result, ZygoteError};

use crate::layer::SandboxLayer;

/// Something a layer's bootstrap process can become.
pub trait BootstrapRunner {
    /// Takes over the layer. Only returns on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the runner cannot start or stops serving.
    fn run(&self, layer: SandboxLayer) -> Result<Infallible>;
}

/// Serves fork requests on the layer's control socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForkServerRunner;

impl BootstrapRunner for ForkServerRunner {
    fn run(&self, layer: SandboxLayer) -> Result<Infallible> {
        tracing::info!(depth = layer.depth(), "bootstrap: fork server");
        layer.into_fork_server().serve()
    }
}

/// Replaces the bootstrap process with an external program.
#[derive(Debug, Clone)]
pub struct ExecRunner {
    argv: Vec<String>,
    env: BTreeMap<String, String>,
}

impl ExecRunner {
    /// Creates a runner for `argv`, which must name at least the program.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::Config`] if `argv` is empty.
    pub fn new(argv: Vec<String>, env: BTreeMap<String, String>) -> Result<Self> {
        if argv.is_empty() {
            return Err(ZygoteError::Config {
                message: "exec bootstrap needs a non-empty argv".into(),
            });
        }
        Ok(Self { argv, env })
    }
}

impl BootstrapRunner for ExecRunner {
    fn run(&self, layer: SandboxLayer) -> Result<Infallible> {
        let depth = layer.depth();
        let fd = layer.into_listener().into_raw_fd();
        // SAFETY: fd is the listener released above and stays open.
        let cleared = unsafe { libc::fcntl(fd, libc::F_SETFD, 0) };
        if cleared == -1 {
            return Err(ZygoteError::Io {
                path: PathBuf::from(format!("fd:{fd}")),
                source: std::io::Error::last_os_error(),
            });
        }

        let program = &self.argv[0];
        tracing::info!(program = %program, depth, listen_fd = fd, "bootstrap: exec");
        let err = Command::new(program)
            .args(&self.argv[1..])
            .envs(&self.env)
            .env(LISTEN_FD_ENV, fd.to_string())
            .env(LAYER_DEPTH_ENV, depth.to_string())
            .exec();
        Err(ZygoteError::Io {
            path: PathBuf::from(program),
            source: err,
        })
    }
}

/// Bootstrap entry selected by a document's `entry` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "entry", rename_all = "kebab-case")]
pub enum BootstrapSpec {
    /// Become a fork server.
    ForkServer,
    /// Exec a program with the listener inherited.
    Exec {
        /// Program and arguments.
        argv: Vec<String>,
        /// Extra environment variables.
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
}

impl BootstrapSpec {
    /// Resolves the entry to its runner.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::Config`] if the entry's fields are invalid.
    pub fn runner(self) -> Result<Box<dyn BootstrapRunner>> {
        match self {
            Self::ForkServer => Ok(Box::new(ForkServerRunner)),
            Self::Exec { argv, env } => Ok(Box::new(ExecRunner::new(argv, env)?)),
        }
    }
}

/// A parsed bootstrap document ready to run.
pub struct LoadedBootstrap {
    source_text: String,
    runner: Box<dyn BootstrapRunner>,
}

impl fmt::Debug for LoadedBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedBootstrap")
            .field("source_text", &self.source_text)
            .finish_non_exhaustive()
    }
}

impl LoadedBootstrap {
    /// Reads and parses the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::Bootstrap`] if the file cannot be read or
    /// does not describe a known entry.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ZygoteError::Bootstrap {
            message: format!("cannot read {}: {e}", path.display()),
            source_text: String::new(),
        })?;
        Self::parse(text)
    }

    /// Parses a document.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::Bootstrap`] carrying the document text if it
    /// is not valid JSON, names an unknown entry, or has invalid fields.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let source_text = text.into();
        let runner = serde_json::from_str::<BootstrapSpec>(&source_text)
            .map_err(ZygoteError::from)
            .and_then(BootstrapSpec::runner);
        match runner {
            Ok(runner) => Ok(Self {
                source_text,
                runner,
            }),
            Err(e) => Err(ZygoteError::Bootstrap {
                message: e.to_string(),
                source_text,
            }),
        }
    }

    /// Text of the document.
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Hands `layer` to the selected runner.
    ///
    /// # Errors
    ///
    /// Returns [`ZygoteError::Bootstrap`] carrying the document text if
    /// the runner fails.
    pub fn run(self, layer: SandboxLayer) -> Result<Infallible> {
        let Self {
            source_text,
            runner,
        } = self;
        runner.run(layer).map_err(|e| match e {
            ZygoteError::Bootstrap { .. } => e,
            other => ZygoteError::Bootstrap {
                message: other.to_string(),
                source_text,
            },
        })
    }
}
