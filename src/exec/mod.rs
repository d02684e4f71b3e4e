// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`invocation`] resolves descriptors into argv + process options.
//! - [`backend`] defines the `ProcessLauncher` / `ProcessHandle` seam the
//!   supervisor talks to, plus the production launcher.
//! - [`driver`] runs one service as a real child process with restarts,
//!   using `tokio::process::Command`.

pub mod backend;
pub mod driver;
pub mod invocation;

pub use backend::{NeverStarted, ProcessHandle, ProcessLauncher, RealProcessLauncher};
pub use driver::ChildProcess;
pub use invocation::{build_invocation, Invocation, ProcessOptions};
