//! # livedev
//!
//! Development-time supervisor for scripts and modules.
//!
//! Each app's entry file is scanned for imports, which are resolved to local
//! source files recursively. Those files are watched, and the app's process
//! is restarted whenever one of them is modified.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use livedev::{AppSpec, Mode, NotifyWatcher, Orchestrator, SupervisorConfig, TokioRunner};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), livedev::Error> {
//! let orchestrator = Orchestrator::new(
//!     SupervisorConfig::new("."),
//!     Arc::new(NotifyWatcher::new()?),
//!     Arc::new(TokioRunner::new()),
//! );
//!
//! let specs = vec![AppSpec {
//!     name: "web".into(),
//!     command: "server.py".into(),
//!     mode: Mode::Script,
//!     interpreter: "python3".into(),
//!     arguments: vec![],
//!     additional_files: vec![],
//!     unbuffered: true,
//!     verbose: false,
//! }];
//!
//! orchestrator
//!     .run(specs, async { tokio::signal::ctrl_c().await.ok(); })
//!     .await
//! # }
//! ```

pub mod error;
pub mod orchestrator;
pub mod resolver;
pub mod runner;
pub mod supervisor;
pub mod types;
pub mod watcher;

pub use error::{Error, ParseError, SpawnError};
pub use orchestrator::Orchestrator;
pub use resolver::{Resolution, Resolver};
pub use runner::{ProcessHandle, ProcessRunner, SpawnRequest, TokioRunner, WaitOutcome};
pub use supervisor::AppSupervisor;
pub use types::*;
pub use watcher::{ChangeCallback, FileWatcher, NotifyWatcher, OwnerId};
