use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::error::SpawnError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
	/// Share the supervisor's own stdout/stderr.
	#[default]
	Inherit,
	Null,
}

#[derive(Debug, Clone)]
pub struct SpawnRequest {
	pub argv: Vec<String>,
	pub cwd: PathBuf,
	pub output: Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
	pub id: u64,
	pub pid: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
	Exited(Option<i32>),
	TimedOut,
}

/// Spawns and signals child processes. The environment is always inherited.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
	fn spawn(&self, request: &SpawnRequest) -> Result<ProcessHandle, SpawnError>;

	/// Asks the process to exit.
	fn terminate(&self, handle: &ProcessHandle);

	fn kill(&self, handle: &ProcessHandle);

	/// Waits for exit, giving up after `timeout` if one is set.
	async fn wait(&self, handle: &ProcessHandle, timeout: Option<Duration>) -> WaitOutcome;
}

/// [`ProcessRunner`] backed by `tokio::process`.
///
/// Each child leads its own process group; terminate and kill signal the
/// whole group so grandchildren go down with it.
#[derive(Default)]
pub struct TokioRunner {
	next_id: AtomicU64,
	children: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<Child>>>>,
}

impl TokioRunner {
	pub fn new() -> Self {
		Self::default()
	}

	fn child(&self, id: u64) -> Option<Arc<tokio::sync::Mutex<Child>>> {
		self.children
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(&id)
			.cloned()
	}

	fn forget(&self, id: u64) {
		self.children
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(&id);
	}
}

#[async_trait]
impl ProcessRunner for TokioRunner {
	fn spawn(&self, request: &SpawnRequest) -> Result<ProcessHandle, SpawnError> {
		let Some((program, args)) = request.argv.split_first() else {
			return Err(SpawnError {
				program: String::new(),
				source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argument vector"),
			});
		};

		let mut cmd = Command::new(program);
		cmd.args(args).current_dir(&request.cwd).process_group(0);
		if request.output == Output::Null {
			cmd.stdout(Stdio::null()).stderr(Stdio::null());
		}

		let child = cmd.spawn().map_err(|source| SpawnError {
			program: program.clone(),
			source,
		})?;

		let handle = ProcessHandle {
			id: self.next_id.fetch_add(1, Ordering::Relaxed),
			pid: child.id(),
		};
		self.children
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(handle.id, Arc::new(tokio::sync::Mutex::new(child)));
		Ok(handle)
	}

	fn terminate(&self, handle: &ProcessHandle) {
		signal_group(handle, nix::sys::signal::Signal::SIGTERM);
	}

	fn kill(&self, handle: &ProcessHandle) {
		signal_group(handle, nix::sys::signal::Signal::SIGKILL);
	}

	async fn wait(&self, handle: &ProcessHandle, timeout: Option<Duration>) -> WaitOutcome {
		let Some(child) = self.child(handle.id) else {
			return WaitOutcome::Exited(None);
		};
		let mut child = child.lock().await;

		let status = match timeout {
			Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
				Ok(status) => status,
				Err(_) => return WaitOutcome::TimedOut,
			},
			None => child.wait().await,
		};
		drop(child);
		self.forget(handle.id);

		match status {
			Ok(status) => WaitOutcome::Exited(status.code()),
			Err(e) => {
				tracing::warn!("wait on pid {:?} failed: {}", handle.pid, e);
				WaitOutcome::Exited(None)
			}
		}
	}
}

fn signal_group(handle: &ProcessHandle, signal: nix::sys::signal::Signal) {
	use nix::sys::signal::killpg;
	use nix::unistd::Pid;

	let Some(pid) = handle.pid else {
		return;
	};
	if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
		tracing::debug!("{:?} to process group {}: {}", signal, pid, e);
	}
}
