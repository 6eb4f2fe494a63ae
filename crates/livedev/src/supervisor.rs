use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::resolver::Resolver;
use crate::runner::{Output, ProcessHandle, ProcessRunner, SpawnRequest, WaitOutcome};
use crate::types::*;
use crate::watcher::{ChangeCallback, FileWatcher, OwnerId};

/// Supervises one app: its process, the files it depends on, and the watch
/// registrations on those files.
///
/// Every command (`start`, `stop`, `restart`, and the restart triggered by a
/// change notification) runs under the app's command lock, so commands for
/// one app never interleave. Different apps do not share the lock.
pub struct AppSupervisor {
	spec: AppSpec,
	owner: OwnerId,
	config: SupervisorConfig,
	resolver: Resolver,
	watcher: Arc<dyn FileWatcher>,
	runner: Arc<dyn ProcessRunner>,
	runtime: Mutex<AppRuntime>,
	/// Bumped right before every spawn. Change notifications remember the
	/// value they saw on arrival.
	spawns: AtomicU64,
}

#[derive(Debug)]
struct AppRuntime {
	state: AppState,
	dependencies: DependencySet,
	process: Option<ProcessHandle>,
}

impl AppSupervisor {
	pub fn new(
		spec: AppSpec,
		config: SupervisorConfig,
		watcher: Arc<dyn FileWatcher>,
		runner: Arc<dyn ProcessRunner>,
	) -> Arc<Self> {
		let resolver = Resolver::new(&config.project_root);
		Arc::new(Self {
			spec,
			owner: OwnerId::next(),
			config,
			resolver,
			watcher,
			runner,
			runtime: Mutex::new(AppRuntime {
				state: AppState::Stopped,
				dependencies: DependencySet::new(),
				process: None,
			}),
			spawns: AtomicU64::new(0),
		})
	}

	pub fn name(&self) -> &str {
		&self.spec.name
	}

	pub fn spec(&self) -> &AppSpec {
		&self.spec
	}

	pub fn owner(&self) -> OwnerId {
		self.owner
	}

	pub async fn state(&self) -> AppState {
		self.runtime.lock().await.state
	}

	pub async fn dependencies(&self) -> DependencySet {
		self.runtime.lock().await.dependencies.clone()
	}

	pub async fn pid(&self) -> Option<u32> {
		self.runtime.lock().await.process.and_then(|p| p.pid)
	}

	pub async fn start(self: &Arc<Self>) -> Result<()> {
		let mut rt = self.runtime.lock().await;
		self.start_locked(&mut rt)
	}

	pub async fn stop(&self) -> StopOutcome {
		let mut rt = self.runtime.lock().await;
		self.stop_locked(&mut rt).await
	}

	pub async fn restart(self: &Arc<Self>) -> Result<()> {
		let mut rt = self.runtime.lock().await;
		self.stop_locked(&mut rt).await;
		self.start_locked(&mut rt)
	}

	/// Restarts the app if `path` belongs to its current dependency set.
	pub async fn on_file_changed(self: &Arc<Self>, path: &Path) {
		let seen = self.spawns.load(Ordering::SeqCst);
		self.handle_change(path.to_path_buf(), seen).await;
	}

	async fn handle_change(self: &Arc<Self>, path: PathBuf, seen: u64) {
		let mut rt = self.runtime.lock().await;
		if !rt.state.is_running() || !rt.dependencies.contains(&path) {
			tracing::trace!("{}: ignoring change to {}", self.spec.name, path.display());
			return;
		}
		// A spawn after the notification arrived already runs the new code.
		if self.spawns.load(Ordering::SeqCst) != seen {
			tracing::debug!("{}: change to {} folded into restart", self.spec.name, path.display());
			return;
		}

		tracing::info!("{}: {} changed, restarting", self.spec.name, path.display());
		self.stop_locked(&mut rt).await;
		if let Err(e) = self.start_locked(&mut rt) {
			tracing::error!("{}", e);
		}
	}

	fn start_locked(self: &Arc<Self>, rt: &mut AppRuntime) -> Result<()> {
		if rt.state.is_running() {
			return Ok(());
		}
		rt.state = AppState::Starting;

		let entries = self.resolver.entry_files(&self.spec);
		if entries.is_empty() {
			rt.state = AppState::Failed;
			rt.dependencies.clear();
			return Err(Error::Configuration {
				app: self.spec.name.clone(),
				command: self.spec.command.clone(),
			});
		}

		let mut dependencies = self.collect_dependencies(&entries);
		let on_modified = self.change_callback();
		// Only paths with a live watch stay in the set.
		dependencies.retain(|path| match self.watcher.watch(self.owner, path, Arc::clone(&on_modified)) {
			Ok(()) => true,
			Err(e) => {
				tracing::warn!("{}: {}", self.spec.name, e);
				false
			}
		});
		rt.dependencies = dependencies;

		let request = SpawnRequest {
			argv: self.spec.argv(),
			cwd: self.config.working_dir.clone(),
			output: Output::Inherit,
		};
		self.spawns.fetch_add(1, Ordering::SeqCst);
		match self.runner.spawn(&request) {
			Ok(process) => {
				rt.process = Some(process);
				rt.state = AppState::Running;
				tracing::info!(
					"{}: started (pid {}), watching {} files",
					self.spec.name,
					process.pid.map(|p| p.to_string()).unwrap_or_else(|| "?".into()),
					rt.dependencies.len()
				);
				Ok(())
			}
			Err(source) => {
				self.watcher.unwatch_all(self.owner);
				rt.dependencies.clear();
				rt.state = AppState::Failed;
				Err(Error::Spawn { app: self.spec.name.clone(), source })
			}
		}
	}

	async fn stop_locked(&self, rt: &mut AppRuntime) -> StopOutcome {
		// Watches go first: a dying process may still write to a watched
		// file, which must not schedule another restart.
		self.watcher.unwatch_all(self.owner);

		let Some(process) = rt.process else {
			if rt.state != AppState::Failed {
				rt.state = AppState::Stopped;
			}
			return StopOutcome::NotRunning;
		};

		rt.state = AppState::Stopping;
		self.runner.terminate(&process);
		let outcome = match self.runner.wait(&process, Some(self.config.grace_period)).await {
			WaitOutcome::Exited(code) => {
				tracing::debug!("{}: exited with {:?}", self.spec.name, code);
				StopOutcome::Exited
			}
			WaitOutcome::TimedOut => {
				let timeout = Error::TerminationTimeout {
					app: self.spec.name.clone(),
					grace: self.config.grace_period,
				};
				tracing::warn!("{}", timeout);
				self.runner.kill(&process);
				self.runner.wait(&process, None).await;
				StopOutcome::Killed
			}
		};

		rt.process = None;
		rt.state = AppState::Stopped;
		tracing::info!("{}: stopped", self.spec.name);
		outcome
	}

	/// Entry files, extra watched files, and everything the entries import.
	fn collect_dependencies(&self, entries: &[PathBuf]) -> DependencySet {
		let mut files: DependencySet = entries.iter().cloned().collect();

		for extra in &self.spec.additional_files {
			let path = self.config.working_dir.join(extra);
			files.insert(path.canonicalize().unwrap_or(path));
		}

		for entry in entries {
			let resolution = self.resolver.resolve(entry);
			for error in &resolution.errors {
				tracing::warn!("{}: {}", self.spec.name, error);
			}
			files.extend(resolution.files);
		}

		if self.spec.verbose {
			for file in &files {
				tracing::info!("{}: watching {}", self.spec.name, file.display());
			}
		} else {
			tracing::debug!("{}: dependencies {:?}", self.spec.name, files);
		}
		files
	}

	fn change_callback(self: &Arc<Self>) -> ChangeCallback {
		let supervisor: Weak<Self> = Arc::downgrade(self);
		let handle = tokio::runtime::Handle::current();
		Arc::new(move |path: &Path| {
			let Some(supervisor) = supervisor.upgrade() else {
				return;
			};
			let seen = supervisor.spawns.load(Ordering::SeqCst);
			let path = path.to_path_buf();
			handle.spawn(async move {
				supervisor.handle_change(path, seen).await;
			});
		})
	}
}
