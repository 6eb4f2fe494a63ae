use std::future::Future;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::runner::ProcessRunner;
use crate::supervisor::AppSupervisor;
use crate::types::{AppSpec, SupervisorConfig};
use crate::watcher::FileWatcher;

/// Starts every app, waits for shutdown, then stops them in order.
pub struct Orchestrator {
	config: SupervisorConfig,
	watcher: Arc<dyn FileWatcher>,
	runner: Arc<dyn ProcessRunner>,
}

impl Orchestrator {
	pub fn new(
		config: SupervisorConfig,
		watcher: Arc<dyn FileWatcher>,
		runner: Arc<dyn ProcessRunner>,
	) -> Self {
		Self { config, watcher, runner }
	}

	/// Runs `specs` until `shutdown` resolves.
	///
	/// An app that fails to start is reported and left out; the run only
	/// fails when no app could be started at all.
	pub async fn run<F>(&self, specs: Vec<AppSpec>, shutdown: F) -> Result<()>
	where
		F: Future<Output = ()>,
	{
		let apps = self.start_all(specs).await;
		if apps.is_empty() {
			return Err(Error::NoAppsStarted);
		}

		shutdown.await;
		self.stop_all(&apps).await;
		Ok(())
	}

	/// Starts each spec in turn and returns the apps that are now running.
	pub async fn start_all(&self, specs: Vec<AppSpec>) -> Vec<Arc<AppSupervisor>> {
		let mut apps = Vec::with_capacity(specs.len());
		for spec in specs {
			let app = AppSupervisor::new(
				spec,
				self.config.clone(),
				Arc::clone(&self.watcher),
				Arc::clone(&self.runner),
			);
			match app.start().await {
				Ok(()) => apps.push(app),
				Err(e) => tracing::error!("{}", e),
			}
		}
		tracing::info!("managing {} app(s)", apps.len());
		apps
	}

	pub async fn stop_all(&self, apps: &[Arc<AppSupervisor>]) {
		for app in apps {
			app.stop().await;
		}
	}
}
