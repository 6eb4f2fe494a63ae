use std::sync::Arc;

use livedev::{NotifyWatcher, Orchestrator, TokioRunner};
use owo_colors::OwoColorize;
use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::config::Config;

/// Exit status when a second signal arrives during teardown.
const INTERRUPTED: i32 = 130;

pub async fn run(config: Config) -> Result<(), livedev::Error> {
	let names: Vec<&str> = config.apps.iter().map(|app| app.name.as_str()).collect();
	eprintln!(
		"{} {} running {} from {}",
		"livedev".bold(),
		env!("CARGO_PKG_VERSION"),
		names.join(", ").cyan(),
		config.path.display()
	);

	let orchestrator = Orchestrator::new(
		config.supervisor,
		Arc::new(NotifyWatcher::new()?),
		Arc::new(TokioRunner::new()),
	);
	orchestrator.run(config.apps, shutdown()).await?;

	eprintln!("{}", "goodbye".dimmed());
	Ok(())
}

/// Resolves on the first SIGINT or SIGTERM. A later signal aborts the
/// process instead of waiting for the apps to stop.
async fn shutdown() {
	wait_for_signal().await;
	tracing::info!("shutting down");
	tokio::spawn(async {
		wait_for_signal().await;
		tracing::warn!("interrupted again, exiting without waiting");
		std::process::exit(INTERRUPTED);
	});
}

async fn wait_for_signal() {
	let mut terminate = match signal(SignalKind::terminate()) {
		Ok(stream) => Some(stream),
		Err(e) => {
			tracing::warn!("cannot listen for SIGTERM: {}", e);
			None
		}
	};
	tokio::select! {
		_ = tokio::signal::ctrl_c() => {},
		_ = recv(&mut terminate) => {},
	}
}

async fn recv(stream: &mut Option<Signal>) {
	match stream {
		Some(stream) => {
			stream.recv().await;
		}
		None => std::future::pending::<()>().await,
	}
}
