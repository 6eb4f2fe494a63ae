//! File watch registrations shared by every supervised app.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};

use crate::error::Error;

/// Called with the modified path. Runs on the watcher's event thread.
pub type ChangeCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// Identifies the app a watch registration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub u64);

impl OwnerId {
	pub fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		OwnerId(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

/// Delivers content-modification notifications for registered files.
///
/// Implementations must accept registrations from several apps at once.
pub trait FileWatcher: Send + Sync {
	/// Registers `path` for `owner`. Registering the same pair twice is a
	/// no-op.
	fn watch(&self, owner: OwnerId, path: &Path, on_modified: ChangeCallback) -> Result<(), Error>;

	/// Drops every registration `owner` holds.
	fn unwatch_all(&self, owner: OwnerId);
}

type Registrations = HashMap<PathBuf, Vec<(OwnerId, ChangeCallback)>>;

struct Backend {
	watcher: RecommendedWatcher,
	/// Registrations per watched directory.
	dirs: HashMap<PathBuf, usize>,
}

/// [`FileWatcher`] on top of the platform's native notification API.
///
/// Files are watched through their parent directory so that a file that is
/// replaced on disk keeps reporting. Only data modifications are delivered.
pub struct NotifyWatcher {
	backend: Mutex<Backend>,
	registrations: Arc<Mutex<Registrations>>,
}

impl NotifyWatcher {
	pub fn new() -> Result<Self, Error> {
		let registrations: Arc<Mutex<Registrations>> = Arc::default();
		let dispatch_to = Arc::clone(&registrations);
		let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
			Ok(event) => dispatch(&dispatch_to, event),
			Err(e) => tracing::warn!("watch error: {}", e),
		})
		.map_err(|e| Error::Watch { path: PathBuf::new(), message: e.to_string() })?;

		Ok(Self {
			backend: Mutex::new(Backend { watcher, dirs: HashMap::new() }),
			registrations,
		})
	}

	/// Number of (owner, path) registrations currently held.
	pub fn registration_count(&self) -> usize {
		lock(&self.registrations).values().map(Vec::len).sum()
	}
}

impl FileWatcher for NotifyWatcher {
	fn watch(&self, owner: OwnerId, path: &Path, on_modified: ChangeCallback) -> Result<(), Error> {
		// The backend lock serializes registration changes. The event thread
		// only ever takes the registrations lock, so calling into notify
		// while holding the backend lock cannot deadlock against it.
		let mut backend = lock(&self.backend);
		let already = lock(&self.registrations)
			.get(path)
			.is_some_and(|owners| owners.iter().any(|(o, _)| *o == owner));
		if already {
			return Ok(());
		}

		let dir = path.parent().unwrap_or(path).to_path_buf();
		if !backend.dirs.contains_key(&dir) {
			backend
				.watcher
				.watch(&dir, RecursiveMode::NonRecursive)
				.map_err(|e| Error::Watch { path: path.to_path_buf(), message: e.to_string() })?;
		}
		*backend.dirs.entry(dir).or_insert(0) += 1;

		lock(&self.registrations)
			.entry(path.to_path_buf())
			.or_default()
			.push((owner, on_modified));
		Ok(())
	}

	fn unwatch_all(&self, owner: OwnerId) {
		let mut backend = lock(&self.backend);
		let mut removed = Vec::new();
		{
			let mut registrations = lock(&self.registrations);
			registrations.retain(|path, owners| {
				let before = owners.len();
				owners.retain(|(o, _)| *o != owner);
				if owners.len() != before {
					removed.push(path.clone());
				}
				!owners.is_empty()
			});
		}

		for path in removed {
			let dir = path.parent().unwrap_or(path.as_path()).to_path_buf();
			let Some(count) = backend.dirs.get_mut(&dir) else {
				continue;
			};
			*count -= 1;
			if *count == 0 {
				backend.dirs.remove(&dir);
				if let Err(e) = backend.watcher.unwatch(&dir) {
					tracing::debug!("unwatch {}: {}", dir.display(), e);
				}
			}
		}
	}
}

fn dispatch(registrations: &Mutex<Registrations>, event: Event) {
	if !matches!(event.kind, EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)) {
		return;
	}
	for path in &event.paths {
		let callbacks: Vec<ChangeCallback> = match lock(registrations).get(path) {
			Some(owners) => owners.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
			None => continue,
		};
		for callback in callbacks {
			callback(path);
		}
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
