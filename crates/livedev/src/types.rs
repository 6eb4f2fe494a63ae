use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Grace window between the terminate signal and the kill escalation.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Every local source file one entry point reaches. Rebuilt from scratch on
/// each start, never patched in place.
pub type DependencySet = BTreeSet<PathBuf>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	/// `command` is a path to a file that is executed directly.
	#[default]
	Script,
	/// `command` is a dotted module name run with the interpreter's `-m`.
	Module,
}

/// Immutable description of one supervised app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppSpec {
	pub name: String,
	pub command: String,
	#[serde(default)]
	pub mode: Mode,
	pub interpreter: PathBuf,
	#[serde(default)]
	pub arguments: Vec<String>,
	#[serde(default)]
	pub additional_files: Vec<PathBuf>,
	#[serde(default)]
	pub unbuffered: bool,
	#[serde(default)]
	pub verbose: bool,
}

impl AppSpec {
	/// Argument vector in its fixed order: interpreter, `-u`, `-m`, command,
	/// then the configured arguments.
	pub fn argv(&self) -> Vec<String> {
		let mut argv = vec![self.interpreter.to_string_lossy().into_owned()];
		if self.unbuffered {
			argv.push("-u".to_string());
		}
		if self.mode == Mode::Module {
			argv.push("-m".to_string());
		}
		argv.push(self.command.clone());
		argv.extend(self.arguments.iter().cloned());
		argv
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppState {
	Stopped,
	Starting,
	Running,
	Stopping,
	Failed,
}

impl AppState {
	pub fn is_running(&self) -> bool {
		matches!(self, AppState::Running)
	}
}

/// What `stop()` had to do to get rid of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
	NotRunning,
	Exited,
	Killed,
}

/// One import found in a source file.
///
/// `import a.b` is `{ module: "a.b", level: 0, name: None }`,
/// `from ..pkg import mod` is `{ module: "pkg", level: 2, name: Some("mod") }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportReference {
	pub module: String,
	pub level: usize,
	pub name: Option<String>,
}

impl ImportReference {
	pub fn direct(module: impl Into<String>) -> Self {
		Self { module: module.into(), level: 0, name: None }
	}

	pub fn from_import(module: impl Into<String>, level: usize, name: Option<String>) -> Self {
		Self { module: module.into(), level, name }
	}

	/// `module.name` for from-style imports, where `name` may be a submodule.
	pub fn submodule(&self) -> Option<String> {
		let name = self.name.as_deref()?;
		if self.module.is_empty() {
			Some(name.to_string())
		} else {
			Some(format!("{}.{}", self.module, name))
		}
	}
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
	/// Root for absolute imports and the ceiling for relative ones.
	pub project_root: PathBuf,
	/// Where apps are spawned and what relative `additional_files` are
	/// joined to.
	pub working_dir: PathBuf,
	pub grace_period: Duration,
}

impl SupervisorConfig {
	/// Apps run in the current directory.
	pub fn new(project_root: impl Into<PathBuf>) -> Self {
		Self {
			project_root: project_root.into(),
			working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
			grace_period: DEFAULT_GRACE_PERIOD,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn spec(mode: Mode) -> AppSpec {
		AppSpec {
			name: "web".into(),
			command: "web.main".into(),
			mode,
			interpreter: "/usr/bin/python3".into(),
			arguments: vec!["--port".into(), "8000".into()],
			additional_files: vec![],
			unbuffered: true,
			verbose: false,
		}
	}

	#[test]
	fn argv_order_module() {
		assert_eq!(
			spec(Mode::Module).argv(),
			vec!["/usr/bin/python3", "-u", "-m", "web.main", "--port", "8000"]
		);
	}

	#[test]
	fn argv_order_script() {
		let mut s = spec(Mode::Script);
		s.unbuffered = false;
		s.command = "main.py".into();
		assert_eq!(s.argv(), vec!["/usr/bin/python3", "main.py", "--port", "8000"]);
	}

	#[test]
	fn submodule_names() {
		let r = ImportReference::from_import("a.b", 0, Some("c".into()));
		assert_eq!(r.submodule().as_deref(), Some("a.b.c"));
		let r = ImportReference::from_import("", 1, Some("c".into()));
		assert_eq!(r.submodule().as_deref(), Some("c"));
		assert_eq!(ImportReference::direct("a").submodule(), None);
	}
}
