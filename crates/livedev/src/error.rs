use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A source file that could not be tokenized or holds a malformed import.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}:{line}: {message}", .path.display())]
pub struct ParseError {
	pub path: PathBuf,
	pub line: usize,
	pub message: String,
}

#[derive(Debug, Error)]
#[error("failed to spawn {program}: {source}")]
pub struct SpawnError {
	pub program: String,
	#[source]
	pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("{app}: no entry file found for '{command}'")]
	Configuration { app: String, command: String },

	#[error(transparent)]
	Parse(#[from] ParseError),

	#[error("{app}: {source}")]
	Spawn {
		app: String,
		#[source]
		source: SpawnError,
	},

	#[error("{app}: process still alive {grace:?} after terminate, killing")]
	TerminationTimeout { app: String, grace: Duration },

	#[error("failed to watch {}: {message}", .path.display())]
	Watch { path: PathBuf, message: String },

	#[error("no apps could be started")]
	NoAppsStarted,
}

impl Error {
	pub fn is_configuration(&self) -> bool {
		matches!(self, Error::Configuration { .. })
	}

	pub fn is_spawn(&self) -> bool {
		matches!(self, Error::Spawn { .. })
	}
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
