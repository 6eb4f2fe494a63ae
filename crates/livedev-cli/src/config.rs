use livedev::{AppSpec, Mode, SupervisorConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "livedev.toml";
/// JSON file of `name → app` used before livedev.toml existed.
pub const LEGACY_CONFIG_FILE: &str = ".livedev";
/// Same JSON format under the name the Python tool reads.
pub const PYLIVEDEV_CONFIG_FILE: &str = ".pylivedev";

const DEFAULT_INTERPRETER: &str = "python3";

// ── livedev.toml format ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub interpreter: Option<String>,
	#[serde(default = "default_grace_period")]
	pub grace_period_secs: u64,
	pub project_root: Option<PathBuf>,
}

impl Default for Settings {
	fn default() -> Self {
		Self { interpreter: None, grace_period_secs: default_grace_period(), project_root: None }
	}
}

fn default_grace_period() -> u64 { livedev::DEFAULT_GRACE_PERIOD.as_secs() }

/// A single app definition: either a bare script path or a full table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AppDef {
	Simple(String),
	Full {
		command: String,
		#[serde(default)]
		mode: Mode,
		interpreter: Option<String>,
		#[serde(default)]
		arguments: Vec<String>,
		#[serde(default, alias = "files")]
		additional_files: Vec<PathBuf>,
		#[serde(default)]
		unbuffered: bool,
		#[serde(default)]
		verbose: bool,
	},
}

impl AppDef {
	fn into_spec(self, name: String, settings: &Settings) -> AppSpec {
		let default_interpreter = settings
			.interpreter
			.clone()
			.unwrap_or_else(|| DEFAULT_INTERPRETER.to_string());

		match self {
			AppDef::Simple(command) => AppSpec {
				name,
				command,
				mode: Mode::Script,
				interpreter: default_interpreter.into(),
				arguments: vec![],
				additional_files: vec![],
				unbuffered: false,
				verbose: false,
			},
			AppDef::Full { command, mode, interpreter, arguments, additional_files, unbuffered, verbose } => {
				AppSpec {
					name,
					command,
					mode,
					interpreter: interpreter.unwrap_or(default_interpreter).into(),
					arguments,
					additional_files,
					unbuffered,
					verbose,
				}
			}
		}
	}
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
	#[serde(default)]
	settings: Settings,
	#[serde(default)]
	apps: BTreeMap<String, AppDef>,
}

// ── Config: resolved apps ready for the orchestrator ─────────────────────────

#[derive(Debug)]
pub struct Config {
	pub path: PathBuf,
	pub supervisor: SupervisorConfig,
	pub apps: Vec<AppSpec>,
}

/// `livedev.toml` in `dir`, else one of the legacy JSON files.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
	[CONFIG_FILE, LEGACY_CONFIG_FILE, PYLIVEDEV_CONFIG_FILE]
		.iter()
		.map(|name| dir.join(name))
		.find(|path| path.is_file())
}

pub fn load(path: &Path, cwd: &Path) -> Result<Config, String> {
	let content = std::fs::read_to_string(path)
		.map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

	let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
	let file = (if is_toml { parse_toml(&content) } else { parse_legacy_json(&content) })
		.map_err(|e| format!("failed to parse {}: {}", path.display(), e))?;

	let config = resolve(file, cwd, path);
	if config.apps.is_empty() {
		return Err(format!("no apps defined in {}", path.display()));
	}
	Ok(config)
}

fn parse_toml(content: &str) -> Result<ConfigFile, String> {
	toml::from_str(content).map_err(|e| e.to_string())
}

fn parse_legacy_json(content: &str) -> Result<ConfigFile, String> {
	let apps: BTreeMap<String, AppDef> = serde_json::from_str(content).map_err(|e| e.to_string())?;
	Ok(ConfigFile { settings: Settings::default(), apps })
}

fn resolve(file: ConfigFile, cwd: &Path, path: &Path) -> Config {
	let project_root = match &file.settings.project_root {
		Some(root) => cwd.join(root),
		None => cwd.to_path_buf(),
	};
	let supervisor = SupervisorConfig {
		project_root,
		working_dir: cwd.to_path_buf(),
		grace_period: Duration::from_secs(file.settings.grace_period_secs),
	};
	let apps = file
		.apps
		.into_iter()
		.map(|(name, def)| def.into_spec(name, &file.settings))
		.collect();

	Config { path: path.to_path_buf(), supervisor, apps }
}

pub const SAMPLE_CONFIG: &str = r#"# livedev.toml: apps to run and restart when their local imports change

[settings]
# interpreter = "python3"
# grace_period_secs = 10

[apps]
# worker = "worker.py"

# [apps.web]
# command = "web.server"
# mode = "module"
# arguments = ["--port", "8000"]
# additional_files = ["settings.json"]
# unbuffered = true
"#;

#[cfg(test)]
mod tests {
	use super::*;

	fn specs(file: ConfigFile) -> Vec<AppSpec> {
		resolve(file, Path::new("/work"), Path::new("/work/livedev.toml")).apps
	}

	#[test]
	fn toml_simple_and_full_apps() {
		let file = parse_toml(
			r#"
[settings]
interpreter = "/opt/py/bin/python"

[apps]
worker = "worker.py"

[apps.web]
command = "web.server"
mode = "module"
interpreter = "python3.12"
arguments = ["--port", "8000"]
additional_files = ["settings.json"]
unbuffered = true
verbose = true
"#,
		)
		.unwrap();
		let apps = specs(file);
		assert_eq!(apps.len(), 2);

		let web = &apps[0];
		assert_eq!(web.name, "web");
		assert_eq!(web.mode, Mode::Module);
		assert_eq!(web.interpreter, PathBuf::from("python3.12"));
		assert_eq!(web.arguments, vec!["--port", "8000"]);
		assert_eq!(web.additional_files, vec![PathBuf::from("settings.json")]);
		assert!(web.unbuffered && web.verbose);

		let worker = &apps[1];
		assert_eq!(worker.command, "worker.py");
		assert_eq!(worker.mode, Mode::Script);
		assert_eq!(worker.interpreter, PathBuf::from("/opt/py/bin/python"));
	}

	#[test]
	fn interpreter_defaults_to_python3() {
		let apps = specs(parse_toml("[apps]\nmain = \"main.py\"\n").unwrap());
		assert_eq!(apps[0].interpreter, PathBuf::from("python3"));
	}

	#[test]
	fn settings_defaults() {
		let file = parse_toml("[apps]\nmain = \"main.py\"\n").unwrap();
		let config = resolve(file, Path::new("/work"), Path::new("/work/livedev.toml"));
		assert_eq!(config.supervisor.project_root, PathBuf::from("/work"));
		assert_eq!(config.supervisor.grace_period, Duration::from_secs(10));
	}

	#[test]
	fn project_root_is_relative_to_cwd() {
		let file = parse_toml("[settings]\nproject_root = \"src\"\ngrace_period_secs = 2\n").unwrap();
		let config = resolve(file, Path::new("/work"), Path::new("/work/livedev.toml"));
		assert_eq!(config.supervisor.project_root, PathBuf::from("/work/src"));
		assert_eq!(config.supervisor.working_dir, PathBuf::from("/work"));
		assert_eq!(config.supervisor.grace_period, Duration::from_secs(2));
	}

	fn temp_dir(name: &str) -> PathBuf {
		let dir = std::env::temp_dir().join(format!("livedev-config-{}-{}", std::process::id(), name));
		let _ = std::fs::remove_dir_all(&dir);
		std::fs::create_dir_all(&dir).unwrap();
		dir
	}

	#[test]
	fn finds_pylivedev_file() {
		let dir = temp_dir("pylivedev");
		assert_eq!(find_config(&dir), None);

		std::fs::write(dir.join(".pylivedev"), r#"{"api": {"command": "api.py"}}"#).unwrap();
		let path = find_config(&dir).unwrap();
		assert_eq!(path, dir.join(".pylivedev"));
		let config = load(&path, &dir).unwrap();
		assert_eq!(config.apps[0].name, "api");

		std::fs::write(dir.join(CONFIG_FILE), "[apps]\nweb = \"web.py\"\n").unwrap();
		assert_eq!(find_config(&dir), Some(dir.join(CONFIG_FILE)));
		let _ = std::fs::remove_dir_all(&dir);
	}

	#[test]
	fn legacy_json_accepts_files_alias() {
		let file = parse_legacy_json(
			r#"{"api": {"command": "api.py", "mode": "script", "files": ["conf.json"]}}"#,
		)
		.unwrap();
		let apps = specs(file);
		assert_eq!(apps[0].name, "api");
		assert_eq!(apps[0].additional_files, vec![PathBuf::from("conf.json")]);
	}

	#[test]
	fn unknown_mode_is_rejected() {
		assert!(parse_toml("[apps.x]\ncommand = \"x.py\"\nmode = \"daemon\"\n").is_err());
	}

	#[test]
	fn sample_config_parses() {
		let file = parse_toml(SAMPLE_CONFIG).unwrap();
		assert!(file.apps.is_empty());
	}
}
