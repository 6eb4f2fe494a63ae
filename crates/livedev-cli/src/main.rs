mod config;
mod run;

use std::path::{Path, PathBuf};
use livedev::Resolver;
use owo_colors::OwoColorize;
use tracing::Level;

/// Flags accepted before or after the subcommand.
struct GlobalArgs {
	config: Option<PathBuf>,
	level: Level,
	rest: Vec<String>,
}

fn main() {
	let args = match parse_global_args(std::env::args().skip(1)) {
		Ok(args) => args,
		Err(e) => {
			eprintln!("{} {}", "error:".red().bold(), e);
			eprintln!("run 'livedev help' for usage");
			std::process::exit(1);
		}
	};

	let command = args.rest.first().map(|s| s.as_str()).unwrap_or("run");
	match command {
		"help" | "--help" | "-h" => print_usage(),
		"version" | "--version" | "-V" => println!("livedev {}", env!("CARGO_PKG_VERSION")),
		"init" => cmd_init(),
		"deps" => {
			init_logging(args.level);
			cmd_deps(&args.rest[1..]);
		}
		"run" => {
			init_logging(args.level);
			cmd_run(args.config.as_deref());
		}
		other => {
			eprintln!("unknown command: {}", other);
			eprintln!("run 'livedev help' for usage");
			std::process::exit(1);
		}
	}
}

fn parse_global_args(args: impl Iterator<Item = String>) -> Result<GlobalArgs, String> {
	let mut parsed = GlobalArgs { config: None, level: Level::INFO, rest: Vec::new() };
	let mut args = args;
	while let Some(arg) = args.next() {
		match arg.as_str() {
			"-v" | "--verbose" => parsed.level = Level::DEBUG,
			"-q" | "--quiet" => parsed.level = Level::WARN,
			"-c" | "--config" => {
				let path = args.next().ok_or_else(|| format!("{} requires a path", arg))?;
				parsed.config = Some(PathBuf::from(path));
			}
			_ => parsed.rest.push(arg),
		}
	}
	Ok(parsed)
}

fn init_logging(level: Level) {
	tracing_subscriber::fmt()
		.with_max_level(level)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}

fn print_usage() {
	eprintln!("{} {} - restart scripts when their local imports change", "livedev".bold(), env!("CARGO_PKG_VERSION"));
	eprintln!();
	eprintln!("usage: {} [options] [command]", "livedev".bold());
	eprintln!();

	eprintln!("{}", "commands".cyan().bold());
	eprintln!("  {}                  Run every configured app (default)", "run".bold());
	eprintln!("  {} <file>          Print the local files <file> depends on", "deps".bold());
	eprintln!("  {}                 Write a sample {}", "init".bold(), config::CONFIG_FILE);
	eprintln!("  {}                 Show this message", "help".bold());
	eprintln!("  {}              Print the version", "version".bold());
	eprintln!();

	eprintln!("{}", "options".cyan().bold());
	eprintln!("  {} <path>    Config file (default: ./{}, else ./{} or ./{})", "-c, --config".bold(), config::CONFIG_FILE, config::LEGACY_CONFIG_FILE, config::PYLIVEDEV_CONFIG_FILE);
	eprintln!("  {}        Debug logging", "-v, --verbose".bold());
	eprintln!("  {}          Warnings and errors only", "-q, --quiet".bold());
}

fn current_dir() -> PathBuf {
	match std::env::current_dir() {
		Ok(dir) => dir,
		Err(e) => {
			eprintln!("cannot determine working directory: {}", e);
			std::process::exit(1);
		}
	}
}

fn cmd_init() {
	let path = current_dir().join(config::CONFIG_FILE);
	if path.exists() {
		eprintln!("already exists: {}", path.display());
		return;
	}
	match std::fs::write(&path, config::SAMPLE_CONFIG) {
		Ok(()) => eprintln!("created {}", path.display()),
		Err(e) => {
			eprintln!("failed to write {}: {}", path.display(), e);
			std::process::exit(1);
		}
	}
}

fn cmd_deps(args: &[String]) {
	let Some(file) = args.first() else {
		eprintln!("usage: livedev deps <file>");
		std::process::exit(1);
	};
	let cwd = current_dir();
	let entry = cwd.join(file);
	if !entry.is_file() {
		eprintln!("no such file: {}", entry.display());
		std::process::exit(1);
	}

	let resolver = Resolver::new(project_root_for(&cwd));
	match resolver.find_local_dependencies(&entry) {
		Ok(files) => {
			for path in files {
				println!("{}", path.strip_prefix(resolver.root()).unwrap_or(path.as_path()).display());
			}
		}
		Err(e) => {
			eprintln!("{} {}", "error:".red().bold(), e);
			std::process::exit(1);
		}
	}
}

/// The configured project root when a config file is present, else `cwd`.
fn project_root_for(cwd: &Path) -> PathBuf {
	config::find_config(cwd)
		.and_then(|path| config::load(&path, cwd).ok())
		.map(|config| config.supervisor.project_root)
		.unwrap_or_else(|| cwd.to_path_buf())
}

fn cmd_run(config_path: Option<&Path>) {
	let cwd = current_dir();
	let Some(path) = config_path.map(|p| cwd.join(p)).or_else(|| config::find_config(&cwd)) else {
		eprintln!(
			"no {}, {} or {} in {}",
			config::CONFIG_FILE,
			config::LEGACY_CONFIG_FILE,
			config::PYLIVEDEV_CONFIG_FILE,
			cwd.display()
		);
		eprintln!("run 'livedev init' to create one");
		std::process::exit(1);
	};

	let config = match config::load(&path, &cwd) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("{} {}", "error:".red().bold(), e);
			std::process::exit(1);
		}
	};

	let runtime = match tokio::runtime::Runtime::new() {
		Ok(runtime) => runtime,
		Err(e) => {
			eprintln!("failed to start async runtime: {}", e);
			std::process::exit(1);
		}
	};
	if let Err(e) = runtime.block_on(run::run(config)) {
		eprintln!("{} {}", "error:".red().bold(), e);
		std::process::exit(1);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(args: &[&str]) -> GlobalArgs {
		parse_global_args(args.iter().map(|s| s.to_string())).unwrap()
	}

	#[test]
	fn flags_anywhere() {
		let args = parse(&["deps", "-v", "main.py", "--config", "dev.toml"]);
		assert_eq!(args.level, Level::DEBUG);
		assert_eq!(args.config, Some(PathBuf::from("dev.toml")));
		assert_eq!(args.rest, vec!["deps", "main.py"]);
	}

	#[test]
	fn quiet_and_default_level() {
		assert_eq!(parse(&[]).level, Level::INFO);
		assert_eq!(parse(&["-q"]).level, Level::WARN);
	}

	#[test]
	fn config_flag_needs_a_path() {
		assert!(parse_global_args(["-c".to_string()].into_iter()).is_err());
	}
}
