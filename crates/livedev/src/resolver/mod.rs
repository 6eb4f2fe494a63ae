//! Static resolution of import statements to local source files.

pub mod scan;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ParseError;
use crate::types::{AppSpec, DependencySet, ImportReference, Mode};

pub use scan::scan_imports;

pub const SOURCE_EXTENSION: &str = "py";
pub const PACKAGE_MARKER: &str = "__init__";
pub const MAIN_MARKER: &str = "__main__";

/// Outcome of a lenient resolution pass: every file reached, plus the files
/// that could not be parsed. Unparsable files stay in `files` when an import
/// reached them, so they keep being watched.
#[derive(Debug, Default)]
pub struct Resolution {
	pub files: DependencySet,
	pub errors: Vec<ParseError>,
}

#[derive(Debug, Clone)]
pub struct Resolver {
	root: PathBuf,
}

impl Resolver {
	pub fn new(project_root: impl Into<PathBuf>) -> Self {
		let root = project_root.into();
		Self { root: canonical(&root) }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Maps `name` (with `leading_dots` relative levels) to an existing file.
	///
	/// Candidates are `a/b/__init__.py`, `a/b.py`, `a.py`: the segment list
	/// ends with the package marker and loses its last segment after each
	/// miss. Each candidate is tried under the starting directory first and
	/// the project root second. A relative import that climbs above the
	/// project root does not resolve.
	pub fn resolve_module_to_file(
		&self,
		name: &str,
		leading_dots: usize,
		from_dir: &Path,
	) -> Option<PathBuf> {
		let from_dir = canonical(from_dir);
		let base = if leading_dots == 0 {
			from_dir
		} else {
			self.ascend(&from_dir, leading_dots - 1)?
		};

		let mut search = vec![base];
		if search[0] != self.root {
			search.push(self.root.clone());
		}

		let mut segments: Vec<&str> = name.split('.').filter(|s| !s.is_empty()).collect();
		segments.push(PACKAGE_MARKER);

		while !segments.is_empty() {
			let mut relative: PathBuf = segments.iter().collect();
			relative.set_extension(SOURCE_EXTENSION);
			for dir in &search {
				let candidate = dir.join(&relative);
				if candidate.is_file() {
					return Some(canonical(&candidate));
				}
			}
			segments.pop();
		}
		None
	}

	/// Every local file `entry` reaches through its imports.
	///
	/// Fails only when `entry` itself cannot be parsed; parse errors further
	/// down are logged and the files collected so far are kept.
	pub fn find_local_dependencies(&self, entry: &Path) -> Result<DependencySet, ParseError> {
		let entry = canonical(entry);
		let resolution = self.resolve(&entry);
		for error in resolution.errors {
			if error.path == entry {
				return Err(error);
			}
			tracing::warn!("skipping imports of unparsable file: {}", error);
		}
		Ok(resolution.files)
	}

	/// Lenient transitive resolution. `entry` appears in the result only if
	/// some import leads back to it.
	pub fn resolve(&self, entry: &Path) -> Resolution {
		let mut resolution = Resolution::default();
		let mut scanned: HashSet<PathBuf> = HashSet::new();
		let mut pending = vec![canonical(entry)];

		while let Some(file) = pending.pop() {
			if !scanned.insert(file.clone()) {
				continue;
			}
			let imports = match read_imports(&file) {
				Ok(imports) => imports,
				Err(e) => {
					resolution.errors.push(e);
					continue;
				}
			};
			let from_dir = file.parent().unwrap_or(&self.root).to_path_buf();

			for reference in imports {
				let mut found = vec![self.resolve_module_to_file(
					&reference.module,
					reference.level,
					&from_dir,
				)];
				if let Some(submodule) = reference.submodule() {
					found.push(self.resolve_module_to_file(&submodule, reference.level, &from_dir));
				}
				for path in found.into_iter().flatten() {
					if resolution.files.insert(path.clone()) {
						pending.push(path);
					}
				}
			}
		}
		resolution
	}

	/// Files executed directly when the app starts.
	///
	/// Script mode: the command path itself. Module mode: `a/b.py`, or the
	/// `__init__.py`/`__main__.py` of package `a/b`.
	pub fn entry_files(&self, spec: &AppSpec) -> Vec<PathBuf> {
		match spec.mode {
			Mode::Script => {
				let path = self.root.join(&spec.command);
				if path.is_file() {
					vec![canonical(&path)]
				} else {
					vec![]
				}
			}
			Mode::Module => {
				let package: PathBuf = spec.command.split('.').filter(|s| !s.is_empty()).collect();
				if package.as_os_str().is_empty() {
					return vec![];
				}
				let module = self.root.join(&package).with_extension(SOURCE_EXTENSION);
				if module.is_file() {
					return vec![canonical(&module)];
				}
				[PACKAGE_MARKER, MAIN_MARKER]
					.iter()
					.map(|marker| {
						self.root
							.join(&package)
							.join(marker)
							.with_extension(SOURCE_EXTENSION)
					})
					.filter(|p| p.is_file())
					.map(|p| canonical(&p))
					.collect()
			}
		}
	}

	/// Walks `levels` parents up from `dir`, never past the project root.
	fn ascend(&self, dir: &Path, levels: usize) -> Option<PathBuf> {
		let mut dir = dir.to_path_buf();
		for _ in 0..levels {
			if dir == self.root {
				return None;
			}
			dir = dir.parent()?.to_path_buf();
		}
		Some(dir)
	}
}

fn read_imports(file: &Path) -> Result<Vec<ImportReference>, ParseError> {
	let source = std::fs::read_to_string(file).map_err(|e| ParseError {
		path: file.to_path_buf(),
		line: 0,
		message: format!("cannot read source: {}", e),
	})?;
	scan_imports(file, &source)
}

fn canonical(path: &Path) -> PathBuf {
	path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
