//! Import discovery over a whole source file.
//!
//! The file is parsed into a syntax tree and every `import` and
//! `from ... import` statement is collected at any nesting level: inside
//! functions and classes, and in the bodies of `if`, loops, `with`, `try`
//! and `match`.

use std::path::Path;

use rustpython_parser::{ast, Parse};

use crate::error::ParseError;
use crate::types::ImportReference;

/// Every import statement in `source`, in order of appearance.
pub fn scan_imports(path: &Path, source: &str) -> Result<Vec<ImportReference>, ParseError> {
	let source = source.strip_prefix('\u{feff}').unwrap_or(source);
	let suite = ast::Suite::parse(source, &path.to_string_lossy()).map_err(|e| ParseError {
		path: path.to_path_buf(),
		line: line_at(source, u32::from(e.offset) as usize),
		message: e.error.to_string(),
	})?;

	let mut imports = Vec::new();
	collect(&suite, &mut imports);
	Ok(imports)
}

fn collect(body: &[ast::Stmt], out: &mut Vec<ImportReference>) {
	for stmt in body {
		match stmt {
			ast::Stmt::Import(ast::StmtImport { names, .. }) => {
				out.extend(names.iter().map(|alias| ImportReference::direct(alias.name.as_str())));
			}
			ast::Stmt::ImportFrom(ast::StmtImportFrom { module, names, level, .. }) => {
				let module = module.as_ref().map(|m| m.as_str()).unwrap_or_default();
				let level = level.as_ref().map_or(0, |l| l.to_u32() as usize);
				for alias in names {
					let name = alias.name.as_str();
					let name = (name != "*").then(|| name.to_string());
					out.push(ImportReference::from_import(module, level, name));
				}
			}
			ast::Stmt::FunctionDef(ast::StmtFunctionDef { body, .. })
			| ast::Stmt::AsyncFunctionDef(ast::StmtAsyncFunctionDef { body, .. })
			| ast::Stmt::ClassDef(ast::StmtClassDef { body, .. })
			| ast::Stmt::With(ast::StmtWith { body, .. })
			| ast::Stmt::AsyncWith(ast::StmtAsyncWith { body, .. }) => collect(body, out),
			ast::Stmt::If(ast::StmtIf { body, orelse, .. })
			| ast::Stmt::For(ast::StmtFor { body, orelse, .. })
			| ast::Stmt::AsyncFor(ast::StmtAsyncFor { body, orelse, .. })
			| ast::Stmt::While(ast::StmtWhile { body, orelse, .. }) => {
				collect(body, out);
				collect(orelse, out);
			}
			ast::Stmt::Try(ast::StmtTry { body, handlers, orelse, finalbody, .. })
			| ast::Stmt::TryStar(ast::StmtTryStar { body, handlers, orelse, finalbody, .. }) => {
				collect(body, out);
				for handler in handlers {
					match handler {
						ast::ExceptHandler::ExceptHandler(handler) => collect(&handler.body, out),
					}
				}
				collect(orelse, out);
				collect(finalbody, out);
			}
			ast::Stmt::Match(ast::StmtMatch { cases, .. }) => {
				for case in cases {
					collect(&case.body, out);
				}
			}
			_ => {}
		}
	}
}

/// 1-based line of a byte offset.
fn line_at(source: &str, offset: usize) -> usize {
	let end = offset.min(source.len());
	source.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
	use super::*;

	fn scan(source: &str) -> Vec<ImportReference> {
		scan_imports(Path::new("t.py"), source).unwrap()
	}

	fn scan_err(source: &str) -> ParseError {
		scan_imports(Path::new("t.py"), source).unwrap_err()
	}

	#[test]
	fn direct_imports() {
		assert_eq!(
			scan("import os\nimport a.b as c, d\n"),
			vec![
				ImportReference::direct("os"),
				ImportReference::direct("a.b"),
				ImportReference::direct("d"),
			]
		);
	}

	#[test]
	fn from_imports() {
		assert_eq!(
			scan("from a.b import c, d as e\nfrom .. import x\nfrom .m import *\n"),
			vec![
				ImportReference::from_import("a.b", 0, Some("c".into())),
				ImportReference::from_import("a.b", 0, Some("d".into())),
				ImportReference::from_import("", 2, Some("x".into())),
				ImportReference::from_import("m", 1, None),
			]
		);
	}

	#[test]
	fn parenthesized_from_import_spans_lines() {
		let src = "from pkg import (\n    one,  # first\n    two as t,\n)\n";
		assert_eq!(
			scan(src),
			vec![
				ImportReference::from_import("pkg", 0, Some("one".into())),
				ImportReference::from_import("pkg", 0, Some("two".into())),
			]
		);
	}

	#[test]
	fn nested_and_inline_imports() {
		let src = "\
def handler():
    import inner
    if True: import cond
class A:
    x = 1; from deep import thing
try:
    import fast
except ImportError:
    import slow
finally:
    import last
for _ in range(1):
    import looped
else:
    import after_loop
with open('f') as f:
    import managed
";
		let modules: Vec<String> = scan(src).into_iter().map(|r| r.module).collect();
		assert_eq!(
			modules,
			vec!["inner", "cond", "deep", "fast", "slow", "last", "looped", "after_loop", "managed"]
		);
	}

	#[test]
	fn ellipsis_counts_three_levels() {
		assert_eq!(
			scan("from ...up import x\n"),
			vec![ImportReference::from_import("up", 3, Some("x".into()))]
		);
	}

	#[test]
	fn ignores_strings_and_comments() {
		let src = "\
# import commented
s = 'import quoted'
doc = \"\"\"
import in_docstring
\"\"\"
raw = rb'\\d import'
x = {'a': 1}
raise ValueError() from None
__import__('dynamic')
";
		assert!(scan(src).is_empty());
	}

	#[test]
	fn line_continuation() {
		assert_eq!(
			scan("import a, \\\n    b\n"),
			vec![ImportReference::direct("a"), ImportReference::direct("b")]
		);
	}

	#[test]
	fn crlf_line_endings() {
		assert_eq!(scan("import a\r\nimport b\r\n").len(), 2);
	}

	#[test]
	fn leading_byte_order_mark() {
		assert_eq!(scan("\u{feff}import os\n"), vec![ImportReference::direct("os")]);
	}

	#[test]
	fn unterminated_string_is_error() {
		let err = scan_err("import a\nx = 'oops\n");
		assert_eq!(err.line, 2);
		assert_eq!(err.path, Path::new("t.py"));
		assert!(!err.message.is_empty());
	}

	#[test]
	fn unbalanced_brackets_are_errors() {
		scan_err("x = (1,\n2\n");
		scan_err("x = 1)\n");
		scan_err("x = (1]\n");
	}

	#[test]
	fn invalid_statements_are_errors() {
		let err = scan_err("import lib\nx = = 1\ndef f(:):\n    return 1 +\nclass\n");
		assert_eq!(err.line, 2);
		scan_err("def f(:):\n    pass\n");
		scan_err("class\n");
		scan_err("return 1 +\n");
	}

	#[test]
	fn malformed_imports_are_errors() {
		scan_err("import\n");
		scan_err("from import x\n");
		scan_err("from a x\n");
		scan_err("from a import\n");
		scan_err("from a import ()\n");
		scan_err("import a b\n");
	}
}
