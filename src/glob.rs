//! Filename expansion for `*` and `?`.
//!
//! A pattern is matched one `/`-separated component at a time: components without
//! metacharacters are appended as they are, the others are compiled to a byte regex
//! and matched against the entries of every directory reached so far. Names starting
//! with `.` only match a component that starts with `.` too.

use std::ffi::OsStr;
use std::fmt::Write;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use regex::bytes::Regex;
use tracing::{debug, warn};

use crate::types::Token;

pub fn has_magic(token: &[u8]) -> bool {
	token.iter().any(|&c| c == b'*' || c == b'?')
}

fn compile(component: &[u8]) -> Result<Regex, regex::Error> {
	let mut re = String::from("(?-u)^");
	for &c in component {
		match c {
			b'*' => re.push_str("[^/]*"),
			b'?' => re.push_str("[^/]"),
			c if c.is_ascii_alphanumeric() => re.push(c as char),
			c => { let _ = write!(re, "\\x{:02x}", c); },
		}
	}
	re.push('$');
	Regex::new(&re)
}

fn join(prefix: &[u8], component: &[u8]) -> Token {
	let mut path = prefix.to_vec();
	if !path.is_empty() && path.last() != Some(&b'/') {
		path.push(b'/');
	}
	path.extend_from_slice(component);
	path
}

fn on_disk(base: &Path, path: &[u8]) -> PathBuf {
	let path = Path::new(OsStr::from_bytes(path));
	if path.is_absolute() { path.to_path_buf() } else { base.join(path) }
}

fn matching_entries(base: &Path, prefix: &[u8], re: &Regex, show_hidden: bool, dirs_only: bool) -> Vec<Token> {
	let entries = match fs::read_dir(on_disk(base, prefix)) {
		Ok(entries) => entries,
		Err(_) => { return vec![]; },
	};
	let mut found = vec![];
	for entry in entries.flatten() {
		let name = entry.file_name();
		let name = name.as_bytes();
		if !show_hidden && name.first() == Some(&b'.') {
			continue;
		}
		if !re.is_match(name) {
			continue;
		}
		let path = join(prefix, name);
		if dirs_only && !on_disk(base, &path).is_dir() {
			continue;
		}
		found.push(path);
	}
	found
}

/// All paths matching `pattern`, resolved relative to `base`, sorted bytewise.
/// The returned paths keep the form of the pattern (relative patterns give relative
/// paths, a trailing `/` only matches directories and is kept).
pub fn matches_in(base: &Path, pattern: &[u8]) -> Vec<Token> {
	let absolute = pattern.first() == Some(&b'/');
	let trailing = pattern.len() > 1 && pattern.last() == Some(&b'/');
	let components: Vec<&[u8]> = pattern.split(|&c| c == b'/').filter(|c| !c.is_empty()).collect();
	let mut candidates: Vec<Token> = vec![if absolute { b"/".to_vec() } else { vec![] }];
	for (n, component) in components.iter().enumerate() {
		let last = n + 1 == components.len();
		let mut next = vec![];
		if has_magic(component) {
			let re = match compile(component) {
				Ok(re) => re,
				Err(e) => {
					warn!("cannot compile glob component {:?}: {}", String::from_utf8_lossy(component), e);
					return vec![];
				},
			};
			let show_hidden = component.first() == Some(&b'.');
			for prefix in &candidates {
				next.extend(matching_entries(base, prefix, &re, show_hidden, !last || trailing));
			}
		} else {
			for prefix in &candidates {
				next.push(join(prefix, component));
			}
		}
		candidates = next;
		if candidates.is_empty() {
			break;
		}
	}
	candidates.retain(|c| fs::symlink_metadata(on_disk(base, c)).is_ok());
	if trailing {
		candidates.retain(|c| on_disk(base, c).is_dir());
		for path in candidates.iter_mut() {
			path.push(b'/');
		}
	}
	candidates.sort();
	candidates
}

/// Expands `pattern` against the current directory. A pattern matching nothing
/// expands to itself.
pub fn expand(pattern: &[u8]) -> Vec<Token> {
	let found = matches_in(Path::new("."), pattern);
	debug!(pattern = %String::from_utf8_lossy(pattern), matches = found.len(), "glob");
	if found.is_empty() {
		vec![pattern.to_vec()]
	} else {
		found
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs::File;

	fn tree() -> tempfile::TempDir {
		let dir = tempfile::tempdir().unwrap();
		for name in &["b.txt", "a.txt", "ab.rs", ".hidden.txt", "notes"] {
			File::create(dir.path().join(name)).unwrap();
		}
		fs::create_dir_all(dir.path().join("src/net")).unwrap();
		File::create(dir.path().join("src/main.rs")).unwrap();
		File::create(dir.path().join("src/net/mod.rs")).unwrap();
		dir
	}

	fn strs(found: Vec<Token>) -> Vec<String> {
		found.into_iter().map(|t| String::from_utf8(t).unwrap()).collect()
	}

	#[test]
	fn detects_metacharacters() {
		assert!(has_magic(b"*.rs"));
		assert!(has_magic(b"a?c"));
		assert!(!has_magic(b"plain.txt"));
	}

	#[test]
	fn star_matches_sorted_and_skips_hidden() {
		let dir = tree();
		assert_eq!(strs(matches_in(dir.path(), b"*.txt")), vec!["a.txt", "b.txt"]);
	}

	#[test]
	fn leading_dot_matches_hidden() {
		let dir = tree();
		assert_eq!(strs(matches_in(dir.path(), b".*.txt")), vec![".hidden.txt"]);
	}

	#[test]
	fn question_mark_is_one_byte() {
		let dir = tree();
		assert_eq!(strs(matches_in(dir.path(), b"?.txt")), vec!["a.txt", "b.txt"]);
		assert_eq!(strs(matches_in(dir.path(), b"a?.rs")), vec!["ab.rs"]);
	}

	#[test]
	fn regex_characters_are_literal() {
		let dir = tree();
		assert!(matches_in(dir.path(), b"a+txt*").is_empty());
		assert!(matches_in(dir.path(), b"a.tx(t)?").is_empty());
	}

	#[test]
	fn walks_directories() {
		let dir = tree();
		assert_eq!(strs(matches_in(dir.path(), b"src/*.rs")), vec!["src/main.rs"]);
		assert_eq!(strs(matches_in(dir.path(), b"*/net/mod.rs")), vec!["src/net/mod.rs"]);
		assert_eq!(strs(matches_in(dir.path(), b"s*/*")), vec!["src/main.rs", "src/net"]);
	}

	#[test]
	fn trailing_slash_keeps_only_directories() {
		let dir = tree();
		assert_eq!(strs(matches_in(dir.path(), b"*/")), vec!["src/"]);
		assert_eq!(strs(matches_in(dir.path(), b"s*/n*/")), vec!["src/net/"]);
		assert_eq!(strs(matches_in(dir.path(), b"src/*/")), vec!["src/net/"]);
		assert!(matches_in(dir.path(), b"note?/").is_empty());
	}

	#[test]
	fn directory_component_must_be_a_directory() {
		let dir = tree();
		assert!(matches_in(dir.path(), b"note?/x").is_empty());
	}

	#[test]
	fn absolute_patterns_stay_absolute() {
		let dir = tree();
		let mut pattern = dir.path().as_os_str().as_bytes().to_vec();
		pattern.extend_from_slice(b"/*.rs");
		let found = matches_in(Path::new("/nonexistent"), &pattern);
		assert_eq!(found.len(), 1);
		assert!(found[0].ends_with(b"/ab.rs"));
		assert_eq!(found[0].first(), Some(&b'/'));
	}

	#[test]
	fn no_match_keeps_the_pattern() {
		assert_eq!(expand(b"*.does-not-exist-anywhere"), vec![b"*.does-not-exist-anywhere".to_vec()]);
	}
}
